//! Row/column 2D FFT on rectangular grids.

use std::sync::Arc;

use common::Buffer2;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Planned forward and inverse transforms for a fixed `width × height` grid.
///
/// The inverse transform is normalized by `1 / (width * height)`, so a
/// forward/inverse pair is the identity.
pub(crate) struct Fft2d {
    width: usize,
    height: usize,
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl Fft2d {
    pub fn new(width: usize, height: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            width,
            height,
            row_forward: planner.plan_fft_forward(width),
            row_inverse: planner.plan_fft_inverse(width),
            col_forward: planner.plan_fft_forward(height),
            col_inverse: planner.plan_fft_inverse(height),
        }
    }

    pub fn forward(&self, data: &mut Buffer2<Complex<f64>>) {
        self.process(data, &self.row_forward, &self.col_forward);
    }

    pub fn inverse(&self, data: &mut Buffer2<Complex<f64>>) {
        self.process(data, &self.row_inverse, &self.col_inverse);
        let norm = 1.0 / (self.width * self.height) as f64;
        data.iter_mut().for_each(|c| *c *= norm);
    }

    fn process(
        &self,
        data: &mut Buffer2<Complex<f64>>,
        rows: &Arc<dyn Fft<f64>>,
        cols: &Arc<dyn Fft<f64>>,
    ) {
        assert_eq!(
            data.shape(),
            (self.width, self.height),
            "FFT plan does not match the grid shape"
        );

        data.par_chunks_mut(self.width)
            .for_each(|row| rows.process(row));

        // Columns are transformed as rows of the transposed grid.
        let mut transposed = transpose(data.pixels(), self.width, self.height);
        transposed
            .par_chunks_mut(self.height)
            .for_each(|col| cols.process(col));
        let restored = transpose(&transposed, self.height, self.width);
        data.pixels_mut().copy_from_slice(&restored);
    }
}

/// Transposes a row-major `width × height` grid into a `height × width` one.
fn transpose(data: &[Complex<f64>], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = data[y * width + x];
        }
    }
    out
}

pub(crate) fn to_complex(plane: &Buffer2<f64>) -> Buffer2<Complex<f64>> {
    plane.map(|&v| Complex::new(v, 0.0))
}
