//! Kernel application by zero-padded FFT convolution.
//!
//! `out[p] = Σ_q img[q] · k[c + p - q]` where `c` is the kernel center. The
//! image is treated as zero outside its bounds; both operands are padded to
//! `(W + kw - 1) × (H + kh - 1)` so the circular product has no wraparound.


use common::Buffer2;
use rustfft::num_complex::Complex;

use crate::error::Result;
use crate::fft::{Fft2d, to_complex};
use crate::kernel::Kernel;
use crate::sky_image::SkyImage;

/// Relative pixel-scale difference above which a mismatch is reported.
const SCALE_WARN_TOLERANCE: f64 = 1e-6;

/// Convolves a map with `kernel`. The output keeps the map's geometry and
/// metadata; bad pixels contribute nothing and stay bad.
pub fn convolve(image: &SkyImage, kernel: &Kernel) -> Result<SkyImage> {
    let plane = image.plane()?;

    let scale = image.scale();
    if (scale - kernel.pixel_scale()).abs() > SCALE_WARN_TOLERANCE * scale {
        tracing::warn!(
            "Kernel sampled at {} arcsec/pixel applied to a {} arcsec/pixel map",
            kernel.pixel_scale(),
            scale
        );
    }

    let bad = image.bad_pixel_count();
    if bad > 0 {
        tracing::debug!("{} bad pixels excluded from convolution", bad);
    }

    Ok(image.with_plane(convolve_plane(&plane, kernel)))
}

/// Convolves a bare plane with `kernel`, ignoring pixel scales.
pub fn convolve_plane(plane: &Buffer2<f64>, kernel: &Kernel) -> Buffer2<f64> {
    let (w, h) = plane.shape();
    let (kw, kh) = kernel.shape();
    let (cx, cy) = kernel.center();
    let (pw, ph) = (w + kw - 1, h + kh - 1);

    let mut padded_image = Buffer2::new_filled(pw, ph, Complex::new(0.0, 0.0));
    for (y, row) in plane.rows().enumerate() {
        for (x, &v) in row.iter().enumerate() {
            if v.is_finite() {
                padded_image[(x, y)] = Complex::new(v, 0.0);
            }
        }
    }

    // Kernel value at displacement d goes to index d mod padded size.
    let mut padded_kernel = Buffer2::new_filled(pw, ph, 0.0);
    for (ky, row) in kernel.data().rows().enumerate() {
        let py = (ky as isize - cy as isize).rem_euclid(ph as isize) as usize;
        for (kx, &v) in row.iter().enumerate() {
            let px = (kx as isize - cx as isize).rem_euclid(pw as isize) as usize;
            padded_kernel[(px, py)] = v;
        }
    }

    let fft = Fft2d::new(pw, ph);
    let mut spectrum_k = to_complex(&padded_kernel);
    fft.forward(&mut padded_image);
    fft.forward(&mut spectrum_k);
    for (a, b) in padded_image.iter_mut().zip(spectrum_k.iter()) {
        *a *= *b;
    }
    fft.inverse(&mut padded_image);

    Buffer2::from_fn(w, h, |x, y| {
        if plane[(x, y)].is_finite() {
            padded_image[(x, y)].re
        } else {
            f64::NAN
        }
    })
}
