//! Reconciling the input map's pixel grid with a reference grid.
//!
//! When the reference has coarser pixels the input is rebinned (flux summed
//! into the larger pixels); otherwise it is resampled with a windowed-sinc
//! interpolant. The actual pixel work is delegated to a [`Resampler`].

mod resample;

pub use resample::GridResampler;

use strum_macros::Display;

use crate::error::{Error, Result};
use crate::sky_image::SkyImage;

/// How the input grid is brought onto the reference grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AlignMode {
    /// Flux-conserving accumulation into coarser output pixels.
    #[strum(serialize = "rebin")]
    Rebin,
    /// Interpolation at output pixel centers.
    #[strum(serialize = "resample")]
    Resample,
}

impl AlignMode {
    /// Rebin when the reference pixels are larger than the input's.
    pub fn choose(input_scale: f64, reference_scale: f64) -> Self {
        if reference_scale > input_scale {
            AlignMode::Rebin
        } else {
            AlignMode::Resample
        }
    }
}

/// Separable `sinc(x)·sinc(x/a)` interpolation kernel (Lanczos) with support
/// radius `a` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SincSincKernel {
    pub support: usize,
}

impl Default for SincSincKernel {
    fn default() -> Self {
        Self { support: 2 }
    }
}

impl SincSincKernel {
    pub fn new(support: usize) -> Result<Self> {
        if support == 0 {
            return Err(Error::invalid("sinc support must be at least 1 pixel"));
        }
        Ok(Self { support })
    }

    #[inline]
    pub fn weight(&self, x: f64) -> f64 {
        let a = self.support as f64;
        if x.abs() < 1e-12 {
            return 1.0;
        }
        if x.abs() >= a {
            return 0.0;
        }
        let pi_x = std::f64::consts::PI * x;
        let pi_x_a = pi_x / a;
        (pi_x.sin() / pi_x) * (pi_x_a.sin() / pi_x_a)
    }
}

/// Backend that moves pixel data from one grid onto another.
pub trait Resampler: Send + Sync {
    /// Returns the input's data on the reference grid. The result carries the
    /// reference geometry (shape, bounds, scale, WCS) and the input's metadata.
    fn align_to(
        &self,
        input: &SkyImage,
        reference: &SkyImage,
        mode: AlignMode,
        kernel: SincSincKernel,
    ) -> Result<SkyImage>;
}

/// Output of [`GridAligner::align`].
#[derive(Debug, Clone, PartialEq)]
pub struct Aligned {
    pub image: SkyImage,
    /// Pixel scale (arcsec) at which beams must be synthesized.
    pub pixel_scale: f64,
    /// `None` when no reference was supplied.
    pub mode: Option<AlignMode>,
}

/// Decides between rebinning and resampling and runs the backend.
#[derive(Debug, Clone, Default)]
pub struct GridAligner<R: Resampler = GridResampler> {
    resampler: R,
    kernel: SincSincKernel,
}

impl GridAligner<GridResampler> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: Resampler> GridAligner<R> {
    pub fn with_resampler(resampler: R) -> Self {
        Self {
            resampler,
            kernel: SincSincKernel::default(),
        }
    }

    pub fn with_kernel(mut self, kernel: SincSincKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn resampler(&self) -> &R {
        &self.resampler
    }

    pub fn align(&self, input: &SkyImage, reference: Option<&SkyImage>) -> Result<Aligned> {
        let input = input.clone().trim_trailing_axis()?;

        let Some(reference) = reference else {
            let pixel_scale = input.scale();
            return Ok(Aligned {
                image: input,
                pixel_scale,
                mode: None,
            });
        };

        let reference = reference.clone().trim_trailing_axis()?;
        let mode = AlignMode::choose(input.scale(), reference.scale());
        tracing::debug!(
            "Aligning {}x{} map at {:.3}\"/px onto {}x{} grid at {:.3}\"/px using {}",
            input.width(),
            input.height(),
            input.scale(),
            reference.width(),
            reference.height(),
            reference.scale(),
            mode
        );

        let image = self
            .resampler
            .align_to(&input, &reference, mode, self.kernel)?
            .trim_trailing_axis()?;

        if (image.width(), image.height()) != (reference.width(), reference.height()) {
            return Err(Error::BackendFailure(format!(
                "resampler returned a {}x{} map for a {}x{} reference grid",
                image.width(),
                image.height(),
                reference.width(),
                reference.height()
            )));
        }
        if image.pixels.len() != image.dimensions.sample_count() {
            return Err(Error::BackendFailure(format!(
                "resampler returned {} samples for a {}x{} map",
                image.pixels.len(),
                image.width(),
                image.height()
            )));
        }

        Ok(Aligned {
            image,
            pixel_scale: reference.scale(),
            mode: Some(mode),
        })
    }
}
