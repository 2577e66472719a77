//! Analytic two-component beam models.
//!
//! An instrument beam is modelled as a narrow main lobe plus a broad
//! secondary (error) lobe, both circular Gaussians:
//!
//! ```text
//! B(r) = alpha * exp(-4 ln2 r² / theta_main²) + beta * exp(-4 ln2 r² / theta_secondary²)
//! ```
//!
//! where the thetas are full widths at half maximum in arcsec.

mod registry;

pub use registry::{BeamRegistry, Waveband};

use std::f64::consts::LN_2;

use common::Buffer2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kernel::Kernel;

/// Default beam image half-width in pixels (a 128×128 grid).
pub const DEFAULT_BEAM_HALF_WIDTH: usize = 64;

/// Tolerance on `alpha + beta == 1`.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Two-Gaussian beam parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamModel {
    /// Weight of the main lobe.
    pub alpha: f64,
    /// Weight of the secondary lobe.
    pub beta: f64,
    /// Main lobe FWHM in arcsec.
    pub theta_main: f64,
    /// Secondary lobe FWHM in arcsec.
    pub theta_secondary: f64,
}

impl BeamModel {
    pub const SCUBA2_450: BeamModel = BeamModel {
        alpha: 0.94,
        beta: 0.06,
        theta_main: 7.9,
        theta_secondary: 25.0,
    };

    pub const SCUBA2_850: BeamModel = BeamModel {
        alpha: 0.98,
        beta: 0.02,
        theta_main: 13.0,
        theta_secondary: 48.0,
    };

    pub fn new(alpha: f64, beta: f64, theta_main: f64, theta_secondary: f64) -> Result<Self> {
        let model = Self {
            alpha,
            beta,
            theta_main,
            theta_secondary,
        };
        model.validate()?;
        Ok(model)
    }

    /// Single Gaussian of the given FWHM.
    pub fn gaussian(fwhm: f64) -> Result<Self> {
        Self::new(1.0, 0.0, fwhm, fwhm)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, theta) in [
            ("theta_main", self.theta_main),
            ("theta_secondary", self.theta_secondary),
        ] {
            if !(theta.is_finite() && theta > 0.0) {
                return Err(Error::invalid(format!(
                    "beam width {} must be positive, got {}",
                    name, theta
                )));
            }
        }
        if !(self.alpha >= 0.0 && self.beta >= 0.0) {
            return Err(Error::invalid(format!(
                "beam weights must be non-negative, got alpha={} beta={}",
                self.alpha, self.beta
            )));
        }
        if (self.alpha + self.beta - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::invalid(format!(
                "beam weights must sum to 1, got alpha + beta = {}",
                self.alpha + self.beta
            )));
        }
        Ok(())
    }

    /// Un-normalized profile at squared radius `r2` (arcsec²). Peak value is
    /// `alpha + beta`.
    #[inline]
    pub fn profile(&self, r2: f64) -> f64 {
        let main = (-4.0 * LN_2 * r2 / (self.theta_main * self.theta_main)).exp();
        let secondary = (-4.0 * LN_2 * r2 / (self.theta_secondary * self.theta_secondary)).exp();
        self.alpha * main + self.beta * secondary
    }
}

/// Renders beam models onto a square pixel grid.
///
/// The grid spans pixel indices `1 - half_width ..= half_width` on both axes
/// and the profile peaks at the center of pixel index 1 (pixel coordinate
/// 0.5), which is array index `half_width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamSynthesizer {
    half_width: usize,
}

impl Default for BeamSynthesizer {
    fn default() -> Self {
        Self {
            half_width: DEFAULT_BEAM_HALF_WIDTH,
        }
    }
}

impl BeamSynthesizer {
    pub fn new(half_width: usize) -> Result<Self> {
        if half_width == 0 {
            return Err(Error::invalid("beam half-width must be at least 1 pixel"));
        }
        Ok(Self { half_width })
    }

    pub fn half_width(&self) -> usize {
        self.half_width
    }

    /// Array index of the beam peak on both axes.
    pub fn center(&self) -> (usize, usize) {
        (self.half_width, self.half_width)
    }

    /// Pixel-index bounds of the rendered grid.
    pub fn lbound(&self) -> (i64, i64) {
        let lower = 1 - self.half_width as i64;
        (lower, lower)
    }

    /// Renders `model` at `pixel_scale` arcsec per pixel, normalized to unit sum.
    pub fn synthesize(&self, model: &BeamModel, pixel_scale: f64) -> Result<Kernel> {
        if !(pixel_scale.is_finite() && pixel_scale > 0.0) {
            return Err(Error::invalid(format!(
                "pixel scale must be positive, got {}",
                pixel_scale
            )));
        }
        model.validate()?;

        let size = 2 * self.half_width;
        let center = self.half_width as f64;
        let mut data = Buffer2::from_fn(size, size, |x, y| {
            let dx = (x as f64 - center) * pixel_scale;
            let dy = (y as f64 - center) * pixel_scale;
            model.profile(dx * dx + dy * dy)
        });

        let sum: f64 = data.iter().sum();
        if !(sum.is_finite() && sum > 0.0) {
            return Err(Error::NumericalDegeneracy(format!(
                "beam sum is {} for {:?} at {} arcsec/pixel",
                sum, model, pixel_scale
            )));
        }
        data.iter_mut().for_each(|v| *v /= sum);

        tracing::debug!(
            "Synthesized {}x{} beam (theta_main={}, theta_secondary={}) at {:.3} arcsec/pixel, peak {:.6e}",
            size,
            size,
            model.theta_main,
            model.theta_secondary,
            pixel_scale,
            data[self.center()]
        );

        Kernel::new(data, self.center(), pixel_scale)
    }
}
