//! Regularized frequency-domain deconvolution.
//!
//! Given a source beam `s` and a target beam `t`, finds the kernel `k` with
//! `s * k ≈ t`. In the Fourier domain:
//!
//! ```text
//! H = conj(S) / (|S|² + ε)
//! K = H · T
//! ```
//!
//! The regularizer `ε` keeps frequencies where the source carries no power
//! from being amplified. The inverse transform puts zero displacement at
//! array index (0, 0); the result is rolled so it lands on the requested
//! center instead.


use crate::error::{Error, Result};
use crate::fft::{Fft2d, to_complex};
use crate::kernel::Kernel;

/// Wiener regularization constant. Both beams are normalized to unit sum, so
/// their spectra peak at 1 and `ε` is an absolute power floor.
pub const WIENER_REGULARIZATION: f64 = 1e-10;

/// Relative tolerance when comparing the two beams' pixel scales.
const SCALE_TOLERANCE: f64 = 1e-9;

/// Derives the kernel that turns `source` into `target`, centered on `center`.
pub fn deconvolve(target: &Kernel, source: &Kernel, center: (usize, usize)) -> Result<Kernel> {
    if target.shape() != source.shape() {
        return Err(Error::ShapeMismatch {
            target_shape: target.shape(),
            source_shape: source.shape(),
        });
    }
    let (width, height) = target.shape();
    if center.0 >= width || center.1 >= height {
        return Err(Error::invalid(format!(
            "deconvolution center {:?} lies outside the {}x{} grid",
            center, width, height
        )));
    }
    let scale = target.pixel_scale();
    if (scale - source.pixel_scale()).abs() > SCALE_TOLERANCE * scale {
        return Err(Error::invalid(format!(
            "beams sampled at different pixel scales: target {} arcsec, source {} arcsec",
            scale,
            source.pixel_scale()
        )));
    }

    let fft = Fft2d::new(width, height);
    let mut spectrum_t = to_complex(target.data());
    let mut spectrum_s = to_complex(source.data());
    fft.forward(&mut spectrum_t);
    fft.forward(&mut spectrum_s);

    let mut min_denominator = f64::INFINITY;
    for (t, s) in spectrum_t.iter_mut().zip(spectrum_s.iter()) {
        let denominator = s.norm_sqr() + WIENER_REGULARIZATION;
        if !(denominator.is_finite() && denominator > 0.0) {
            return Err(Error::NumericalDegeneracy(format!(
                "Wiener denominator is {}",
                denominator
            )));
        }
        min_denominator = min_denominator.min(denominator);
        *t *= s.conj() / denominator;
    }

    fft.inverse(&mut spectrum_t);
    let raw = spectrum_t.map(|c| c.re);
    if let Some(bad) = raw.iter().find(|v| !v.is_finite()) {
        return Err(Error::NumericalDegeneracy(format!(
            "deconvolution produced a non-finite sample ({})",
            bad
        )));
    }

    let data = raw.rolled(center.0 as isize, center.1 as isize);
    let kernel = Kernel::new(data, center, scale)?;

    tracing::debug!(
        "Wiener kernel {}x{}: sum {:.6}, center value {:.6e}, min denominator {:.3e}",
        width,
        height,
        kernel.sum(),
        kernel.center_value(),
        min_denominator
    );

    Ok(kernel)
}
