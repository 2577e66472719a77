//! Beammatch - resolution matching for submillimetre maps.
//!
//! Smooths a SCUBA-2 450 µm map so that its beam matches the 850 µm beam:
//! - Analytic two-Gaussian beam synthesis
//! - Smoothing kernel derivation by Wiener deconvolution
//! - FFT convolution
//! - Rebin / resample onto a reference pixel grid
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use beammatch::{BeamMatcher, MatchConfig};
//!
//! let map = beammatch::fits::load("s450.fits".as_ref())?;
//! let reference = beammatch::fits::load("s850.fits".as_ref())?;
//!
//! let matcher = BeamMatcher::new(MatchConfig::default())?;
//! let result = matcher.run(&map, Some(&reference))?;
//! beammatch::fits::save(&result.image, "s450_matched.fits".as_ref())?;
//! ```

pub mod align;
pub mod beam;
pub mod convolve;
pub mod error;
pub(crate) mod fft;
pub mod kernel;
pub mod pipeline;
pub mod sky_image;
pub mod wcs;
pub mod wiener;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Core types
// ============================================================================

pub use error::{Error, Result};
pub use kernel::Kernel;
pub use sky_image::{ImageDimensions, SkyImage, SkyImageMetadata};
pub use wcs::Wcs;

#[cfg(feature = "fits")]
pub use sky_image::fits;

// ============================================================================
// Beams and kernels
// ============================================================================

pub use beam::{BeamModel, BeamRegistry, BeamSynthesizer, DEFAULT_BEAM_HALF_WIDTH, Waveband};
pub use convolve::{convolve, convolve_plane};
pub use wiener::{WIENER_REGULARIZATION, deconvolve};

// ============================================================================
// Alignment
// ============================================================================

pub use align::{AlignMode, Aligned, GridAligner, GridResampler, Resampler, SincSincKernel};

// ============================================================================
// Pipeline
// ============================================================================

pub use pipeline::{
    BeamMatcher, MatchConfig, MatchProgress, MatchResult, MatchStage, ProgressCallback,
};
