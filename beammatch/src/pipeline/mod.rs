//! End-to-end beam matching.
//!
//! 1. Check the input belongs to the source waveband
//! 2. Align it with the reference grid, if one is given
//! 3. Synthesize both beams at the aligned pixel scale and derive the
//!    smoothing kernel by Wiener deconvolution
//! 4. Convolve the aligned map with that kernel

pub mod config;
#[cfg(test)]
mod tests;

pub use config::MatchConfig;

use std::sync::Arc;

use strum_macros::Display;

use crate::align::{AlignMode, GridAligner, GridResampler, Resampler};
use crate::beam::{BeamRegistry, BeamSynthesizer, Waveband};
use crate::convolve::convolve;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::sky_image::SkyImage;
use crate::wiener::deconvolve;

/// Stage of a matching run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MatchStage {
    /// Bringing the input onto the reference grid.
    Aligning,
    /// Building beams and the smoothing kernel.
    SynthesizingKernel,
    /// Applying the kernel.
    Smoothing,
}

/// Progress information for a matching run.
#[derive(Debug, Clone)]
pub struct MatchProgress {
    /// Current step (0-based).
    pub current: usize,
    /// Total number of steps.
    pub total: usize,
    pub stage: MatchStage,
}

/// Callback type for progress reporting.
pub type ProgressCallback = Option<Arc<dyn Fn(MatchProgress) + Send + Sync>>;

const STAGE_COUNT: usize = 3;

fn report_progress(callback: &ProgressCallback, current: usize, stage: MatchStage) {
    if let Some(f) = callback.as_ref() {
        f(MatchProgress {
            current,
            total: STAGE_COUNT,
            stage,
        });
    }
}

/// Output of [`BeamMatcher::run`].
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Smoothed map on the aligned grid.
    pub image: SkyImage,
    /// Kernel that was applied.
    pub kernel: Kernel,
    /// Alignment mode, `None` without a reference.
    pub mode: Option<AlignMode>,
    /// Pixel scale the beams were synthesized at, arcsec.
    pub pixel_scale: f64,
}

pub struct BeamMatcher<R: Resampler = GridResampler> {
    config: MatchConfig,
    registry: BeamRegistry,
    synthesizer: BeamSynthesizer,
    aligner: GridAligner<R>,
    progress: ProgressCallback,
}

impl BeamMatcher<GridResampler> {
    pub fn new(config: MatchConfig) -> Result<Self> {
        config.validate()?;
        let aligner = GridAligner::with_resampler(config.resampler());
        Self::build(config, aligner)
    }
}

impl<R: Resampler> BeamMatcher<R> {
    fn build(config: MatchConfig, aligner: GridAligner<R>) -> Result<Self> {
        let aligner = aligner.with_kernel(config.sinc_kernel()?);
        Ok(Self {
            registry: config.registry(),
            synthesizer: config.synthesizer()?,
            aligner,
            config,
            progress: None,
        })
    }

    /// Replaces the resampling backend.
    pub fn with_resampler<R2: Resampler>(self, resampler: R2) -> Result<BeamMatcher<R2>> {
        let mut matcher = BeamMatcher::build(self.config, GridAligner::with_resampler(resampler))?;
        matcher.progress = self.progress;
        Ok(matcher)
    }

    pub fn with_progress(
        mut self,
        callback: impl Fn(MatchProgress) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Kernel that turns the source beam into the target beam at
    /// `pixel_scale` arcsec per pixel.
    pub fn smoothing_kernel(&self, pixel_scale: f64) -> Result<Kernel> {
        let source = self.beam(self.config.source, pixel_scale)?;
        let target = self.beam(self.config.target, pixel_scale)?;
        deconvolve(&target, &source, self.synthesizer.center())
    }

    pub fn run(&self, input: &SkyImage, reference: Option<&SkyImage>) -> Result<MatchResult> {
        self.check_waveband(input)?;
        let input = input.clone().trim_trailing_axis()?;

        if reference.is_some() {
            tracing::info!("Aligning input map with reference map");
        }
        report_progress(&self.progress, 0, MatchStage::Aligning);
        let aligned = self.aligner.align(&input, reference)?;
        match aligned.mode {
            Some(mode) => tracing::info!(
                "Input aligned using {} at {:.3} arcsec/pixel",
                mode,
                aligned.pixel_scale
            ),
            None => tracing::info!(
                "No reference map, keeping input grid at {:.3} arcsec/pixel",
                aligned.pixel_scale
            ),
        }

        tracing::info!("Creating smoothing kernel");
        report_progress(&self.progress, 1, MatchStage::SynthesizingKernel);
        let kernel = self.smoothing_kernel(aligned.pixel_scale)?;
        if let Some(fwhm) = kernel.fwhm_arcsec() {
            tracing::debug!("Smoothing kernel FWHM {:.2} arcsec", fwhm);
        }

        tracing::info!("Smoothing using above kernel");
        report_progress(&self.progress, 2, MatchStage::Smoothing);
        let image = convolve(&aligned.image, &kernel)?;

        Ok(MatchResult {
            image,
            kernel,
            mode: aligned.mode,
            pixel_scale: aligned.pixel_scale,
        })
    }

    fn beam(&self, band: Waveband, pixel_scale: f64) -> Result<Kernel> {
        let model = self
            .registry
            .get(band)
            .ok_or_else(|| Error::invalid(format!("no beam model for {}", band)))?;
        self.synthesizer.synthesize(model, pixel_scale)
    }

    fn check_waveband(&self, input: &SkyImage) -> Result<()> {
        let source = self.config.source;
        let name = input.metadata.object.as_deref().unwrap_or("input");

        let instrument_ok = input
            .metadata
            .instrument
            .as_deref()
            .is_some_and(|i| i.trim().eq_ignore_ascii_case(source.instrument()));
        if !instrument_ok {
            return Err(Error::invalid(format!(
                "'{}' does not contain {} data",
                name,
                source.instrument()
            )));
        }
        if input.metadata.waveband() != Some(source) {
            return Err(Error::invalid(format!(
                "'{}' does not contain {} um data",
                name,
                source.filter()
            )));
        }
        Ok(())
    }
}
