//! Configuration for the beam-matching pipeline.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::align::{GridResampler, SincSincKernel};
use crate::beam::{BeamModel, BeamRegistry, BeamSynthesizer, DEFAULT_BEAM_HALF_WIDTH, Waveband};
use crate::error::{Error, Result};

/// Pipeline settings. Every field has a default, so an empty YAML document
/// is a valid configuration.
///
/// ```yaml
/// source: scuba2-450
/// target: scuba2-850
/// beam_half_width: 64
/// sinc_support: 2
/// conserve_flux: true
/// beams:
///   scuba2-450: { alpha: 0.94, beta: 0.06, theta_main: 7.9, theta_secondary: 25.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    /// Waveband the input map must belong to.
    pub source: Waveband,
    /// Waveband whose beam the output should have.
    pub target: Waveband,
    /// Half-width in pixels of the synthesized beam images.
    pub beam_half_width: usize,
    /// Support radius of the sinc·sinc resampling kernel.
    pub sinc_support: usize,
    /// Rebin into summed flux rather than mean surface brightness.
    pub conserve_flux: bool,
    /// Beam models replacing the built-in catalog entries.
    pub beams: BTreeMap<Waveband, BeamModel>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            source: Waveband::Scuba2_450,
            target: Waveband::Scuba2_850,
            beam_half_width: DEFAULT_BEAM_HALF_WIDTH,
            sinc_support: SincSincKernel::default().support,
            conserve_flux: true,
            beams: BTreeMap::new(),
        }
    }
}

impl MatchConfig {
    pub fn from_yaml_str(text: &str) -> std::result::Result<Self, serde_yml::Error> {
        serde_yml::from_str(text)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.source == self.target {
            return Err(Error::invalid(format!(
                "source and target wavebands are both {}",
                self.source
            )));
        }
        if self.beam_half_width == 0 {
            return Err(Error::invalid("beam_half_width must be at least 1"));
        }
        if self.sinc_support == 0 {
            return Err(Error::invalid("sinc_support must be at least 1"));
        }
        for (band, model) in &self.beams {
            model.validate().map_err(|err| {
                Error::invalid(format!("beam override for {}: {}", band, err))
            })?;
        }
        let registry = self.registry();
        for band in [self.source, self.target] {
            if registry.get(band).is_none() {
                return Err(Error::invalid(format!("no beam model for {}", band)));
            }
        }
        Ok(())
    }

    /// Built-in catalog with the configured overrides applied.
    pub fn registry(&self) -> BeamRegistry {
        let mut registry = BeamRegistry::default();
        for (band, model) in &self.beams {
            registry.insert(*band, *model);
        }
        registry
    }

    pub fn synthesizer(&self) -> Result<BeamSynthesizer> {
        BeamSynthesizer::new(self.beam_half_width)
    }

    pub fn sinc_kernel(&self) -> Result<SincSincKernel> {
        SincSincKernel::new(self.sinc_support)
    }

    pub fn resampler(&self) -> GridResampler {
        GridResampler::default().with_conserve(self.conserve_flux)
    }

    pub fn with_source(mut self, source: Waveband) -> Self {
        self.source = source;
        self
    }

    pub fn with_target(mut self, target: Waveband) -> Self {
        self.target = target;
        self
    }

    pub fn with_beam_half_width(mut self, half_width: usize) -> Self {
        self.beam_half_width = half_width;
        self
    }

    pub fn with_sinc_support(mut self, support: usize) -> Self {
        self.sinc_support = support;
        self
    }

    pub fn with_conserve_flux(mut self, conserve: bool) -> Self {
        self.conserve_flux = conserve;
        self
    }

    pub fn with_beam(mut self, band: Waveband, model: BeamModel) -> Self {
        self.beams.insert(band, model);
        self
    }
}
