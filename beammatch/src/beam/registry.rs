//! Instrument beam catalog.
//!
//! Two-component beam parameters for SCUBA-2 from Dempsey et al. (2013),
//! "SCUBA-2: on-sky calibration using submillimetre standard sources".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::BeamModel;

/// An instrument and filter combination with a known beam.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum Waveband {
    #[strum(serialize = "scuba2-450")]
    #[serde(rename = "scuba2-450")]
    Scuba2_450,
    #[strum(serialize = "scuba2-850")]
    #[serde(rename = "scuba2-850")]
    Scuba2_850,
}

impl Waveband {
    /// Value of the INSTRUME header for maps in this band.
    pub fn instrument(self) -> &'static str {
        match self {
            Waveband::Scuba2_450 | Waveband::Scuba2_850 => "SCUBA-2",
        }
    }

    /// Value of the FILTER header for maps in this band.
    pub fn filter(self) -> &'static str {
        match self {
            Waveband::Scuba2_450 => "450",
            Waveband::Scuba2_850 => "850",
        }
    }

    /// Resolves INSTRUME and FILTER header values. Surrounding whitespace and
    /// instrument case are ignored; a trailing "um" on the filter is accepted.
    pub fn from_headers(instrument: &str, filter: &str) -> Option<Self> {
        if !instrument.trim().eq_ignore_ascii_case("SCUBA-2") {
            return None;
        }
        let filter = filter.trim();
        let filter = filter
            .strip_suffix("um")
            .map(str::trim_end)
            .unwrap_or(filter);
        match filter {
            "450" => Some(Waveband::Scuba2_450),
            "850" => Some(Waveband::Scuba2_850),
            _ => None,
        }
    }
}

/// Waveband → beam model lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamRegistry {
    beams: BTreeMap<Waveband, BeamModel>,
}

impl BeamRegistry {
    pub fn empty() -> Self {
        Self {
            beams: BTreeMap::new(),
        }
    }

    pub fn get(&self, waveband: Waveband) -> Option<&BeamModel> {
        self.beams.get(&waveband)
    }

    /// Adds or replaces the model for `waveband`.
    pub fn insert(&mut self, waveband: Waveband, model: BeamModel) -> Option<BeamModel> {
        self.beams.insert(waveband, model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Waveband, &BeamModel)> {
        self.beams.iter().map(|(band, model)| (*band, model))
    }
}

impl Default for BeamRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.insert(Waveband::Scuba2_450, BeamModel::SCUBA2_450);
        registry.insert(Waveband::Scuba2_850, BeamModel::SCUBA2_850);
        registry
    }
}
