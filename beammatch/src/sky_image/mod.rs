//! Sky maps as seen by the beam-matching pipeline.
//!
//! A [`SkyImage`] is a row-major `f64` plane with a pixel scale in arcsec,
//! integer pixel-index bounds and an optional celestial WCS. Pixel index `k`
//! spans pixel coordinates `(k - 1, k]`, so its center sits at `k - 0.5`.
//! Non-finite samples are bad pixels.

#[cfg(feature = "fits")]
pub mod fits;

use common::Buffer2;
use glam::DVec2;

use crate::beam::Waveband;
use crate::error::{Error, Result};
use crate::wcs::Wcs;

/// Shape of a map. `depth` is `Some` when the data carries a third axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDimensions {
    pub width: usize,
    pub height: usize,
    pub depth: Option<usize>,
}

impl ImageDimensions {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            depth: None,
        }
    }

    pub fn with_depth(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth: Some(depth),
        }
    }

    /// Total number of samples across all planes.
    pub fn sample_count(&self) -> usize {
        self.width * self.height * self.depth.unwrap_or(1)
    }

    /// True when the data is a single plane, with or without a unit third axis.
    pub fn is_planar(&self) -> bool {
        self.depth.is_none_or(|d| d == 1)
    }
}

/// Header values the pipeline reads or carries through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkyImageMetadata {
    /// INSTRUME keyword
    pub instrument: Option<String>,
    /// FILTER keyword
    pub filter: Option<String>,
    /// OBJECT keyword
    pub object: Option<String>,
    /// BUNIT keyword
    pub units: Option<String>,
}

impl SkyImageMetadata {
    pub fn for_waveband(waveband: Waveband) -> Self {
        Self {
            instrument: Some(waveband.instrument().to_string()),
            filter: Some(waveband.filter().to_string()),
            ..Default::default()
        }
    }

    pub fn waveband(&self) -> Option<Waveband> {
        Waveband::from_headers(self.instrument.as_deref()?, self.filter.as_deref()?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkyImage {
    pub dimensions: ImageDimensions,
    pub pixels: Vec<f64>,
    /// Per-axis pixel size in arcsec.
    pub pixel_scale: DVec2,
    /// Pixel index of the first column and row.
    pub lbound: (i64, i64),
    pub wcs: Option<Wcs>,
    pub metadata: SkyImageMetadata,
}

impl SkyImage {
    /// Creates a 2D map with square pixels of `pixel_scale` arcsec.
    pub fn new(width: usize, height: usize, pixels: Vec<f64>, pixel_scale: f64) -> Result<Self> {
        Self::from_parts(
            ImageDimensions::new(width, height),
            pixels,
            DVec2::splat(pixel_scale),
        )
    }

    pub fn from_plane(plane: Buffer2<f64>, pixel_scale: DVec2) -> Result<Self> {
        let dimensions = ImageDimensions::new(plane.width(), plane.height());
        Self::from_parts(dimensions, plane.into_vec(), pixel_scale)
    }

    pub fn from_parts(
        dimensions: ImageDimensions,
        pixels: Vec<f64>,
        pixel_scale: DVec2,
    ) -> Result<Self> {
        if dimensions.width == 0 || dimensions.height == 0 || dimensions.depth == Some(0) {
            return Err(Error::invalid(format!(
                "image bounds must be non-empty, got {:?}",
                dimensions
            )));
        }
        if pixels.len() != dimensions.sample_count() {
            return Err(Error::invalid(format!(
                "expected {} samples for {:?}, got {}",
                dimensions.sample_count(),
                dimensions,
                pixels.len()
            )));
        }
        validate_pixel_scale(pixel_scale)?;

        Ok(Self {
            dimensions,
            pixels,
            pixel_scale,
            lbound: (1, 1),
            wcs: None,
            metadata: SkyImageMetadata::default(),
        })
    }

    pub fn with_lbound(mut self, lbound: (i64, i64)) -> Self {
        self.lbound = lbound;
        self
    }

    /// Attaches a WCS and takes the pixel scale from its CD matrix.
    pub fn with_wcs(mut self, wcs: Wcs) -> Result<Self> {
        let scale = wcs.pixel_scale_arcsec();
        validate_pixel_scale(scale)?;
        self.pixel_scale = scale;
        self.wcs = Some(wcs);
        Ok(self)
    }

    pub fn with_metadata(mut self, metadata: SkyImageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.dimensions.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.dimensions.height
    }

    /// Single-valued pixel size: geometric mean of the two axes.
    pub fn scale(&self) -> f64 {
        (self.pixel_scale.x * self.pixel_scale.y).sqrt()
    }

    /// Drops a unit third axis. Any other depth is rejected.
    pub fn trim_trailing_axis(mut self) -> Result<Self> {
        match self.dimensions.depth {
            None => Ok(self),
            Some(1) => {
                self.dimensions.depth = None;
                Ok(self)
            }
            Some(depth) => Err(Error::invalid(format!(
                "{} does not contain a 2-dimensional image (third axis has {} planes)",
                self.label(),
                depth
            ))),
        }
    }

    /// Copies the pixel plane out. Fails for multi-plane data.
    pub fn plane(&self) -> Result<Buffer2<f64>> {
        if !self.dimensions.is_planar() {
            return Err(Error::invalid(format!(
                "{} does not contain a 2-dimensional image",
                self.label()
            )));
        }
        Ok(Buffer2::new(self.width(), self.height(), self.pixels.clone()))
    }

    /// Same geometry and metadata, new pixel values.
    pub fn with_plane(&self, plane: Buffer2<f64>) -> Self {
        assert_eq!(
            plane.shape(),
            (self.width(), self.height()),
            "replacement plane must match the image shape"
        );
        Self {
            dimensions: ImageDimensions::new(plane.width(), plane.height()),
            pixels: plane.into_vec(),
            pixel_scale: self.pixel_scale,
            lbound: self.lbound,
            wcs: self.wcs.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Sum of all finite samples.
    pub fn finite_sum(&self) -> f64 {
        self.pixels.iter().filter(|v| v.is_finite()).sum()
    }

    pub fn bad_pixel_count(&self) -> usize {
        self.pixels.iter().filter(|v| !v.is_finite()).count()
    }

    /// Position of the center of array pixel `(x, y)` in arcsec, measured in
    /// the pixel-coordinate frame (no celestial projection).
    pub fn pixel_center_arcsec(&self, x: f64, y: f64) -> DVec2 {
        let pixel_coord = DVec2::new(
            self.lbound.0 as f64 + x - 0.5,
            self.lbound.1 as f64 + y - 0.5,
        );
        pixel_coord * self.pixel_scale
    }

    /// Inverse of [`Self::pixel_center_arcsec`].
    pub fn arcsec_to_array(&self, position: DVec2) -> DVec2 {
        let pixel_coord = position / self.pixel_scale;
        DVec2::new(
            pixel_coord.x - self.lbound.0 as f64 + 0.5,
            pixel_coord.y - self.lbound.1 as f64 + 0.5,
        )
    }

    fn label(&self) -> String {
        match &self.metadata.object {
            Some(object) => format!("Image '{}'", object),
            None => "Image".to_string(),
        }
    }
}

fn validate_pixel_scale(scale: DVec2) -> Result<()> {
    if scale.is_finite() && scale.x > 0.0 && scale.y > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "pixel scale must be positive, got {:?}",
            scale
        )))
    }
}
