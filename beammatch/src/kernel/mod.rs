//! Convolution kernels on a pixel grid.

#[cfg(test)]
mod tests;

use common::Buffer2;
use glam::DVec2;

use crate::error::{Error, Result};
use crate::sky_image::SkyImage;

/// A 2D kernel with an explicit zero-displacement pixel.
///
/// `center` is the array index that corresponds to zero offset. Beams are
/// generated with their peak there, and smoothing kernels derived from them
/// keep the same convention.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    data: Buffer2<f64>,
    center: (usize, usize),
    /// Arcsec per pixel.
    pixel_scale: f64,
}

impl Kernel {
    pub fn new(data: Buffer2<f64>, center: (usize, usize), pixel_scale: f64) -> Result<Self> {
        if data.width() == 0 || data.height() == 0 {
            return Err(Error::invalid("kernel must not be empty"));
        }
        if center.0 >= data.width() || center.1 >= data.height() {
            return Err(Error::invalid(format!(
                "kernel center {:?} lies outside the {}x{} grid",
                center,
                data.width(),
                data.height()
            )));
        }
        if !(pixel_scale.is_finite() && pixel_scale > 0.0) {
            return Err(Error::invalid(format!(
                "kernel pixel scale must be positive, got {}",
                pixel_scale
            )));
        }
        Ok(Self {
            data,
            center,
            pixel_scale,
        })
    }

    #[inline]
    pub fn data(&self) -> &Buffer2<f64> {
        &self.data
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    #[inline]
    pub fn center(&self) -> (usize, usize) {
        self.center
    }

    #[inline]
    pub fn pixel_scale(&self) -> f64 {
        self.pixel_scale
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn center_value(&self) -> f64 {
        self.data[self.center]
    }

    /// Full width at half maximum, in pixels, measured around the center.
    ///
    /// Walks outwards along the four axis directions until the profile drops
    /// below half the center value, locating each crossing by linear
    /// interpolation, and averages the four radii. `None` when the center is
    /// not a positive peak or the profile never falls to half within the grid.
    pub fn half_max_width(&self) -> Option<f64> {
        let peak = self.center_value();
        if !(peak.is_finite() && peak > 0.0) {
            return None;
        }
        let half = peak * 0.5;
        let (cx, cy) = (self.center.0 as isize, self.center.1 as isize);

        let mut total = 0.0;
        for (sx, sy) in [(1isize, 0isize), (-1, 0), (0, 1), (0, -1)] {
            let mut prev = peak;
            let mut radius = None;
            for step in 1.. {
                let x = cx + sx * step;
                let y = cy + sy * step;
                let Some(&value) = self.value_at(x, y) else {
                    break;
                };
                if value < half {
                    let frac = (prev - half) / (prev - value);
                    radius = Some((step - 1) as f64 + frac);
                    break;
                }
                prev = value;
            }
            total += radius?;
        }

        Some(total / 2.0)
    }

    /// [`Self::half_max_width`] converted to arcsec.
    pub fn fwhm_arcsec(&self) -> Option<f64> {
        self.half_max_width().map(|w| w * self.pixel_scale)
    }

    /// The kernel as a map whose center pixel has pixel index 1.
    pub fn to_sky_image(&self) -> Result<SkyImage> {
        let lbound = (1 - self.center.0 as i64, 1 - self.center.1 as i64);
        let image = SkyImage::from_plane(self.data.clone(), DVec2::splat(self.pixel_scale))?;
        Ok(image.with_lbound(lbound))
    }

    fn value_at(&self, x: isize, y: isize) -> Option<&f64> {
        if x < 0 || y < 0 {
            return None;
        }
        self.data.get(x as usize, y as usize)
    }
}
