//! Celestial world coordinate system.
//!
//! Maps FITS grid coordinates (1-based, integer values at pixel centers) to
//! sky coordinates and back using the gnomonic (tangent plane) projection:
//!
//! 1. Grid to intermediate: `(xi, eta) = CD × (p - CRPIX)` in degrees
//! 2. Intermediate to sky: de-project from the tangent plane about CRVAL

#[cfg(test)]
mod tests;

use glam::{DMat2, DVec2};

/// Arcseconds per degree.
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Below this `|det(CD)|` (deg²) the matrix is treated as singular.
const MIN_CD_DETERMINANT: f64 = 1e-20;

/// Gnomonic WCS with a full CD matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    /// Reference grid coordinate (CRPIX1, CRPIX2).
    pub crpix: DVec2,
    /// Sky coordinate of the reference point in degrees (CRVAL1, CRVAL2).
    pub crval: DVec2,
    /// Grid offset to intermediate coordinates, degrees per pixel.
    /// Column `j` holds (CD1_j, CD2_j).
    pub cd: DMat2,
}

impl Wcs {
    pub fn new(crpix: DVec2, crval: DVec2, cd: DMat2) -> Self {
        Self { crpix, crval, cd }
    }

    /// Builds from the row-major FITS layout `[[CD1_1, CD1_2], [CD2_1, CD2_2]]`.
    pub fn from_cd_rows(crpix: DVec2, crval: DVec2, rows: [[f64; 2]; 2]) -> Self {
        let cd = DMat2::from_cols(
            DVec2::new(rows[0][0], rows[1][0]),
            DVec2::new(rows[0][1], rows[1][1]),
        );
        Self::new(crpix, crval, cd)
    }

    /// Builds a conventional sky-aligned grid: RA increasing to the left,
    /// `pixel_scale` in arcsec, rotated by `rotation` degrees (North through East).
    pub fn from_scale_rotation(
        crpix: DVec2,
        crval: DVec2,
        pixel_scale: f64,
        rotation: f64,
    ) -> Self {
        let scale_deg = pixel_scale / ARCSEC_PER_DEG;
        let (sin_r, cos_r) = rotation.to_radians().sin_cos();
        Self::from_cd_rows(
            crpix,
            crval,
            [
                [-scale_deg * cos_r, -scale_deg * sin_r],
                [-scale_deg * sin_r, scale_deg * cos_r],
            ],
        )
    }

    pub fn determinant(&self) -> f64 {
        self.cd.determinant()
    }

    /// Per-axis pixel size in arcsec (length of each CD column).
    pub fn pixel_scale_arcsec(&self) -> DVec2 {
        DVec2::new(self.cd.x_axis.length(), self.cd.y_axis.length()) * ARCSEC_PER_DEG
    }

    /// Grid coordinate to (RA, Dec) in degrees.
    pub fn pixel_to_sky(&self, pixel: DVec2) -> DVec2 {
        let intermediate = self.cd * (pixel - self.crpix);
        let xi = intermediate.x.to_radians();
        let eta = intermediate.y.to_radians();

        let ra0 = self.crval.x.to_radians();
        let (sin_dec0, cos_dec0) = self.crval.y.to_radians().sin_cos();
        let denom = cos_dec0 - eta * sin_dec0;

        let ra = ra0 + xi.atan2(denom);
        let dec = (sin_dec0 + eta * cos_dec0).atan2((xi * xi + denom * denom).sqrt());

        DVec2::new(ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }

    /// (RA, Dec) in degrees to grid coordinate.
    ///
    /// Returns `None` for points on the far side of the tangent plane or when
    /// the CD matrix is singular.
    pub fn sky_to_pixel(&self, sky: DVec2) -> Option<DVec2> {
        let det = self.determinant();
        if det.abs() < MIN_CD_DETERMINANT {
            return None;
        }

        let (sin_dec, cos_dec) = sky.y.to_radians().sin_cos();
        let (sin_dec0, cos_dec0) = self.crval.y.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (sky.x - self.crval.x).to_radians().sin_cos();

        let d = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        if d <= 0.0 {
            return None;
        }

        let xi = (cos_dec * sin_dra / d).to_degrees();
        let eta = ((sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / d).to_degrees();

        Some(self.crpix + self.cd.inverse() * DVec2::new(xi, eta))
    }
}
