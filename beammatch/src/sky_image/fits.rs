//! FITS reading and writing for [`SkyImage`].
//!
//! Only the primary HDU is used. Recognised header keys:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `CRPIXi`, `CRVALi` | WCS reference point (grid coordinate, degrees) |
//! | `CDi_j` or `CDELTi` (+ `PCi_j`) | grid → intermediate matrix, degrees/pixel |
//! | `LBOUND1`, `LBOUND2` | pixel index of the first column/row (default 1) |
//! | `INSTRUME`, `FILTER`, `OBJECT`, `BUNIT` | metadata |

use std::path::Path;

use fitsio::FitsFile;
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::headers::ReadsKey;
use fitsio::images::{ImageDescription, ImageType};
use glam::DVec2;

use super::{ImageDimensions, SkyImage, SkyImageMetadata};
use crate::error::{Error, Result};
use crate::wcs::{ARCSEC_PER_DEG, Wcs};

fn fits_error(path: &Path) -> impl Fn(fitsio::errors::Error) -> Error + '_ {
    move |source| Error::Fits {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads a 2D map, or a cube whose third axis holds the planes.
pub fn load(path: &Path) -> Result<SkyImage> {
    let mut fptr = FitsFile::open(path).map_err(fits_error(path))?;
    let hdu = fptr.primary_hdu().map_err(fits_error(path))?;

    let shape = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => shape.clone(),
        _ => {
            return Err(Error::invalid(format!(
                "'{}' has no image in its primary HDU",
                path.display()
            )));
        }
    };
    // fitsio reports axes slowest first
    let dimensions = match shape.as_slice() {
        [h, w] => ImageDimensions::new(*w, *h),
        [d, h, w] => ImageDimensions::with_depth(*w, *h, *d),
        _ => {
            return Err(Error::invalid(format!(
                "'{}' has {} axes, expected 2 or 3",
                path.display(),
                shape.len()
            )));
        }
    };

    let pixels: Vec<f64> = hdu.read_image(&mut fptr).map_err(fits_error(path))?;

    let mut header = Header {
        fptr: &mut fptr,
        hdu: &hdu,
    };
    let metadata = SkyImageMetadata {
        instrument: header.string("INSTRUME"),
        filter: header.string("FILTER"),
        object: header.string("OBJECT"),
        units: header.string("BUNIT"),
    };
    let lbound = (
        header.get::<i64>("LBOUND1").unwrap_or(1),
        header.get::<i64>("LBOUND2").unwrap_or(1),
    );
    let (wcs, pixel_scale) = header.wcs(path)?;

    let image = SkyImage::from_parts(dimensions, pixels, pixel_scale)?
        .with_lbound(lbound)
        .with_metadata(metadata);
    let image = match wcs {
        Some(wcs) => image.with_wcs(wcs)?,
        None => image,
    };

    tracing::debug!(
        "Loaded {} ({}x{}{}, {:.3}\"/px, lbound {:?}, wcs: {})",
        path.display(),
        image.width(),
        image.height(),
        image
            .dimensions
            .depth
            .map(|d| format!("x{}", d))
            .unwrap_or_default(),
        image.scale(),
        image.lbound,
        image.wcs.is_some()
    );

    Ok(image)
}

/// Writes a 2D map as a double-precision primary image, replacing `path`.
pub fn save(image: &SkyImage, path: &Path) -> Result<()> {
    let plane = image.plane()?;
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[image.height(), image.width()],
    };
    let err = fits_error(path);
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()
        .map_err(&err)?;
    let hdu = fptr.primary_hdu().map_err(&err)?;

    hdu.write_image(&mut fptr, plane.pixels()).map_err(&err)?;

    match &image.wcs {
        Some(wcs) => {
            hdu.write_key(&mut fptr, "CTYPE1", "RA---TAN").map_err(&err)?;
            hdu.write_key(&mut fptr, "CTYPE2", "DEC--TAN").map_err(&err)?;
            hdu.write_key(&mut fptr, "CRPIX1", wcs.crpix.x).map_err(&err)?;
            hdu.write_key(&mut fptr, "CRPIX2", wcs.crpix.y).map_err(&err)?;
            hdu.write_key(&mut fptr, "CRVAL1", wcs.crval.x).map_err(&err)?;
            hdu.write_key(&mut fptr, "CRVAL2", wcs.crval.y).map_err(&err)?;
            hdu.write_key(&mut fptr, "CD1_1", wcs.cd.x_axis.x).map_err(&err)?;
            hdu.write_key(&mut fptr, "CD1_2", wcs.cd.y_axis.x).map_err(&err)?;
            hdu.write_key(&mut fptr, "CD2_1", wcs.cd.x_axis.y).map_err(&err)?;
            hdu.write_key(&mut fptr, "CD2_2", wcs.cd.y_axis.y).map_err(&err)?;
        }
        None => {
            let cdelt = image.pixel_scale / ARCSEC_PER_DEG;
            hdu.write_key(&mut fptr, "CDELT1", cdelt.x).map_err(&err)?;
            hdu.write_key(&mut fptr, "CDELT2", cdelt.y).map_err(&err)?;
        }
    }

    hdu.write_key(&mut fptr, "LBOUND1", image.lbound.0).map_err(&err)?;
    hdu.write_key(&mut fptr, "LBOUND2", image.lbound.1).map_err(&err)?;

    let metadata = &image.metadata;
    for (key, value) in [
        ("INSTRUME", &metadata.instrument),
        ("FILTER", &metadata.filter),
        ("OBJECT", &metadata.object),
        ("BUNIT", &metadata.units),
    ] {
        if let Some(value) = value {
            hdu.write_key(&mut fptr, key, value.as_str()).map_err(&err)?;
        }
    }

    tracing::debug!(
        "Wrote {}x{} map to {}",
        image.width(),
        image.height(),
        path.display()
    );
    Ok(())
}

/// Header access for the primary HDU.
struct Header<'a> {
    fptr: &'a mut FitsFile,
    hdu: &'a FitsHdu,
}

impl Header<'_> {
    /// Missing and unreadable keys both come back as `None`.
    fn get<T: ReadsKey>(&mut self, key: &str) -> Option<T> {
        self.hdu.read_key::<T>(self.fptr, key).ok()
    }

    fn string(&mut self, key: &str) -> Option<String> {
        self.get::<String>(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn pair(&mut self, prefix: &str) -> Option<DVec2> {
        let x = self.get::<f64>(&format!("{}1", prefix))?;
        let y = self.get::<f64>(&format!("{}2", prefix))?;
        Some(DVec2::new(x, y))
    }

    /// Row-major `[[M1_1, M1_2], [M2_1, M2_2]]`; any missing key makes it `None`.
    fn matrix(&mut self, prefix: &str) -> Option<[[f64; 2]; 2]> {
        let mut rows = [[0.0; 2]; 2];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = self.get::<f64>(&format!("{}{}_{}", prefix, i + 1, j + 1))?;
            }
        }
        Some(rows)
    }

    /// Celestial WCS (when `CRPIX`/`CRVAL` are present) and the per-axis
    /// pixel scale in arcsec.
    fn wcs(&mut self, path: &Path) -> Result<(Option<Wcs>, DVec2)> {
        let cd = match self.matrix("CD") {
            Some(cd) => Some(cd),
            None => self.pair("CDELT").map(|cdelt| {
                let pc = self.matrix("PC").unwrap_or([[1.0, 0.0], [0.0, 1.0]]);
                [
                    [cdelt.x * pc[0][0], cdelt.x * pc[0][1]],
                    [cdelt.y * pc[1][0], cdelt.y * pc[1][1]],
                ]
            }),
        };
        let Some(cd) = cd else {
            return Err(Error::invalid(format!(
                "'{}' has no pixel scale (neither CDi_j nor CDELTi present)",
                path.display()
            )));
        };

        match (self.pair("CRPIX"), self.pair("CRVAL")) {
            (Some(crpix), Some(crval)) => {
                let ctype = self.string("CTYPE1");
                if let Some(ctype) = ctype.filter(|c| !c.ends_with("-TAN")) {
                    tracing::warn!(
                        "{}: projection {} treated as gnomonic (TAN)",
                        path.display(),
                        ctype
                    );
                }
                let wcs = Wcs::from_cd_rows(crpix, crval, cd);
                let scale = wcs.pixel_scale_arcsec();
                Ok((Some(wcs), scale))
            }
            _ => {
                let scale = DVec2::new(
                    cd[0][0].hypot(cd[1][0]),
                    cd[0][1].hypot(cd[1][1]),
                ) * ARCSEC_PER_DEG;
                Ok((None, scale))
            }
        }
    }
}
