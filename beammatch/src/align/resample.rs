//! Default resampling backend.
//!
//! Coordinates inside this module are array coordinates with pixel centers
//! at integer values: array pixel `(x, y)` covers `[x - 0.5, x + 0.5)`.

use glam::DVec2;
use rayon::prelude::*;

use super::{AlignMode, Resampler, SincSincKernel};
use crate::error::{Error, Result};
use crate::sky_image::{ImageDimensions, SkyImage};
use crate::wcs::Wcs;

/// Below this total weight an output pixel counts as uncovered.
const MIN_WEIGHT: f64 = 1e-12;

/// Windowed-sinc resampler and turbo-box rebinner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridResampler {
    /// Value for output pixels nothing maps onto.
    pub fill_value: f64,
    /// Rebin into summed flux (true) or area-weighted mean (false).
    pub conserve: bool,
}

impl Default for GridResampler {
    fn default() -> Self {
        Self {
            fill_value: f64::NAN,
            conserve: true,
        }
    }
}

impl GridResampler {
    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = fill_value;
        self
    }

    pub fn with_conserve(mut self, conserve: bool) -> Self {
        self.conserve = conserve;
        self
    }

    /// Interpolates the input at every output pixel center.
    fn resample(
        &self,
        input: &SkyImage,
        reference: &SkyImage,
        mapping: &GridMapping,
        kernel: SincSincKernel,
    ) -> (Vec<f64>, usize) {
        let (out_w, out_h) = (reference.width(), reference.height());
        let mut out = vec![self.fill_value; out_w * out_h];

        let covered = out
            .par_chunks_mut(out_w)
            .enumerate()
            .map(|(y, row)| {
                let mut covered = 0;
                for (x, value) in row.iter_mut().enumerate() {
                    let Some(pos) = mapping.reference_to_input(DVec2::new(x as f64, y as f64))
                    else {
                        continue;
                    };
                    if let Some(v) = sample_sinc(input, pos, kernel) {
                        *value = v;
                        covered += 1;
                    }
                }
                covered
            })
            .sum();

        (out, covered)
    }

    /// Spreads each input pixel over the output pixels its scaled footprint
    /// overlaps, in proportion to overlap area.
    fn rebin(
        &self,
        input: &SkyImage,
        reference: &SkyImage,
        mapping: &GridMapping,
    ) -> (Vec<f64>, usize) {
        let (out_w, out_h) = (reference.width(), reference.height());
        let half = 0.5 * input.pixel_scale / reference.pixel_scale;
        let inv_area = 1.0 / (4.0 * half.x * half.y);

        let mut data = vec![0.0; out_w * out_h];
        let mut weights = vec![0.0; out_w * out_h];

        for iy in 0..input.height() {
            for ix in 0..input.width() {
                let v = input.pixels[iy * input.width() + ix];
                if !v.is_finite() {
                    continue;
                }
                let Some(center) = mapping.input_to_reference(DVec2::new(ix as f64, iy as f64))
                else {
                    continue;
                };

                // Box edges in coordinates where output pixel j spans [j, j + 1).
                let lo = center + 0.5 - half;
                let hi = center + 0.5 + half;
                let ox_min = lo.x.floor().max(0.0) as usize;
                let oy_min = lo.y.floor().max(0.0) as usize;
                let ox_max = hi.x.ceil().clamp(0.0, out_w as f64) as usize;
                let oy_max = hi.y.ceil().clamp(0.0, out_h as f64) as usize;

                for oy in oy_min..oy_max {
                    let overlap_y = (hi.y.min((oy + 1) as f64) - lo.y.max(oy as f64)).max(0.0);
                    if overlap_y == 0.0 {
                        continue;
                    }
                    for ox in ox_min..ox_max {
                        let overlap_x =
                            (hi.x.min((ox + 1) as f64) - lo.x.max(ox as f64)).max(0.0);
                        let w = overlap_x * overlap_y * inv_area;
                        if w > 0.0 {
                            let idx = oy * out_w + ox;
                            data[idx] += v * w;
                            weights[idx] += w;
                        }
                    }
                }
            }
        }

        let covered = weights.iter().filter(|&&w| w >= MIN_WEIGHT).count();
        let out = data
            .iter()
            .zip(&weights)
            .map(|(&d, &w)| {
                if w < MIN_WEIGHT {
                    self.fill_value
                } else if self.conserve {
                    d
                } else {
                    d / w
                }
            })
            .collect();

        (out, covered)
    }
}

impl Resampler for GridResampler {
    fn align_to(
        &self,
        input: &SkyImage,
        reference: &SkyImage,
        mode: AlignMode,
        kernel: SincSincKernel,
    ) -> Result<SkyImage> {
        if !input.dimensions.is_planar() || !reference.dimensions.is_planar() {
            return Err(Error::invalid("resampling requires 2-dimensional maps"));
        }
        let mapping = GridMapping::new(input, reference)?;

        let (pixels, covered) = match mode {
            AlignMode::Resample => self.resample(input, reference, &mapping, kernel),
            AlignMode::Rebin => self.rebin(input, reference, &mapping),
        };

        if covered == 0 {
            return Err(Error::BackendFailure(
                "reference grid does not overlap the input map".to_string(),
            ));
        }
        let filled = pixels.len() - covered;
        tracing::debug!(
            "{} produced {} covered and {} filled pixels ({:?} mapping)",
            mode,
            covered,
            filled,
            mapping.kind()
        );

        Ok(SkyImage {
            dimensions: ImageDimensions::new(reference.width(), reference.height()),
            pixels,
            pixel_scale: reference.pixel_scale,
            lbound: reference.lbound,
            wcs: reference.wcs.clone(),
            metadata: input.metadata.clone(),
        })
    }
}

/// Separable sinc·sinc interpolation at array position `pos`. Bad and
/// out-of-bounds taps are dropped and the remaining weights renormalized.
/// `None` when `pos` lies more than half a pixel outside the map or no tap
/// survives.
fn sample_sinc(input: &SkyImage, pos: DVec2, kernel: SincSincKernel) -> Option<f64> {
    let (w, h) = (input.width() as isize, input.height() as isize);
    if pos.x < -0.5 || pos.y < -0.5 || pos.x >= w as f64 - 0.5 || pos.y >= h as f64 - 0.5 {
        return None;
    }

    let a = kernel.support as isize;
    let (fx, fy) = (pos.x.floor() as isize, pos.y.floor() as isize);

    let mut sum = 0.0;
    let mut weight = 0.0;
    for ty in (fy - a + 1)..=(fy + a) {
        if ty < 0 || ty >= h {
            continue;
        }
        let wy = kernel.weight(pos.y - ty as f64);
        if wy == 0.0 {
            continue;
        }
        let row = ty as usize * input.width();
        for tx in (fx - a + 1)..=(fx + a) {
            if tx < 0 || tx >= w {
                continue;
            }
            let v = input.pixels[row + tx as usize];
            if !v.is_finite() {
                continue;
            }
            let wxy = kernel.weight(pos.x - tx as f64) * wy;
            sum += v * wxy;
            weight += wxy;
        }
    }

    (weight.abs() >= MIN_WEIGHT).then(|| sum / weight)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MappingKind {
    Celestial,
    PixelFrame,
}

/// Array-coordinate mapping between the input and reference grids.
enum GridMapping<'a> {
    /// Both grids carry a WCS: go through the sky.
    Celestial { input: &'a Wcs, reference: &'a Wcs },
    /// Shared pixel-coordinate origin, related by pixel scales.
    PixelFrame {
        input: &'a SkyImage,
        reference: &'a SkyImage,
    },
}

impl<'a> GridMapping<'a> {
    fn new(input: &'a SkyImage, reference: &'a SkyImage) -> Result<Self> {
        match (&input.wcs, &reference.wcs) {
            (Some(input_wcs), Some(reference_wcs)) => {
                for (name, wcs) in [("input", input_wcs), ("reference", reference_wcs)] {
                    let det = wcs.determinant();
                    if !(det.is_finite() && det != 0.0) {
                        return Err(Error::BackendFailure(format!(
                            "{} WCS has a degenerate CD matrix (determinant {})",
                            name, det
                        )));
                    }
                }
                Ok(GridMapping::Celestial {
                    input: input_wcs,
                    reference: reference_wcs,
                })
            }
            _ => Ok(GridMapping::PixelFrame { input, reference }),
        }
    }

    fn kind(&self) -> MappingKind {
        match self {
            GridMapping::Celestial { .. } => MappingKind::Celestial,
            GridMapping::PixelFrame { .. } => MappingKind::PixelFrame,
        }
    }

    fn reference_to_input(&self, pos: DVec2) -> Option<DVec2> {
        match self {
            GridMapping::Celestial { input, reference } => {
                // FITS grid coordinates are array coordinates plus one.
                let sky = reference.pixel_to_sky(pos + 1.0);
                input.sky_to_pixel(sky).map(|p| p - 1.0)
            }
            GridMapping::PixelFrame { input, reference } => {
                let world = reference.pixel_center_arcsec(pos.x, pos.y);
                Some(input.arcsec_to_array(world))
            }
        }
    }

    fn input_to_reference(&self, pos: DVec2) -> Option<DVec2> {
        match self {
            GridMapping::Celestial { input, reference } => {
                let sky = input.pixel_to_sky(pos + 1.0);
                reference.sky_to_pixel(sky).map(|p| p - 1.0)
            }
            GridMapping::PixelFrame { input, reference } => {
                let world = input.pixel_center_arcsec(pos.x, pos.y);
                Some(reference.arcsec_to_array(world))
            }
        }
    }
}
