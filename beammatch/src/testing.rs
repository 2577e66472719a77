//! Shared test helpers.

use common::Buffer2;
use glam::DVec2;

use crate::beam::Waveband;
use crate::kernel::Kernel;
use crate::sky_image::{SkyImage, SkyImageMetadata};

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A `width × height` map tagged with `band`, with `kernel` pasted so that
/// its center lands on array pixel `at`.
pub fn map_with_source(
    width: usize,
    height: usize,
    band: Waveband,
    kernel: &Kernel,
    at: (usize, usize),
) -> SkyImage {
    let (cx, cy) = kernel.center();
    let plane = Buffer2::from_fn(width, height, |x, y| {
        let kx = x as isize - at.0 as isize + cx as isize;
        let ky = y as isize - at.1 as isize + cy as isize;
        if kx < 0 || ky < 0 {
            return 0.0;
        }
        kernel
            .data()
            .get(kx as usize, ky as usize)
            .copied()
            .unwrap_or(0.0)
    });
    SkyImage::from_plane(plane, DVec2::splat(kernel.pixel_scale()))
        .unwrap()
        .with_metadata(SkyImageMetadata {
            object: Some("synthetic".to_string()),
            ..SkyImageMetadata::for_waveband(band)
        })
}

/// Constant map tagged with `band`.
pub fn flat_map(width: usize, height: usize, scale: f64, value: f64, band: Waveband) -> SkyImage {
    SkyImage::new(width, height, vec![value; width * height], scale)
        .unwrap()
        .with_metadata(SkyImageMetadata::for_waveband(band))
}
