use common::Buffer2;

use super::*;
use crate::beam::{BeamModel, BeamSynthesizer};

fn gaussian_kernel(size: usize, fwhm_px: f64) -> Kernel {
    let c = (size / 2) as f64;
    let sigma2 = (fwhm_px / 2.354_820_045).powi(2);
    let data = Buffer2::from_fn(size, size, |x, y| {
        let r2 = (x as f64 - c).powi(2) + (y as f64 - c).powi(2);
        (-r2 / (2.0 * sigma2)).exp()
    });
    Kernel::new(data, (size / 2, size / 2), 2.0).unwrap()
}

#[test]
fn test_new_rejects_bad_geometry() {
    let data = Buffer2::new_filled(4, 4, 1.0);
    assert!(Kernel::new(data.clone(), (4, 0), 1.0).is_err());
    assert!(Kernel::new(data.clone(), (0, 4), 1.0).is_err());
    assert!(Kernel::new(data.clone(), (1, 1), 0.0).is_err());
    assert!(Kernel::new(data.clone(), (1, 1), f64::NAN).is_err());
    assert!(Kernel::new(Buffer2::new(0, 0, vec![]), (0, 0), 1.0).is_err());
    assert!(Kernel::new(data, (3, 3), 1.0).is_ok());
}

#[test]
fn test_half_max_width_of_gaussian() {
    let kernel = gaussian_kernel(64, 6.0);
    let width = kernel.half_max_width().unwrap();
    // Linear interpolation between samples overestimates slightly
    assert!((width - 6.0).abs() < 0.1, "width = {}", width);
    let fwhm = kernel.fwhm_arcsec().unwrap();
    assert!((fwhm - 12.0).abs() < 0.2, "fwhm = {}", fwhm);
}

#[test]
fn test_half_max_width_none_for_flat_kernel() {
    let kernel = Kernel::new(Buffer2::new_filled(8, 8, 1.0), (4, 4), 1.0).unwrap();
    assert_eq!(kernel.half_max_width(), None);

    let kernel = Kernel::new(Buffer2::new_filled(8, 8, 0.0), (4, 4), 1.0).unwrap();
    assert_eq!(kernel.half_max_width(), None);
}

#[test]
fn test_single_pixel_spike_width() {
    let mut data = Buffer2::new_filled(9, 9, 0.0);
    data[(4, 4)] = 1.0;
    let kernel = Kernel::new(data, (4, 4), 1.0).unwrap();
    // Crossing half way to the first neighbour in every direction
    assert_eq!(kernel.half_max_width(), Some(1.0));
}

#[test]
fn test_to_sky_image_puts_center_at_pixel_index_one() {
    let beam = BeamSynthesizer::new(8)
        .unwrap()
        .synthesize(&BeamModel::SCUBA2_850, 4.0)
        .unwrap();
    let image = beam.to_sky_image().unwrap();

    assert_eq!(image.lbound, (-7, -7));
    assert_eq!((image.width(), image.height()), (16, 16));
    assert_eq!(image.scale(), 4.0);
    let (cx, cy) = beam.center();
    assert_eq!(image.lbound.0 + cx as i64, 1);
    assert_eq!(image.lbound.1 + cy as i64, 1);
    assert!((image.finite_sum() - 1.0).abs() < 1e-9);
}
