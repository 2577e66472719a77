//! Tests for the gnomonic WCS.

use glam::{DMat2, DVec2};

use super::*;

fn scuba_like_wcs() -> Wcs {
    // 4" pixels centered on a source at moderate declination
    Wcs::from_scale_rotation(DVec2::new(101.0, 101.0), DVec2::new(83.8221, -5.3911), 4.0, 0.0)
}

#[test]
fn test_reference_pixel_maps_to_crval() {
    let wcs = scuba_like_wcs();
    let sky = wcs.pixel_to_sky(wcs.crpix);
    assert!((sky.x - 83.8221).abs() < 1e-12, "ra = {}", sky.x);
    assert!((sky.y + 5.3911).abs() < 1e-12, "dec = {}", sky.y);
}

#[test]
fn test_pixel_sky_round_trip() {
    let wcs = Wcs::from_scale_rotation(DVec2::new(50.5, 40.0), DVec2::new(10.0, 60.0), 2.0, 17.0);

    for &(x, y) in &[(1.0, 1.0), (50.5, 40.0), (200.0, -30.0), (-75.25, 310.5)] {
        let pixel = DVec2::new(x, y);
        let back = wcs
            .sky_to_pixel(wcs.pixel_to_sky(pixel))
            .expect("point is on the near side");
        assert!(
            (back - pixel).length() < 1e-7,
            "round trip of {:?} gave {:?}",
            pixel,
            back
        );
    }
}

#[test]
fn test_pixel_scale_from_cd_matrix() {
    let wcs = Wcs::from_scale_rotation(DVec2::ZERO, DVec2::new(0.0, 0.0), 3.0, 30.0);
    let scale = wcs.pixel_scale_arcsec();
    assert!((scale.x - 3.0).abs() < 1e-9, "x scale = {}", scale.x);
    assert!((scale.y - 3.0).abs() < 1e-9, "y scale = {}", scale.y);
}

#[test]
fn test_from_cd_rows_matches_fits_layout() {
    let wcs = Wcs::from_cd_rows(DVec2::ZERO, DVec2::ZERO, [[1.0, 2.0], [3.0, 4.0]]);
    // xi = CD1_1 dx + CD1_2 dy, eta = CD2_1 dx + CD2_2 dy
    let offset = wcs.cd * DVec2::new(1.0, 0.0);
    assert_eq!(offset, DVec2::new(1.0, 3.0));
    let offset = wcs.cd * DVec2::new(0.0, 1.0);
    assert_eq!(offset, DVec2::new(2.0, 4.0));
}

#[test]
fn test_ra_increases_to_the_left() {
    let wcs = scuba_like_wcs();
    let left = wcs.pixel_to_sky(DVec2::new(100.0, 101.0));
    let right = wcs.pixel_to_sky(DVec2::new(102.0, 101.0));
    assert!(left.x > right.x, "RA should decrease with x");
}

#[test]
fn test_far_side_point_is_rejected() {
    let wcs = scuba_like_wcs();
    let antipode = DVec2::new(83.8221 + 180.0, 5.3911);
    assert!(wcs.sky_to_pixel(antipode).is_none());
}

#[test]
fn test_singular_cd_is_rejected() {
    let wcs = Wcs::new(DVec2::ZERO, DVec2::new(10.0, 10.0), DMat2::ZERO);
    assert!(wcs.sky_to_pixel(DVec2::new(10.0, 10.0)).is_none());
}
