use std::io::Write;
use std::sync::Mutex;

use glam::DVec2;

use super::*;
use crate::align::SincSincKernel;
use crate::beam::BeamModel;
use crate::sky_image::{ImageDimensions, SkyImageMetadata};
use crate::testing::{flat_map, init_tracing, map_with_source};

// ============================================================================
// Input validation
// ============================================================================

#[test]
fn test_rejects_non_scuba2_map() {
    let matcher = BeamMatcher::new(MatchConfig::default()).unwrap();
    let input = flat_map(16, 16, 2.0, 1.0, Waveband::Scuba2_450).with_metadata(SkyImageMetadata {
        instrument: Some("HARP".to_string()),
        filter: Some("450".to_string()),
        object: Some("ORION".to_string()),
        units: None,
    });

    let err = matcher.run(&input, None).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(
        err.to_string().contains("does not contain SCUBA-2 data"),
        "message: {}",
        err
    );
}

#[test]
fn test_rejects_850_map() {
    let matcher = BeamMatcher::new(MatchConfig::default()).unwrap();
    let input = flat_map(16, 16, 4.0, 1.0, Waveband::Scuba2_850);

    let err = matcher.run(&input, None).unwrap_err();
    assert!(
        err.to_string().contains("does not contain 450 um data"),
        "message: {}",
        err
    );
}

#[test]
fn test_rejects_map_without_headers() {
    let matcher = BeamMatcher::new(MatchConfig::default()).unwrap();
    let input = SkyImage::new(8, 8, vec![0.0; 64], 2.0).unwrap();
    assert!(matches!(
        matcher.run(&input, None),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_rejects_cube() {
    let matcher = BeamMatcher::new(MatchConfig::default()).unwrap();
    let input = SkyImage::from_parts(
        ImageDimensions::with_depth(8, 8, 4),
        vec![0.0; 256],
        DVec2::splat(2.0),
    )
    .unwrap()
    .with_metadata(SkyImageMetadata::for_waveband(Waveband::Scuba2_450));

    let err = matcher.run(&input, None).unwrap_err();
    assert!(
        err.to_string().contains("2-dimensional"),
        "message: {}",
        err
    );
}

// ============================================================================
// Matching
// ============================================================================

#[test]
fn test_point_source_takes_target_beam() {
    init_tracing();

    let scale = 3.0;
    let synth = BeamSynthesizer::default();
    let source_beam = synth.synthesize(&BeamModel::SCUBA2_450, scale).unwrap();
    let target_beam = synth.synthesize(&BeamModel::SCUBA2_850, scale).unwrap();

    let at = (64, 64);
    let input = map_with_source(128, 128, Waveband::Scuba2_450, &source_beam, at);
    let expected = map_with_source(128, 128, Waveband::Scuba2_850, &target_beam, at);

    let matcher = BeamMatcher::new(MatchConfig::default()).unwrap();
    let result = matcher.run(&input, None).unwrap();

    assert_eq!(result.mode, None);
    assert_eq!(result.pixel_scale, scale);
    assert_eq!(result.image.metadata, input.metadata);

    let peak = target_beam.center_value();
    for y in 44..=84 {
        for x in 44..=84 {
            let i = y * 128 + x;
            let diff = (result.image.pixels[i] - expected.pixels[i]).abs();
            assert!(
                diff / peak < 1e-3,
                "pixel ({}, {}) off by {} of peak",
                x,
                y,
                diff / peak
            );
        }
    }
}

#[test]
fn test_smoothing_kernel_width() {
    let matcher = BeamMatcher::new(MatchConfig::default()).unwrap();
    let kernel = matcher.smoothing_kernel(3.0).unwrap();

    assert_eq!(kernel.shape(), (128, 128));
    assert_eq!(kernel.center(), (64, 64));
    let fwhm = kernel.fwhm_arcsec().unwrap();
    // Quadrature difference of the main lobes is about 10.3"
    assert!(fwhm > 9.0 && fwhm < 12.0, "kernel fwhm {}", fwhm);
}

#[test]
fn test_flux_is_preserved_away_from_edges() {
    let scale = 2.0;
    let beam = BeamSynthesizer::new(16)
        .unwrap()
        .synthesize(&BeamModel::SCUBA2_450, scale)
        .unwrap();
    let input = map_with_source(160, 160, Waveband::Scuba2_450, &beam, (80, 80));

    let matcher = BeamMatcher::new(MatchConfig::default()).unwrap();
    let result = matcher.run(&input, None).unwrap();

    let before = input.finite_sum();
    let after = result.image.finite_sum();
    assert!(
        (before - after).abs() < 1e-3 * before,
        "flux {} became {}",
        before,
        after
    );
}

#[test]
fn test_reference_grid_is_used() {
    let input = flat_map(40, 40, 2.0, 1.0, Waveband::Scuba2_450);
    let reference = flat_map(20, 20, 4.0, 0.0, Waveband::Scuba2_850);

    let matcher = BeamMatcher::new(MatchConfig::default()).unwrap();
    let result = matcher.run(&input, Some(&reference)).unwrap();

    assert_eq!(result.mode, Some(AlignMode::Rebin));
    assert_eq!(result.pixel_scale, 4.0);
    assert_eq!(result.kernel.pixel_scale(), 4.0);
    assert_eq!(result.image.dimensions, ImageDimensions::new(20, 20));
    assert_eq!(result.image.pixel_scale, DVec2::splat(4.0));
    // Metadata follows the data, not the reference
    assert_eq!(result.image.metadata.waveband(), Some(Waveband::Scuba2_450));
}

#[test]
fn test_progress_reports_every_stage() {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let matcher = BeamMatcher::new(MatchConfig::default().with_beam_half_width(16))
        .unwrap()
        .with_progress(move |p: MatchProgress| {
            sink.lock().unwrap().push((p.current, p.total, p.stage));
        });

    let input = flat_map(24, 24, 2.0, 1.0, Waveband::Scuba2_450);
    matcher.run(&input, None).unwrap();

    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            (0, 3, MatchStage::Aligning),
            (1, 3, MatchStage::SynthesizingKernel),
            (2, 3, MatchStage::Smoothing),
        ]
    );
}

/// Formatted log output collected from a scoped subscriber.
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn run_logged(matcher: &BeamMatcher, input: &SkyImage, reference: Option<&SkyImage>) -> String {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::with_default(subscriber, || matcher.run(input, reference).unwrap());
    String::from_utf8_lossy(&log.0.lock().unwrap()).into_owned()
}

#[test]
fn test_alignment_is_logged_only_with_reference() {
    let matcher = BeamMatcher::new(MatchConfig::default().with_beam_half_width(8)).unwrap();
    let input = flat_map(12, 12, 2.0, 1.0, Waveband::Scuba2_450);
    let reference = flat_map(6, 6, 4.0, 0.0, Waveband::Scuba2_850);

    let without = run_logged(&matcher, &input, None);
    assert!(
        !without.contains("Aligning input map with reference map"),
        "log: {}",
        without
    );
    assert!(without.contains("Creating smoothing kernel"), "log: {}", without);

    let with = run_logged(&matcher, &input, Some(&reference));
    assert!(
        with.contains("Aligning input map with reference map"),
        "log: {}",
        with
    );
}

struct CoarseningResampler;

impl Resampler for CoarseningResampler {
    fn align_to(
        &self,
        input: &SkyImage,
        reference: &SkyImage,
        _mode: AlignMode,
        _kernel: SincSincKernel,
    ) -> Result<SkyImage> {
        let (w, h) = (reference.width(), reference.height());
        Ok(SkyImage::new(w, h, vec![2.0; w * h], reference.scale())?
            .with_metadata(input.metadata.clone()))
    }
}

#[test]
fn test_custom_resampler() {
    let matcher = BeamMatcher::new(MatchConfig::default().with_beam_half_width(16))
        .unwrap()
        .with_resampler(CoarseningResampler)
        .unwrap();
    let input = flat_map(12, 12, 2.0, 1.0, Waveband::Scuba2_450);
    let reference = flat_map(6, 6, 4.0, 0.0, Waveband::Scuba2_850);

    let result = matcher.run(&input, Some(&reference)).unwrap();
    assert_eq!(result.image.dimensions, ImageDimensions::new(6, 6));
    assert_eq!(result.pixel_scale, 4.0);
}

#[test]
fn test_backend_failure_aborts() {
    let input = flat_map(8, 8, 2.0, 1.0, Waveband::Scuba2_450);
    let reference = flat_map(8, 8, 2.0, 0.0, Waveband::Scuba2_850).with_lbound((900, 900));
    let matcher = BeamMatcher::new(MatchConfig::default().with_beam_half_width(8)).unwrap();
    assert!(matches!(
        matcher.run(&input, Some(&reference)),
        Err(Error::BackendFailure(_))
    ));
}

struct TruncatingResampler;

impl Resampler for TruncatingResampler {
    fn align_to(
        &self,
        input: &SkyImage,
        reference: &SkyImage,
        _mode: AlignMode,
        _kernel: SincSincKernel,
    ) -> Result<SkyImage> {
        let (w, h) = (reference.width(), reference.height());
        let mut image = SkyImage::new(w, h, vec![1.0; w * h], reference.scale())?
            .with_metadata(input.metadata.clone());
        image.pixels.truncate(3);
        Ok(image)
    }
}

#[test]
fn test_malformed_backend_result_is_an_error() {
    let matcher = BeamMatcher::new(MatchConfig::default().with_beam_half_width(8))
        .unwrap()
        .with_resampler(TruncatingResampler)
        .unwrap();
    let input = flat_map(12, 12, 2.0, 1.0, Waveband::Scuba2_450);
    let reference = flat_map(6, 6, 4.0, 0.0, Waveband::Scuba2_850);

    assert!(matches!(
        matcher.run(&input, Some(&reference)),
        Err(Error::BackendFailure(_))
    ));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_empty_yaml_is_default() {
    let config = MatchConfig::from_yaml_str("{}").unwrap();
    assert_eq!(config, MatchConfig::default());
    config.validate().unwrap();
}

#[test]
fn test_yaml_overrides() {
    let yaml = "
beam_half_width: 32
conserve_flux: false
beams:
  scuba2-450:
    alpha: 1.0
    beta: 0.0
    theta_main: 8.0
    theta_secondary: 8.0
";
    let config = MatchConfig::from_yaml_str(yaml).unwrap();
    config.validate().unwrap();

    assert_eq!(config.beam_half_width, 32);
    assert!(!config.conserve_flux);
    assert!(!config.resampler().conserve);
    let registry = config.registry();
    assert_eq!(registry.get(Waveband::Scuba2_450).unwrap().theta_main, 8.0);
    assert_eq!(
        registry.get(Waveband::Scuba2_850),
        Some(&BeamModel::SCUBA2_850)
    );
}

#[test]
fn test_yaml_rejects_unknown_fields() {
    assert!(MatchConfig::from_yaml_str("beam_width: 3").is_err());
    assert!(MatchConfig::from_yaml_str("source: scuba2-1100").is_err());
}

#[test]
fn test_validate_rejects_bad_settings() {
    let bad = [
        MatchConfig::default().with_target(Waveband::Scuba2_450),
        MatchConfig::default().with_beam_half_width(0),
        MatchConfig::default().with_sinc_support(0),
        MatchConfig::default().with_beam(
            Waveband::Scuba2_850,
            BeamModel {
                alpha: 0.5,
                beta: 0.2,
                theta_main: 13.0,
                theta_secondary: 48.0,
            },
        ),
    ];
    for config in bad {
        assert!(
            matches!(config.validate(), Err(Error::InvalidInput(_))),
            "{:?} should be rejected",
            config
        );
        assert!(BeamMatcher::new(config).is_err());
    }
}

#[test]
fn test_config_file_loading() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "sinc_support: 3").unwrap();
    let config = MatchConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.sinc_support, 3);

    let mut broken = tempfile::NamedTempFile::new().unwrap();
    writeln!(broken, "sinc_support: [1, 2]").unwrap();
    assert!(matches!(
        MatchConfig::from_yaml_file(broken.path()),
        Err(Error::Config { .. })
    ));

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        MatchConfig::from_yaml_file(&dir.path().join("missing.yaml")),
        Err(Error::Io { .. })
    ));
}
