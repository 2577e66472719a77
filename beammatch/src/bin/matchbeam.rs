//! Smooths a SCUBA-2 450um map to the resolution of the 850um beam.
//!
//! ```text
//! matchbeam s450.fits s450_matched.fits s850.fits
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use beammatch::{BeamMatcher, MatchConfig, fits};
use clap::Parser;
use common::{LogLevel, setup_logging};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Match the beam of a SCUBA-2 450um map to the 850um beam",
    long_about = None
)]
struct Args {
    /// Input 450um map (FITS)
    input: PathBuf,

    /// Output map (FITS), overwritten if it exists
    output: PathBuf,

    /// Reference map whose pixel grid the output should use
    reference: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the smoothing kernel to this FITS file
    #[arg(long)]
    kernel: Option<PathBuf>,

    /// Screen log level (none, critical, progress, debug)
    #[arg(long, default_value_t = LogLevel::Progress)]
    ilevel: LogLevel,

    /// Log file level (none, critical, progress, debug)
    #[arg(long, default_value_t = LogLevel::None)]
    glevel: LogLevel,

    /// Log file, used when --glevel is not none
    #[arg(long, default_value = "matchbeam.log")]
    logfile: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.ilevel, Some((args.logfile.as_path(), args.glevel)))?;

    let config = match &args.config {
        Some(path) => MatchConfig::from_yaml_file(path)?,
        None => MatchConfig::default(),
    };
    let matcher = BeamMatcher::new(config).context("Invalid configuration")?;

    let input = fits::load(&args.input)
        .with_context(|| format!("Failed to load input map {}", args.input.display()))?;
    let reference = args
        .reference
        .as_ref()
        .map(|path| {
            fits::load(path)
                .with_context(|| format!("Failed to load reference map {}", path.display()))
        })
        .transpose()?;

    let result = matcher.run(&input, reference.as_ref())?;

    fits::save(&result.image, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!("Wrote smoothed map to {}", args.output.display());

    if let Some(path) = &args.kernel {
        let kernel = result.kernel.to_sky_image()?;
        fits::save(&kernel, path)
            .with_context(|| format!("Failed to write kernel {}", path.display()))?;
        tracing::info!("Wrote smoothing kernel to {}", path.display());
    }

    Ok(())
}
