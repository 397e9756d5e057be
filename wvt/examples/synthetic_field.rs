//! Bin a synthetic galaxy-like field and write the result tables.
//!
//! ```text
//! cargo run -p wvt --example synthetic_field -- [config.yaml] [output_prefix]
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use common::log_setup::LogOptions;
use common::Buffer2;
use wvt::{Config, OutputSelection, VoronoiBinner};

const WIDTH: usize = 64;
const HEIGHT: usize = 48;

/// Exponential disk plus a faint sky level, with Poisson-like noise.
fn synthetic_field() -> (Buffer2<f64>, Buffer2<f64>) {
    let center = (WIDTH as f64 * 0.4, HEIGHT as f64 * 0.55);
    let signal = Buffer2::from_fn(WIDTH, HEIGHT, |x, y| {
        let dx = x as f64 - center.0;
        let dy = (y as f64 - center.1) * 1.6;
        200.0 * (-(dx * dx + dy * dy).sqrt() / 6.0).exp() + 0.5
    });
    let noise = signal.map(|s| (s + 4.0).sqrt());
    (signal, noise)
}

fn main() -> anyhow::Result<()> {
    common::log_setup::setup_logging(
        &LogOptions::console("info").with_log_dir("logs", "synthetic_field"),
    )?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.first() {
        Some(path) => Config::load(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::new(15.0),
    };
    let prefix = args.get(1).map(String::as_str).unwrap_or("synthetic");

    let (signal, noise) = synthetic_field();
    let result = VoronoiBinner::from_config(config).bin_images(&signal, &noise)?;

    tracing::info!(
        "{} bins after {} iterations ({}), {} warnings",
        result.bin_count(),
        result.iterations,
        result.state,
        result.warnings.len()
    );

    let pixel_path = format!("{}.pixel.dat", prefix);
    let mut out = BufWriter::new(File::create(&pixel_path)?);
    result.write_pixel_table(&mut out, OutputSelection::All)?;

    let bin_path = format!("{}.bin.dat", prefix);
    let mut out = BufWriter::new(File::create(&bin_path)?);
    result.write_bin_table(&mut out, OutputSelection::All)?;

    let maps = result.bin_maps(WIDTH, HEIGHT, OutputSelection::ValidOnly);
    let covered = maps.bin.iter().filter(|&&b| b != wvt::NO_BIN).count();
    tracing::info!(
        "Wrote {} and {}; valid bins cover {} of {} pixels",
        pixel_path,
        bin_path,
        covered,
        WIDTH * HEIGHT
    );

    Ok(())
}
