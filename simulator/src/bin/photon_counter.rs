//! Photon counter for optical detector channels
//!
//! Reads a JSON file of per-event photon collections, applies the detection
//! model (flat quantum efficiency and a wavelength acceptance band) and writes
//! the enabled output streams as CSV files.
//!
//! With `--library-build` every event is treated as a point source scanning
//! the voxels of a grid, and the raw channel counts are accumulated into a
//! visibility library saved as JSON at the end of the run.
//!
//! Usage:
//! ```
//! cargo run --bin photon_counter -- --input events.json --output-dir out [OPTIONS]
//! ```
//!
//! See --help for detailed options.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;
use opdet_sim::input::EventFile;
use opdet_sim::library::{SteppedLightSource, VisibilityAccumulator};
use opdet_sim::shared_args::{CounterArgs, LibraryArgs};
use opdet_sim::sims::{run_events, DetectionEngine, LibraryBuild};
use opdet_sim::sink::CsvSink;

/// Command line arguments for the photon counter
#[derive(Parser, Debug)]
#[command(
    name = "Photon Counter",
    about = "Counts detected photons per channel and per event",
    long_about = None
)]
struct Args {
    /// JSON file of photon events
    #[arg(short, long)]
    input: PathBuf,

    /// Directory the CSV streams are written to
    #[arg(short, long, default_value = "photon_counts")]
    output_dir: PathBuf,

    /// First event id to process (defaults to the smallest id in the input)
    #[arg(long)]
    first_event: Option<u32>,

    /// Last event id to process (defaults to the largest id in the input)
    #[arg(long)]
    last_event: Option<u32>,

    #[command(flatten)]
    counter: CounterArgs,

    #[command(flatten)]
    library: LibraryArgs,
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 | 2 => LevelFilter::Info,
        _ => LevelFilter::Trace,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = args
        .counter
        .to_config()
        .context("Invalid counting options")?;
    config.library_build |= args.library.library_build;

    env_logger::Builder::new()
        .filter_level(level_for(config.verbosity))
        .parse_default_env()
        .init();

    let events = EventFile::load_from_file(&args.input)
        .with_context(|| format!("Failed to read events from {}", args.input.display()))?;
    let Some((first_in_file, last_in_file)) = events.event_span() else {
        bail!("No events in {}", args.input.display());
    };
    let first_event = args.first_event.unwrap_or(first_in_file);
    let last_event = args.last_event.unwrap_or(last_in_file);
    if first_event > last_event {
        bail!("Event range {first_event}..={last_event} is empty");
    }
    let mut source = events.into_source();

    let sink = CsvSink::create(&args.output_dir, &config.streams).with_context(|| {
        format!("Failed to create outputs in {}", args.output_dir.display())
    })?;

    println!("Photon Counter");
    println!("==============");
    println!("Input: {}", args.input.display());
    println!("Events: {first_event}..={last_event}");
    println!("Quantum efficiency: {}", config.quantum_efficiency);
    println!(
        "Acceptance band: ({}, {}) nm",
        config.wavelength_cut_low, config.wavelength_cut_high
    );
    println!("Detection seed: {}", config.effective_seed());

    if !config.library_build {
        let mut engine = DetectionEngine::new(config, sink)?;
        let summary = run_events(&mut engine, &mut source, first_event..=last_event)?;
        println!(
            "Counted {} photons in {} events, {} detected",
            summary.count_all, summary.events, summary.count_detected
        );
        println!("Results written to {}", args.output_dir.display());
        return Ok(());
    }

    let grid = args.library.grid().context("Invalid voxel grid")?;
    let mut light_source =
        SteppedLightSource::new(&grid, args.library.photons_per_voxel, first_event);
    let mut accumulator = VisibilityAccumulator::new();

    let summary = {
        let library = LibraryBuild {
            accumulator: &mut accumulator,
            light_source: &mut light_source,
        };
        let mut engine = DetectionEngine::with_library(config, sink, library)?;
        let summary = run_events(&mut engine, &mut source, first_event..=last_event)?;
        engine.finalize_library()?;
        summary
    };

    let n_channels = match args.library.n_channels {
        Some(n) => n,
        None => accumulator
            .entries()
            .iter()
            .map(|entry| entry.channel + 1)
            .max()
            .unwrap_or(0),
    };
    let library = accumulator
        .to_library(grid.n_voxels(), n_channels)
        .context("Failed to build visibility table")?;
    library
        .save_to_file(&args.library.library_file)
        .with_context(|| {
            format!(
                "Failed to save library to {}",
                args.library.library_file.display()
            )
        })?;

    println!(
        "Library of {} voxels x {} channels from {} events saved to {}",
        library.n_voxels(),
        library.n_channels(),
        summary.events,
        args.library.library_file.display()
    );
    Ok(())
}
