//! Optical detector photon counting
//!
//! This crate turns the photons that a light-propagation simulation delivers
//! to each optical detector channel into detected photon counts:
//! - Photons arrive itemized (energy or wavelength, time) or as compact
//!   time-bucketed counts, normalized by [`input`]
//! - Detection applies a flat quantum efficiency and a wavelength
//!   acceptance band, see [`photometry`]
//! - Counts are aggregated per channel and per event by [`hardware`] and
//!   written to a [`sink::RecordSink`]
//! - Library builds accumulate per-voxel visibilities in [`library`]
//!
//! [`sims::DetectionEngine`] ties these together for one event at a time.

pub mod config;
pub mod errors;
pub mod hardware;
pub mod input;
pub mod library;
pub mod photometry;
pub mod shared_args;
pub mod sims;
pub mod sink;

// Re-exports for easier access
pub use config::{ConfigError, CounterConfig};
pub use errors::DetectionError;
pub use input::{PhotonSource, RawEventInput, Representation};
pub use library::{VisibilityAccumulator, VisibilityLibrary, VoxelGrid};
pub use photometry::{energy_to_wavelength, DetectionSampler};
pub use sims::{run_events, DetectionEngine, LibraryBuild, RunSummary};
pub use sink::{ChannelTally, CsvSink, EventTally, MemorySink, OutputStreams, RecordSink};
