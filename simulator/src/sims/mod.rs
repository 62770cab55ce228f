//! Event processing: the detection engine and its run driver.

pub mod engine;
pub mod runner;

pub use engine::{DetectionEngine, LibraryBuild};
pub use runner::{run_events, RunSummary};
