use thiserror::Error;

use crate::config::ConfigError;
use crate::input::Representation;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Event {event_id}: {reason} (run representation is {expected:?})")]
    RepresentationMismatch {
        event_id: u32,
        expected: Representation,
        reason: &'static str,
    },

    #[error("Photon energy must be positive, got {0}")]
    NonPositiveEnergy(f64),

    #[error("Visibility library was already finalized for this run")]
    LibraryAlreadyFinalized,

    #[error("Library build mode misconfigured: {0}")]
    LibraryMode(&'static str),

    #[error("Output sink error: {0}")]
    Sink(#[from] std::io::Error),
}
