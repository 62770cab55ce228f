//! Run configuration for the photon counter.
//!
//! A [`CounterConfig`] is read once at startup (JSON file or command line) and
//! validated before any event is processed. Nothing here changes during a run.

use std::path::Path;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::Representation;
use crate::photometry::{AcceptanceBand, DetectionSampler};
use crate::sink::OutputStreams;

/// Highest verbosity level with its own diagnostics.
pub const MAX_VERBOSITY: u8 = 3;

/// Default bucket width for the compact photon representation, in ns.
pub const DEFAULT_BUCKET_WIDTH: f64 = 2.0;

/// Errors that make a run configuration unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Quantum efficiency must be between 0.0 and 1.0, got {0}")]
    QuantumEfficiencyOutOfRange(f64),

    #[error("Wavelength cut low ({low_nm}) must be below cut high ({high_nm})")]
    InvalidBand { low_nm: f64, high_nm: f64 },

    #[error("Input label must not be empty")]
    MissingInputLabel,

    #[error("Bucket width must be positive and finite, got {0}")]
    InvalidBucketWidth(f64),

    #[error("Verbosity must be between 0 and 3, got {0}")]
    VerbosityOutOfRange(u8),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Recognized options of a photon counting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Diagnostic detail, 0 (quiet) to 3 (per channel). No effect on results.
    pub verbosity: u8,

    /// Label of the upstream producer whose photons are counted
    pub input_label: String,

    /// Which output streams are written
    pub streams: OutputStreams,

    /// Flat quantum efficiency applied to every channel
    pub quantum_efficiency: f64,

    /// Lower edge of the sensitive wavelength band in nm (exclusive)
    pub wavelength_cut_low: f64,

    /// Upper edge of the sensitive wavelength band in nm (exclusive)
    pub wavelength_cut_high: f64,

    /// Explicit seed for the detection stream
    pub seed: Option<u64>,

    /// Run-wide seed used to derive the detection seed when `seed` is unset
    pub run_seed: u64,

    /// Input arrives as time-bucketed counts instead of photon lists
    pub use_compact_photons: bool,

    /// Accumulate a visibility library from single-voxel events
    pub library_build: bool,

    /// Width of one time bucket of the compact representation
    pub bucket_width: f64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            input_label: "largeant".to_string(),
            streams: OutputStreams::default(),
            quantum_efficiency: 1.0,
            wavelength_cut_low: 0.0,
            wavelength_cut_high: 1.0e6,
            seed: None,
            run_seed: 0,
            use_compact_photons: false,
            library_build: false,
            bucket_width: DEFAULT_BUCKET_WIDTH,
        }
    }
}

impl CounterConfig {
    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save the configuration as pretty-printed JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check every option, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verbosity > MAX_VERBOSITY {
            return Err(ConfigError::VerbosityOutOfRange(self.verbosity));
        }
        if self.input_label.trim().is_empty() {
            return Err(ConfigError::MissingInputLabel);
        }
        if !(self.bucket_width > 0.0 && self.bucket_width.is_finite()) {
            return Err(ConfigError::InvalidBucketWidth(self.bucket_width));
        }
        self.sampler()?;
        Ok(())
    }

    pub fn band(&self) -> Result<AcceptanceBand, ConfigError> {
        AcceptanceBand::new(self.wavelength_cut_low, self.wavelength_cut_high)
    }

    pub fn sampler(&self) -> Result<DetectionSampler, ConfigError> {
        DetectionSampler::new(self.quantum_efficiency, self.band()?)
    }

    pub fn representation(&self) -> Representation {
        Representation::from_compact_flag(self.use_compact_photons)
    }

    /// Seed of the detection stream.
    ///
    /// The explicit `seed` wins; otherwise the first value of a ChaCha8 stream
    /// seeded with `run_seed`, so runs without an explicit seed are still
    /// reproducible from the run-wide seed.
    pub fn effective_seed(&self) -> u64 {
        self.seed
            .unwrap_or_else(|| ChaCha8Rng::seed_from_u64(self.run_seed).next_u64())
    }

    /// Detection stream seeded with [`Self::effective_seed`].
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.effective_seed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        CounterConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_qe_out_of_range() {
        let config = CounterConfig {
            quantum_efficiency: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::QuantumEfficiencyOutOfRange(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_band() {
        let config = CounterConfig {
            wavelength_cut_low: 500.0,
            wavelength_cut_high: 300.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBand { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_label() {
        let config = CounterConfig {
            input_label: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingInputLabel)
        ));
    }

    #[test]
    fn test_rejects_bad_bucket_width_and_verbosity() {
        let config = CounterConfig {
            bucket_width: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CounterConfig {
            verbosity: 4,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::VerbosityOutOfRange(4))
        ));
    }

    #[test]
    fn test_effective_seed() {
        let explicit = CounterConfig {
            seed: Some(1234),
            ..Default::default()
        };
        assert_eq!(explicit.effective_seed(), 1234);

        let derived = CounterConfig {
            run_seed: 5,
            ..Default::default()
        };
        assert_eq!(derived.effective_seed(), derived.effective_seed());
        assert_ne!(
            derived.effective_seed(),
            CounterConfig {
                run_seed: 6,
                ..Default::default()
            }
            .effective_seed()
        );
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: CounterConfig =
            serde_json::from_str(r#"{"quantum_efficiency": 0.2, "use_compact_photons": true}"#)
                .unwrap();
        assert_eq!(config.quantum_efficiency, 0.2);
        assert_eq!(config.representation(), Representation::Bucketed);
        assert_eq!(config.bucket_width, DEFAULT_BUCKET_WIDTH);
        assert_eq!(config.input_label, "largeant");
    }
}
