use std::path::PathBuf;
use std::str::FromStr;

use clap::Args;

use crate::config::{ConfigError, CounterConfig};
use crate::library::{VoxelError, VoxelGrid};

/// Parse a triplet string in format "x,y,z"
fn parse_triplet<T: FromStr>(s: &str) -> Result<[T; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err("Triplet must be in format 'x,y,z'".to_string());
    }

    let mut values = Vec::with_capacity(3);
    for (axis, part) in ["x", "y", "z"].iter().zip(parts) {
        let value = part
            .trim()
            .parse::<T>()
            .map_err(|_| format!("Invalid {axis} value '{}'", part.trim()))?;
        values.push(value);
    }
    values
        .try_into()
        .map_err(|_| "Triplet must have three values".to_string())
}

fn parse_point(s: &str) -> Result<[f64; 3], String> {
    parse_triplet(s)
}

fn parse_steps(s: &str) -> Result<[u32; 3], String> {
    parse_triplet(s)
}

/// Counting options shared by the photon counting binaries.
///
/// Every option is an override: unset options keep the value from
/// `--config`, or the built-in default without a config file.
#[derive(Args, Debug, Clone, Default)]
pub struct CounterArgs {
    /// JSON configuration file to start from
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Diagnostic verbosity, 0 (quiet) to 3 (per channel)
    #[arg(short, long)]
    pub verbosity: Option<u8>,

    /// Label of the producer whose photons are counted
    #[arg(long)]
    pub input_label: Option<String>,

    /// Flat quantum efficiency in [0, 1]
    #[arg(long)]
    pub quantum_efficiency: Option<f64>,

    /// Lower edge of the acceptance band in nm (exclusive)
    #[arg(long)]
    pub wavelength_cut_low: Option<f64>,

    /// Upper edge of the acceptance band in nm (exclusive)
    #[arg(long)]
    pub wavelength_cut_high: Option<f64>,

    /// Explicit seed for the detection stream
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run-wide seed the detection seed is derived from when --seed is unset
    #[arg(long)]
    pub run_seed: Option<u64>,

    /// Input holds time-bucketed photon counts
    #[arg(long, default_value_t = false)]
    pub compact_photons: bool,

    /// Width of one time bucket of compact input
    #[arg(long)]
    pub bucket_width: Option<f64>,

    /// Write every photon reaching a channel
    #[arg(long, default_value_t = false)]
    pub all_photons: bool,

    /// Write every detected photon
    #[arg(long, default_value_t = false)]
    pub detected_photons: bool,

    /// Skip the per-channel tallies
    #[arg(long, default_value_t = false)]
    pub no_per_channel: bool,

    /// Skip the per-event tallies
    #[arg(long, default_value_t = false)]
    pub no_per_event: bool,

    /// Skip writing library entries
    #[arg(long, default_value_t = false)]
    pub no_library: bool,
}

impl CounterArgs {
    /// Resolve the run configuration and validate it.
    pub fn to_config(&self) -> Result<CounterConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => CounterConfig::load_from_file(path)?,
            None => CounterConfig::default(),
        };

        if let Some(verbosity) = self.verbosity {
            config.verbosity = verbosity;
        }
        if let Some(label) = &self.input_label {
            config.input_label = label.clone();
        }
        if let Some(qe) = self.quantum_efficiency {
            config.quantum_efficiency = qe;
        }
        if let Some(low) = self.wavelength_cut_low {
            config.wavelength_cut_low = low;
        }
        if let Some(high) = self.wavelength_cut_high {
            config.wavelength_cut_high = high;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(run_seed) = self.run_seed {
            config.run_seed = run_seed;
        }
        if let Some(width) = self.bucket_width {
            config.bucket_width = width;
        }
        config.use_compact_photons |= self.compact_photons;

        let streams = &mut config.streams;
        streams.all_photons |= self.all_photons;
        streams.detected_photons |= self.detected_photons;
        streams.per_channel &= !self.no_per_channel;
        streams.per_event &= !self.no_per_event;
        streams.library &= !self.no_library;

        config.validate()?;
        Ok(config)
    }
}

/// Voxelization and light source of a library build.
#[derive(Args, Debug, Clone)]
pub struct LibraryArgs {
    /// Build a visibility library, one voxel per event
    #[arg(long, default_value_t = false)]
    pub library_build: bool,

    /// Minimum corner of the voxelized volume (format: "x,y,z")
    #[arg(long, default_value = "-200.0,-200.0,0.0", value_parser = parse_point)]
    pub grid_lower: [f64; 3],

    /// Maximum corner of the voxelized volume (format: "x,y,z")
    #[arg(long, default_value = "200.0,200.0,500.0", value_parser = parse_point)]
    pub grid_upper: [f64; 3],

    /// Voxels along each axis (format: "nx,ny,nz")
    #[arg(long, default_value = "10,10,10", value_parser = parse_steps)]
    pub grid_steps: [u32; 3],

    /// Photons produced by the point source in each library event
    #[arg(long, default_value_t = 1.0e5)]
    pub photons_per_voxel: f64,

    /// Number of channels in the saved library table
    #[arg(long)]
    pub n_channels: Option<u32>,

    /// File the finished library table is saved to
    #[arg(long, default_value = "visibility_library.json")]
    pub library_file: PathBuf,
}

impl LibraryArgs {
    pub fn grid(&self) -> Result<VoxelGrid, VoxelError> {
        VoxelGrid::new(self.grid_lower, self.grid_upper, self.grid_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        counter: CounterArgs,
        #[command(flatten)]
        library: LibraryArgs,
    }

    #[test]
    fn test_parse_triplet() {
        assert_eq!(parse_point("1, -2.5,3").unwrap(), [1.0, -2.5, 3.0]);
        assert_eq!(parse_steps("4,5,6").unwrap(), [4, 5, 6]);
        assert!(parse_steps("4,5").is_err());
        assert!(parse_steps("4,x,6").is_err());
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        let cli = TestCli::parse_from(["test"]);
        assert_eq!(cli.counter.to_config().unwrap(), CounterConfig::default());
        assert!(!cli.library.library_build);
        assert_eq!(cli.library.grid().unwrap().n_voxels(), 1000);
    }

    #[test]
    fn test_overrides() {
        let cli = TestCli::parse_from([
            "test",
            "--quantum-efficiency",
            "0.25",
            "--wavelength-cut-low",
            "300",
            "--seed",
            "9",
            "--compact-photons",
            "--all-photons",
            "--no-per-channel",
        ]);
        let config = cli.counter.to_config().unwrap();
        assert_eq!(config.quantum_efficiency, 0.25);
        assert_eq!(config.wavelength_cut_low, 300.0);
        assert_eq!(config.seed, Some(9));
        assert!(config.use_compact_photons);
        assert!(config.streams.all_photons);
        assert!(!config.streams.per_channel);
        assert!(config.streams.per_event);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = TestCli::parse_from(["test", "--quantum-efficiency", "1.5"]);
        assert!(matches!(
            cli.counter.to_config(),
            Err(ConfigError::QuantumEfficiencyOutOfRange(_))
        ));
    }
}
