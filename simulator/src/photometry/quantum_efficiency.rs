//! Stochastic photon detection for optical detector channels.
//!
//! A photon reaching a channel's sensitive face is registered with probability
//! equal to the channel's quantum efficiency, provided its wavelength falls
//! inside the sensitive band of the device. Both conditions are evaluated per
//! photon with one uniform draw from the run's random stream.
//!
//! # Detection Model
//!
//! For a photon of wavelength λ and a uniform draw u ∈ [0, 1):
//!
//! detected ⇔ u ≤ QE ∧ low < λ < high
//!
//! # Reproducibility
//!
//! Exactly one draw is consumed per photon, and it is consumed before the
//! wavelength gate is evaluated. The number of draws therefore depends only on
//! the number of photons, never on the band, so a fixed seed reproduces the
//! same decisions for any band setting. Do not short-circuit on the band test.

use rand::Rng;

use crate::config::ConfigError;

/// Sensitive wavelength range of a detector channel.
///
/// The interval is open on both ends: a photon exactly on `low_nm` or
/// `high_nm` is rejected. Infinite bounds express an unbounded band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceBand {
    /// Lower wavelength cut in nanometers (exclusive)
    pub low_nm: f64,

    /// Upper wavelength cut in nanometers (exclusive)
    pub high_nm: f64,
}

impl AcceptanceBand {
    /// Create a band from its lower and upper cuts.
    ///
    /// # Errors
    /// [`ConfigError::InvalidBand`] if either bound is NaN or `low >= high`.
    pub fn new(low_nm: f64, high_nm: f64) -> Result<Self, ConfigError> {
        if low_nm.is_nan() || high_nm.is_nan() || low_nm >= high_nm {
            return Err(ConfigError::InvalidBand { low_nm, high_nm });
        }
        Ok(Self { low_nm, high_nm })
    }

    /// Band accepting every finite wavelength.
    pub fn unbounded() -> Self {
        Self {
            low_nm: f64::NEG_INFINITY,
            high_nm: f64::INFINITY,
        }
    }

    /// True if the wavelength lies strictly inside the band.
    pub fn contains(&self, wavelength_nm: f64) -> bool {
        wavelength_nm > self.low_nm && wavelength_nm < self.high_nm
    }

    pub fn width(&self) -> f64 {
        self.high_nm - self.low_nm
    }
}

/// Per-photon detection decision with a flat quantum efficiency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionSampler {
    quantum_efficiency: f64,
    band: AcceptanceBand,
}

impl DetectionSampler {
    /// Create a sampler.
    ///
    /// # Arguments
    /// * `quantum_efficiency` - Detection probability for in-band photons, in [0, 1]
    /// * `band` - Sensitive wavelength range
    ///
    /// # Errors
    /// [`ConfigError::QuantumEfficiencyOutOfRange`] if QE is outside [0, 1] or NaN.
    pub fn new(quantum_efficiency: f64, band: AcceptanceBand) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&quantum_efficiency) {
            return Err(ConfigError::QuantumEfficiencyOutOfRange(quantum_efficiency));
        }
        Ok(Self {
            quantum_efficiency,
            band,
        })
    }

    pub fn quantum_efficiency(&self) -> f64 {
        self.quantum_efficiency
    }

    pub fn band(&self) -> &AcceptanceBand {
        &self.band
    }

    /// Decide whether one photon is detected.
    ///
    /// Consumes exactly one uniform draw from `rng` regardless of the outcome
    /// of the wavelength test.
    ///
    /// # Arguments
    /// * `wavelength_nm` - Photon wavelength
    /// * `rng` - The run's random stream
    pub fn sample<R: Rng + ?Sized>(&self, wavelength_nm: f64, rng: &mut R) -> bool {
        let u: f64 = rng.gen();
        let passes_qe = u <= self.quantum_efficiency;
        passes_qe && self.band.contains(wavelength_nm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_band_is_open_interval() {
        let band = AcceptanceBand::new(100.0, 200.0).unwrap();
        assert!(band.contains(150.0));
        assert!(!band.contains(100.0));
        assert!(!band.contains(200.0));
        assert!(!band.contains(99.0));
        assert_eq!(band.width(), 100.0);
    }

    #[test]
    fn test_band_validation() {
        assert!(AcceptanceBand::new(200.0, 100.0).is_err());
        assert!(AcceptanceBand::new(100.0, 100.0).is_err());
        assert!(AcceptanceBand::new(f64::NAN, 100.0).is_err());
        assert!(AcceptanceBand::new(f64::NEG_INFINITY, f64::INFINITY).is_ok());
    }

    #[test]
    fn test_unbounded_band_accepts_finite_values() {
        let band = AcceptanceBand::unbounded();
        assert!(band.contains(-1.0e12));
        assert!(band.contains(0.0));
        assert!(band.contains(1.0e12));
    }

    #[test]
    fn test_qe_validation() {
        let band = AcceptanceBand::unbounded();
        assert!(DetectionSampler::new(-0.1, band).is_err());
        assert!(DetectionSampler::new(1.1, band).is_err());
        assert!(DetectionSampler::new(f64::NAN, band).is_err());
        assert!(DetectionSampler::new(0.0, band).is_ok());
        assert!(DetectionSampler::new(1.0, band).is_ok());
    }

    #[test]
    fn test_zero_qe_never_detects() {
        let sampler = DetectionSampler::new(0.0, AcceptanceBand::unbounded()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!((0..10_000).all(|_| !sampler.sample(128.0, &mut rng)));
    }

    #[test]
    fn test_unit_qe_unbounded_always_detects() {
        let sampler = DetectionSampler::new(1.0, AcceptanceBand::unbounded()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!((0..10_000).all(|_| sampler.sample(450.0, &mut rng)));
    }

    #[test]
    fn test_out_of_band_still_consumes_one_draw() {
        let band = AcceptanceBand::new(300.0, 600.0).unwrap();
        let sampler = DetectionSampler::new(1.0, band).unwrap();

        let mut sampled = ChaCha8Rng::seed_from_u64(99);
        let mut reference = ChaCha8Rng::seed_from_u64(99);

        // Out of band: rejected, but the stream must still advance by one
        assert!(!sampler.sample(128.0, &mut sampled));
        let _: f64 = reference.gen();

        let next_sampled: f64 = sampled.gen();
        let next_reference: f64 = reference.gen();
        assert_eq!(next_sampled, next_reference);
    }

    #[test]
    fn test_detection_rate_tracks_qe() {
        let sampler = DetectionSampler::new(0.25, AcceptanceBand::unbounded()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let trials = 40_000;
        let hits = (0..trials).filter(|_| sampler.sample(500.0, &mut rng)).count();
        let rate = hits as f64 / trials as f64;
        assert!((rate - 0.25).abs() < 0.01, "rate was {rate}");
    }
}
