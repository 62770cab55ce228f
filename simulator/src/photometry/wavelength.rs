//! Photon energy to wavelength conversion.
//!
//! The upstream propagation simulation reports photon kinetic energies in GeV.
//! Detection decisions are made on wavelength, so every itemized photon goes
//! through [`energy_to_wavelength`] once before sampling.
//!
//! # Conversion
//!
//! λ = 2π·ħc / E
//!
//! with ħc expressed in GeV·nm so the result comes out directly in nanometers.

use std::f64::consts::PI;

use crate::errors::DetectionError;

/// Reduced Planck constant times speed of light, in GeV·nm.
///
/// Matches the unit convention of the photon propagation simulation that
/// produces the photon energies.
pub const HBAR_C_GEV_NM: f64 = 0.000197;

/// Wavelength assigned to every photon of the bucketed representation.
///
/// Bucketed records carry counts only, so no per-photon spectrum survives.
/// This sentinel stands in for the scintillation peak.
pub const BUCKETED_WAVELENGTH_NM: f64 = 128.0;

/// Convert a photon energy in GeV to a wavelength in nanometers.
///
/// # Arguments
/// * `energy_gev` - Photon kinetic energy, must be positive and finite
///
/// # Returns
/// Wavelength in nm, or [`DetectionError::NonPositiveEnergy`] for `E <= 0`
///
/// # Examples
/// ```rust
/// use opdet_sim::photometry::wavelength::energy_to_wavelength;
///
/// let wavelength = energy_to_wavelength(1.2394e-6).unwrap();
/// assert!((wavelength - 998.7).abs() < 0.05);
/// assert!(energy_to_wavelength(0.0).is_err());
/// ```
pub fn energy_to_wavelength(energy_gev: f64) -> Result<f64, DetectionError> {
    if energy_gev <= 0.0 || !energy_gev.is_finite() {
        return Err(DetectionError::NonPositiveEnergy(energy_gev));
    }
    Ok(2.0 * PI * HBAR_C_GEV_NM / energy_gev)
}

/// Inverse of [`energy_to_wavelength`], used to build test photons at a
/// chosen wavelength.
pub fn wavelength_to_energy(wavelength_nm: f64) -> Result<f64, DetectionError> {
    // Same formula, the relation is its own inverse
    energy_to_wavelength(wavelength_nm)
}
