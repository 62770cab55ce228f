//! Photon wavelengths and the detection model

pub mod quantum_efficiency;
pub mod wavelength;

pub use quantum_efficiency::{AcceptanceBand, DetectionSampler};
pub use wavelength::{energy_to_wavelength, wavelength_to_energy, BUCKETED_WAVELENGTH_NM};
