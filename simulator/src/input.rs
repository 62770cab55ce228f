//! Photon input representations and their normalization.
//!
//! The propagation simulation hands over photons in one of two shapes:
//!
//! - **Itemized**: one [`PhotonRecord`] per photon, grouped by channel. Each
//!   record carries its own energy (or wavelength) and arrival time.
//! - **Bucketed**: per channel, a map from integer time bucket to photon count.
//!   Per-photon spectra are dropped, so every photon gets
//!   [`BUCKETED_WAVELENGTH_NM`], and its time is `bucket × bucket_width`.
//!
//! [`PhotonInput`] is the validated sum of both shapes. Its
//! [`PhotonInput::channels`] iterator normalizes either shape into the same
//! stream of [`SimulatedPhoton`] values, which is all the detection loop sees.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::DetectionError;
use crate::photometry::wavelength::{energy_to_wavelength, BUCKETED_WAVELENGTH_NM};

/// Spectral information of one itemized photon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spectral {
    /// Kinetic energy in GeV, converted to wavelength on use
    EnergyGev(f64),
    /// Wavelength already known, in nm
    WavelengthNm(f64),
}

/// One photon reaching a channel, as reported by the propagation simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotonRecord {
    pub spectral: Spectral,
    /// Arrival time at the channel face
    pub time: f64,
}

impl PhotonRecord {
    pub fn from_energy(energy_gev: f64, time: f64) -> Self {
        Self {
            spectral: Spectral::EnergyGev(energy_gev),
            time,
        }
    }

    pub fn from_wavelength(wavelength_nm: f64, time: f64) -> Self {
        Self {
            spectral: Spectral::WavelengthNm(wavelength_nm),
            time,
        }
    }

    /// Wavelength in nm, converting from energy when needed.
    pub fn wavelength(&self) -> Result<f64, DetectionError> {
        match self.spectral {
            Spectral::EnergyGev(energy) => energy_to_wavelength(energy),
            Spectral::WavelengthNm(wavelength) => Ok(wavelength),
        }
    }
}

/// All itemized photons that reached one channel in one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPhotons {
    pub channel: u32,
    pub photons: Vec<PhotonRecord>,
}

/// Compact photon counts of one channel in one event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BucketedPhotonRecord {
    pub channel: u32,
    /// Time bucket index → number of photons in that bucket
    pub buckets: BTreeMap<i32, u32>,
}

impl BucketedPhotonRecord {
    pub fn new(channel: u32) -> Self {
        Self {
            channel,
            buckets: BTreeMap::new(),
        }
    }

    /// Add `count` photons to a bucket.
    pub fn add(&mut self, bucket: i32, count: u32) {
        *self.buckets.entry(bucket).or_insert(0) += count;
    }

    pub fn total_photons(&self) -> u64 {
        self.buckets.values().map(|&n| n as u64).sum()
    }
}

/// Which input shape a run consumes. Chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    Itemized,
    Bucketed,
}

impl Representation {
    pub fn from_compact_flag(use_compact_photons: bool) -> Self {
        if use_compact_photons {
            Representation::Bucketed
        } else {
            Representation::Itemized
        }
    }
}

/// Photon collections of one event as a provider returns them.
///
/// Exactly one of the two fields is expected to be present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawEventInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itemized: Option<Vec<ChannelPhotons>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucketed: Option<Vec<BucketedPhotonRecord>>,
}

impl RawEventInput {
    pub fn itemized(channels: Vec<ChannelPhotons>) -> Self {
        Self {
            itemized: Some(channels),
            bucketed: None,
        }
    }

    pub fn bucketed(channels: Vec<BucketedPhotonRecord>) -> Self {
        Self {
            itemized: None,
            bucketed: Some(channels),
        }
    }
}

/// Validated photon input of one event.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotonInput {
    Itemized(Vec<ChannelPhotons>),
    Bucketed(Vec<BucketedPhotonRecord>),
}

impl PhotonInput {
    /// Validate a provider's raw input against the run's representation.
    ///
    /// # Errors
    /// [`DetectionError::RepresentationMismatch`] when both or neither
    /// collection is present, or when the present one is not the run's shape.
    pub fn from_raw(
        event_id: u32,
        raw: RawEventInput,
        expected: Representation,
    ) -> Result<Self, DetectionError> {
        let mismatch = |reason| DetectionError::RepresentationMismatch {
            event_id,
            expected,
            reason,
        };

        let input = match (raw.itemized, raw.bucketed) {
            (Some(_), Some(_)) => {
                return Err(mismatch("both itemized and bucketed photons present"))
            }
            (None, None) => return Err(mismatch("no photon collection present")),
            (Some(channels), None) => PhotonInput::Itemized(channels),
            (None, Some(channels)) => PhotonInput::Bucketed(channels),
        };

        if input.representation() != expected {
            return Err(mismatch("photon representation differs from the run's"));
        }
        Ok(input)
    }

    pub fn representation(&self) -> Representation {
        match self {
            PhotonInput::Itemized(_) => Representation::Itemized,
            PhotonInput::Bucketed(_) => Representation::Bucketed,
        }
    }

    pub fn channel_count(&self) -> usize {
        match self {
            PhotonInput::Itemized(channels) => channels.len(),
            PhotonInput::Bucketed(channels) => channels.len(),
        }
    }

    /// Channels in input order, each yielding normalized photons.
    pub fn channels(&self, bucket_width: f64) -> Box<dyn Iterator<Item = ChannelStream<'_>> + '_> {
        match self {
            PhotonInput::Itemized(channels) => {
                Box::new(channels.iter().map(ChannelStream::Itemized))
            }
            PhotonInput::Bucketed(channels) => Box::new(
                channels
                    .iter()
                    .map(move |record| ChannelStream::Bucketed {
                        record,
                        bucket_width,
                    }),
            ),
        }
    }
}

/// A photon as seen by the detection loop, whatever its source shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedPhoton {
    pub wavelength_nm: f64,
    pub time: f64,
}

/// One channel's photons, normalized.
#[derive(Debug, Clone, Copy)]
pub enum ChannelStream<'a> {
    Itemized(&'a ChannelPhotons),
    Bucketed {
        record: &'a BucketedPhotonRecord,
        bucket_width: f64,
    },
}

impl<'a> ChannelStream<'a> {
    pub fn channel(&self) -> u32 {
        match self {
            ChannelStream::Itemized(photons) => photons.channel,
            ChannelStream::Bucketed { record, .. } => record.channel,
        }
    }

    /// Photons of this channel in detection order.
    ///
    /// Itemized photons come in record order. Bucketed photons come in
    /// ascending bucket order, `count` identical photons per bucket.
    pub fn photons(
        &self,
    ) -> Box<dyn Iterator<Item = Result<SimulatedPhoton, DetectionError>> + 'a> {
        match *self {
            ChannelStream::Itemized(photons) => {
                Box::new(photons.photons.iter().map(|record| {
                    record.wavelength().map(|wavelength_nm| SimulatedPhoton {
                        wavelength_nm,
                        time: record.time,
                    })
                }))
            }
            ChannelStream::Bucketed {
                record,
                bucket_width,
            } => Box::new(record.buckets.iter().flat_map(move |(&bucket, &count)| {
                let photon = SimulatedPhoton {
                    wavelength_nm: BUCKETED_WAVELENGTH_NM,
                    time: bucket as f64 * bucket_width,
                };
                std::iter::repeat(photon).take(count as usize).map(Ok)
            })),
        }
    }
}

/// Supplies the photon input of each event.
pub trait PhotonSource {
    /// Photon collections of an event, or `None` when the event has none.
    fn fetch(&mut self, event_id: u32) -> Option<RawEventInput>;
}

/// One event of an [`EventFile`].
///
/// The input stays nested under its own key: flattening it would route the
/// integer bucket keys through serde's string-keyed buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    pub event_id: u32,
    pub input: RawEventInput,
}

/// JSON file of photon events, the binary's input provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFile {
    pub events: Vec<EventEntry>,
}

impl EventFile {
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    pub fn push(&mut self, event_id: u32, input: RawEventInput) {
        self.events.push(EventEntry { event_id, input });
    }

    /// Smallest and largest event id in the file.
    pub fn event_span(&self) -> Option<(u32, u32)> {
        let first = self.events.iter().map(|e| e.event_id).min()?;
        let last = self.events.iter().map(|e| e.event_id).max()?;
        Some((first, last))
    }

    /// Index the events by id. A repeated id keeps its last entry.
    pub fn into_source(self) -> EventMap {
        EventMap {
            events: self
                .events
                .into_iter()
                .map(|entry| (entry.event_id, entry.input))
                .collect(),
        }
    }
}

/// In-memory photon source keyed by event id.
#[derive(Debug, Clone, Default)]
pub struct EventMap {
    events: BTreeMap<u32, RawEventInput>,
}

impl EventMap {
    pub fn insert(&mut self, event_id: u32, input: RawEventInput) {
        self.events.insert(event_id, input);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl PhotonSource for EventMap {
    fn fetch(&mut self, event_id: u32) -> Option<RawEventInput> {
        self.events.remove(&event_id)
    }
}
