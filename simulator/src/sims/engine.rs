//! Per-event photon detection.
//!
//! The engine turns the photon collections of one event into channel and
//! event tallies:
//! 1. Validate the input against the run's photon representation
//! 2. Convert every photon to a wavelength and arrival time
//! 3. Draw detection against quantum efficiency and the acceptance band
//! 4. Emit the enabled output streams and, in library builds, feed the
//!    visibility accumulator with each channel's raw count
//!
//! Randomness comes from a single stream owned by the engine. Exactly one
//! draw is made per photon, so results are reproducible for a fixed seed and
//! input regardless of verbosity or which streams are enabled.

use log::{debug, info, log_enabled, trace, warn, Level};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::config::CounterConfig;
use crate::errors::DetectionError;
use crate::hardware::{ChannelAggregator, EventAggregator};
use crate::input::{PhotonInput, RawEventInput, Representation};
use crate::library::{LightSourceProvider, VisibilityAccumulator, VoxelId};
use crate::photometry::DetectionSampler;
use crate::sink::{EventTally, RecordSink};

/// Collaborators of a library build, borrowed for the whole run.
pub struct LibraryBuild<'a> {
    pub accumulator: &'a mut VisibilityAccumulator,
    pub light_source: &'a mut dyn LightSourceProvider,
}

pub struct DetectionEngine<'a, S: RecordSink, R: Rng = ChaCha8Rng> {
    config: CounterConfig,
    sampler: DetectionSampler,
    representation: Representation,
    rng: R,
    sink: S,
    library: Option<LibraryBuild<'a>>,
}

impl<'a, S: RecordSink> DetectionEngine<'a, S, ChaCha8Rng> {
    /// Engine for a plain counting run, seeded from the configuration.
    pub fn new(config: CounterConfig, sink: S) -> Result<Self, DetectionError> {
        let rng = config.rng();
        Self::with_rng(config, sink, rng, None)
    }

    /// Engine for a library build, seeded from the configuration.
    pub fn with_library(
        config: CounterConfig,
        sink: S,
        library: LibraryBuild<'a>,
    ) -> Result<Self, DetectionError> {
        let rng = config.rng();
        Self::with_rng(config, sink, rng, Some(library))
    }
}

impl<'a, S: RecordSink, R: Rng> DetectionEngine<'a, S, R> {
    /// Engine drawing from a caller-supplied random stream.
    ///
    /// # Errors
    /// Invalid configuration, or library collaborators given without
    /// `library_build` set (or the reverse).
    pub fn with_rng(
        config: CounterConfig,
        sink: S,
        rng: R,
        library: Option<LibraryBuild<'a>>,
    ) -> Result<Self, DetectionError> {
        config.validate()?;
        match (config.library_build, library.is_some()) {
            (true, false) => {
                return Err(DetectionError::LibraryMode(
                    "library_build needs a visibility accumulator and a light source",
                ))
            }
            (false, true) => {
                return Err(DetectionError::LibraryMode(
                    "library collaborators given but library_build is off",
                ))
            }
            _ => {}
        }

        let sampler = config.sampler()?;
        let representation = config.representation();
        if config.verbosity >= 1 {
            info!(
                "Counting '{}' photons: {:?} input, QE {}, band ({}, {}) nm",
                config.input_label,
                representation,
                sampler.quantum_efficiency(),
                sampler.band().low_nm,
                sampler.band().high_nm
            );
        }

        Ok(Self {
            config,
            sampler,
            representation,
            rng,
            sink,
            library,
        })
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Count the photons of one event.
    ///
    /// `None` input means the provider had nothing for this event. That is
    /// logged and an all-zero event tally is emitted so the per-event stream
    /// stays dense.
    ///
    /// # Errors
    /// A representation mismatch, a photon with non-positive energy, or a
    /// sink failure. All of them abort the run.
    pub fn process(
        &mut self,
        event_id: u32,
        input: Option<RawEventInput>,
    ) -> Result<EventTally, DetectionError> {
        let Some(raw) = input else {
            if self.config.verbosity >= 1 {
                warn!(
                    "Event {event_id}: no photon collection from '{}', writing an empty event",
                    self.config.input_label
                );
            }
            let tally = EventAggregator::new(event_id, &self.config.streams)
                .finalize(&mut self.sink)?;
            return Ok(tally);
        };

        let input = PhotonInput::from_raw(event_id, raw, self.representation)?;
        if self.config.verbosity >= 1 {
            info!(
                "Event {event_id}: found photon collection of size {}",
                input.channel_count()
            );
        }
        self.count_input(event_id, &input)
    }

    fn count_input(
        &mut self,
        event_id: u32,
        input: &PhotonInput,
    ) -> Result<EventTally, DetectionError> {
        let verbosity = self.config.verbosity;
        let lit_voxel = self.record_light_production(event_id);
        let trace_photons = verbosity >= 3 && log_enabled!(Level::Trace);

        let mut event = EventAggregator::new(event_id, &self.config.streams);
        let mut channel = ChannelAggregator::new(event_id, self.config.streams);

        for stream in input.channels(self.config.bucket_width) {
            channel.reset(stream.channel());
            for photon in stream.photons() {
                let photon = photon?;
                let detected = self.sampler.sample(photon.wavelength_nm, &mut self.rng);
                if trace_photons {
                    trace!(
                        "Event {event_id} channel {}: {:.2} nm at {:.2}, detected {detected}",
                        stream.channel(),
                        photon.wavelength_nm,
                        photon.time
                    );
                }
                channel.record_photon(
                    photon.wavelength_nm,
                    photon.time,
                    detected,
                    &mut self.sink,
                )?;
            }

            let tally = channel.finalize(&mut self.sink)?;
            if let (Some(library), Some(voxel)) = (self.library.as_mut(), lit_voxel) {
                library
                    .accumulator
                    .record(voxel, tally.channel, tally.count_all);
            }
            if verbosity >= 3 {
                info!(
                    "Event {event_id} channel {}: {} photons, {} detected",
                    tally.channel, tally.count_all, tally.count_detected
                );
            }
            event.add(&tally);
        }

        let channels = event.channels_seen();
        let tally = event.finalize(&mut self.sink)?;
        if verbosity >= 2 {
            info!(
                "Event {event_id}: {channels} channels, {} photons, {} detected",
                tally.count_all, tally.count_detected
            );
        }
        Ok(tally)
    }

    /// Add this event's light production to the library, once per event.
    ///
    /// Returns the voxel whose channel hits should be recorded, `None` when
    /// not building a library or when the production was rejected.
    fn record_light_production(&mut self, event_id: u32) -> Option<VoxelId> {
        let library = self.library.as_mut()?;
        let Some((voxel, produced)) = library.light_source.light_production(event_id) else {
            warn!("Event {event_id}: no light source, skipping library entries");
            return None;
        };
        debug!("Event {event_id}: light source in voxel {voxel}, {produced} photons");
        library
            .accumulator
            .record_production(voxel, produced)
            .then_some(voxel)
    }

    /// Write the visibility library to the sink. Allowed once per run.
    ///
    /// # Returns
    /// Number of library entries
    pub fn finalize_library(&mut self) -> Result<usize, DetectionError> {
        let Some(library) = self.library.as_mut() else {
            return Err(DetectionError::LibraryMode(
                "finalize_library called outside a library build",
            ));
        };
        let entries = library
            .accumulator
            .finalize(&mut self.sink, self.config.streams.library)?;
        if self.config.verbosity >= 1 {
            info!("Visibility library finalized with {entries} entries");
        }
        Ok(entries)
    }

    pub fn flush(&mut self) -> Result<(), DetectionError> {
        self.sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{BucketedPhotonRecord, ChannelPhotons, PhotonRecord};
    use crate::library::SteppedLightSource;
    use crate::library::VoxelGrid;
    use crate::sink::{MemorySink, OutputStreams};

    fn itemized_event(channels: &[(u32, usize)]) -> RawEventInput {
        RawEventInput::itemized(
            channels
                .iter()
                .map(|&(channel, n)| ChannelPhotons {
                    channel,
                    photons: (0..n)
                        .map(|i| PhotonRecord::from_wavelength(400.0, i as f64))
                        .collect(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_counts_every_photon_at_full_qe() {
        let mut engine = DetectionEngine::new(CounterConfig::default(), MemorySink::new()).unwrap();
        let tally = engine.process(1, Some(itemized_event(&[(0, 3), (4, 2)]))).unwrap();
        assert_eq!((tally.count_all, tally.count_detected), (5, 5));

        let sink = engine.into_sink();
        let channels = sink.channels_of(1);
        assert_eq!(channels.len(), 2);
        assert_eq!((channels[1].channel, channels[1].count_all), (4, 2));
    }

    #[test]
    fn test_missing_input_writes_zero_event() {
        let mut engine = DetectionEngine::new(CounterConfig::default(), MemorySink::new()).unwrap();
        let tally = engine.process(7, None).unwrap();
        assert_eq!((tally.event_id, tally.count_all, tally.count_detected), (7, 0, 0));
        assert_eq!(engine.sink().events.len(), 1);
        assert!(engine.sink().channels.is_empty());
    }

    #[test]
    fn test_wrong_representation_is_fatal() {
        let mut engine = DetectionEngine::new(CounterConfig::default(), MemorySink::new()).unwrap();
        let bucketed = RawEventInput::bucketed(vec![BucketedPhotonRecord::new(0)]);
        assert!(matches!(
            engine.process(2, Some(bucketed)),
            Err(DetectionError::RepresentationMismatch { event_id: 2, .. })
        ));
    }

    #[test]
    fn test_library_mode_needs_collaborators() {
        let config = CounterConfig {
            library_build: true,
            ..Default::default()
        };
        assert!(matches!(
            DetectionEngine::new(config, MemorySink::new()),
            Err(DetectionError::LibraryMode(_))
        ));

        let mut engine = DetectionEngine::new(CounterConfig::default(), MemorySink::new()).unwrap();
        assert!(matches!(
            engine.finalize_library(),
            Err(DetectionError::LibraryMode(_))
        ));
    }

    #[test]
    fn test_library_build_records_raw_counts() {
        let grid = VoxelGrid::new([0.0; 3], [1.0; 3], [2, 1, 1]).unwrap();
        let mut light = SteppedLightSource::new(&grid, 100.0, 0);
        let mut accumulator = VisibilityAccumulator::new();
        let config = CounterConfig {
            library_build: true,
            quantum_efficiency: 0.0,
            ..Default::default()
        };

        {
            let library = LibraryBuild {
                accumulator: &mut accumulator,
                light_source: &mut light,
            };
            let mut engine =
                DetectionEngine::with_library(config, MemorySink::new(), library).unwrap();
            engine.process(0, Some(itemized_event(&[(0, 20), (1, 5)]))).unwrap();
            engine.process(1, Some(itemized_event(&[(1, 50)]))).unwrap();
            assert_eq!(engine.finalize_library().unwrap(), 3);
            assert_eq!(engine.sink().library.len(), 3);
        }

        // QE 0 detects nothing, yet the library sees every photon
        assert_eq!(accumulator.efficiency(0, 0), Some(0.2));
        assert_eq!(accumulator.efficiency(0, 1), Some(0.05));
        assert_eq!(accumulator.efficiency(1, 1), Some(0.5));
        assert!(accumulator.is_finalized());
    }

    #[test]
    fn test_disabled_streams_emit_nothing() {
        let config = CounterConfig {
            streams: OutputStreams::none(),
            ..Default::default()
        };
        let mut engine = DetectionEngine::new(config, MemorySink::new()).unwrap();
        let tally = engine.process(3, Some(itemized_event(&[(0, 4)]))).unwrap();
        assert_eq!(tally.count_all, 4);
        let sink = engine.into_sink();
        assert!(sink.events.is_empty());
        assert!(sink.channels.is_empty());
        assert!(sink.all_photons.is_empty());
    }
}
