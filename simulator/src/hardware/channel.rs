//! Per-channel photon counting within one event.

use crate::sink::{ChannelTally, OutputStreams, PhotonDetail, RecordSink};

/// Counts photons of the channel currently being processed.
///
/// One aggregator serves a whole event: [`reset`](Self::reset) starts a new
/// channel, [`record_photon`](Self::record_photon) is called once per photon,
/// and [`finalize`](Self::finalize) closes the channel and hands back its
/// tally for the event sum.
#[derive(Debug, Clone)]
pub struct ChannelAggregator {
    streams: OutputStreams,
    tally: ChannelTally,
}

impl ChannelAggregator {
    pub fn new(event_id: u32, streams: OutputStreams) -> Self {
        Self {
            streams,
            tally: ChannelTally {
                event_id,
                ..Default::default()
            },
        }
    }

    /// Zero the counters and switch to `channel`.
    pub fn reset(&mut self, channel: u32) {
        self.tally = ChannelTally {
            event_id: self.tally.event_id,
            channel,
            count_all: 0,
            count_detected: 0,
        };
    }

    /// Count one photon and emit its detail records.
    ///
    /// The detail record is built only when at least one per-photon stream
    /// is enabled. Detected photons also go to the detected-photons stream.
    pub fn record_photon<S: RecordSink + ?Sized>(
        &mut self,
        wavelength_nm: f64,
        time: f64,
        detected: bool,
        sink: &mut S,
    ) -> std::io::Result<()> {
        self.tally.count_all += 1;
        if detected {
            self.tally.count_detected += 1;
        }

        if self.streams.wants_photon_details() {
            let detail = PhotonDetail {
                event_id: self.tally.event_id,
                channel: self.tally.channel,
                wavelength_nm,
                time,
            };
            if self.streams.all_photons {
                sink.write_photon(&detail)?;
            }
            if detected && self.streams.detected_photons {
                sink.write_detected_photon(&detail)?;
            }
        }
        Ok(())
    }

    /// Emit the channel tally (if enabled) and return it.
    pub fn finalize<S: RecordSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> std::io::Result<ChannelTally> {
        if self.streams.per_channel {
            sink.write_channel(&self.tally)?;
        }
        Ok(self.tally)
    }

    /// Counts accumulated so far for the current channel.
    pub fn tally(&self) -> &ChannelTally {
        &self.tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn test_counts_and_details() {
        let mut sink = MemorySink::new();
        let mut agg = ChannelAggregator::new(5, OutputStreams::all());
        agg.reset(12);

        agg.record_photon(400.0, 1.0, true, &mut sink).unwrap();
        agg.record_photon(410.0, 2.0, false, &mut sink).unwrap();
        agg.record_photon(420.0, 3.0, true, &mut sink).unwrap();
        let tally = agg.finalize(&mut sink).unwrap();

        assert_eq!(tally.event_id, 5);
        assert_eq!(tally.channel, 12);
        assert_eq!(tally.count_all, 3);
        assert_eq!(tally.count_detected, 2);

        assert_eq!(sink.all_photons.len(), 3);
        assert_eq!(sink.detected_photons.len(), 2);
        assert_eq!(sink.detected_photons[1].wavelength_nm, 420.0);
        assert_eq!(sink.channels, vec![tally]);
    }

    #[test]
    fn test_reset_zeroes_counters() {
        let mut sink = MemorySink::new();
        let mut agg = ChannelAggregator::new(1, OutputStreams::none());
        agg.reset(0);
        agg.record_photon(128.0, 0.0, true, &mut sink).unwrap();
        agg.reset(1);

        assert_eq!(agg.tally().channel, 1);
        assert_eq!(agg.tally().count_all, 0);
        assert_eq!(agg.tally().count_detected, 0);
    }

    #[test]
    fn test_disabled_streams_emit_nothing() {
        let mut sink = MemorySink::new();
        let mut agg = ChannelAggregator::new(1, OutputStreams::none());
        agg.reset(3);
        agg.record_photon(128.0, 0.0, true, &mut sink).unwrap();
        let tally = agg.finalize(&mut sink).unwrap();

        assert_eq!(tally.count_detected, 1);
        assert!(sink.all_photons.is_empty());
        assert!(sink.detected_photons.is_empty());
        assert!(sink.channels.is_empty());
    }

    #[test]
    fn test_detected_stream_alone() {
        let mut sink = MemorySink::new();
        let streams = OutputStreams {
            detected_photons: true,
            ..OutputStreams::none()
        };
        let mut agg = ChannelAggregator::new(1, streams);
        agg.reset(3);
        agg.record_photon(128.0, 0.0, false, &mut sink).unwrap();
        agg.record_photon(128.0, 2.0, true, &mut sink).unwrap();

        assert!(sink.all_photons.is_empty());
        assert_eq!(sink.detected_photons.len(), 1);
        assert_eq!(sink.detected_photons[0].time, 2.0);
    }
}
