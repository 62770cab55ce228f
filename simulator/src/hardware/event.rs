//! Event-level photon totals.

use crate::sink::{ChannelTally, EventTally, OutputStreams, RecordSink};

/// Sums channel tallies into the event tally.
#[derive(Debug, Clone)]
pub struct EventAggregator {
    per_event: bool,
    tally: EventTally,
    channels_seen: usize,
}

impl EventAggregator {
    pub fn new(event_id: u32, streams: &OutputStreams) -> Self {
        Self {
            per_event: streams.per_event,
            tally: EventTally {
                event_id,
                count_all: 0,
                count_detected: 0,
            },
            channels_seen: 0,
        }
    }

    pub fn add(&mut self, channel: &ChannelTally) {
        self.tally.count_all += channel.count_all;
        self.tally.count_detected += channel.count_detected;
        self.channels_seen += 1;
    }

    pub fn channels_seen(&self) -> usize {
        self.channels_seen
    }

    /// Emit the event tally and return it.
    ///
    /// Events without any channel still emit an all-zero record so the
    /// per-event stream stays dense over the event sequence.
    pub fn finalize<S: RecordSink + ?Sized>(self, sink: &mut S) -> std::io::Result<EventTally> {
        if self.per_event {
            sink.write_event(&self.tally)?;
        }
        Ok(self.tally)
    }
}
