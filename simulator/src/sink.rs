//! Output records and the sinks that receive them.
//!
//! The engine produces four kinds of records plus the visibility library
//! entries. Each kind has its own enable flag in [`OutputStreams`]; the engine
//! checks the flag before building a record, so a disabled stream costs
//! nothing beyond the branch.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Wavelength and arrival time of one photon at one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotonDetail {
    pub event_id: u32,
    pub channel: u32,
    pub wavelength_nm: f64,
    pub time: f64,
}

/// Photon counts of one channel in one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelTally {
    pub event_id: u32,
    pub channel: u32,
    pub count_all: u64,
    pub count_detected: u64,
}

/// Photon counts summed over all channels of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventTally {
    pub event_id: u32,
    pub count_all: u64,
    pub count_detected: u64,
}

/// Raw detection efficiency of one channel for photons emitted in one voxel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub voxel: u32,
    pub channel: u32,
    pub efficiency: f64,
}

/// Independent enable flags for every output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputStreams {
    /// Every photon reaching a channel
    pub all_photons: bool,
    /// Photons that passed the detection model
    pub detected_photons: bool,
    /// One tally per channel per event
    pub per_channel: bool,
    /// One tally per event
    pub per_event: bool,
    /// Visibility library entries, written once at the end of a library build
    pub library: bool,
}

impl Default for OutputStreams {
    fn default() -> Self {
        Self {
            all_photons: false,
            detected_photons: false,
            per_channel: true,
            per_event: true,
            library: true,
        }
    }
}

impl OutputStreams {
    pub fn all() -> Self {
        Self {
            all_photons: true,
            detected_photons: true,
            per_channel: true,
            per_event: true,
            library: true,
        }
    }

    pub fn none() -> Self {
        Self {
            all_photons: false,
            detected_photons: false,
            per_channel: false,
            per_event: false,
            library: false,
        }
    }

    /// True if any per-photon stream is enabled.
    pub fn wants_photon_details(&self) -> bool {
        self.all_photons || self.detected_photons
    }
}

/// Receiver of the engine's output records.
///
/// Writes are fire-and-forget from the engine's point of view: an error is
/// propagated to the caller and never retried.
pub trait RecordSink {
    fn write_photon(&mut self, detail: &PhotonDetail) -> std::io::Result<()>;

    fn write_detected_photon(&mut self, detail: &PhotonDetail) -> std::io::Result<()>;

    fn write_channel(&mut self, tally: &ChannelTally) -> std::io::Result<()>;

    fn write_event(&mut self, tally: &EventTally) -> std::io::Result<()>;

    fn write_library_entry(&mut self, entry: &LibraryEntry) -> std::io::Result<()>;

    /// Push buffered records to their destination.
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Sink that keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub all_photons: Vec<PhotonDetail>,
    pub detected_photons: Vec<PhotonDetail>,
    pub channels: Vec<ChannelTally>,
    pub events: Vec<EventTally>,
    pub library: Vec<LibraryEntry>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel tallies of one event, in emission order.
    pub fn channels_of(&self, event_id: u32) -> Vec<ChannelTally> {
        self.channels
            .iter()
            .filter(|t| t.event_id == event_id)
            .copied()
            .collect()
    }

    pub fn event(&self, event_id: u32) -> Option<&EventTally> {
        self.events.iter().find(|t| t.event_id == event_id)
    }
}

impl RecordSink for MemorySink {
    fn write_photon(&mut self, detail: &PhotonDetail) -> std::io::Result<()> {
        self.all_photons.push(*detail);
        Ok(())
    }

    fn write_detected_photon(&mut self, detail: &PhotonDetail) -> std::io::Result<()> {
        self.detected_photons.push(*detail);
        Ok(())
    }

    fn write_channel(&mut self, tally: &ChannelTally) -> std::io::Result<()> {
        self.channels.push(*tally);
        Ok(())
    }

    fn write_event(&mut self, tally: &EventTally) -> std::io::Result<()> {
        self.events.push(*tally);
        Ok(())
    }

    fn write_library_entry(&mut self, entry: &LibraryEntry) -> std::io::Result<()> {
        self.library.push(*entry);
        Ok(())
    }
}

pub const ALL_PHOTONS_CSV: &str = "all_photons.csv";
pub const DETECTED_PHOTONS_CSV: &str = "detected_photons.csv";
pub const CHANNELS_CSV: &str = "channels.csv";
pub const EVENTS_CSV: &str = "events.csv";
pub const LIBRARY_CSV: &str = "library.csv";

/// Sink writing one CSV file per enabled stream into a directory.
///
/// Files for disabled streams are never created. Records written to a
/// disabled stream are an engine bug and are ignored.
pub struct CsvSink {
    dir: PathBuf,
    all_photons: Option<BufWriter<File>>,
    detected_photons: Option<BufWriter<File>>,
    channels: Option<BufWriter<File>>,
    events: Option<BufWriter<File>>,
    library: Option<BufWriter<File>>,
}

fn open_csv(
    dir: &Path,
    enabled: bool,
    name: &str,
    header: &str,
) -> std::io::Result<Option<BufWriter<File>>> {
    if !enabled {
        return Ok(None);
    }
    let mut writer = BufWriter::new(File::create(dir.join(name))?);
    writeln!(writer, "{header}")?;
    Ok(Some(writer))
}

impl CsvSink {
    /// Create the output directory and the files of the enabled streams.
    pub fn create(dir: &Path, streams: &OutputStreams) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let photon_header = "event_id,channel,wavelength_nm,time";
        Ok(Self {
            dir: dir.to_path_buf(),
            all_photons: open_csv(dir, streams.all_photons, ALL_PHOTONS_CSV, photon_header)?,
            detected_photons: open_csv(
                dir,
                streams.detected_photons,
                DETECTED_PHOTONS_CSV,
                photon_header,
            )?,
            channels: open_csv(
                dir,
                streams.per_channel,
                CHANNELS_CSV,
                "event_id,channel,count_all,count_detected",
            )?,
            events: open_csv(
                dir,
                streams.per_event,
                EVENTS_CSV,
                "event_id,count_all,count_detected",
            )?,
            library: open_csv(dir, streams.library, LIBRARY_CSV, "voxel,channel,efficiency")?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn write_photon_row(writer: &mut Option<BufWriter<File>>, d: &PhotonDetail) -> std::io::Result<()> {
    if let Some(w) = writer {
        writeln!(w, "{},{},{},{}", d.event_id, d.channel, d.wavelength_nm, d.time)?;
    }
    Ok(())
}

impl RecordSink for CsvSink {
    fn write_photon(&mut self, detail: &PhotonDetail) -> std::io::Result<()> {
        write_photon_row(&mut self.all_photons, detail)
    }

    fn write_detected_photon(&mut self, detail: &PhotonDetail) -> std::io::Result<()> {
        write_photon_row(&mut self.detected_photons, detail)
    }

    fn write_channel(&mut self, t: &ChannelTally) -> std::io::Result<()> {
        if let Some(w) = &mut self.channels {
            writeln!(w, "{},{},{},{}", t.event_id, t.channel, t.count_all, t.count_detected)?;
        }
        Ok(())
    }

    fn write_event(&mut self, t: &EventTally) -> std::io::Result<()> {
        if let Some(w) = &mut self.events {
            writeln!(w, "{},{},{}", t.event_id, t.count_all, t.count_detected)?;
        }
        Ok(())
    }

    fn write_library_entry(&mut self, e: &LibraryEntry) -> std::io::Result<()> {
        if let Some(w) = &mut self.library {
            writeln!(w, "{},{},{}", e.voxel, e.channel, e.efficiency)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        for writer in [
            &mut self.all_photons,
            &mut self.detected_photons,
            &mut self.channels,
            &mut self.events,
            &mut self.library,
        ]
        .into_iter()
        .flatten()
        {
            writer.flush()?;
        }
        Ok(())
    }
}
