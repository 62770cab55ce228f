//! Run-wide accumulation of the visibility library.
//!
//! During a library build every event is a single isotropic point source in
//! one voxel. For each channel the raw number of photons reaching it (before
//! quantum efficiency) is divided by the photons produced in the voxel. The
//! ratio is a pure transport probability, so one library serves any QE.
//!
//! The accumulator keeps raw sums and only divides when entries are read:
//! hits per (voxel, channel) pair, and photons produced per voxel, added once
//! per event. A channel missing from an event's input still has that event's
//! production in its denominator. Two accumulators built from disjoint events
//! merge by summing both, never by averaging ratios.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::errors::DetectionError;
use crate::sink::{LibraryEntry, RecordSink};

use super::table::{LibraryError, VisibilityLibrary};
use super::voxel::VoxelId;

/// Owned by the run; passed by reference to the engine.
#[derive(Debug, Clone, Default)]
pub struct VisibilityAccumulator {
    hits: BTreeMap<(VoxelId, u32), u64>,
    produced: BTreeMap<VoxelId, f64>,
    finalized: bool,
    warned_after_finalize: bool,
}

impl VisibilityAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the photons produced in a voxel by one event.
    ///
    /// Called once per event, before its channel hits.
    ///
    /// # Returns
    /// `false` without storing anything when `photons_produced` is not a
    /// positive finite number, or after [`finalize`](Self::finalize).
    pub fn record_production(&mut self, voxel: VoxelId, photons_produced: f64) -> bool {
        if !self.accepting() {
            return false;
        }
        if !(photons_produced > 0.0 && photons_produced.is_finite()) {
            debug!(
                "Skipping library event in voxel {voxel}: {photons_produced} photons produced"
            );
            return false;
        }
        *self.produced.entry(voxel).or_default() += photons_produced;
        true
    }

    /// Record the raw hit count of one channel for one voxel event.
    ///
    /// # Arguments
    /// * `voxel` - Voxel the photons were produced in
    /// * `channel` - Channel that received them
    /// * `count_all` - Photons reaching the channel, before QE
    ///
    /// # Returns
    /// `false` without storing anything after [`finalize`](Self::finalize).
    pub fn record(&mut self, voxel: VoxelId, channel: u32, count_all: u64) -> bool {
        if !self.accepting() {
            return false;
        }
        *self.hits.entry((voxel, channel)).or_default() += count_all;
        true
    }

    fn accepting(&mut self) -> bool {
        if self.finalized {
            if !self.warned_after_finalize {
                warn!("Visibility library already finalized, ignoring further records");
                self.warned_after_finalize = true;
            }
            return false;
        }
        true
    }

    /// Fold another accumulator's raw counts into this one.
    pub fn merge(&mut self, other: &VisibilityAccumulator) {
        for (key, hits) in &other.hits {
            *self.hits.entry(*key).or_default() += hits;
        }
        for (voxel, produced) in &other.produced {
            *self.produced.entry(*voxel).or_default() += produced;
        }
    }

    /// Number of (voxel, channel) pairs with an efficiency.
    pub fn len(&self) -> usize {
        self.hits
            .keys()
            .filter(|(voxel, _)| self.produced.contains_key(voxel))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Total photons produced in a voxel over all recorded events.
    pub fn photons_produced(&self, voxel: VoxelId) -> Option<f64> {
        self.produced.get(&voxel).copied()
    }

    fn ratio(&self, voxel: VoxelId, hits: u64) -> Option<f64> {
        let produced = self.produced.get(&voxel)?;
        Some((hits as f64 / produced).clamp(0.0, 1.0))
    }

    /// Efficiency of one pair, clamped to [0, 1].
    pub fn efficiency(&self, voxel: VoxelId, channel: u32) -> Option<f64> {
        let hits = self.hits.get(&(voxel, channel))?;
        self.ratio(voxel, *hits)
    }

    /// All entries, ordered by voxel then channel.
    pub fn entries(&self) -> Vec<LibraryEntry> {
        self.hits
            .iter()
            .filter_map(|(&(voxel, channel), &hits)| {
                self.ratio(voxel, hits).map(|efficiency| LibraryEntry {
                    voxel,
                    channel,
                    efficiency,
                })
            })
            .collect()
    }

    /// Write every entry to the sink. Allowed once per run.
    ///
    /// # Arguments
    /// * `sink` - Receiver of the entries
    /// * `write_entries` - Whether the library stream is enabled
    ///
    /// # Returns
    /// Number of entries in the library
    pub fn finalize<S: RecordSink + ?Sized>(
        &mut self,
        sink: &mut S,
        write_entries: bool,
    ) -> Result<usize, DetectionError> {
        if self.finalized {
            return Err(DetectionError::LibraryAlreadyFinalized);
        }
        self.finalized = true;

        let entries = self.entries();
        if write_entries {
            for entry in &entries {
                sink.write_library_entry(entry)?;
            }
            sink.flush()?;
        }
        Ok(entries.len())
    }

    /// Dense table for downstream lookups.
    pub fn to_library(
        &self,
        n_voxels: u32,
        n_channels: u32,
    ) -> Result<VisibilityLibrary, LibraryError> {
        VisibilityLibrary::from_entries(n_voxels, n_channels, &self.entries())
    }
}
