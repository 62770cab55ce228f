//! Dense visibility library used by light-transport lookups.
//!
//! Rows are voxels, columns are channels. Pairs never recorded during the
//! build read as zero visibility.

use std::path::Path;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sink::LibraryEntry;

use super::voxel::VoxelId;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Library entry ({voxel}, {channel}) outside a {n_voxels}x{n_channels} table")]
    OutOfRange {
        voxel: VoxelId,
        channel: u32,
        n_voxels: u32,
        n_channels: u32,
    },

    #[error("Library entry ({voxel}, {channel}) efficiency {efficiency} outside [0, 1]")]
    InvalidEfficiency {
        voxel: VoxelId,
        channel: u32,
        efficiency: f64,
    },

    #[error("Failed to access library file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse library file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// On-disk form: table shape plus the non-zero entries.
#[derive(Debug, Serialize, Deserialize)]
struct LibraryFile {
    n_voxels: u32,
    n_channels: u32,
    entries: Vec<LibraryEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityLibrary {
    table: Array2<f32>,
}

impl VisibilityLibrary {
    /// Build a table of the given shape from library entries.
    pub fn from_entries(
        n_voxels: u32,
        n_channels: u32,
        entries: &[LibraryEntry],
    ) -> Result<Self, LibraryError> {
        let mut table = Array2::<f32>::zeros((n_voxels as usize, n_channels as usize));
        for entry in entries {
            if entry.voxel >= n_voxels || entry.channel >= n_channels {
                return Err(LibraryError::OutOfRange {
                    voxel: entry.voxel,
                    channel: entry.channel,
                    n_voxels,
                    n_channels,
                });
            }
            if !(0.0..=1.0).contains(&entry.efficiency) {
                return Err(LibraryError::InvalidEfficiency {
                    voxel: entry.voxel,
                    channel: entry.channel,
                    efficiency: entry.efficiency,
                });
            }
            table[[entry.voxel as usize, entry.channel as usize]] = entry.efficiency as f32;
        }
        Ok(Self { table })
    }

    pub fn n_voxels(&self) -> u32 {
        self.table.nrows() as u32
    }

    pub fn n_channels(&self) -> u32 {
        self.table.ncols() as u32
    }

    /// Fraction of photons produced in `voxel` that reach `channel`.
    pub fn visibility(&self, voxel: VoxelId, channel: u32) -> Option<f32> {
        self.table
            .get([voxel as usize, channel as usize])
            .copied()
    }

    /// Visibilities of every channel for one voxel.
    pub fn voxel_visibilities(&self, voxel: VoxelId) -> Option<ArrayView1<'_, f32>> {
        if voxel >= self.n_voxels() {
            return None;
        }
        Some(self.table.row(voxel as usize))
    }

    /// Non-zero entries, ordered by voxel then channel.
    pub fn entries(&self) -> Vec<LibraryEntry> {
        self.table
            .indexed_iter()
            .filter(|(_, v)| **v > 0.0)
            .map(|((voxel, channel), &v)| LibraryEntry {
                voxel: voxel as VoxelId,
                channel: channel as u32,
                efficiency: v as f64,
            })
            .collect()
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), LibraryError> {
        let file = LibraryFile {
            n_voxels: self.n_voxels(),
            n_channels: self.n_channels(),
            entries: self.entries(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, LibraryError> {
        let json = std::fs::read_to_string(path)?;
        let file: LibraryFile = serde_json::from_str(&json)?;
        Self::from_entries(file.n_voxels, file.n_channels, &file.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn entry(voxel: u32, channel: u32, efficiency: f64) -> LibraryEntry {
        LibraryEntry {
            voxel,
            channel,
            efficiency,
        }
    }

    #[test]
    fn test_lookup() {
        let lib = VisibilityLibrary::from_entries(3, 2, &[entry(1, 1, 0.5), entry(2, 0, 0.125)])
            .unwrap();
        assert_eq!(lib.visibility(1, 1), Some(0.5));
        assert_eq!(lib.visibility(0, 0), Some(0.0));
        assert_eq!(lib.visibility(3, 0), None);
        assert_eq!(lib.visibility(0, 2), None);

        let row = lib.voxel_visibilities(2).unwrap();
        assert_eq!(row.to_vec(), vec![0.125, 0.0]);
        assert!(lib.voxel_visibilities(3).is_none());
    }

    #[test]
    fn test_rejects_bad_entries() {
        assert!(matches!(
            VisibilityLibrary::from_entries(1, 1, &[entry(1, 0, 0.1)]),
            Err(LibraryError::OutOfRange { .. })
        ));
        assert!(matches!(
            VisibilityLibrary::from_entries(1, 1, &[entry(0, 0, 1.5)]),
            Err(LibraryError::InvalidEfficiency { .. })
        ));
    }

    #[test]
    fn test_entries_skip_zeros() {
        let lib = VisibilityLibrary::from_entries(2, 2, &[entry(1, 0, 0.75), entry(0, 1, 0.0)])
            .unwrap();
        let entries = lib.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!((entries[0].voxel, entries[0].channel), (1, 0));
        assert_relative_eq!(entries[0].efficiency, 0.75);
    }
}
