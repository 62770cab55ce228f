//! Voxelization of the detector volume and library-build light sources.
//!
//! A visibility library is indexed by voxel: the detector volume is an
//! axis-aligned box split into `nx × ny × nz` cells, numbered x-fastest.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index of one voxel of a [`VoxelGrid`].
pub type VoxelId = u32;

#[derive(Debug, Error)]
pub enum VoxelError {
    #[error("Voxel grid needs at least one step along every axis, got {0:?}")]
    EmptyGrid([u32; 3]),

    #[error("Voxel grid bounds are inverted or not finite on axis {axis}: {lower}..{upper}")]
    InvalidBounds { axis: usize, lower: f64, upper: f64 },

    #[error("Voxel grid {0:?} has more voxels than fit in a voxel id")]
    TooManyVoxels([u32; 3]),
}

/// Regular grid over an axis-aligned box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxelGrid {
    lower: [f64; 3],
    upper: [f64; 3],
    steps: [u32; 3],
}

impl VoxelGrid {
    /// Create a grid.
    ///
    /// # Arguments
    /// * `lower` - Minimum corner (x, y, z)
    /// * `upper` - Maximum corner (x, y, z)
    /// * `steps` - Number of voxels along each axis
    pub fn new(lower: [f64; 3], upper: [f64; 3], steps: [u32; 3]) -> Result<Self, VoxelError> {
        if steps.iter().any(|&n| n == 0) {
            return Err(VoxelError::EmptyGrid(steps));
        }
        let n_voxels = steps
            .iter()
            .try_fold(1u32, |total, &n| total.checked_mul(n));
        if n_voxels.is_none() {
            return Err(VoxelError::TooManyVoxels(steps));
        }
        for axis in 0..3 {
            let (lo, hi) = (lower[axis], upper[axis]);
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                return Err(VoxelError::InvalidBounds {
                    axis,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(Self {
            lower,
            upper,
            steps,
        })
    }

    pub fn steps(&self) -> [u32; 3] {
        self.steps
    }

    /// Total voxel count. Fits in a [`VoxelId`], checked by [`Self::new`].
    pub fn n_voxels(&self) -> u32 {
        self.steps.iter().product()
    }

    fn voxel_size(&self, axis: usize) -> f64 {
        (self.upper[axis] - self.lower[axis]) / self.steps[axis] as f64
    }

    /// Voxel id of grid indices, `None` outside the grid.
    pub fn voxel_id(&self, indices: [u32; 3]) -> Option<VoxelId> {
        if (0..3).any(|axis| indices[axis] >= self.steps[axis]) {
            return None;
        }
        let [nx, ny, _] = self.steps;
        Some(indices[0] + nx * (indices[1] + ny * indices[2]))
    }

    /// Grid indices of a voxel id, `None` outside the grid.
    pub fn indices(&self, voxel: VoxelId) -> Option<[u32; 3]> {
        if voxel >= self.n_voxels() {
            return None;
        }
        let [nx, ny, _] = self.steps;
        Some([voxel % nx, (voxel / nx) % ny, voxel / (nx * ny)])
    }

    /// Center point of a voxel.
    pub fn center(&self, voxel: VoxelId) -> Option<[f64; 3]> {
        let indices = self.indices(voxel)?;
        let mut center = [0.0; 3];
        for axis in 0..3 {
            center[axis] =
                self.lower[axis] + (indices[axis] as f64 + 0.5) * self.voxel_size(axis);
        }
        Some(center)
    }

    /// Voxel containing a point. The upper faces belong to the last voxel.
    pub fn voxel_at(&self, point: [f64; 3]) -> Option<VoxelId> {
        let mut indices = [0u32; 3];
        for axis in 0..3 {
            let p = point[axis];
            if !(self.lower[axis]..=self.upper[axis]).contains(&p) {
                return None;
            }
            let i = ((p - self.lower[axis]) / self.voxel_size(axis)).floor() as u32;
            indices[axis] = i.min(self.steps[axis] - 1);
        }
        self.voxel_id(indices)
    }
}

/// Reports where a library-build event emitted its light.
pub trait LightSourceProvider {
    /// Voxel of the event's source and the number of photons it produced,
    /// `None` if the event had no source.
    fn light_production(&mut self, event_id: u32) -> Option<(VoxelId, f64)>;
}

/// Isotropic point source scanning the voxels of a grid, one voxel per event.
///
/// Event `first_event` lights voxel 0, the next event voxel 1, and so on,
/// wrapping around after the last voxel.
#[derive(Debug, Clone)]
pub struct SteppedLightSource {
    n_voxels: u32,
    photons_per_voxel: f64,
    first_event: u32,
}

impl SteppedLightSource {
    pub fn new(grid: &VoxelGrid, photons_per_voxel: f64, first_event: u32) -> Self {
        Self {
            n_voxels: grid.n_voxels(),
            photons_per_voxel,
            first_event,
        }
    }

    /// Voxel lit during `event_id`, `None` before the scan starts.
    pub fn voxel_for_event(&self, event_id: u32) -> Option<VoxelId> {
        let offset = event_id.checked_sub(self.first_event)?;
        Some(offset % self.n_voxels)
    }

    pub fn photons_per_voxel(&self) -> f64 {
        self.photons_per_voxel
    }
}

impl LightSourceProvider for SteppedLightSource {
    fn light_production(&mut self, event_id: u32) -> Option<(VoxelId, f64)> {
        self.voxel_for_event(event_id)
            .map(|voxel| (voxel, self.photons_per_voxel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> VoxelGrid {
        VoxelGrid::new([0.0, -10.0, 0.0], [4.0, 10.0, 30.0], [4, 2, 3]).unwrap()
    }

    #[test]
    fn test_id_index_round_trip() {
        let grid = grid();
        assert_eq!(grid.n_voxels(), 24);
        for voxel in 0..grid.n_voxels() {
            let indices = grid.indices(voxel).unwrap();
            assert_eq!(grid.voxel_id(indices), Some(voxel));
        }
        assert_eq!(grid.indices(24), None);
        assert_eq!(grid.voxel_id([4, 0, 0]), None);
    }

    #[test]
    fn test_center_and_lookup() {
        let grid = grid();
        let voxel = grid.voxel_id([1, 1, 2]).unwrap();
        let center = grid.center(voxel).unwrap();
        assert_relative_eq!(center[0], 1.5);
        assert_relative_eq!(center[1], 5.0);
        assert_relative_eq!(center[2], 25.0);
        assert_eq!(grid.voxel_at(center), Some(voxel));
        assert_eq!(grid.voxel_at([4.0, 10.0, 30.0]), Some(grid.n_voxels() - 1));
        assert_eq!(grid.voxel_at([-0.1, 0.0, 0.0]), None);
    }

    #[test]
    fn test_invalid_grids() {
        assert!(VoxelGrid::new([0.0; 3], [1.0; 3], [1, 0, 1]).is_err());
        assert!(VoxelGrid::new([0.0; 3], [1.0, 0.0, 1.0], [1, 1, 1]).is_err());
        assert!(VoxelGrid::new([0.0; 3], [f64::INFINITY, 1.0, 1.0], [1, 1, 1]).is_err());
    }

    #[test]
    fn test_voxel_count_overflow_rejected() {
        assert!(matches!(
            VoxelGrid::new([0.0; 3], [1.0; 3], [2000, 2000, 2000]),
            Err(VoxelError::TooManyVoxels(_))
        ));

        // Largest grid that still fits
        let grid = VoxelGrid::new([0.0; 3], [1.0; 3], [65_535, 65_537, 1]).unwrap();
        assert_eq!(grid.n_voxels(), u32::MAX);
        let last = grid.n_voxels() - 1;
        assert_eq!(grid.voxel_id(grid.indices(last).unwrap()), Some(last));
    }

    #[test]
    fn test_stepped_source() {
        let grid = grid();
        let mut source = SteppedLightSource::new(&grid, 1.0e5, 10);
        assert_eq!(source.light_production(9), None);
        assert_eq!(source.light_production(10), Some((0, 1.0e5)));
        assert_eq!(source.light_production(13), Some((3, 1.0e5)));
        // 24 voxels, so event 10 + 25 wraps to voxel 1
        assert_eq!(source.voxel_for_event(35), Some(1));
    }
}
