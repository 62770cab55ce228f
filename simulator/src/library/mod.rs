//! Visibility library: voxel grid, build-time accumulation and lookup table.

pub mod accumulator;
pub mod table;
pub mod voxel;

pub use accumulator::VisibilityAccumulator;
pub use table::{LibraryError, VisibilityLibrary};
pub use voxel::{LightSourceProvider, SteppedLightSource, VoxelError, VoxelGrid, VoxelId};
