//! Block allocation engine
//!
//! The engine is one explicit `Disk` value; there is no process-wide state.
//! Callers that share a device across threads must wrap the whole `Disk`
//! (or the `DiskService` around it) in a single lock.

pub mod allocator;
pub mod audit;
pub mod block;
pub mod config;
pub mod diagnostics;
pub mod disk;
pub mod error;
pub mod host;
mod maintenance;
pub mod registry;
pub mod snapshot;
pub mod undo;

pub use allocator::{BlockPlacer, Hole, PlacementStrategy};
pub use block::{Block, BlockState, BlockTable, MAX_BLOCKS};
pub use config::DiskConfig;
pub use diagnostics::{BlockView, DiskStats, FileEntry};
pub use disk::{Disk, FaultRng};
pub use error::{DiskError, Result};
pub use registry::{FileId, FileRegistry, FileStatus};
pub use snapshot::{DiskSnapshot, SnapshotStore};
pub use undo::{DeletedSnapshot, Restoration};
