//! # disksim - Block Storage Simulator
//!
//! `disksim-rs` simulates a small fixed-size block device for teaching and
//! demos. Clients allocate and free "files" made of blocks and watch what
//! happens to the device:
//!
//! - **Placement strategies**: contiguous, fragmented, first/best/worst-fit
//! - **Fragmentation accounting** per file
//! - **Logical delete** with single-level undo
//! - **Maintenance**: defragmentation, bad-block injection and repair
//! - **Snapshots**: the device is persisted after every mutation
//!
//! ## Quick Start
//!
//! ```rust
//! use disksim_rs::{DiskService, PlacementStrategy, Result};
//!
//! # fn main() -> Result<()> {
//! let mut disk = DiskService::in_memory(10);
//!
//! let a = disk.allocate_contiguous(5)?;
//! let b = disk.allocate_custom(3, PlacementStrategy::BestFit)?;
//!
//! disk.delete(a)?;
//! disk.undelete_last()?;
//!
//! assert_eq!(disk.stats().used, 8);
//! assert!(disk.exists(b));
//! # Ok(())
//! # }
//! ```
//!
//! ## Persistent devices
//!
//! ```rust,no_run
//! use disksim_rs::{DiskBuilder, Result};
//!
//! # fn main() -> Result<()> {
//! let mut disk = DiskBuilder::new()
//!     .capacity(128)
//!     .snapshot_path("disk_state.json")
//!     .seed(42)
//!     .build()?;
//!
//! disk.allocate_fragmented(12)?;
//! disk.mark_bad(4)?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod core;

pub use crate::core::{
    allocator::{BlockPlacer, Hole, PlacementStrategy},
    audit::{DEFAULT_LOG_CAPACITY, LOG_MESSAGE_LEN},
    block::{Block, BlockState, MAX_BLOCKS},
    config::DiskConfig,
    diagnostics::{BlockView, DiskStats, FileEntry},
    disk::{Disk, FaultRng},
    error::{DiskError, Result},
    host::{HostDiskInfo, HostDiskProbe, StatvfsProbe},
    registry::{FileId, FileStatus},
    snapshot::{DiskSnapshot, SnapshotStore, DEFAULT_SNAPSHOT_PATH},
    undo::{DeletedSnapshot, Restoration},
};

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Simulated device with snapshot persistence
///
/// This is a wrapper around [`Disk`] that:
/// - Persists a snapshot after every mutating operation
/// - Never lets a failed persist undo or fail the operation itself
/// - Starts from a fresh device when the snapshot is missing or unreadable
///
/// # Examples
///
/// ```rust
/// use disksim_rs::DiskService;
///
/// let mut disk = DiskService::in_memory(4);
/// let id = disk.allocate_contiguous(3).unwrap();
/// assert!(disk.allocate_contiguous(3).is_err());
/// assert_eq!(disk.files()[0].id, id);
/// ```
pub struct DiskService {
    disk: Disk,
    store: Option<SnapshotStore>,
    last_persist_error: Option<String>,
}

impl DiskService {
    /// Create a device that is never persisted
    pub fn in_memory(capacity: usize) -> Self {
        DiskService {
            disk: Disk::new(capacity),
            store: None,
            last_persist_error: None,
        }
    }

    /// Open the device persisted at `path`
    ///
    /// Falls back to a fresh device of `capacity` blocks when the snapshot
    /// is absent or malformed.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Self {
        let rng = Box::new(StdRng::from_entropy());
        Self::open_with(path, capacity, DEFAULT_LOG_CAPACITY, rng)
    }

    /// Open with an explicit log capacity and random source
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        capacity: usize,
        log_capacity: usize,
        rng: FaultRng,
    ) -> Self {
        let store = SnapshotStore::new(path);
        info!("Opening simulated disk at {:?}", store.path());

        let mut disk = match store.load() {
            Ok(snapshot) => {
                let mut disk = snapshot.restore(capacity, log_capacity, rng);
                disk.record(format!("load: loaded from '{}'", store.path().display()));
                disk
            }
            Err(e) => {
                if store.exists() {
                    warn!("Ignoring unreadable snapshot: {}", e);
                } else {
                    debug!("No snapshot found, starting fresh");
                }
                Disk::with_rng(capacity, log_capacity, rng)
            }
        };
        disk.record(format!(
            "init: blocks={} persist='{}'",
            disk.capacity(),
            store.path().display()
        ));

        let mut service = DiskService {
            disk,
            store: Some(store),
            last_persist_error: None,
        };
        service.persist_quietly();
        service
    }

    /// Build a device from a validated configuration
    pub fn from_config(config: &DiskConfig) -> Result<Self> {
        DiskBuilder::from_config(config).build()
    }

    /// Read-only access to the underlying device
    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.store.as_ref().map(|s| s.path())
    }

    /// Error from the most recent failed persist, cleared on success
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    /// Write a snapshot now, reporting failure to the caller
    pub fn persist(&mut self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        match store.save(&self.disk) {
            Ok(()) => {
                self.last_persist_error = None;
                Ok(())
            }
            Err(e) => {
                self.last_persist_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Persist after a mutation; failures are logged, never propagated
    fn persist_quietly(&mut self) {
        if let Err(e) = self.persist() {
            warn!("Snapshot persist failed: {}", e);
        }
    }

    /// Allocate `size` consecutive blocks (first run long enough)
    pub fn allocate_contiguous(&mut self, size: usize) -> Result<FileId> {
        debug!("allocate_contiguous size={}", size);
        let id = self.disk.allocate_contiguous(size)?;
        self.persist_quietly();
        Ok(id)
    }

    /// Allocate the first `size` free blocks wherever they are
    pub fn allocate_fragmented(&mut self, size: usize) -> Result<FileId> {
        debug!("allocate_fragmented size={}", size);
        let id = self.disk.allocate_fragmented(size)?;
        self.persist_quietly();
        Ok(id)
    }

    /// Allocate `size` blocks from the hole `strategy` selects
    pub fn allocate_custom(&mut self, size: usize, strategy: PlacementStrategy) -> Result<FileId> {
        debug!("allocate_custom size={} strategy={}", size, strategy);
        let id = self.disk.allocate_custom(size, strategy)?;
        self.persist_quietly();
        Ok(id)
    }

    /// Logically delete an active file, returning how many blocks were freed
    pub fn delete(&mut self, id: FileId) -> Result<usize> {
        debug!("delete id={}", id);
        let freed = self.disk.logical_delete(id)?;
        self.persist_quietly();
        Ok(freed)
    }

    /// Restore the most recently deleted file
    pub fn undelete_last(&mut self) -> Result<Restoration> {
        debug!("undelete_last");
        let restored = self.disk.undelete_last()?;
        self.persist_quietly();
        Ok(restored)
    }

    /// Compact used blocks toward the front; returns blocks moved
    pub fn defragment(&mut self) -> usize {
        debug!("defragment");
        let moved = self.disk.defragment();
        self.persist_quietly();
        moved
    }

    /// Mark up to `count` random free blocks bad
    pub fn mark_bad(&mut self, count: usize) -> Result<usize> {
        debug!("mark_bad count={}", count);
        let result = self.disk.mark_random_bad(count);
        // Any attempt that got past validation was logged
        if !matches!(result, Err(DiskError::InvalidArgument(_))) {
            self.persist_quietly();
        }
        result
    }

    /// Probabilistically repair bad blocks; returns blocks repaired
    pub fn repair(&mut self) -> usize {
        debug!("repair");
        let repaired = self.disk.repair();
        self.persist_quietly();
        repaired
    }

    /// Reinitialize the device
    pub fn reset(&mut self) {
        info!("Resetting simulated disk ({} blocks)", self.disk.capacity());
        self.disk.reset();
        self.persist_quietly();
    }

    pub fn exists(&self, id: FileId) -> bool {
        self.disk.exists(id)
    }

    pub fn blocks(&self) -> Vec<BlockView> {
        self.disk.blocks()
    }

    pub fn files(&self) -> Vec<FileEntry> {
        self.disk.files()
    }

    pub fn stats(&self) -> DiskStats {
        self.disk.stats()
    }

    pub fn logs(&self) -> Vec<String> {
        self.disk.logs()
    }

    pub fn holes(&self) -> Vec<Hole> {
        self.disk.holes()
    }

    pub fn fragmentation_percent(&self) -> f64 {
        self.disk.fragmentation_percent()
    }
}

/// Builder for [`DiskService`]
///
/// # Examples
///
/// ```rust
/// use disksim_rs::DiskBuilder;
///
/// let disk = DiskBuilder::new().capacity(64).seed(7).build().unwrap();
/// assert_eq!(disk.stats().total, 64);
/// ```
pub struct DiskBuilder {
    config: DiskConfig,
}

impl DiskBuilder {
    pub fn new() -> Self {
        DiskBuilder {
            config: DiskConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: &DiskConfig) -> Self {
        DiskBuilder {
            config: config.clone(),
        }
    }

    /// Number of blocks (1..=512)
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Number of retained log entries
    pub fn log_capacity(mut self, log_capacity: usize) -> Self {
        self.config.log_capacity = log_capacity;
        self
    }

    /// Persist snapshots at `path`
    pub fn snapshot_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.snapshot_path = Some(path.into());
        self
    }

    /// Make fault injection reproducible
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Validate the settings and build the service
    pub fn build(self) -> Result<DiskService> {
        let config = self.config.validated()?;

        let rng: FaultRng = match config.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        };

        info!(
            "Building simulated disk: {} blocks, log capacity {}",
            config.capacity, config.log_capacity
        );

        Ok(match &config.snapshot_path {
            Some(path) => {
                DiskService::open_with(path, config.capacity, config.log_capacity, rng)
            }
            None => DiskService {
                disk: Disk::with_rng(config.capacity, config.log_capacity, rng),
                store: None,
                last_persist_error: None,
            },
        })
    }
}

impl Default for DiskBuilder {
    fn default() -> Self {
        Self::new()
    }
}
