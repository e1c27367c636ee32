//! The simulated device
//!
//! `Disk` owns every piece of device state: the block table, the file
//! registry, the single-slot undo buffer, the operation log and the random
//! source used for fault injection. Operations are split by concern across
//! `disk`, `undo`, `maintenance` and `diagnostics`.

use crate::core::allocator::{
    BlockPlacer, ContiguousPlacer, FragmentedPlacer, HolePlacer, PlacementStrategy,
};
use crate::core::audit::{OperationLog, DEFAULT_LOG_CAPACITY};
use crate::core::block::{BlockTable, MAX_BLOCKS};
use crate::core::error::{DiskError, Result};
use crate::core::registry::{FileId, FileRegistry};
use crate::core::undo::DeletedSnapshot;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::fmt;
use tracing::debug;

/// Random source for fault injection and repair
pub type FaultRng = Box<dyn RngCore + Send>;

/// In-memory block device
pub struct Disk {
    pub(crate) table: BlockTable,
    pub(crate) registry: FileRegistry,
    pub(crate) last_deleted: Option<DeletedSnapshot>,
    pub(crate) log: OperationLog,
    pub(crate) rng: FaultRng,
}

impl Disk {
    /// Create a fresh device with `capacity` free blocks
    ///
    /// Capacity is clamped to `1..=MAX_BLOCKS`. Fault injection draws from
    /// an entropy-seeded generator.
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, DEFAULT_LOG_CAPACITY, Box::new(StdRng::from_entropy()))
    }

    /// Create a device whose fault injection is reproducible
    pub fn seeded(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, DEFAULT_LOG_CAPACITY, Box::new(StdRng::seed_from_u64(seed)))
    }

    /// Create a device with an explicit log capacity and random source
    pub fn with_rng(capacity: usize, log_capacity: usize, rng: FaultRng) -> Self {
        Disk {
            table: BlockTable::new(capacity),
            registry: FileRegistry::new(),
            last_deleted: None,
            log: OperationLog::new(log_capacity.max(1)),
            rng,
        }
    }

    /// Swap the random source (tests pin outcomes with a seeded generator)
    pub fn set_rng(&mut self, rng: FaultRng) {
        self.rng = rng;
    }

    /// Reinitialize the device
    ///
    /// All blocks become free, the registry and id counter start over, the
    /// log is cleared and the undo buffer is invalidated.
    pub fn reset(&mut self) {
        self.table.reset();
        self.registry.clear();
        self.last_deleted = None;
        self.log.clear();
        self.log.record(format!(
            "reset: disk reinitialized (blocks={})",
            self.table.capacity()
        ));
        debug!("Device reset to {} free blocks", self.table.capacity());
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn total_free(&self) -> usize {
        self.table.total_free()
    }

    pub fn total_used(&self) -> usize {
        self.table.total_used()
    }

    pub fn total_bad(&self) -> usize {
        self.table.total_bad()
    }

    /// Whether `id` is currently active
    pub fn exists(&self, id: FileId) -> bool {
        self.registry.is_active(id)
    }

    pub fn table(&self) -> &BlockTable {
        &self.table
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    /// Append a free-form entry to the operation log
    pub fn record(&mut self, message: impl Into<String>) {
        self.log.record(message);
    }

    /// Allocate `size` consecutive blocks from the first run long enough
    pub fn allocate_contiguous(&mut self, size: usize) -> Result<FileId> {
        let (id, blocks) = self.allocate_with(&ContiguousPlacer, size)?;
        self.log.record(format!(
            "allocate_contiguous: id={} size={} start={}",
            id, size, blocks[0]
        ));
        Ok(id)
    }

    /// Allocate the first `size` free blocks, contiguous or not
    pub fn allocate_fragmented(&mut self, size: usize) -> Result<FileId> {
        let (id, _) = self.allocate_with(&FragmentedPlacer, size)?;
        self.log
            .record(format!("allocate_fragmented: id={} size={}", id, size));
        Ok(id)
    }

    /// Allocate `size` blocks from the hole chosen by `strategy`
    pub fn allocate_custom(&mut self, size: usize, strategy: PlacementStrategy) -> Result<FileId> {
        let (id, blocks) = self.allocate_with(&HolePlacer::new(strategy), size)?;
        self.log.record(format!(
            "allocate_custom: id={} size={} strategy={} start={}",
            id, size, strategy, blocks[0]
        ));
        Ok(id)
    }

    /// Run a placer and, on success, hand the chosen blocks to a new file
    ///
    /// Returns the new id and the claimed indices. Nothing is mutated when
    /// placement fails or no file id is left to mint.
    pub fn allocate_with(
        &mut self,
        placer: &dyn BlockPlacer,
        size: usize,
    ) -> Result<(FileId, Vec<usize>)> {
        if size == 0 {
            return Err(DiskError::InvalidArgument(
                "size must be positive".to_string(),
            ));
        }

        let blocks = placer.place(&self.table, size)?;
        debug_assert_eq!(blocks.len(), size);

        let id = self
            .registry
            .mint()
            .ok_or_else(|| DiskError::NoSpace("file id space exhausted".to_string()))?;
        for &index in &blocks {
            let claimed = self.table.claim(index, id);
            debug_assert!(claimed, "placer chose non-free block {}", index);
        }

        debug!(
            "Allocated file {} ({} blocks, {})",
            id,
            blocks.len(),
            placer.name()
        );
        Ok((id, blocks))
    }
}

impl Default for Disk {
    fn default() -> Self {
        Self::new(MAX_BLOCKS)
    }
}

impl fmt::Debug for Disk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disk")
            .field("capacity", &self.table.capacity())
            .field("used", &self.table.total_used())
            .field("free", &self.table.total_free())
            .field("bad", &self.table.total_bad())
            .field("next_file_id", &self.registry.next_id())
            .field("last_deleted", &self.last_deleted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::Block;

    #[test]
    fn test_contiguous_allocation_scenario() {
        let mut disk = Disk::seeded(10, 1);

        let id = disk.allocate_contiguous(5).unwrap();
        assert_eq!(id, FileId::new(1));
        for i in 0..5 {
            assert_eq!(disk.table().get(i), Some(Block::Used(id)));
        }
        assert_eq!(disk.total_free(), 5);
        assert!(disk.exists(id));
    }

    #[test]
    fn test_contiguous_no_space() {
        let mut disk = Disk::seeded(4, 1);
        assert_eq!(disk.allocate_contiguous(3).unwrap(), FileId::new(1));

        let err = disk.allocate_contiguous(3).unwrap_err();
        assert!(matches!(err, DiskError::NoSpace(_)));
        // Failed placement mints nothing
        assert_eq!(disk.registry().next_id(), 2);
        assert_eq!(disk.total_used(), 3);
    }

    #[test]
    fn test_contiguous_larger_than_device() {
        let mut disk = Disk::seeded(8, 1);
        assert!(matches!(
            disk.allocate_contiguous(9),
            Err(DiskError::NoSpace(_))
        ));
    }

    #[test]
    fn test_zero_size_rejected_everywhere() {
        let mut disk = Disk::seeded(8, 1);
        assert!(matches!(
            disk.allocate_contiguous(0),
            Err(DiskError::InvalidArgument(_))
        ));
        assert!(matches!(
            disk.allocate_fragmented(0),
            Err(DiskError::InvalidArgument(_))
        ));
        assert!(matches!(
            disk.allocate_custom(0, PlacementStrategy::BestFit),
            Err(DiskError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_fragmented_allocation_fills_gaps() {
        let mut disk = Disk::seeded(10, 1);
        let a = disk.allocate_contiguous(2).unwrap();
        let b = disk.allocate_contiguous(2).unwrap();
        for index in disk.table().owned_by(a) {
            disk.table.release(index);
        }

        let c = disk.allocate_fragmented(3).unwrap();
        assert_eq!(disk.table().owned_by(c), vec![0, 1, 4]);
        assert_eq!(disk.table().owned_by(b), vec![2, 3]);
    }

    #[test]
    fn test_fragmented_requires_enough_free_blocks() {
        let mut disk = Disk::seeded(5, 1);
        disk.allocate_fragmented(4).unwrap();
        assert!(matches!(
            disk.allocate_fragmented(2),
            Err(DiskError::NoSpace(_))
        ));
        assert_eq!(disk.total_free(), 1);
    }

    #[test]
    fn test_custom_allocation_logs_strategy() {
        let mut disk = Disk::seeded(10, 1);
        disk.allocate_custom(3, PlacementStrategy::WorstFit).unwrap();

        let last = disk.log().entries().pop().unwrap();
        assert_eq!(last, "allocate_custom: id=1 size=3 strategy=worst-fit start=0");
    }

    #[test]
    fn test_reset_reinitializes_everything() {
        let mut disk = Disk::seeded(10, 1);
        disk.allocate_contiguous(4).unwrap();
        disk.table.mark_bad(8);
        disk.reset();

        assert_eq!(disk.total_free(), 10);
        assert_eq!(disk.registry().next_id(), 1);
        assert_eq!(disk.registry().entries().count(), 0);
        assert!(disk.last_deleted.is_none());
        assert_eq!(disk.log().len(), 1);
        assert_eq!(disk.allocate_contiguous(1).unwrap(), FileId::new(1));
    }

    #[test]
    fn test_exhausted_id_space_is_no_space() {
        let mut disk = Disk::seeded(4, 1);
        disk.registry.set_next_id(crate::core::registry::MAX_FILE_ID);
        let last = disk.allocate_contiguous(1).unwrap();
        assert_eq!(last.get(), crate::core::registry::MAX_FILE_ID);

        assert!(matches!(
            disk.allocate_fragmented(1),
            Err(DiskError::NoSpace(_))
        ));
        assert_eq!(disk.total_used(), 1);
    }

    #[test]
    fn test_ids_never_reused_across_failures() {
        let mut disk = Disk::seeded(3, 1);
        let first = disk.allocate_contiguous(3).unwrap();
        assert!(disk.allocate_fragmented(1).is_err());
        disk.logical_delete(first).unwrap();
        assert_eq!(disk.allocate_fragmented(1).unwrap(), FileId::new(2));
    }
}
