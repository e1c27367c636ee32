//! Maintenance: compaction and fault simulation

use crate::core::block::Block;
use crate::core::disk::Disk;
use crate::core::error::{DiskError, Result};
use rand::Rng;
use tracing::debug;

impl Disk {
    /// Compact used blocks toward index 0
    ///
    /// Used blocks keep their owners and relative order. Bad blocks are
    /// fixed obstacles: they are never moved or overwritten, and used blocks
    /// flow around them into the lowest non-bad positions. Returns the
    /// number of blocks that moved.
    pub fn defragment(&mut self) -> usize {
        let capacity = self.table.capacity();
        let mut write_idx = 0;
        let mut moved = 0;

        for read_idx in 0..capacity {
            let owner = match self.table.get(read_idx) {
                Some(Block::Used(owner)) => owner,
                _ => continue,
            };

            // Everything in [write_idx, read_idx) is free or bad here
            while self.table.get(write_idx) == Some(Block::Bad) {
                write_idx += 1;
            }

            if write_idx != read_idx {
                self.table.set(write_idx, Block::Used(owner));
                self.table.set(read_idx, Block::Free);
                moved += 1;
            }
            write_idx += 1;
        }

        let used = self.table.total_used();
        self.log.record(format!(
            "defragment: compacted used blocks to front (used={} moved={})",
            used, moved
        ));
        debug!("Defragmented device: {} blocks moved, {} used", moved, used);
        moved
    }

    /// Mark up to `count` random free blocks bad
    ///
    /// Sampling is bounded to `4 * capacity` draws. Returns how many blocks
    /// were actually marked; fails only when none could be.
    pub fn mark_random_bad(&mut self, count: usize) -> Result<usize> {
        if count == 0 {
            return Err(DiskError::InvalidArgument(
                "count must be positive".to_string(),
            ));
        }

        let capacity = self.table.capacity();
        let max_attempts = capacity * 4;
        let mut marked = 0;
        let mut attempts = 0;

        while attempts < max_attempts && marked < count {
            let index = self.rng.gen_range(0..capacity);
            if self.table.mark_bad(index) {
                marked += 1;
            }
            attempts += 1;
        }

        self.log
            .record(format!("mark_bad: requested={} marked={}", count, marked));
        debug!(
            "Fault injection: {} of {} blocks marked bad after {} draws",
            marked, count, attempts
        );

        if marked == 0 {
            return Err(DiskError::PartialFailure {
                requested: count,
                achieved: 0,
            });
        }
        Ok(marked)
    }

    /// Give every bad block an independent 50% chance of turning free
    pub fn repair(&mut self) -> usize {
        let mut repaired = 0;

        for index in 0..self.table.capacity() {
            if self.table.get(index) == Some(Block::Bad) && self.rng.gen_bool(0.5) {
                self.table.repair(index);
                repaired += 1;
            }
        }

        self.log
            .record(format!("repair: repaired={} bad->free", repaired));
        debug!("Repaired {} bad blocks", repaired);
        repaired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::BlockState;
    use crate::core::registry::FileId;

    #[test]
    fn test_defragment_compacts_in_order() {
        let mut disk = Disk::seeded(10, 7);
        let a = disk.allocate_contiguous(2).unwrap(); // 0-1
        let b = disk.allocate_contiguous(2).unwrap(); // 2-3
        let c = disk.allocate_contiguous(2).unwrap(); // 4-5
        disk.logical_delete(b).unwrap();

        let moved = disk.defragment();
        assert_eq!(moved, 2);
        assert_eq!(disk.table().owned_by(a), vec![0, 1]);
        assert_eq!(disk.table().owned_by(c), vec![2, 3]);
        for i in 4..10 {
            assert_eq!(disk.table().get(i), Some(Block::Free));
        }
    }

    #[test]
    fn test_defragment_already_compact() {
        let mut disk = Disk::seeded(8, 7);
        disk.allocate_contiguous(3).unwrap();
        assert_eq!(disk.defragment(), 0);
        assert_eq!(disk.total_used(), 3);
    }

    #[test]
    fn test_defragment_keeps_bad_blocks_in_place() {
        let mut disk = Disk::seeded(8, 7);
        disk.table.mark_bad(0);
        disk.table.mark_bad(3);
        let id = FileId::new(1);
        disk.registry.reserve_through(id);
        disk.table.claim(5, id);
        disk.table.claim(7, id);
        disk.table.claim(6, FileId::new(2));

        disk.defragment();

        let states: Vec<BlockState> = disk.table().iter().map(|(_, b)| b.state()).collect();
        assert_eq!(
            states,
            vec![
                BlockState::Bad,
                BlockState::Used,
                BlockState::Used,
                BlockState::Bad,
                BlockState::Used,
                BlockState::Free,
                BlockState::Free,
                BlockState::Free,
            ]
        );
        assert_eq!(disk.table().get(1), Some(Block::Used(id)));
        assert_eq!(disk.table().get(2), Some(Block::Used(FileId::new(2))));
        assert_eq!(disk.table().get(4), Some(Block::Used(id)));
        assert_eq!(disk.total_bad(), 2);
    }

    #[test]
    fn test_mark_bad_rejects_zero() {
        let mut disk = Disk::seeded(8, 7);
        assert!(matches!(
            disk.mark_random_bad(0),
            Err(DiskError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mark_bad_only_touches_free_blocks() {
        let mut disk = Disk::seeded(16, 7);
        let id = disk.allocate_contiguous(8).unwrap();

        let marked = disk.mark_random_bad(4).unwrap();
        assert!(marked >= 1 && marked <= 4);
        assert_eq!(disk.total_bad(), marked);
        assert_eq!(disk.table().owned_by(id).len(), 8);
    }

    #[test]
    fn test_mark_bad_more_than_free_returns_lesser_count() {
        let mut disk = Disk::seeded(8, 7);
        disk.allocate_contiguous(6).unwrap();

        let marked = disk.mark_random_bad(5).unwrap();
        assert!(marked >= 1 && marked <= 2);
        assert_eq!(disk.total_bad(), marked);
    }

    #[test]
    fn test_mark_bad_on_full_device_fails() {
        let mut disk = Disk::seeded(4, 7);
        disk.allocate_contiguous(4).unwrap();

        let err = disk.mark_random_bad(2).unwrap_err();
        assert!(matches!(
            err,
            DiskError::PartialFailure {
                requested: 2,
                achieved: 0
            }
        ));
        assert_eq!(disk.log().entries().last().unwrap(), "mark_bad: requested=2 marked=0");
    }

    #[test]
    fn test_repair_only_frees_bad_blocks() {
        let mut disk = Disk::seeded(32, 11);
        let id = disk.allocate_contiguous(4).unwrap();
        for i in 10..30 {
            disk.table.mark_bad(i);
        }

        let repaired = disk.repair();
        assert_eq!(disk.total_bad(), 20 - repaired);
        assert_eq!(disk.table().owned_by(id), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_repair_is_reproducible_with_same_seed() {
        let run = |seed| {
            let mut disk = Disk::seeded(64, seed);
            for i in 0..64 {
                disk.table.mark_bad(i);
            }
            disk.repair();
            disk.table()
                .iter()
                .map(|(_, b)| b.state())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(42), run(42));
    }
}
