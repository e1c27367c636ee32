//! Logical delete and single-level undo through the public service

use disksim_rs::{DiskError, DiskService, FileStatus, PlacementStrategy};

#[test]
fn test_undo_survives_unrelated_operations() {
    let mut disk = DiskService::in_memory(16);
    let a = disk.allocate_contiguous(4).unwrap();
    let b = disk.allocate_contiguous(4).unwrap();
    disk.delete(a).unwrap();

    // Allocations elsewhere do not disturb the freed blocks
    disk.allocate_custom(3, PlacementStrategy::WorstFit).unwrap();

    let restored = disk.undelete_last().unwrap();
    assert_eq!(restored.file_id, a);
    assert_eq!(restored.blocks, vec![0, 1, 2, 3]);
    assert!(!restored.relocated);
    assert!(disk.exists(b));
}

#[test]
fn test_undo_after_defragment_relocates() {
    let mut disk = DiskService::in_memory(10);
    let a = disk.allocate_contiguous(3).unwrap(); // 0-2
    let b = disk.allocate_contiguous(3).unwrap(); // 3-5
    disk.delete(a).unwrap();

    // b moves down into a's old blocks
    disk.defragment();
    assert_eq!(disk.disk().table().owned_by(b), vec![0, 1, 2]);

    let restored = disk.undelete_last().unwrap();
    assert!(restored.relocated);
    assert_eq!(restored.blocks, vec![3, 4, 5]);
    assert_eq!(disk.stats().used, 6);
}

#[test]
fn test_second_delete_overwrites_buffer() {
    let mut disk = DiskService::in_memory(10);
    let a = disk.allocate_contiguous(2).unwrap();
    let b = disk.allocate_contiguous(2).unwrap();

    disk.delete(a).unwrap();
    disk.delete(b).unwrap();

    assert_eq!(disk.undelete_last().unwrap().file_id, b);
    assert!(matches!(disk.undelete_last(), Err(DiskError::NoOp)));
    assert_eq!(disk.disk().registry().status(a), FileStatus::Deleted);
    assert!(!disk.exists(a));
}

#[test]
fn test_undo_no_space_keeps_buffer_until_reset() {
    let mut disk = DiskService::in_memory(6);
    let a = disk.allocate_contiguous(4).unwrap();
    disk.delete(a).unwrap();

    let filler = disk.allocate_fragmented(5).unwrap();
    assert!(matches!(disk.undelete_last(), Err(DiskError::NoSpace(_))));
    assert_eq!(disk.disk().last_deleted().unwrap().file_id, a);

    disk.reset();
    assert!(disk.disk().last_deleted().is_none());
    assert!(!disk.exists(filler));
}

#[test]
fn test_reset_invalidates_undo() {
    let mut disk = DiskService::in_memory(8);
    let a = disk.allocate_contiguous(2).unwrap();
    disk.delete(a).unwrap();
    disk.reset();

    assert!(matches!(disk.undelete_last(), Err(DiskError::NoOp)));
}

#[test]
fn test_deleted_ids_are_never_reissued() {
    let mut disk = DiskService::in_memory(8);
    let a = disk.allocate_contiguous(2).unwrap();
    disk.delete(a).unwrap();
    let b = disk.allocate_contiguous(2).unwrap();

    assert_ne!(a, b);
    assert!(b > a);
}
