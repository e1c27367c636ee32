//! Fragmentation accounting and read-only views

use crate::core::allocator::{find_holes, Hole};
use crate::core::block::{Block, BlockState};
use crate::core::disk::Disk;
use crate::core::registry::{FileId, FileStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-block view for clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    pub index: usize,
    pub state: BlockState,
    pub file_id: Option<FileId>,
}

/// One row of the file listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: FileId,
    pub status: FileStatus,
    /// Blocks currently owned
    pub size: usize,
}

/// Aggregate device counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskStats {
    pub total: usize,
    pub used: usize,
    pub free: usize,
    pub bad: usize,
    pub fragmentation_percent: f64,
}

/// Count maximal same-owner runs per file in one pass over the device
fn runs_per_owner(blocks: &[Block]) -> HashMap<FileId, usize> {
    let mut runs = HashMap::new();
    let mut previous: Option<FileId> = None;

    for block in blocks {
        let owner = block.owner();
        if let Some(id) = owner {
            if previous != Some(id) {
                *runs.entry(id).or_insert(0) += 1;
            }
        }
        previous = owner;
    }

    runs
}

impl Disk {
    /// Percentage of active files whose blocks form more than one run
    ///
    /// 0.0 when there are no active files.
    pub fn fragmentation_percent(&self) -> f64 {
        let runs = runs_per_owner(self.table.as_slice());
        let mut active = 0usize;
        let mut fragmented = 0usize;

        for id in self.registry.active_ids() {
            active += 1;
            if runs.get(&id).copied().unwrap_or(0) > 1 {
                fragmented += 1;
            }
        }

        if active == 0 {
            return 0.0;
        }
        100.0 * fragmented as f64 / active as f64
    }

    /// Whether an active file's blocks span more than one run
    pub fn is_fragmented(&self, id: FileId) -> bool {
        runs_per_owner(self.table.as_slice())
            .get(&id)
            .map_or(false, |&count| count > 1)
    }

    /// Every block with its state and owner
    pub fn blocks(&self) -> Vec<BlockView> {
        self.table
            .iter()
            .map(|(index, block)| BlockView {
                index,
                state: block.state(),
                file_id: block.owner(),
            })
            .collect()
    }

    /// Every registered (non-unused) file with its current size
    pub fn files(&self) -> Vec<FileEntry> {
        let mut sizes: HashMap<FileId, usize> = HashMap::new();
        for (_, block) in self.table.iter() {
            if let Some(owner) = block.owner() {
                *sizes.entry(owner).or_insert(0) += 1;
            }
        }

        self.registry
            .entries()
            .map(|(id, status)| FileEntry {
                id,
                status,
                size: sizes.get(&id).copied().unwrap_or(0),
            })
            .collect()
    }

    pub fn stats(&self) -> DiskStats {
        DiskStats {
            total: self.table.capacity(),
            used: self.table.total_used(),
            free: self.table.total_free(),
            bad: self.table.total_bad(),
            fragmentation_percent: self.fragmentation_percent(),
        }
    }

    /// Recent log entries, oldest first
    pub fn logs(&self) -> Vec<String> {
        self.log.entries()
    }

    /// Current free holes, left to right
    pub fn holes(&self) -> Vec<Hole> {
        find_holes(self.table.as_slice())
    }
}
