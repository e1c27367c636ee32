//! Logical delete and single-level undo
//!
//! Deleting a file frees its blocks but keeps a record of exactly which
//! blocks it held. Only the most recent deletion is recoverable.

use crate::core::allocator::scan::first_free_blocks;
use crate::core::disk::Disk;
use crate::core::error::{DiskError, Result};
use crate::core::registry::{FileId, FileStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The undo buffer: the last deleted file and the blocks it held
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedSnapshot {
    pub file_id: FileId,
    /// Freed indices in ascending order (may be empty)
    pub indices: Vec<usize>,
}

/// Result of a successful undelete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restoration {
    pub file_id: FileId,
    /// Blocks the file now owns
    pub blocks: Vec<usize>,
    /// True when the original positions were unavailable
    pub relocated: bool,
}

impl Disk {
    /// Free every block of an active file and mark it deleted
    ///
    /// The freed indices replace whatever the undo buffer held. A file that
    /// owns no blocks is still marked deleted.
    pub fn logical_delete(&mut self, id: FileId) -> Result<usize> {
        if !self.registry.is_active(id) {
            return Err(DiskError::NotFound(id));
        }

        let indices = self.table.owned_by(id);
        for &index in &indices {
            self.table.release(index);
        }
        self.registry.set_status(id, FileStatus::Deleted);

        let freed = indices.len();
        if freed == 0 {
            self.log.record(format!("delete: id={} (no blocks)", id));
        } else {
            self.log
                .record(format!("delete: id={} freed={} blocks", id, freed));
        }
        self.last_deleted = Some(DeletedSnapshot {
            file_id: id,
            indices,
        });

        debug!("Logically deleted file {} ({} blocks freed)", id, freed);
        Ok(freed)
    }

    /// Bring back the most recently deleted file
    ///
    /// The original blocks are reused when every one of them is still free;
    /// otherwise the same number of blocks is claimed fragmented-style. The
    /// undo buffer survives a `NoSpace` failure so the call can be retried
    /// after space is freed.
    pub fn undelete_last(&mut self) -> Result<Restoration> {
        let snapshot = self.last_deleted.as_ref().ok_or(DiskError::NoOp)?;
        let id = snapshot.file_id;

        let original_free = snapshot
            .indices
            .iter()
            .all(|&index| self.table.get(index).map_or(false, |b| b.is_free()));

        let (blocks, relocated) = if original_free {
            (snapshot.indices.clone(), false)
        } else {
            let count = snapshot.indices.len();
            let blocks = first_free_blocks(self.table.as_slice(), count).ok_or_else(|| {
                DiskError::NoSpace(format!(
                    "cannot restore file {}: {} blocks needed, {} free",
                    id,
                    count,
                    self.table.total_free()
                ))
            })?;
            (blocks, true)
        };

        for &index in &blocks {
            self.table.claim(index, id);
        }
        self.registry.set_status(id, FileStatus::Active);
        self.last_deleted = None;

        self.log.record(format!(
            "undelete_last: id={} restored={} blocks{}",
            id,
            blocks.len(),
            if relocated { " (relocated)" } else { "" }
        ));
        debug!(
            "Restored file {} to {} blocks (relocated: {})",
            id,
            blocks.len(),
            relocated
        );

        Ok(Restoration {
            file_id: id,
            blocks,
            relocated,
        })
    }

    /// The current undo buffer, if any
    pub fn last_deleted(&self) -> Option<&DeletedSnapshot> {
        self.last_deleted.as_ref()
    }
}
