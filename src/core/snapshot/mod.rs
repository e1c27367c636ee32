//! Snapshot persistence for the simulated device
//!
//! The whole device is serialized as one JSON document after every
//! mutation. Writes go to a temporary file that is renamed over the target,
//! so a crash mid-write leaves the previous snapshot intact.
//!
//! Loading is best-effort: a damaged document is repaired block by block
//! and the file registry is rebuilt from block ownership instead of being
//! trusted as stored.

use crate::core::block::{Block, BlockState, MAX_BLOCKS};
use crate::core::disk::{Disk, FaultRng};
use crate::core::error::{DiskError, Result};
use crate::core::registry::{FileId, FileStatus};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default snapshot file name
pub const DEFAULT_SNAPSHOT_PATH: &str = "disk_state.json";

/// A persisted file entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    /// 1 = active, 2 = deleted
    pub status: i64,
}

/// Serialized form of the whole device
///
/// Signed integers are used throughout so that hand-edited or corrupted
/// documents still parse and can be repaired instead of rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSnapshot {
    /// Device capacity
    #[serde(default)]
    pub blocks: i64,

    /// Per-block state code: 0 free, 1 used, 2 bad
    #[serde(default)]
    pub state: Vec<i64>,

    /// Per-block owner id, -1 when none
    #[serde(default)]
    pub owner: Vec<i64>,

    /// Non-unused file entries
    #[serde(default)]
    pub files: Vec<FileRecord>,

    #[serde(default)]
    pub next_file_id: i64,

    /// Recent log entries, oldest first
    #[serde(default)]
    pub logs: Vec<String>,
}

impl DiskSnapshot {
    /// Capture the current device state
    pub fn capture(disk: &Disk) -> Self {
        let table = disk.table();

        DiskSnapshot {
            blocks: table.capacity() as i64,
            state: table.iter().map(|(_, b)| b.state().code() as i64).collect(),
            owner: table
                .iter()
                .map(|(_, b)| b.owner().map_or(-1, |id| id.get() as i64))
                .collect(),
            files: disk
                .registry()
                .entries()
                .map(|(id, status)| FileRecord {
                    id: id.get() as i64,
                    status: status.code() as i64,
                })
                .collect(),
            next_file_id: disk.registry().next_id() as i64,
            logs: disk.log().entries(),
        }
    }

    /// Rebuild a device from this snapshot, repairing what it can
    ///
    /// `fallback_capacity` is used when the stored capacity is out of range.
    pub fn restore(self, fallback_capacity: usize, log_capacity: usize, rng: FaultRng) -> Disk {
        let capacity = usize::try_from(self.blocks)
            .ok()
            .filter(|c| (1..=MAX_BLOCKS).contains(c))
            .unwrap_or(fallback_capacity);

        let mut disk = Disk::with_rng(capacity, log_capacity, rng);
        let mut repaired = 0usize;

        for index in 0..disk.capacity() {
            let state = match self.state.get(index) {
                Some(&code) => BlockState::from_code(code).unwrap_or_else(|| {
                    repaired += 1;
                    BlockState::Free
                }),
                None => BlockState::Free,
            };

            let block = match state {
                BlockState::Free => Block::Free,
                BlockState::Bad => Block::Bad,
                BlockState::Used => {
                    match self.owner.get(index).and_then(|&o| FileId::from_stored(o)) {
                        Some(owner) => Block::Used(owner),
                        None => {
                            repaired += 1;
                            Block::Free
                        }
                    }
                }
            };
            disk.table.set(index, block);
        }

        // Out-of-range counters are dropped; referenced ids still raise it below
        match FileId::from_stored(self.next_file_id) {
            Some(next) => disk.registry.set_next_id(next.get()),
            None => repaired += 1,
        }

        // Ownership is the source of truth for which files are active
        let owners: Vec<FileId> = disk.table.iter().filter_map(|(_, b)| b.owner()).collect();
        for owner in owners {
            disk.registry.set_status(owner, FileStatus::Active);
            disk.registry.reserve_through(owner);
        }

        for record in &self.files {
            let (id, status) = match (
                FileId::from_stored(record.id),
                FileStatus::from_code(record.status),
            ) {
                (Some(id), Some(status)) => (id, status),
                _ => {
                    repaired += 1;
                    continue;
                }
            };
            disk.registry.reserve_through(id);
            if status == FileStatus::Deleted && disk.registry.status(id) == FileStatus::Unused {
                disk.registry.set_status(id, FileStatus::Deleted);
            }
        }

        disk.log.restore(self.logs);

        if repaired > 0 {
            warn!("Repaired {} inconsistent entries while restoring snapshot", repaired);
        }
        disk
    }
}

/// Location of the persisted snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        SnapshotStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    /// Atomically write `disk` to the snapshot path
    pub fn save(&self, disk: &Disk) -> Result<()> {
        let snapshot = DiskSnapshot::capture(disk);
        let json = serde_json::to_string_pretty(&snapshot).map_err(|e| {
            DiskError::Persistence(format!("Failed to serialize snapshot: {}", e))
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    DiskError::Persistence(format!("Failed to create snapshot dir: {}", e))
                })?;
            }
        }

        let tmp = self.temp_path();
        let write_tmp = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()
        };
        write_tmp().map_err(|e| {
            DiskError::Persistence(format!("Failed to write {}: {}", tmp.display(), e))
        })?;

        fs::rename(&tmp, &self.path).map_err(|e| {
            DiskError::Persistence(format!(
                "Failed to move snapshot into place at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!("Snapshot written to {:?}", self.path);
        Ok(())
    }

    /// Read and parse the snapshot without interpreting it
    pub fn load(&self) -> Result<DiskSnapshot> {
        let json = fs::read_to_string(&self.path).map_err(|e| {
            DiskError::Persistence(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        serde_json::from_str(&json).map_err(|e| {
            DiskError::Persistence(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }
}
