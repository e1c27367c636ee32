//! File registry: identifier minting and lifecycle status
//!
//! File sizes and block membership are never stored here. They are derived
//! from the block table by scanning for owned blocks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Largest id the registry will ever hand out
pub const MAX_FILE_ID: u32 = u32::MAX - 1;

/// Identifier of a simulated file
///
/// Ids are positive, assigned monotonically starting at 1 and never reused.
/// Valid ids lie in `1..=MAX_FILE_ID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(u32);

impl FileId {
    pub const fn new(id: u32) -> Self {
        FileId(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Convert a persisted id, rejecting anything outside `1..=MAX_FILE_ID`
    pub fn from_stored(raw: i64) -> Option<Self> {
        u32::try_from(raw)
            .ok()
            .filter(|id| (1..=MAX_FILE_ID).contains(id))
            .map(FileId)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FileId {
    fn from(id: u32) -> Self {
        FileId(id)
    }
}

/// Lifecycle status of a file id
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Unused = 0,
    Active = 1,
    Deleted = 2,
}

impl FileStatus {
    /// Numeric code used in persisted snapshots
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FileStatus::Unused),
            1 => Some(FileStatus::Active),
            2 => Some(FileStatus::Deleted),
            _ => None,
        }
    }
}

/// Mapping from file id to status, plus the id counter
#[derive(Debug, Clone)]
pub struct FileRegistry {
    /// Only non-`Unused` ids are stored
    statuses: BTreeMap<FileId, FileStatus>,
    next_id: u32,
}

impl FileRegistry {
    pub fn new() -> Self {
        FileRegistry {
            statuses: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Mint a fresh id and register it as `Active`
    ///
    /// Returns `None` once every id up to `MAX_FILE_ID` has been used.
    pub fn mint(&mut self) -> Option<FileId> {
        if self.next_id > MAX_FILE_ID {
            return None;
        }
        let id = FileId(self.next_id);
        self.next_id += 1;
        self.statuses.insert(id, FileStatus::Active);
        Some(id)
    }

    pub fn status(&self, id: FileId) -> FileStatus {
        self.statuses
            .get(&id)
            .copied()
            .unwrap_or(FileStatus::Unused)
    }

    pub fn is_active(&self, id: FileId) -> bool {
        self.status(id) == FileStatus::Active
    }

    pub fn set_status(&mut self, id: FileId, status: FileStatus) {
        if status == FileStatus::Unused {
            self.statuses.remove(&id);
        } else {
            self.statuses.insert(id, status);
        }
    }

    /// Non-unused entries in ascending id order
    pub fn entries(&self) -> impl Iterator<Item = (FileId, FileStatus)> + '_ {
        self.statuses.iter().map(|(&id, &status)| (id, status))
    }

    pub fn active_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.entries()
            .filter(|(_, status)| *status == FileStatus::Active)
            .map(|(id, _)| id)
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Raise the id counter so `id` can never be minted again
    pub fn reserve_through(&mut self, id: FileId) {
        if let Some(next) = id.0.checked_add(1) {
            self.next_id = self.next_id.max(next);
        } else {
            self.next_id = u32::MAX;
        }
    }

    /// Set the counter, clamped to `1..=MAX_FILE_ID + 1`
    pub fn set_next_id(&mut self, next_id: u32) {
        self.next_id = next_id.clamp(1, MAX_FILE_ID + 1);
    }

    /// Whether another id can still be minted
    pub fn has_capacity(&self) -> bool {
        self.next_id <= MAX_FILE_ID
    }

    pub fn clear(&mut self) {
        self.statuses.clear();
        self.next_id = 1;
    }
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::new()
    }
}
