//! Block table: the ground truth of the simulated device
//!
//! Each block is a single record carrying its state and, only when used,
//! its owning file. Free and bad blocks cannot carry an owner.

use crate::core::registry::FileId;
use serde::{Deserialize, Serialize};

/// Hard upper bound on device capacity
pub const MAX_BLOCKS: usize = 512;

/// Observable state of a block
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    Free = 0,
    Used = 1,
    Bad = 2,
}

impl BlockState {
    /// Numeric code used in persisted snapshots
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(BlockState::Free),
            1 => Some(BlockState::Used),
            2 => Some(BlockState::Bad),
            _ => None,
        }
    }
}

/// One block record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Block {
    Free,
    Used(FileId),
    Bad,
}

impl Block {
    pub fn state(self) -> BlockState {
        match self {
            Block::Free => BlockState::Free,
            Block::Used(_) => BlockState::Used,
            Block::Bad => BlockState::Bad,
        }
    }

    pub fn owner(self) -> Option<FileId> {
        match self {
            Block::Used(owner) => Some(owner),
            _ => None,
        }
    }

    pub fn is_free(self) -> bool {
        self == Block::Free
    }

    pub fn is_used(self) -> bool {
        matches!(self, Block::Used(_))
    }
}

/// Fixed-capacity array of blocks
#[derive(Debug, Clone)]
pub struct BlockTable {
    blocks: Vec<Block>,
}

impl BlockTable {
    /// Create a table of `capacity` free blocks
    ///
    /// Capacity is clamped to `1..=MAX_BLOCKS`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_BLOCKS);
        BlockTable {
            blocks: vec![Block::Free; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    pub fn get(&self, index: usize) -> Option<Block> {
        self.blocks.get(index).copied()
    }

    pub fn as_slice(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Block)> + '_ {
        self.blocks.iter().copied().enumerate()
    }

    pub fn count(&self, state: BlockState) -> usize {
        self.blocks.iter().filter(|b| b.state() == state).count()
    }

    pub fn total_free(&self) -> usize {
        self.count(BlockState::Free)
    }

    pub fn total_used(&self) -> usize {
        self.count(BlockState::Used)
    }

    pub fn total_bad(&self) -> usize {
        self.count(BlockState::Bad)
    }

    /// Indices owned by `owner`, in ascending order
    pub fn owned_by(&self, owner: FileId) -> Vec<usize> {
        self.iter()
            .filter(|(_, block)| block.owner() == Some(owner))
            .map(|(index, _)| index)
            .collect()
    }

    /// Hand a free block to `owner`
    ///
    /// Returns false (and changes nothing) unless the block is free.
    pub fn claim(&mut self, index: usize, owner: FileId) -> bool {
        match self.blocks.get_mut(index) {
            Some(block) if block.is_free() => {
                *block = Block::Used(owner);
                true
            }
            _ => false,
        }
    }

    /// Return a used block to the free pool, dropping its owner
    pub fn release(&mut self, index: usize) -> bool {
        match self.blocks.get_mut(index) {
            Some(block) if block.is_used() => {
                *block = Block::Free;
                true
            }
            _ => false,
        }
    }

    /// Mark a free block bad
    pub fn mark_bad(&mut self, index: usize) -> bool {
        match self.blocks.get_mut(index) {
            Some(block) if block.is_free() => {
                *block = Block::Bad;
                true
            }
            _ => false,
        }
    }

    /// Turn a bad block back into a free one
    pub fn repair(&mut self, index: usize) -> bool {
        match self.blocks.get_mut(index) {
            Some(block) if *block == Block::Bad => {
                *block = Block::Free;
                true
            }
            _ => false,
        }
    }

    /// Overwrite a block record wholesale (compaction and snapshot restore)
    pub(crate) fn set(&mut self, index: usize, block: Block) {
        if let Some(slot) = self.blocks.get_mut(index) {
            *slot = block;
        }
    }

    /// Set every block back to free
    pub fn reset(&mut self) {
        self.blocks.iter_mut().for_each(|b| *b = Block::Free);
    }
}
