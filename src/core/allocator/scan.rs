//! Left-to-right scans for contiguous and fragmented placement

use crate::core::block::Block;

/// Start of the first run of free blocks that reaches `size`
///
/// The streak counter resets on every non-free block, so the run returned
/// is the leftmost one long enough; only its first `size` blocks are used.
pub fn first_free_run(blocks: &[Block], size: usize) -> Option<usize> {
    if size == 0 || size > blocks.len() {
        return None;
    }

    let mut streak = 0;
    let mut start = 0;

    for (index, block) in blocks.iter().enumerate() {
        if block.is_free() {
            if streak == 0 {
                start = index;
            }
            streak += 1;
            if streak >= size {
                return Some(start);
            }
        } else {
            streak = 0;
        }
    }

    None
}

/// The first `count` free blocks, regardless of contiguity
///
/// Returns `None` when fewer than `count` blocks are free.
pub fn first_free_blocks(blocks: &[Block], count: usize) -> Option<Vec<usize>> {
    let picked: Vec<usize> = blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| block.is_free())
        .map(|(index, _)| index)
        .take(count)
        .collect();

    if picked.len() == count {
        Some(picked)
    } else {
        None
    }
}
