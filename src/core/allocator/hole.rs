//! Free holes and hole-selection strategies
//!
//! A hole is a maximal run of consecutive free blocks. Holes are always
//! produced in left-to-right order, which is what makes "first occurrence"
//! tie-breaking well defined.

use crate::core::allocator::PlacementStrategy;
use crate::core::block::Block;
use serde::{Deserialize, Serialize};

/// A maximal run of free blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hole {
    /// Index of the first free block
    pub start: usize,
    /// Number of consecutive free blocks
    pub length: usize,
}

impl Hole {
    pub fn new(start: usize, length: usize) -> Self {
        Hole { start, length }
    }

    pub fn fits(&self, size: usize) -> bool {
        self.length >= size
    }
}

/// Scan the device left to right and collect every hole
pub fn find_holes(blocks: &[Block]) -> Vec<Hole> {
    let mut holes = Vec::new();
    let mut i = 0;

    while i < blocks.len() {
        while i < blocks.len() && !blocks[i].is_free() {
            i += 1;
        }
        if i >= blocks.len() {
            break;
        }

        let start = i;
        while i < blocks.len() && blocks[i].is_free() {
            i += 1;
        }
        holes.push(Hole::new(start, i - start));
    }

    holes
}

/// Pick the hole `strategy` would allocate `size` blocks from
///
/// Ties on length go to the hole that appears first.
pub fn select_hole(holes: &[Hole], size: usize, strategy: PlacementStrategy) -> Option<Hole> {
    let mut candidates = holes.iter().copied().filter(|hole| hole.fits(size));

    match strategy {
        PlacementStrategy::FirstFit => candidates.next(),
        PlacementStrategy::BestFit => candidates.fold(None, |chosen: Option<Hole>, hole| match chosen {
            Some(current) if current.length <= hole.length => Some(current),
            _ => Some(hole),
        }),
        PlacementStrategy::WorstFit => candidates.fold(None, |chosen: Option<Hole>, hole| match chosen {
            Some(current) if current.length >= hole.length => Some(current),
            _ => Some(hole),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::FileId;

    /// Build a device from a pattern: '.' free, '#' used, 'x' bad
    fn device(pattern: &str) -> Vec<Block> {
        pattern
            .chars()
            .map(|c| match c {
                '.' => Block::Free,
                'x' => Block::Bad,
                _ => Block::Used(FileId::new(1)),
            })
            .collect()
    }

    #[test]
    fn test_hole_fits() {
        let hole = Hole::new(10, 20);
        assert!(hole.fits(20));
        assert!(!hole.fits(21));
    }

    #[test]
    fn test_find_holes_empty_device() {
        let holes = find_holes(&device(".........."));
        assert_eq!(holes, vec![Hole::new(0, 10)]);
    }

    #[test]
    fn test_find_holes_full_device() {
        assert!(find_holes(&device("##x##")).is_empty());
    }

    #[test]
    fn test_find_holes_bad_blocks_split_holes() {
        let holes = find_holes(&device("..#...x.##."));
        assert_eq!(
            holes,
            vec![
                Hole::new(0, 2),
                Hole::new(3, 3),
                Hole::new(7, 1),
                Hole::new(10, 1)
            ]
        );
    }

    #[test]
    fn test_first_fit_takes_first_qualifying_hole() {
        let holes = find_holes(&device("..#....#...#......"));
        let chosen = select_hole(&holes, 3, PlacementStrategy::FirstFit).unwrap();
        assert_eq!(chosen, Hole::new(3, 4));
    }

    #[test]
    fn test_best_fit_takes_smallest_qualifying_hole() {
        // holes of length 2, 4, 3, 6
        let holes = find_holes(&device("..#....#...#......"));
        let chosen = select_hole(&holes, 3, PlacementStrategy::BestFit).unwrap();
        assert_eq!(chosen, Hole::new(8, 3));
    }

    #[test]
    fn test_worst_fit_takes_largest_qualifying_hole() {
        let holes = find_holes(&device("..#....#...#......"));
        let chosen = select_hole(&holes, 3, PlacementStrategy::WorstFit).unwrap();
        assert_eq!(chosen, Hole::new(12, 6));
    }

    #[test]
    fn test_ties_go_to_first_occurrence() {
        // two holes of 3 and two holes of 5
        let holes = find_holes(&device("...#.....#...#....."));

        let best = select_hole(&holes, 2, PlacementStrategy::BestFit).unwrap();
        assert_eq!(best.start, 0);

        let worst = select_hole(&holes, 2, PlacementStrategy::WorstFit).unwrap();
        assert_eq!(worst.start, 4);
    }

    #[test]
    fn test_no_qualifying_hole() {
        let holes = find_holes(&device("..#..#.."));
        for strategy in [
            PlacementStrategy::FirstFit,
            PlacementStrategy::BestFit,
            PlacementStrategy::WorstFit,
        ] {
            assert_eq!(select_hole(&holes, 3, strategy), None);
        }
    }
}
