//! Block placement strategies
//!
//! Three placement policies are provided:
//! - Contiguous: first run of free blocks long enough (left-biased)
//! - Fragmented: the first free blocks found, contiguous or not
//! - Hole fit: first-, best- or worst-fit over the list of free holes

pub mod hole;
pub mod scan;

use crate::core::block::BlockTable;
use crate::core::error::{DiskError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use hole::{find_holes, select_hole, Hole};

/// Hole-selection policy for custom allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementStrategy {
    #[default]
    FirstFit,
    BestFit,
    WorstFit,
}

impl PlacementStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            PlacementStrategy::FirstFit => "first-fit",
            PlacementStrategy::BestFit => "best-fit",
            PlacementStrategy::WorstFit => "worst-fit",
        }
    }

    /// Parse a strategy name, falling back to first-fit for anything unknown
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for PlacementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementStrategy {
    type Err = DiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "first-fit" | "first_fit" | "firstfit" => Ok(PlacementStrategy::FirstFit),
            "best-fit" | "best_fit" | "bestfit" => Ok(PlacementStrategy::BestFit),
            "worst-fit" | "worst_fit" | "worstfit" => Ok(PlacementStrategy::WorstFit),
            other => Err(DiskError::InvalidArgument(format!(
                "unknown placement strategy '{}'. Valid options: first-fit, best-fit, worst-fit",
                other
            ))),
        }
    }
}

/// Block placement trait
///
/// A placer only chooses indices; it never mutates the table. Claiming the
/// chosen blocks and minting the file id is the caller's job.
pub trait BlockPlacer {
    /// Choose exactly `size` free block indices for a new file
    fn place(&self, table: &BlockTable, size: usize) -> Result<Vec<usize>>;

    /// Short name used in operation log entries
    fn name(&self) -> &'static str;
}

/// First-fit over runs of consecutive free blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct ContiguousPlacer;

impl BlockPlacer for ContiguousPlacer {
    fn place(&self, table: &BlockTable, size: usize) -> Result<Vec<usize>> {
        if size > table.capacity() {
            return Err(DiskError::NoSpace(format!(
                "{} blocks requested but device holds {}",
                size,
                table.capacity()
            )));
        }

        let start = scan::first_free_run(table.as_slice(), size).ok_or_else(|| {
            DiskError::NoSpace(format!("no contiguous run of {} free blocks", size))
        })?;

        Ok((start..start + size).collect())
    }

    fn name(&self) -> &'static str {
        "contiguous"
    }
}

/// Greedy claim of the first free blocks, ignoring contiguity
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentedPlacer;

impl BlockPlacer for FragmentedPlacer {
    fn place(&self, table: &BlockTable, size: usize) -> Result<Vec<usize>> {
        scan::first_free_blocks(table.as_slice(), size).ok_or_else(|| {
            DiskError::NoSpace(format!(
                "{} blocks requested but only {} free",
                size,
                table.total_free()
            ))
        })
    }

    fn name(&self) -> &'static str {
        "fragmented"
    }
}

/// Strategy-selected hole placement
#[derive(Debug, Clone, Copy, Default)]
pub struct HolePlacer {
    pub strategy: PlacementStrategy,
}

impl HolePlacer {
    pub fn new(strategy: PlacementStrategy) -> Self {
        HolePlacer { strategy }
    }
}

impl BlockPlacer for HolePlacer {
    fn place(&self, table: &BlockTable, size: usize) -> Result<Vec<usize>> {
        let holes = find_holes(table.as_slice());
        let hole = select_hole(&holes, size, self.strategy).ok_or_else(|| {
            DiskError::NoSpace(format!(
                "no hole of {} blocks for {} ({} holes scanned)",
                size,
                self.strategy,
                holes.len()
            ))
        })?;

        Ok((hole.start..hole.start + size).collect())
    }

    fn name(&self) -> &'static str {
        self.strategy.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::FileId;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("first-fit".parse::<PlacementStrategy>().unwrap(), PlacementStrategy::FirstFit);
        assert_eq!("Best-Fit".parse::<PlacementStrategy>().unwrap(), PlacementStrategy::BestFit);
        assert_eq!("worst_fit".parse::<PlacementStrategy>().unwrap(), PlacementStrategy::WorstFit);
        assert!("next-fit".parse::<PlacementStrategy>().is_err());
    }

    #[test]
    fn test_lenient_parsing_defaults_to_first_fit() {
        assert_eq!(PlacementStrategy::parse_lenient("bogus"), PlacementStrategy::FirstFit);
        assert_eq!(PlacementStrategy::parse_lenient("worst-fit"), PlacementStrategy::WorstFit);
    }

    #[test]
    fn test_contiguous_placer() {
        let mut table = BlockTable::new(10);
        table.claim(2, FileId::new(1));

        assert_eq!(ContiguousPlacer.place(&table, 3).unwrap(), vec![3, 4, 5]);
        assert_eq!(ContiguousPlacer.place(&table, 2).unwrap(), vec![0, 1]);
        assert!(matches!(
            ContiguousPlacer.place(&table, 11),
            Err(DiskError::NoSpace(_))
        ));
    }

    #[test]
    fn test_fragmented_placer() {
        let mut table = BlockTable::new(5);
        table.claim(1, FileId::new(1));
        table.mark_bad(3);

        assert_eq!(FragmentedPlacer.place(&table, 3).unwrap(), vec![0, 2, 4]);
        assert!(matches!(
            FragmentedPlacer.place(&table, 4),
            Err(DiskError::NoSpace(_))
        ));
    }

    #[test]
    fn test_hole_placer_uses_strategy() {
        let mut table = BlockTable::new(12);
        // holes: [0,4) len 4, [5,7) len 2, [8,11) len 3
        table.claim(4, FileId::new(1));
        table.claim(7, FileId::new(1));
        table.claim(11, FileId::new(1));

        let best = HolePlacer::new(PlacementStrategy::BestFit);
        assert_eq!(best.place(&table, 2).unwrap(), vec![5, 6]);

        let worst = HolePlacer::new(PlacementStrategy::WorstFit);
        assert_eq!(worst.place(&table, 2).unwrap(), vec![0, 1]);

        let first = HolePlacer::default();
        assert_eq!(first.place(&table, 3).unwrap(), vec![0, 1, 2]);
        assert_eq!(first.name(), "first-fit");
    }
}
