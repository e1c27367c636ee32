//! Device configuration
//!
//! Settings can come from a TOML file or be assembled in code. Every
//! configuration is validated before a device is built from it.
//!
//! ```toml
//! capacity = 256
//! log_capacity = 512
//! snapshot_path = "/var/lib/disksim/state.json"
//! seed = 42
//! ```

use crate::core::audit::DEFAULT_LOG_CAPACITY;
use crate::core::block::MAX_BLOCKS;
use crate::core::error::{DiskError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Settings for building a simulated device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DiskConfig {
    /// Number of blocks (1..=512)
    #[validate(range(min = 1, max = 512))]
    pub capacity: usize,

    /// Number of retained operation log entries
    #[validate(range(min = 1))]
    pub log_capacity: usize,

    /// Where snapshots are persisted; `None` keeps the device in memory only
    pub snapshot_path: Option<PathBuf>,

    /// Seed for fault injection; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        DiskConfig {
            capacity: MAX_BLOCKS,
            log_capacity: DEFAULT_LOG_CAPACITY,
            snapshot_path: None,
            seed: None,
        }
    }
}

impl DiskConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: DiskConfig =
            toml::from_str(s).map_err(|e| DiskError::Config(format!("invalid TOML: {}", e)))?;
        config.validated()
    }

    /// Read, parse and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DiskError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check field ranges, returning the config unchanged when valid
    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|e| DiskError::Config(e.to_string()))?;
        Ok(self)
    }
}
