//! Host filesystem probe
//!
//! Reports the real machine's disk usage for display next to the simulated
//! device. Purely informational: nothing here touches the block table.

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Space figures for one host filesystem, in bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDiskInfo {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub used_percentage: f64,
    pub free_percentage: f64,
    /// Not measurable from `statvfs`; always zero
    pub bad_sectors: u64,
    pub path: String,
}

impl HostDiskInfo {
    /// Derive used space and percentages from raw totals
    pub fn from_totals(path: impl Into<String>, total: u64, free: u64) -> Self {
        let free = free.min(total);
        let used = total - free;
        let (used_percentage, free_percentage) = if total > 0 {
            let used_percentage = used as f64 / total as f64 * 100.0;
            (used_percentage, 100.0 - used_percentage)
        } else {
            (0.0, 0.0)
        };

        HostDiskInfo {
            total,
            free,
            used,
            used_percentage,
            free_percentage,
            bad_sectors: 0,
            path: path.into(),
        }
    }
}

/// Source of host disk figures
pub trait HostDiskProbe {
    fn probe(&self) -> Result<HostDiskInfo>;
}

/// `statvfs(3)`-backed probe
#[derive(Debug, Clone)]
pub struct StatvfsProbe {
    path: PathBuf,
}

impl StatvfsProbe {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        StatvfsProbe {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Probe the filesystem holding `/`
    pub fn root() -> Self {
        Self::new("/")
    }
}

#[cfg(unix)]
impl HostDiskProbe for StatvfsProbe {
    fn probe(&self) -> Result<HostDiskInfo> {
        use crate::core::error::DiskError;
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(self.path.as_os_str().as_bytes()).map_err(|_| {
            DiskError::InvalidArgument(format!("path contains NUL: {}", self.path.display()))
        })?;

        // SAFETY: statvfs only writes into the zeroed struct we own, and
        // c_path is a valid NUL-terminated string for the call's duration.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        let fragment = stat.f_frsize as u64;
        let total = (stat.f_blocks as u64).saturating_mul(fragment);
        let free = (stat.f_bavail as u64).saturating_mul(fragment);

        Ok(HostDiskInfo::from_totals(
            self.path.display().to_string(),
            total,
            free,
        ))
    }
}

#[cfg(not(unix))]
impl HostDiskProbe for StatvfsProbe {
    fn probe(&self) -> Result<HostDiskInfo> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "host disk probe is only available on Unix",
        )
        .into())
    }
}
