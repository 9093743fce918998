//! Probe reading `/proc/loadavg` and `/proc/meminfo`.

use std::path::Path;

use crate::collector::procfs::parser::{parse_loadavg, parse_meminfo};
use crate::collector::traits::FileSystem;
use crate::collector::{Probe, ProbeError, SwapInfo};
use crate::fixed::LoadAvg;

/// Reads host metrics from the proc filesystem.
pub struct ProcProbe<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> ProcProbe<F> {
    /// Creates a new probe.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    fn read(&self, name: &str) -> Result<String, ProbeError> {
        let path = format!("{}/{}", self.proc_path, name);
        Ok(self.fs.read_to_string(Path::new(&path))?)
    }
}

impl<F: FileSystem> Probe for ProcProbe<F> {
    fn loadavg_1min(&self) -> Result<LoadAvg, ProbeError> {
        let content = self.read("loadavg")?;
        Ok(parse_loadavg(&content)?)
    }

    fn meminfo(&self) -> Result<SwapInfo, ProbeError> {
        let content = self.read("meminfo")?;
        Ok(parse_meminfo(&content)?)
    }
}
