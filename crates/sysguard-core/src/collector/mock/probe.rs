//! Scripted probe for tests that need exact control over sampled values.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};

use crate::collector::{Probe, ProbeError, SwapInfo};
use crate::fixed::LoadAvg;

/// Probe returning whatever the test last set.
///
/// Counts how many times the load average was read, which is one per
/// sampler refresh.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    load: AtomicI64,
    swap_total: AtomicU64,
    swap_free: AtomicU64,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_load(&self, load: LoadAvg) {
        self.load.store(load.raw(), Ordering::SeqCst);
    }

    pub fn set_swap(&self, swap: SwapInfo) {
        self.swap_total.store(swap.total_bytes, Ordering::SeqCst);
        self.swap_free.store(swap.free_bytes, Ordering::SeqCst);
    }

    /// Makes every subsequent read fail until called with `false`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of load average reads so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ProbeError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProbeError::Parse("scripted failure".to_string()));
        }
        Ok(())
    }
}

impl Probe for ScriptedProbe {
    fn loadavg_1min(&self) -> Result<LoadAvg, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(LoadAvg::from_raw(self.load.load(Ordering::SeqCst)))
    }

    fn meminfo(&self) -> Result<SwapInfo, ProbeError> {
        self.check()?;
        Ok(SwapInfo {
            total_bytes: self.swap_total.load(Ordering::SeqCst),
            free_bytes: self.swap_free.load(Ordering::SeqCst),
        })
    }
}
