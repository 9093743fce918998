//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc` states for the conditions the
//! guard cares about.

use super::filesystem::MockFs;

impl MockFs {
    /// An idle host: low load, swap configured and unused.
    pub fn healthy_system() -> Self {
        let fs = Self::new();
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");
        fs.add_file("/proc/meminfo", meminfo(16384000, 8192000, 4096000, 4096000));
        fs
    }

    /// A host under pressure: load far above the core count, swap 75% used.
    pub fn overloaded_system() -> Self {
        let fs = Self::new();
        fs.add_file("/proc/loadavg", "15.00 12.40 9.80 37/912 48211\n");
        fs.add_file("/proc/meminfo", meminfo(16384000, 102400, 4096000, 1024000));
        fs
    }

    /// A host without any swap device.
    pub fn swapless_system() -> Self {
        let fs = Self::new();
        fs.add_file("/proc/loadavg", "0.50 0.40 0.30 2/200 999\n");
        fs.add_file("/proc/meminfo", meminfo(8192000, 4096000, 0, 0));
        fs
    }

    /// Replaces `/proc/loadavg` with the given 1-minute average.
    pub fn set_loadavg(&self, load1: &str) {
        self.add_file("/proc/loadavg", format!("{load1} 0.00 0.00 1/100 1\n"));
    }

    /// Replaces the swap lines of `/proc/meminfo` (values in kB).
    pub fn set_swap(&self, total_kb: u64, free_kb: u64) {
        self.add_file("/proc/meminfo", meminfo(16384000, 8192000, total_kb, free_kb));
    }
}

fn meminfo(mem_total: u64, mem_free: u64, swap_total: u64, swap_free: u64) -> String {
    format!(
        "\
MemTotal:       {mem_total} kB
MemFree:        {mem_free} kB
MemAvailable:   {mem_free} kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
SwapTotal:      {swap_total} kB
SwapFree:       {swap_free} kB
Dirty:              1024 kB
"
    )
}
