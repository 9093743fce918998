//! Host metric probes.
//!
//! The sampler needs two numbers from the operating system: the 1-minute
//! load average and the swap totals. Both come through the [`Probe`] trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                 Sampler                 │
//! └────────────────────┬────────────────────┘
//!                      │
//!               ┌──────▼──────┐
//!               │    Probe    │ (trait)
//!               └──────┬──────┘
//!          ┌───────────┴────────────┐
//!   ┌──────▼──────┐          ┌──────▼───────┐
//!   │  ProcProbe  │          │ ScriptedProbe│
//!   │ /proc/*     │          │  (Testing)   │
//!   └──────┬──────┘          └──────────────┘
//!          │
//!   ┌──────▼──────┐
//!   │  FileSystem │ (trait)
//!   └──────┬──────┘
//!    ┌─────┴──────┐
//! ┌──▼───┐    ┌───▼────┐
//! │RealFs│    │ MockFs │
//! └──────┘    └────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use sysguard_core::collector::{MockFs, Probe, ProcProbe};
//!
//! let probe = ProcProbe::new(MockFs::healthy_system(), "/proc");
//! assert_eq!(probe.loadavg_1min().unwrap().raw(), 150);
//! ```

pub mod mock;
pub mod procfs;
pub mod traits;

use std::fmt;
use std::sync::Arc;

use crate::fixed::{LoadAvg, SwapRatio};

pub use mock::{MockFs, ScriptedProbe};
pub use procfs::{ParseError, ProcProbe};
pub use traits::{FileSystem, RealFs};

/// Swap totals in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl SwapInfo {
    /// Used swap in percent, truncated to two fractional digits.
    ///
    /// A host without swap reports `0`.
    pub fn usage(&self) -> SwapRatio {
        if self.total_bytes == 0 {
            return SwapRatio::ZERO;
        }
        let used = u128::from(self.total_bytes.saturating_sub(self.free_bytes));
        let scaled = used * 100 * SwapRatio::factor() as u128 / u128::from(self.total_bytes);
        SwapRatio::from_raw(scaled as i64)
    }
}

/// Error type for probe failures.
#[derive(Debug)]
pub enum ProbeError {
    /// I/O error reading the source.
    Io(std::io::Error),
    /// The source had unexpected content.
    Parse(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Io(e) => write!(f, "I/O error: {}", e),
            ProbeError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Io(e) => Some(e),
            ProbeError::Parse(_) => None,
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        ProbeError::Io(e)
    }
}

impl From<ParseError> for ProbeError {
    fn from(e: ParseError) -> Self {
        ProbeError::Parse(e.message)
    }
}

/// Source of host health metrics.
///
/// Implementations are called synchronously from the request path and must
/// return promptly.
pub trait Probe: Send + Sync {
    /// 1-minute load average.
    fn loadavg_1min(&self) -> Result<LoadAvg, ProbeError>;

    /// Swap totals.
    fn meminfo(&self) -> Result<SwapInfo, ProbeError>;
}

impl<P: Probe + ?Sized> Probe for Arc<P> {
    fn loadavg_1min(&self) -> Result<LoadAvg, ProbeError> {
        (**self).loadavg_1min()
    }

    fn meminfo(&self) -> Result<SwapInfo, ProbeError> {
        (**self).meminfo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_usage() {
        let swap = SwapInfo {
            total_bytes: 4096,
            free_bytes: 1024,
        };
        assert_eq!(swap.usage().raw(), 7500);
    }

    #[test]
    fn test_swap_usage_truncates() {
        let swap = SwapInfo {
            total_bytes: 3,
            free_bytes: 2,
        };
        // 33.333...% → 33.33
        assert_eq!(swap.usage().raw(), 3333);
    }

    #[test]
    fn test_swap_usage_without_swap() {
        assert_eq!(SwapInfo::default().usage(), SwapRatio::ZERO);
    }

    #[test]
    fn test_swap_usage_large_values() {
        let swap = SwapInfo {
            total_bytes: u64::MAX,
            free_bytes: 0,
        };
        assert_eq!(swap.usage().raw(), 10000);
    }
}
