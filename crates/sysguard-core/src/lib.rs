//! sysguard-core: host-pressure admission control.
//!
//! Provides:
//! - `fixed`: exact fixed-point numbers for thresholds and samples
//! - `config`: directive grammar, configuration file, scope merging
//! - `collector`: OS probes for load average and swap usage
//! - `sampler`: the cached, lazily refreshed host health snapshot
//! - `guard`: the per-request admission decision
//!
//! The crate has no HTTP dependency; `sysguard-tower` binds [`guard::Guard`]
//! into a tower/axum pipeline.

use std::sync::{Arc, OnceLock};

pub mod collector;
pub mod config;
pub mod fixed;
pub mod guard;
pub mod sampler;

#[cfg(test)]
mod testing;

pub use config::{Action, ConfigError, GuardConfig, LogLevel, Settings};
pub use guard::{Admission, Guard, GuardedRequest};
pub use sampler::{Clock, Refresh, Sampler, Snapshot, SystemClock};

static SYSTEM_SAMPLER: OnceLock<Arc<Sampler>> = OnceLock::new();

/// The process-wide sampler over the host's `/proc` and the system clock.
///
/// Created on first use; every caller shares the same snapshot.
pub fn system_sampler() -> Arc<Sampler> {
    SYSTEM_SAMPLER
        .get_or_init(|| {
            Arc::new(Sampler::new(
                collector::ProcProbe::new(collector::RealFs::new(), "/proc"),
                SystemClock,
            ))
        })
        .clone()
}
