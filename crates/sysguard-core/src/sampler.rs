//! Cached host health snapshot with lazy, rate-limited refresh.
//!
//! The sampler never runs on a timer. Requests call
//! [`Sampler::maybe_refresh`]; once the current snapshot has expired, the
//! first caller claims the next window by advancing `claimed_until` with a
//! compare-and-swap, reads the probes and publishes a new snapshot. Every
//! other caller in that window gets the published snapshot back as `Stale`.
//!
//! A snapshot is published as a whole `{expires_at, load, swap}` triple, so a
//! reader can never pair values from one refresh with the expiry of another.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::collector::Probe;
use crate::fixed::{LoadAvg, SwapRatio};

/// Wall clock with one-second resolution.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> i64 {
        (**self).now()
    }
}

/// Last published host health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Wall-clock second at which this snapshot stops being current.
    pub expires_at: i64,
    pub load: LoadAvg,
    pub swap: SwapRatio,
}

/// What a call to [`Sampler::maybe_refresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Probes were read and new values published.
    Fresh,
    /// The snapshot was still current, or another caller owns this window.
    Stale,
    /// Probes failed; zeros were published.
    Failed,
}

impl Refresh {
    /// Whether this call performed a refresh, successful or not.
    pub fn refreshed(self) -> bool {
        matches!(self, Refresh::Fresh | Refresh::Failed)
    }
}

/// Result of [`Sampler::maybe_refresh`]: what happened and the snapshot to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub refresh: Refresh,
    pub snapshot: Snapshot,
}

/// Owner of the process-wide snapshot.
pub struct Sampler {
    probe: Box<dyn Probe>,
    clock: Box<dyn Clock>,
    /// Expiry of the window most recently claimed by a refresher. Always
    /// `>= current.expires_at`.
    claimed_until: AtomicI64,
    current: RwLock<Snapshot>,
    refreshes: AtomicU64,
}

impl Sampler {
    /// Creates a sampler whose first call always refreshes.
    pub fn new(probe: impl Probe + 'static, clock: impl Clock + 'static) -> Self {
        Self {
            probe: Box::new(probe),
            clock: Box::new(clock),
            claimed_until: AtomicI64::new(0),
            current: RwLock::new(Snapshot::default()),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Refreshes the snapshot if it has expired.
    ///
    /// On probe failure both values are published as zero, so the guard fails
    /// open, and the expiry still advances so a broken probe is retried once
    /// per `interval` rather than on every request.
    pub fn maybe_refresh(&self, interval: Duration) -> Observation {
        let now = self.clock.now();
        let claimed = self.claimed_until.load(Ordering::Acquire);

        if now < claimed {
            return self.stale();
        }

        let interval = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX).max(1);
        let expires_at = now.saturating_add(interval);

        if self
            .claimed_until
            .compare_exchange(claimed, expires_at, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return self.stale();
        }

        let (refresh, load, swap) = match self.read_probes() {
            Ok((load, swap)) => (Refresh::Fresh, load, swap),
            Err(e) => {
                debug!(error = %e, "sysguard probe failed, publishing zeros");
                (Refresh::Failed, LoadAvg::ZERO, SwapRatio::ZERO)
            }
        };

        let snapshot = Snapshot {
            expires_at,
            load,
            swap,
        };
        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            // A slow refresher from an older window must not overwrite a newer one.
            if snapshot.expires_at >= current.expires_at {
                *current = snapshot;
            }
        }
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        Observation { refresh, snapshot }
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of refreshes performed since creation.
    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    fn stale(&self) -> Observation {
        Observation {
            refresh: Refresh::Stale,
            snapshot: self.snapshot(),
        }
    }

    fn read_probes(&self) -> Result<(LoadAvg, SwapRatio), crate::collector::ProbeError> {
        let load = self.probe.loadavg_1min()?;
        let swap = self.probe.meminfo()?.usage();
        Ok((load, swap))
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("claimed_until", &self.claimed_until.load(Ordering::Relaxed))
            .field("current", &self.snapshot())
            .field("refreshes", &self.refreshes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{MockFs, ProcProbe, ScriptedProbe, SwapInfo};
    use crate::testing::with_logs;
    use std::sync::Barrier;
    use std::thread;
    use tracing::Level;

    const ONE_SEC: Duration = Duration::from_secs(1);

    /// Sampler over shared handles so tests can poke the probe and clock.
    fn scripted(now: i64) -> (Arc<ScriptedProbe>, Arc<ManualClock>, Sampler) {
        let probe = Arc::new(ScriptedProbe::new());
        let clock = Arc::new(ManualClock::new(now));
        let sampler = Sampler::new(probe.clone(), clock.clone());
        (probe, clock, sampler)
    }

    #[test]
    fn test_first_call_refreshes() {
        let (probe, _clock, sampler) = scripted(1000);
        probe.set_load(LoadAvg::from_raw(1234));
        probe.set_swap(SwapInfo {
            total_bytes: 1000,
            free_bytes: 900,
        });

        assert_eq!(sampler.snapshot(), Snapshot::default());

        let obs = sampler.maybe_refresh(ONE_SEC);
        assert_eq!(obs.refresh, Refresh::Fresh);
        assert_eq!(
            obs.snapshot,
            Snapshot {
                expires_at: 1001,
                load: LoadAvg::from_raw(1234),
                swap: SwapRatio::from_raw(1000),
            }
        );
        assert_eq!(sampler.snapshot(), obs.snapshot);
    }

    #[test]
    fn test_stale_within_interval() {
        let (probe, clock, sampler) = scripted(1000);
        probe.set_load(LoadAvg::from_raw(500));
        sampler.maybe_refresh(Duration::from_secs(5));

        probe.set_load(LoadAvg::from_raw(9000));
        clock.advance(4);
        let obs = sampler.maybe_refresh(Duration::from_secs(5));
        assert_eq!(obs.refresh, Refresh::Stale);
        assert_eq!(obs.snapshot.load.raw(), 500);
        assert_eq!(probe.calls(), 1);

        clock.advance(1);
        let obs = sampler.maybe_refresh(Duration::from_secs(5));
        assert_eq!(obs.refresh, Refresh::Fresh);
        assert_eq!(obs.snapshot.load.raw(), 9000);
        assert_eq!(obs.snapshot.expires_at, 1010);
        assert_eq!(probe.calls(), 2);
    }

    #[test]
    fn test_at_most_one_refresh_per_window() {
        let (probe, clock, sampler) = scripted(1000);
        for _ in 0..1000 {
            sampler.maybe_refresh(ONE_SEC);
        }
        assert_eq!(probe.calls(), 1);
        assert_eq!(sampler.refreshes(), 1);

        clock.advance(1);
        for _ in 0..1000 {
            sampler.maybe_refresh(ONE_SEC);
        }
        assert_eq!(probe.calls(), 2);
    }

    #[test]
    fn test_failure_publishes_zeros_and_advances_expiry() {
        let (probe, clock, sampler) = scripted(1000);
        probe.set_load(LoadAvg::from_raw(20000));
        probe.set_swap(SwapInfo {
            total_bytes: 100,
            free_bytes: 0,
        });
        sampler.maybe_refresh(ONE_SEC);
        assert_eq!(sampler.snapshot().load.raw(), 20000);

        probe.set_failing(true);
        clock.advance(1);
        let obs = sampler.maybe_refresh(ONE_SEC);
        assert_eq!(obs.refresh, Refresh::Failed);
        assert!(obs.refresh.refreshed());
        assert_eq!(obs.snapshot.load, LoadAvg::ZERO);
        assert_eq!(obs.snapshot.swap, SwapRatio::ZERO);
        assert_eq!(obs.snapshot.expires_at, 1002);

        // Persistent failure does not turn into a probe storm.
        for _ in 0..100 {
            assert_eq!(sampler.maybe_refresh(ONE_SEC).refresh, Refresh::Stale);
        }
        assert_eq!(probe.calls(), 2);
    }

    #[test]
    fn test_failure_is_reported_at_debug_only() {
        let (probe, clock, sampler) = scripted(1000);
        probe.set_failing(true);

        let (obs, logs) = with_logs(Level::DEBUG, || sampler.maybe_refresh(ONE_SEC));
        assert_eq!(obs.refresh, Refresh::Failed);
        assert!(logs.contains("DEBUG"), "{logs}");
        assert!(logs.contains("sysguard probe failed"), "{logs}");
        assert!(logs.contains("scripted failure"), "{logs}");

        clock.advance(1);
        let (obs, logs) = with_logs(Level::INFO, || sampler.maybe_refresh(ONE_SEC));
        assert_eq!(obs.refresh, Refresh::Failed);
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn test_clock_going_backwards_keeps_snapshot() {
        let (probe, clock, sampler) = scripted(1000);
        sampler.maybe_refresh(ONE_SEC);
        clock.set(500);
        assert_eq!(sampler.maybe_refresh(ONE_SEC).refresh, Refresh::Stale);
        assert_eq!(sampler.snapshot().expires_at, 1001);
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn test_concurrent_callers_refresh_once() {
        let (probe, _clock, sampler) = scripted(1000);
        let sampler = Arc::new(sampler);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sampler = sampler.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    (0..100)
                        .filter(|_| sampler.maybe_refresh(ONE_SEC).refresh.refreshed())
                        .count()
                })
            })
            .collect();

        let refreshed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(refreshed, 1);
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn test_proc_probe_end_to_end() {
        let fs = MockFs::overloaded_system();
        let sampler = Sampler::new(ProcProbe::new(fs.clone(), "/proc"), ManualClock::new(1));
        let obs = sampler.maybe_refresh(ONE_SEC);
        assert_eq!(obs.refresh, Refresh::Fresh);
        assert_eq!(obs.snapshot.load.raw(), 15000);
        assert_eq!(obs.snapshot.swap.raw(), 7500);
    }

    #[test]
    fn test_proc_probe_values_change_between_windows() {
        let fs = MockFs::swapless_system();
        let clock = Arc::new(ManualClock::new(1));
        let sampler = Sampler::new(ProcProbe::new(fs.clone(), "/proc"), clock.clone());

        let obs = sampler.maybe_refresh(ONE_SEC);
        assert_eq!(obs.snapshot.load.raw(), 500);
        assert_eq!(obs.snapshot.swap, SwapRatio::ZERO);

        fs.set_loadavg("7.25");
        fs.set_swap(1000, 250);
        assert_eq!(sampler.maybe_refresh(ONE_SEC).snapshot.load.raw(), 500);

        clock.advance(1);
        let obs = sampler.maybe_refresh(ONE_SEC);
        assert_eq!(obs.refresh, Refresh::Fresh);
        assert_eq!(obs.snapshot.load.raw(), 7250);
        assert_eq!(obs.snapshot.swap.raw(), 7500);

        fs.remove_file("/proc/meminfo");
        clock.advance(1);
        let obs = sampler.maybe_refresh(ONE_SEC);
        assert_eq!(obs.refresh, Refresh::Failed);
        assert_eq!(obs.snapshot.load, LoadAvg::ZERO);
    }

    #[test]
    fn test_system_clock_is_epoch_seconds() {
        assert!(SystemClock.now() > 1_600_000_000);
    }
}
