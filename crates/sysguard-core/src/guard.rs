//! Per-request admission decision.
//!
//! [`Guard::handle`] runs once per top-level request: it resolves the scope
//! configuration, lets the sampler refresh if due, and compares the cached
//! load and swap values against the configured limits. Load is checked
//! before swap; a value equal to its threshold does not trip.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{Action, GuardConfig, LogLevel, Settings};
use crate::sampler::{Observation, Sampler};

/// Host-side view of a request, as far as the guard needs it.
///
/// The consulted marker must survive internal redirects and belong to one
/// top-level request.
pub trait GuardedRequest {
    /// Whether the guard already ran for this top-level request.
    fn is_consulted(&self) -> bool;

    fn mark_consulted(&mut self);

    /// Host the request is addressed to, used to pick the server scope.
    fn host(&self) -> Option<&str>;

    /// Request target (path and query), for diagnostics.
    fn target(&self) -> &str;
}

/// Outcome of [`Guard::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// No objection; normal processing continues.
    Decline,
    /// Tripped: internally redirect to this path, keeping the query string.
    Redirect(String),
    /// Tripped: hand the request to this named handler.
    Named(String),
    /// Tripped with no fallback configured: answer 503.
    ServiceUnavailable,
}

impl Admission {
    /// Whether the request was rerouted and is finished from the guard's side.
    pub fn is_done(&self) -> bool {
        matches!(self, Admission::Redirect(_) | Admission::Named(_))
    }
}

impl From<&Action> for Admission {
    fn from(action: &Action) -> Self {
        match action {
            Action::ServiceUnavailable => Admission::ServiceUnavailable,
            Action::Redirect(path) => Admission::Redirect(path.clone()),
            Action::Named(alias) => Admission::Named(alias.clone()),
        }
    }
}

/// The decision handler.
#[derive(Debug, Clone)]
pub struct Guard {
    settings: Arc<Settings>,
    sampler: Arc<Sampler>,
}

impl Guard {
    pub fn new(settings: Arc<Settings>, sampler: Arc<Sampler>) -> Self {
        Self { settings, sampler }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Decides whether `req` may proceed.
    ///
    /// Marks the request as consulted before anything else; a request that
    /// already carries the mark is declined without looking at the sampler.
    pub fn handle<R: GuardedRequest + ?Sized>(&self, req: &mut R) -> Admission {
        if req.is_consulted() {
            return Admission::Decline;
        }
        req.mark_consulted();

        let conf = self.settings.resolve(req.host());
        if !conf.enabled {
            return Admission::Decline;
        }

        let obs = self.sampler.maybe_refresh(conf.interval);
        trace_decision(conf, &obs, req.target());

        decide(conf, &obs)
    }
}

fn decide(conf: &GuardConfig, obs: &Observation) -> Admission {
    let snapshot = obs.snapshot;

    if let Some(limit) = &conf.load
        && limit.tripped_by(snapshot.load)
    {
        if obs.refresh.refreshed() {
            log_trip(
                conf.log_level,
                "load",
                snapshot.load.raw(),
                limit.threshold.raw(),
            );
        }
        return Admission::from(&limit.action);
    }

    if let Some(limit) = &conf.swap
        && limit.tripped_by(snapshot.swap)
    {
        if obs.refresh.refreshed() {
            log_trip(
                conf.log_level,
                "swap",
                snapshot.swap.raw(),
                limit.threshold.raw(),
            );
        }
        return Admission::from(&limit.action);
    }

    Admission::Decline
}

fn trace_decision(conf: &GuardConfig, obs: &Observation, target: &str) {
    debug!(
        load = obs.snapshot.load.raw(),
        conf_load = ?conf.load_threshold().map(|t| t.raw()),
        swap = obs.snapshot.swap.raw(),
        conf_swap = ?conf.swap_threshold().map(|t| t.raw()),
        uri = target,
        load_action = ?conf.load.as_ref().map(|l| l.action.to_string()),
        swap_action = ?conf.swap.as_ref().map(|l| l.action.to_string()),
        refresh = ?obs.refresh,
        "sysguard handler"
    );
}

/// One line per trip, at the configured severity. `tracing` has no notice
/// level, so notice goes out as INFO tagged with `severity`.
fn log_trip(level: LogLevel, dimension: &'static str, current: i64, conf: i64) {
    match level {
        LogLevel::Info => {
            info!(dimension, current, conf, "sysguard {dimension} limited, current:{current} conf:{conf}")
        }
        LogLevel::Notice => info!(
            severity = "notice",
            dimension,
            current,
            conf,
            "sysguard {dimension} limited, current:{current} conf:{conf}"
        ),
        LogLevel::Warn => {
            warn!(dimension, current, conf, "sysguard {dimension} limited, current:{current} conf:{conf}")
        }
        LogLevel::Error => {
            error!(dimension, current, conf, "sysguard {dimension} limited, current:{current} conf:{conf}")
        }
    }
}
