//! Guard configuration: directive grammar, per-scope records and merging.
//!
//! A configuration file has a global scope and any number of `server`
//! scopes. Each scope collects its directives into a [`ScopeDirectives`]
//! (every field optional). Server scopes are merged with the global scope,
//! inner values winning, and the result is frozen into a [`GuardConfig`].

mod directive;
mod file;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::fixed::{Fixed, LoadAvg, SwapRatio};

pub use directive::DirectiveError;
pub use file::{ServerScope, Settings};

/// Severity used for trip log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Notice,
    Warn,
    #[default]
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(LogLevel::Info),
            "notice" => Ok(LogLevel::Notice),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fallback target for a tripped request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No action configured: answer 503.
    ServiceUnavailable,
    /// Internal redirect to a URI path (starts with `/`).
    Redirect(String),
    /// Dispatch to a named handler (starts with `@`).
    Named(String),
}

impl Action {
    /// Parses the value of an `action=` parameter.
    ///
    /// Returns `None` unless the value starts with `/` or `@`.
    pub fn parse(value: &str) -> Option<Self> {
        if value.starts_with('/') {
            Some(Action::Redirect(value.to_string()))
        } else if value.starts_with('@') {
            Some(Action::Named(value.to_string()))
        } else {
            None
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ServiceUnavailable => f.write_str("503"),
            Action::Redirect(path) => f.write_str(path),
            Action::Named(alias) => f.write_str(alias),
        }
    }
}

/// One trip dimension: a threshold and what to do when it is exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit<const SCALE: u32> {
    pub threshold: Fixed<SCALE>,
    pub action: Action,
}

impl<const SCALE: u32> Limit<SCALE> {
    /// Strict comparison: a value equal to the threshold does not trip.
    pub fn tripped_by(&self, current: Fixed<SCALE>) -> bool {
        current > self.threshold
    }
}

pub type LoadLimit = Limit<3>;
pub type SwapLimit = Limit<2>;

/// Unmerged directives of one scope. `None` means "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeDirectives {
    pub enabled: Option<bool>,
    pub load: Option<LoadLimit>,
    pub swap: Option<SwapLimit>,
    pub interval: Option<Duration>,
    pub log_level: Option<LogLevel>,
}

impl ScopeDirectives {
    /// Fills every unset field from the enclosing scope.
    pub fn merge(&self, outer: &ScopeDirectives) -> ScopeDirectives {
        ScopeDirectives {
            enabled: self.enabled.or(outer.enabled),
            load: self.load.clone().or_else(|| outer.load.clone()),
            swap: self.swap.clone().or_else(|| outer.swap.clone()),
            interval: self.interval.or(outer.interval),
            log_level: self.log_level.or(outer.log_level),
        }
    }

    /// Applies defaults to whatever is still unset.
    pub fn finish(&self) -> GuardConfig {
        GuardConfig {
            enabled: self.enabled.unwrap_or(false),
            load: self.load.clone(),
            swap: self.swap.clone(),
            interval: self.interval.unwrap_or(GuardConfig::DEFAULT_INTERVAL),
            log_level: self.log_level.unwrap_or_default(),
        }
    }
}

/// Effective, immutable guard configuration of one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub enabled: bool,
    pub load: Option<LoadLimit>,
    pub swap: Option<SwapLimit>,
    pub interval: Duration,
    pub log_level: LogLevel,
}

impl GuardConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn load_threshold(&self) -> Option<LoadAvg> {
        self.load.as_ref().map(|l| l.threshold)
    }

    pub fn swap_threshold(&self) -> Option<SwapRatio> {
        self.swap.as_ref().map(|l| l.threshold)
    }

    /// Every action configured in this scope.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.load
            .iter()
            .map(|l| &l.action)
            .chain(self.swap.iter().map(|l| &l.action))
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        ScopeDirectives::default().finish()
    }
}

/// Fatal configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Malformed file structure (braces, quotes, terminators).
    Syntax { line: usize, message: String },
    /// A directive rejected its arguments.
    Directive {
        line: usize,
        name: String,
        error: DirectiveError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            ConfigError::Syntax { line, message } => write!(f, "{} in line {}", message, line),
            ConfigError::Directive { line, name, error } => match error {
                DirectiveError::InvalidParameter(p) => {
                    write!(f, "invalid parameter \"{}\" in line {}", p, line)
                }
                other => write!(f, "\"{}\" directive {} in line {}", name, other, line),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
