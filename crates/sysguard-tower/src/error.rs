//! Errors raised while building the layer.

use std::fmt;

/// The configuration references something the layer cannot serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerError {
    /// An `action=@alias` has no handler registered with
    /// [`SysguardLayerBuilder::named`](crate::SysguardLayerBuilder::named).
    UnknownNamedHandler(String),
    /// An `action=/path` is not a valid request target.
    InvalidRedirect(String),
}

impl fmt::Display for LayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerError::UnknownNamedHandler(alias) => {
                write!(f, "no named handler registered for \"{}\"", alias)
            }
            LayerError::InvalidRedirect(path) => {
                write!(f, "invalid redirect target \"{}\"", path)
            }
        }
    }
}

impl std::error::Error for LayerError {}
