//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait lets the probes read the real `/proc` filesystem on
//! Linux and an in-memory mock in tests.

use std::io;
use std::path::Path;

/// Abstraction for filesystem reads.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    ///
    /// # Arguments
    /// * `path` - Path to the file to read
    ///
    /// # Returns
    /// The file contents as a string, or an I/O error if the file cannot be read.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Real filesystem implementation that delegates to `std::fs`.
///
/// Use this in production to read from the actual `/proc` filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}
