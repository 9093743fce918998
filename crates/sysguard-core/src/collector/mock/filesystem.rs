//! In-memory mock filesystem for testing probes without real `/proc`.
//!
//! This module provides `MockFs` which simulates a filesystem in memory,
//! allowing tests to run on macOS and in CI environments without Linux.

use crate::collector::traits::FileSystem;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// In-memory filesystem for testing.
///
/// Clones share their contents, so a test can keep a handle and rewrite
/// `/proc/loadavg` after the probe has been handed to a sampler.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: Arc<RwLock<HashMap<PathBuf, String>>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file with the given content.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Removes a file, so later reads fail with `NotFound`.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path.as_ref());
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("file not found: {:?}", path),
                )
            })
    }
}
