//! Data-directory resolution and layout.
//!
//! Everything toke writes lives under one data root:
//!
//! ```text
//! <root>/bin/                         server binaries and runtime envs
//! <root>/backends/                    bundle extracted from the app binary
//! <root>/models/<provider>/<id>/      model weights
//! <root>/cache/                       downloads in flight
//! ```

mod layout;

pub use layout::{DataLayout, EXTRACTION_MARKER};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Cannot determine system data directory")]
    NoDataDir,

    #[error("Path cannot be empty")]
    EmptyPath,

    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// The data root rejected a probe write.
    #[error("Directory {path} is not writable: {reason}")]
    NotWritable { path: PathBuf, reason: String },
}

/// Directory name used under the platform data directory.
pub const APP_DIR_NAME: &str = "toke";

/// Default data root, e.g. `~/.local/share/toke` on Linux or
/// `~/Library/Application Support/toke` on macOS.
pub fn data_root() -> Result<PathBuf, PathError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(PathError::NoDataDir)
}

/// Resolve the data root, preferring an explicit override.
pub fn resolve_data_root(override_dir: Option<PathBuf>) -> Result<PathBuf, PathError> {
    match override_dir {
        Some(dir) if dir.as_os_str().is_empty() => Err(PathError::EmptyPath),
        Some(dir) => Ok(dir),
        None => data_root(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins() {
        let dir = PathBuf::from("/tmp/toke-data");
        assert_eq!(resolve_data_root(Some(dir.clone())).unwrap(), dir);
    }

    #[test]
    fn empty_override_is_rejected() {
        let err = resolve_data_root(Some(PathBuf::new())).unwrap_err();
        assert!(matches!(err, PathError::EmptyPath));
    }
}
