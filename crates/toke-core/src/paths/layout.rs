use std::fs;
use std::path::{Path, PathBuf};

use super::PathError;
use crate::catalog::Provider;

/// Probe file written and removed to confirm the root accepts writes.
const WRITE_PROBE: &str = ".toke_write_test";

/// Marker written into `backends/` after the embedded bundle is unpacked.
pub const EXTRACTION_MARKER: &str = ".extracted-v3";

/// Paths derived from a single data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn backends_dir(&self) -> PathBuf {
        self.root.join("backends")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// `<root>/models/<provider>/<model_id>`
    pub fn model_dir(&self, provider: Provider, model_id: &str) -> PathBuf {
        self.models_dir().join(provider.as_str()).join(model_id)
    }

    pub fn extraction_marker(&self) -> PathBuf {
        self.backends_dir().join(EXTRACTION_MARKER)
    }

    /// Unix socket the MLX server binds when socket transport is used.
    pub fn mlx_socket_path(&self) -> PathBuf {
        self.root.join("mlx-server.sock")
    }

    /// Create every directory of the layout and check the root is writable.
    /// Safe to call repeatedly.
    pub fn ensure_all(&self) -> Result<(), PathError> {
        for dir in [
            self.root.clone(),
            self.bin_dir(),
            self.models_dir(),
            self.backends_dir(),
            self.cache_dir(),
        ] {
            create_dir(&dir)?;
        }
        check_writable(&self.root)
    }
}

fn create_dir(path: &Path) -> Result<(), PathError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn check_writable(dir: &Path) -> Result<(), PathError> {
    let probe = dir.join(WRITE_PROBE);
    fs::write(&probe, b"ok").map_err(|e| PathError::NotWritable {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    let _ = fs::remove_file(&probe);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn model_dir_is_namespaced_by_provider() {
        let layout = DataLayout::new("/data");
        assert_eq!(
            layout.model_dir(Provider::Mlx, "glm-4.5-air-3bit"),
            PathBuf::from("/data/models/mlx/glm-4.5-air-3bit")
        );
        assert_eq!(
            layout.model_dir(Provider::LlamaCpp, "qwen"),
            PathBuf::from("/data/models/llamacpp/qwen")
        );
    }

    #[test]
    fn ensure_all_is_idempotent() {
        let tmp = tempdir().unwrap();
        let layout = DataLayout::new(tmp.path().join("toke"));
        layout.ensure_all().unwrap();
        layout.ensure_all().unwrap();

        for dir in ["bin", "models", "backends", "cache"] {
            assert!(layout.root().join(dir).is_dir(), "{dir} missing");
        }
        assert!(!layout.root().join(WRITE_PROBE).exists());
    }

    #[test]
    fn file_in_place_of_a_directory_is_rejected() {
        let tmp = tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        std::fs::write(layout.models_dir(), b"x").unwrap();

        let err = layout.ensure_all().unwrap_err();
        assert!(matches!(err, PathError::NotADirectory(path) if path == layout.models_dir()));
    }
}
