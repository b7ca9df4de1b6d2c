//! Server bundles shipped with the application.
//!
//! A bundle is found in one of three places, first match wins:
//!
//! 1. the archive embedded in the application binary, unpacked into
//!    `<data>/backends/` once per bundle version,
//! 2. `<exe dir>/backends/<name>` next to the running executable,
//! 3. `<data>/bin/<name>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use toke_core::{BackendResult, DataLayout};
use tracing::{debug, info};

use super::archive::{ArchiveSource, extract_tar_gz};

/// Entries a complete bundle provides.
pub const EXPECTED_FILES: &[&str] = &["llama-server", "mlx-server", "mlx_server.py", "mlx-env"];

/// gzip tar of server binaries compiled into the application.
#[derive(Clone)]
pub struct EmbeddedBundle {
    version: String,
    archive: Arc<[u8]>,
    expected: Vec<String>,
}

impl std::fmt::Debug for EmbeddedBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedBundle")
            .field("version", &self.version)
            .field("archive_len", &self.archive.len())
            .field("expected", &self.expected)
            .finish()
    }
}

impl EmbeddedBundle {
    pub fn new(version: impl Into<String>, archive: impl Into<Arc<[u8]>>) -> Self {
        Self {
            version: version.into(),
            archive: archive.into(),
            expected: EXPECTED_FILES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Override the entries checked before skipping extraction.
    #[must_use]
    pub fn with_expected(mut self, names: &[&str]) -> Self {
        self.expected = names.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Unpack into `<data>/backends/` unless the marker records this version
    /// and every expected entry is present.
    pub async fn ensure_extracted(&self, layout: &DataLayout) -> BackendResult<()> {
        let backends = layout.backends_dir();
        let marker = layout.extraction_marker();

        if self.is_extracted(&backends, &marker).await {
            debug!(dir = %backends.display(), "Embedded backends already extracted");
            return Ok(());
        }

        info!(dir = %backends.display(), version = %self.version, "Extracting embedded backends");
        let written = extract_tar_gz(ArchiveSource::Bytes(Arc::clone(&self.archive)), &backends)
            .await?;
        fs::write(&marker, self.version.as_bytes()).await?;
        info!(files = written.len(), "Embedded backends extracted");
        Ok(())
    }

    async fn is_extracted(&self, backends: &Path, marker: &Path) -> bool {
        match fs::read_to_string(marker).await {
            Ok(recorded) if recorded.trim() == self.version => {}
            _ => return false,
        }
        for name in &self.expected {
            if fs::metadata(backends.join(name)).await.is_err() {
                return false;
            }
        }
        true
    }
}

/// Finds bundled server files on disk.
#[derive(Debug, Clone)]
pub struct ServerLocator {
    layout: DataLayout,
    exe_dir: Option<PathBuf>,
}

impl ServerLocator {
    /// Locator that also searches next to the running executable.
    pub fn new(layout: DataLayout) -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self { layout, exe_dir }
    }

    /// Locator with an explicit executable directory.
    pub const fn with_exe_dir(layout: DataLayout, exe_dir: Option<PathBuf>) -> Self {
        Self { layout, exe_dir }
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let mut paths = vec![self.layout.backends_dir().join(name)];
        if let Some(exe_dir) = &self.exe_dir {
            paths.push(exe_dir.join("backends").join(name));
        }
        paths.push(self.layout.bin_dir().join(name));
        paths
    }

    /// First existing `name` in search order.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        self.candidates(name).into_iter().find(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::archive::tar_gz;

    fn layout() -> (tempfile::TempDir, DataLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path().join("data"));
        layout.ensure_all().unwrap();
        (dir, layout)
    }

    #[tokio::test]
    async fn extraction_is_skipped_when_marker_matches() {
        let (_dir, layout) = layout();
        let bundle = EmbeddedBundle::new(
            "v3",
            tar_gz(&[("llama-server", b"bin".as_slice())]),
        )
        .with_expected(&["llama-server"]);

        bundle.ensure_extracted(&layout).await.unwrap();
        let server = layout.backends_dir().join("llama-server");
        assert!(server.is_file());
        assert_eq!(
            std::fs::read_to_string(layout.extraction_marker()).unwrap(),
            "v3"
        );

        std::fs::write(&server, b"user-patched").unwrap();
        bundle.ensure_extracted(&layout).await.unwrap();
        assert_eq!(std::fs::read(&server).unwrap(), b"user-patched");
    }

    #[tokio::test]
    async fn missing_entry_triggers_reextraction() {
        let (_dir, layout) = layout();
        let bundle = EmbeddedBundle::new(
            "v3",
            tar_gz(&[("mlx-server", b"bin".as_slice())]),
        )
        .with_expected(&["mlx-server"]);

        bundle.ensure_extracted(&layout).await.unwrap();
        std::fs::remove_file(layout.backends_dir().join("mlx-server")).unwrap();
        bundle.ensure_extracted(&layout).await.unwrap();
        assert!(layout.backends_dir().join("mlx-server").is_file());
    }

    #[test]
    fn locator_prefers_backends_then_exe_dir_then_bin() {
        let (dir, layout) = layout();
        let exe_dir = dir.path().join("app");
        std::fs::create_dir_all(exe_dir.join("backends")).unwrap();
        let locator = ServerLocator::with_exe_dir(layout.clone(), Some(exe_dir.clone()));

        assert_eq!(locator.locate("llama-server"), None);

        std::fs::write(layout.bin_dir().join("llama-server"), b"").unwrap();
        assert_eq!(
            locator.locate("llama-server"),
            Some(layout.bin_dir().join("llama-server"))
        );

        std::fs::write(exe_dir.join("backends/llama-server"), b"").unwrap();
        assert_eq!(
            locator.locate("llama-server"),
            Some(exe_dir.join("backends/llama-server"))
        );

        std::fs::write(layout.backends_dir().join("llama-server"), b"").unwrap();
        assert_eq!(
            locator.locate("llama-server"),
            Some(layout.backends_dir().join("llama-server"))
        );
    }
}
