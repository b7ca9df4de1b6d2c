//! Error taxonomy for backend orchestration.
//!
//! One enum covers install, supervise and orchestrate failures so callers can
//! render an actionable message (which file, which provider, which phase)
//! without downcasting.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::Provider;
use crate::paths::PathError;
use crate::ports::SystemProbeError;

/// Errors that can occur while installing, starting or supervising a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    // === Caller errors ===
    /// `start` was called before `setup_model` bound an adapter.
    #[error("backend not initialized, call setup_model first")]
    NotInitialized,

    /// Provider tag outside the supported set.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Model id not present in the catalog.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// Endpoint requested while nothing is running.
    #[error("backend is not running")]
    NotRunning,

    /// No catalog model fits this host.
    #[error("no model in the catalog can run on this system")]
    NoSuitableModel,

    // === Platform ===
    #[error("{provider} is not supported on this platform: {reason}")]
    PlatformUnsupported { provider: Provider, reason: String },

    // === Install ===
    /// No server bundle was found and the provider has no remote download.
    #[error("{provider} server not found: {hint}")]
    ServerUnavailable { provider: Provider, hint: String },

    /// Remote manifest listing could not be fetched. Recovered by the
    /// installer through the fallback file list.
    #[error("failed to fetch file manifest for {repo}: {reason}")]
    ManifestFetchFailed { repo: String, reason: String },

    /// The filtered manifest contained nothing worth downloading.
    #[error("no downloadable files found for model {model}")]
    EmptyManifest { model: String },

    #[error("failed to download {file}: {reason}")]
    DownloadFailed { file: String, reason: String },

    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// Checksum was missing or a placeholder while verified downloads are required.
    #[error("refusing unverified download of {file}: no usable checksum configured")]
    UnverifiedChecksum { file: String },

    #[error("failed to extract {archive}: {reason}")]
    ExtractionFailed { archive: String, reason: String },

    /// Files are on disk but the completeness check still fails.
    #[error("model {model} is incomplete at {}", path.display())]
    IncompleteModel { model: String, path: PathBuf },

    // === Process ===
    #[error("failed to start {provider} server: {reason}")]
    SpawnFailed { provider: Provider, reason: String },

    #[error("{provider} server did not become ready within {}s", timeout.as_secs_f32())]
    ReadinessTimeout {
        provider: Provider,
        timeout: Duration,
    },

    #[error("operation cancelled")]
    Cancelled,

    // === Path & IO ===
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("System probe failed: {0}")]
    Probe(#[from] SystemProbeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Create a `DownloadFailed` error for `file`.
    pub fn download_failed(file: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::DownloadFailed {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a `SpawnFailed` error for `provider`.
    pub fn spawn_failed(provider: Provider, reason: impl std::fmt::Display) -> Self {
        Self::SpawnFailed {
            provider,
            reason: reason.to_string(),
        }
    }

    /// Whether re-invoking the same operation may succeed.
    ///
    /// Platform and caller errors never will; download and readiness failures
    /// might once the cause is gone.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::DownloadFailed { .. }
                | Self::ManifestFetchFailed { .. }
                | Self::ReadinessTimeout { .. }
                | Self::SpawnFailed { .. }
                | Self::Io(_)
        )
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_mismatch_names_both_digests() {
        let err = BackendError::ChecksumMismatch {
            file: "llama-server.tar.gz".to_string(),
            expected: "abc".to_string(),
            actual: "def".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("expected abc"));
        assert!(msg.contains("got def"));
    }

    #[test]
    fn fatal_errors_are_not_retryable() {
        assert!(!BackendError::NotInitialized.is_retryable());
        assert!(
            !BackendError::ServerUnavailable {
                provider: Provider::Mlx,
                hint: String::new(),
            }
            .is_retryable()
        );
        assert!(BackendError::download_failed("config.json", "HTTP 500").is_retryable());
    }
}
