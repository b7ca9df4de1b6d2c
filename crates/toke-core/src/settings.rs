//! Backend settings and validation.
//!
//! All fields are optional so a partial JSON document (or none at all) yields
//! working defaults through the `effective_*` accessors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Provider;

/// Port llama-server binds on loopback.
pub const DEFAULT_LLAMA_PORT: u16 = 11434;

/// Port the MLX server binds when TCP transport is selected.
pub const DEFAULT_MLX_PORT: u16 = 11435;

/// Release location of prebuilt llama-server archives.
pub const DEFAULT_LLAMA_SERVER_BASE_URL: &str =
    "https://github.com/chasedut/toke-llama-server/releases/latest/download/";

/// How clients reach the MLX server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MlxTransport {
    /// Unix domain socket under the data root.
    Socket,
    /// Loopback TCP port.
    Tcp,
}

impl Default for MlxTransport {
    fn default() -> Self {
        if cfg!(unix) { Self::Socket } else { Self::Tcp }
    }
}

/// Readiness polling cadence for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessTiming {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Bounded restart policy for the health monitor.
///
/// Each crash detected by the monitor spends one attempt; attempt `n`
/// (zero-based) waits `initial_backoff * 2^n`, capped at `max_backoff`, before
/// restarting. The budget resets on every explicit `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl RestartPolicy {
    /// Delay before restart attempt `attempt`, or `None` once the budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Some(Duration::from_millis(delay))
    }
}

/// Settings for installing and supervising backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Loopback port for llama-server.
    pub llama_port: Option<u16>,

    /// Loopback port for the MLX server when `mlx_transport` is `tcp`.
    pub mlx_port: Option<u16>,

    pub mlx_transport: Option<MlxTransport>,

    /// Context window passed to llama-server.
    pub context_size: Option<u32>,

    pub llama_ready_interval_ms: Option<u64>,
    pub llama_ready_timeout_ms: Option<u64>,
    pub mlx_ready_interval_ms: Option<u64>,
    pub mlx_ready_timeout_ms: Option<u64>,

    /// Health monitor polling interval.
    pub health_interval_ms: Option<u64>,

    /// Grace period between the interrupt signal and a forced kill.
    pub shutdown_grace_ms: Option<u64>,

    pub restart: Option<RestartPolicy>,

    /// Refuse archive downloads whose checksum is missing or a placeholder.
    pub require_verified_checksums: Option<bool>,

    /// Accept a `llama-server` found on `PATH`.
    pub allow_system_server: Option<bool>,

    /// Base URL for llama-server release archives.
    pub llama_server_base_url: Option<String>,

    /// Expected SHA-256 of the llama-server archive.
    pub llama_server_checksum: Option<String>,
}

impl BackendSettings {
    /// Parse settings from a JSON document; missing fields keep defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn effective_llama_port(&self) -> u16 {
        self.llama_port.unwrap_or(DEFAULT_LLAMA_PORT)
    }

    pub fn effective_mlx_port(&self) -> u16 {
        self.mlx_port.unwrap_or(DEFAULT_MLX_PORT)
    }

    pub fn effective_mlx_transport(&self) -> MlxTransport {
        self.mlx_transport.unwrap_or_default()
    }

    pub fn effective_context_size(&self) -> u32 {
        self.context_size.unwrap_or(8192)
    }

    /// Provider-specific readiness cadence: llama.cpp polls `/health` every
    /// 500ms for 30s, MLX polls its model list every second for 60s.
    pub fn readiness(&self, provider: Provider) -> ReadinessTiming {
        let (interval, timeout) = match provider {
            Provider::LlamaCpp => (
                self.llama_ready_interval_ms.unwrap_or(500),
                self.llama_ready_timeout_ms.unwrap_or(30_000),
            ),
            Provider::Mlx => (
                self.mlx_ready_interval_ms.unwrap_or(1_000),
                self.mlx_ready_timeout_ms.unwrap_or(60_000),
            ),
        };
        ReadinessTiming {
            interval: Duration::from_millis(interval),
            timeout: Duration::from_millis(timeout),
        }
    }

    pub fn effective_health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms.unwrap_or(30_000))
    }

    pub fn effective_shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms.unwrap_or(5_000))
    }

    pub fn effective_restart_policy(&self) -> RestartPolicy {
        self.restart.unwrap_or_default()
    }

    pub fn effective_require_verified_checksums(&self) -> bool {
        self.require_verified_checksums.unwrap_or(false)
    }

    pub fn effective_allow_system_server(&self) -> bool {
        self.allow_system_server.unwrap_or(true)
    }

    pub fn effective_llama_server_base_url(&self) -> &str {
        self.llama_server_base_url
            .as_deref()
            .unwrap_or(DEFAULT_LLAMA_SERVER_BASE_URL)
    }
}

/// Errors that can occur during settings validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid port {0}: must be 1024 or higher")]
    InvalidPort(u16),

    #[error("Invalid {name}: {reason}")]
    InvalidDuration { name: &'static str, reason: String },

    #[error("Invalid context size {0}: must be between 512 and 1,000,000")]
    InvalidContextSize(u32),

    #[error("Invalid restart policy: {0}")]
    InvalidRestartPolicy(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &BackendSettings) -> Result<(), SettingsError> {
    for port in [settings.llama_port, settings.mlx_port].into_iter().flatten() {
        if port < 1024 {
            return Err(SettingsError::InvalidPort(port));
        }
    }

    if let Some(ctx) = settings.context_size {
        if !(512..=1_000_000).contains(&ctx) {
            return Err(SettingsError::InvalidContextSize(ctx));
        }
    }

    for provider in [Provider::LlamaCpp, Provider::Mlx] {
        let timing = settings.readiness(provider);
        if timing.interval.is_zero() {
            return Err(SettingsError::InvalidDuration {
                name: "readiness interval",
                reason: format!("{provider} interval must be greater than zero"),
            });
        }
        if timing.interval > timing.timeout {
            return Err(SettingsError::InvalidDuration {
                name: "readiness timeout",
                reason: format!("{provider} timeout is shorter than its polling interval"),
            });
        }
    }

    if settings.effective_health_interval().is_zero() {
        return Err(SettingsError::InvalidDuration {
            name: "health interval",
            reason: "must be greater than zero".to_string(),
        });
    }

    let policy = settings.effective_restart_policy();
    if policy.max_attempts > 10 {
        return Err(SettingsError::InvalidRestartPolicy(format!(
            "at most 10 attempts allowed, got {}",
            policy.max_attempts
        )));
    }
    if policy.initial_backoff_ms > policy.max_backoff_ms {
        return Err(SettingsError::InvalidRestartPolicy(
            "initial backoff exceeds max backoff".to_string(),
        ));
    }

    Ok(())
}
