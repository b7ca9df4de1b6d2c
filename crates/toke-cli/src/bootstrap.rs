//! CLI bootstrap, the composition root.
//!
//! The only place concrete runtime pieces are wired together: the data
//! layout, settings, the adapter context (with the embedded server bundle
//! when compiled in) and the host probe.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use toke_core::{BackendSettings, DataLayout, resolve_data_root, validate_settings};
use toke_runtime::{AdapterContext, DefaultSystemProbe, Orchestrator};
use tracing::debug;

/// Inputs gathered from flags and the environment.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Data root override; `None` uses the platform data directory.
    pub data_dir: Option<PathBuf>,
    /// JSON settings file; `None` uses defaults.
    pub settings_file: Option<PathBuf>,
}

/// Fully composed context handed to command handlers.
pub struct CliContext {
    pub layout: DataLayout,
    pub settings: BackendSettings,
    pub orchestrator: Orchestrator,
}

impl CliContext {
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

/// Read and validate a settings file.
pub async fn load_settings(path: Option<&std::path::Path>) -> Result<BackendSettings> {
    let Some(path) = path else {
        return Ok(BackendSettings::default());
    };
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    let settings = BackendSettings::from_json(&json)
        .with_context(|| format!("Invalid settings file {}", path.display()))?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Build the CLI context.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let root = resolve_data_root(config.data_dir)?;
    let layout = DataLayout::new(root);
    let settings = load_settings(config.settings_file.as_deref()).await?;
    debug!(root = %layout.root().display(), "Resolved data root");

    let ctx = AdapterContext::new(layout.clone(), settings.clone())?;
    #[cfg(feature = "embedded-backends")]
    let ctx = ctx.with_bundle(embedded::bundle());

    let orchestrator = Orchestrator::new(ctx, Arc::new(DefaultSystemProbe::new()));
    Ok(CliContext {
        layout,
        settings,
        orchestrator,
    })
}

#[cfg(feature = "embedded-backends")]
mod embedded {
    use toke_runtime::EmbeddedBundle;

    static ARCHIVE: &[u8] = include_bytes!(env!("TOKE_EMBEDDED_BUNDLE"));

    pub fn bundle() -> EmbeddedBundle {
        EmbeddedBundle::new(env!("CARGO_PKG_VERSION"), ARCHIVE)
    }
}
