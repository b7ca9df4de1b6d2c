//! llama.cpp `llama-server` adapter (single-file GGUF models).

use std::path::PathBuf;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use toke_core::{
    BackendError, BackendResult, BackendState, Endpoint, ModelOption, ProgressCallback, Provider,
};
use tracing::{info, warn};

use super::context::AdapterContext;
use crate::install::{ArchiveSource, download_verified, ensure_gguf_model, extract_tar_gz};
use crate::process::{LaunchSpec, ReadinessCheck, ReadinessProbe, Supervisor};

const SERVER_NAME: &str = "llama-server";

/// Release archive for the host, if one is published.
pub const fn release_asset() -> Option<&'static str> {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        Some("llama-server-darwin-arm64.tar.gz")
    } else if cfg!(all(target_os = "macos", target_arch = "x86_64")) {
        Some("llama-server-darwin-x64.tar.gz")
    } else if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        Some("llama-server-linux-x64.tar.gz")
    } else {
        None
    }
}

#[derive(Debug)]
pub struct LlamaCppBackend {
    ctx: AdapterContext,
    model: ModelOption,
    server: Option<PathBuf>,
    model_path: Option<PathBuf>,
    supervisor: Supervisor,
}

impl LlamaCppBackend {
    pub fn new(ctx: AdapterContext, model: ModelOption) -> Self {
        Self {
            ctx,
            model,
            server: None,
            model_path: None,
            supervisor: Supervisor::new(Provider::LlamaCpp),
        }
    }

    pub const fn model(&self) -> &ModelOption {
        &self.model
    }

    /// Bundled server, then `PATH` (when allowed), then the release archive.
    pub async fn ensure_server(
        &mut self,
        cancel: &CancellationToken,
        progress: &ProgressCallback,
    ) -> BackendResult<PathBuf> {
        let path = match self.ctx.bundled_server(Provider::LlamaCpp, SERVER_NAME).await {
            Some(path) => path,
            None => match self.system_server() {
                Some(path) => path,
                None => self.download_server(cancel, progress).await?,
            },
        };
        self.server = Some(path.clone());
        self.mark_if_installed();
        Ok(path)
    }

    fn system_server(&self) -> Option<PathBuf> {
        if !self.ctx.settings.effective_allow_system_server() {
            return None;
        }
        let path = which::which(SERVER_NAME).ok()?;
        info!(path = %path.display(), "Using system llama-server");
        Some(path)
    }

    async fn download_server(
        &self,
        cancel: &CancellationToken,
        progress: &ProgressCallback,
    ) -> BackendResult<PathBuf> {
        let asset = release_asset().ok_or_else(|| BackendError::ServerUnavailable {
            provider: Provider::LlamaCpp,
            hint: "no prebuilt llama-server for this platform, install llama.cpp manually"
                .to_string(),
        })?;

        let settings = &self.ctx.settings;
        let url = format!(
            "{}/{asset}",
            settings.effective_llama_server_base_url().trim_end_matches('/')
        );
        let archive = self.ctx.layout.cache_dir().join(asset);
        info!(%url, "Downloading llama-server");

        download_verified(
            &self.ctx.client,
            &url,
            &archive,
            settings.llama_server_checksum.as_deref(),
            settings.effective_require_verified_checksums(),
            cancel,
            progress,
        )
        .await?;

        let bin = self.ctx.layout.bin_dir();
        extract_tar_gz(ArchiveSource::File(archive.clone()), &bin).await?;
        if let Err(e) = fs::remove_file(&archive).await {
            warn!(path = %archive.display(), error = %e, "Failed to remove downloaded archive");
        }

        let server = bin.join(SERVER_NAME);
        if !server.is_file() {
            return Err(BackendError::ServerUnavailable {
                provider: Provider::LlamaCpp,
                hint: format!("{asset} did not contain {SERVER_NAME}"),
            });
        }
        info!(path = %server.display(), "llama-server downloaded");
        Ok(server)
    }

    pub async fn ensure_model(
        &mut self,
        cancel: &CancellationToken,
        progress: &ProgressCallback,
    ) -> BackendResult<PathBuf> {
        let dir = self.ctx.layout.model_dir(Provider::LlamaCpp, &self.model.id);
        let path = ensure_gguf_model(&self.ctx.client, &self.model, &dir, cancel, progress).await?;
        self.model_path = Some(path.clone());
        self.mark_if_installed();
        Ok(path)
    }

    fn mark_if_installed(&mut self) {
        if self.server.is_some() && self.model_path.is_some() {
            self.supervisor.mark_installed();
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::loopback(self.ctx.settings.effective_llama_port())
    }

    fn readiness_probe(&self) -> ReadinessProbe {
        ReadinessProbe::new(
            Provider::LlamaCpp,
            self.endpoint(),
            ReadinessCheck::Health,
            self.ctx.settings.readiness(Provider::LlamaCpp),
            self.ctx.client.clone(),
        )
    }

    pub fn launch_spec(&self) -> BackendResult<LaunchSpec> {
        let (Some(server), Some(model)) = (&self.server, &self.model_path) else {
            return Err(BackendError::NotInitialized);
        };
        let settings = &self.ctx.settings;

        Ok(LaunchSpec::new(server)
            .arg("--model")
            .arg(model)
            .arg("--port")
            .arg(settings.effective_llama_port().to_string())
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--n-gpu-layers")
            .arg("-1")
            .arg("--ctx-size")
            .arg(settings.effective_context_size().to_string())
            .arg("--threads")
            .arg(num_cpus::get().to_string())
            .arg("--mlock")
            .arg("--no-mmap")
            .arg("--jinja"))
    }

    pub async fn start(&mut self, cancel: &CancellationToken) -> BackendResult<()> {
        if self.supervisor.is_alive() {
            return Ok(());
        }
        if !self.supervisor.state().is_installed() {
            return Err(BackendError::NotInitialized);
        }

        let spec = self.launch_spec()?;
        let probe = self.readiness_probe();
        let grace = self.ctx.settings.effective_shutdown_grace();
        self.supervisor.start(&spec, &probe, grace, cancel).await?;
        info!(model = %self.model.id, endpoint = %self.endpoint(), "llama.cpp server started");
        Ok(())
    }

    pub async fn stop(&mut self) -> BackendResult<()> {
        self.supervisor
            .stop(self.ctx.settings.effective_shutdown_grace())
            .await
    }

    /// Process alive and `/health` answering.
    pub async fn is_running(&mut self) -> bool {
        self.supervisor.is_alive() && self.readiness_probe().check_once().await
    }

    /// Process liveness only, without touching the endpoint.
    pub fn is_process_alive(&mut self) -> bool {
        self.supervisor.is_alive()
    }

    pub const fn state(&self) -> BackendState {
        self.supervisor.state()
    }

    pub fn pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }
}
