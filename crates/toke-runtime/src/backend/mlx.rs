//! MLX server adapter (Apple Silicon, multi-file safetensors models).

use std::io;
use std::path::PathBuf;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use toke_core::{
    BackendError, BackendResult, BackendState, Endpoint, MlxTransport, ModelOption,
    ProgressCallback, Provider,
};
use tracing::{debug, info};

use super::context::AdapterContext;
use crate::install::ensure_snapshot_model;
use crate::process::{LaunchSpec, ReadinessCheck, ReadinessProbe, Supervisor};

const SERVER_NAME: &str = "mlx-server";
const ENV_DIR_NAME: &str = "mlx-env";
const MAX_TOKENS: u32 = 4096;
const MAX_MODELS: u32 = 3;

#[derive(Debug)]
pub struct MlxBackend {
    ctx: AdapterContext,
    model: ModelOption,
    server: Option<PathBuf>,
    model_path: Option<PathBuf>,
    supervisor: Supervisor,
}

impl MlxBackend {
    /// Fails with `PlatformUnsupported` anywhere but Apple Silicon.
    pub fn new(ctx: AdapterContext, model: ModelOption) -> BackendResult<Self> {
        ctx.platform
            .supports(Provider::Mlx)
            .map_err(|reason| BackendError::PlatformUnsupported {
                provider: Provider::Mlx,
                reason: reason.to_string(),
            })?;
        Ok(Self {
            ctx,
            model,
            server: None,
            model_path: None,
            supervisor: Supervisor::new(Provider::Mlx),
        })
    }

    pub const fn model(&self) -> &ModelOption {
        &self.model
    }

    /// Bundled server only; MLX has no remote download.
    pub async fn ensure_server(&mut self) -> BackendResult<PathBuf> {
        let path = self
            .ctx
            .bundled_server(Provider::Mlx, SERVER_NAME)
            .await
            .ok_or_else(|| BackendError::ServerUnavailable {
                provider: Provider::Mlx,
                hint: "ensure the bundled version is included in the application".to_string(),
            })?;
        self.server = Some(path.clone());
        self.mark_if_installed();
        Ok(path)
    }

    pub async fn ensure_model(
        &mut self,
        cancel: &CancellationToken,
        progress: &ProgressCallback,
    ) -> BackendResult<PathBuf> {
        let dir = self.ctx.layout.model_dir(Provider::Mlx, &self.model.id);
        let path = ensure_snapshot_model(
            &self.ctx.client,
            self.ctx.manifests.as_ref(),
            &self.model,
            &dir,
            cancel,
            progress,
        )
        .await?;
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
        match self.ctx.settings.effective_mlx_transport() {
            MlxTransport::Socket => Endpoint::unix(self.ctx.layout.mlx_socket_path()),
            MlxTransport::Tcp => Endpoint::loopback(self.ctx.settings.effective_mlx_port()),
        }
    }

    fn readiness_probe(&self) -> ReadinessProbe {
        ReadinessProbe::new(
            Provider::Mlx,
            self.endpoint(),
            ReadinessCheck::ModelList,
            self.ctx.settings.readiness(Provider::Mlx),
            self.ctx.client.clone(),
        )
    }

    /// Arguments and environment for the bundled launcher script.
    pub fn launch_spec(&self) -> BackendResult<LaunchSpec> {
        let (Some(server), Some(model)) = (&self.server, &self.model_path) else {
            return Err(BackendError::NotInitialized);
        };

        let mut spec = LaunchSpec::new(server).arg("--model").arg(model);
        spec = match self.endpoint() {
            Endpoint::Unix { socket } => spec.arg("--socket").arg(socket),
            Endpoint::Http { port, .. } => spec.arg("--port").arg(port.to_string()),
        };
        spec = spec
            .arg("--max-tokens")
            .arg(MAX_TOKENS.to_string())
            .arg("--max-models")
            .arg(MAX_MODELS.to_string())
            .arg("--trust-remote-code")
            .env("PYTORCH_ENABLE_MPS_FALLBACK", "1");

        if let Some(env_dir) = self.ctx.locator.locate(ENV_DIR_NAME) {
            debug!(path = %env_dir.display(), "Using bundled MLX environment");
            spec = spec.env("MLX_ENV_PATH", env_dir);
        }
        Ok(spec)
    }

    pub async fn start(&mut self, cancel: &CancellationToken) -> BackendResult<()> {
        if self.supervisor.is_alive() {
            return Ok(());
        }
        if !self.supervisor.state().is_installed() {
            return Err(BackendError::NotInitialized);
        }

        let spec = self.launch_spec()?;
        if let Some(socket) = self.endpoint().socket_path() {
            remove_stale_socket(socket).await?;
        }

        let probe = self.readiness_probe();
        let grace = self.ctx.settings.effective_shutdown_grace();
        self.supervisor.start(&spec, &probe, grace, cancel).await?;
        info!(model = %self.model.id, endpoint = %self.endpoint(), "MLX server started");
        Ok(())
    }

    pub async fn stop(&mut self) -> BackendResult<()> {
        let was_running = self.supervisor.pid().is_some();
        self.supervisor
            .stop(self.ctx.settings.effective_shutdown_grace())
            .await?;
        if was_running && let Some(socket) = self.endpoint().socket_path() {
            remove_stale_socket(socket).await?;
        }
        Ok(())
    }

    /// Process alive and the model list answering.
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

async fn remove_stale_socket(socket: &std::path::Path) -> BackendResult<()> {
    match fs::remove_file(socket).await {
        Ok(()) => {
            debug!(path = %socket.display(), "Removed stale socket");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use toke_core::{BackendSettings, DataLayout, Platform, catalog};

    use crate::install::ServerLocator;

    fn context(dir: &std::path::Path, platform: Platform) -> AdapterContext {
        let layout = DataLayout::new(dir.join("data"));
        layout.ensure_all().unwrap();
        AdapterContext::new(layout.clone(), BackendSettings::default())
            .unwrap()
            .with_platform(platform)
            .with_locator(ServerLocator::with_exe_dir(layout, None))
    }

    fn mlx_model() -> ModelOption {
        catalog(Platform::apple_silicon())
            .into_iter()
            .find(|m| m.provider == Provider::Mlx)
            .unwrap()
    }

    #[test]
    fn refuses_non_apple_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let err = MlxBackend::new(context(dir.path(), Platform::generic()), mlx_model()).unwrap_err();
        assert!(matches!(err, BackendError::PlatformUnsupported { .. }));
    }

    #[tokio::test]
    async fn missing_bundle_is_server_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend =
            MlxBackend::new(context(dir.path(), Platform::apple_silicon()), mlx_model()).unwrap();
        let err = backend.ensure_server().await.unwrap_err();
        assert!(matches!(err, BackendError::ServerUnavailable { provider: Provider::Mlx, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn launch_spec_uses_socket_and_bundled_env() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Platform::apple_silicon());
        let layout = ctx.layout.clone();
        std::fs::write(layout.bin_dir().join(SERVER_NAME), b"#!/bin/sh\n").unwrap();
        std::fs::create_dir_all(layout.backends_dir().join(ENV_DIR_NAME)).unwrap();

        let mut backend = MlxBackend::new(ctx, mlx_model()).unwrap();
        backend.ensure_server().await.unwrap();
        backend.model_path = Some(dir.path().join("model"));

        let spec = backend.launch_spec().unwrap();
        if cfg!(unix) {
            assert_eq!(
                spec.flag_value("--socket"),
                Some(&OsString::from(layout.mlx_socket_path()))
            );
        }
        assert_eq!(spec.flag_value("--max-tokens"), Some(&OsString::from("4096")));
        assert!(spec.args.contains(&OsString::from("--trust-remote-code")));
        assert!(spec.env.contains(&(
            OsString::from("MLX_ENV_PATH"),
            layout.backends_dir().join(ENV_DIR_NAME).into_os_string()
        )));
    }

    #[tokio::test]
    async fn start_before_install_is_not_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend =
            MlxBackend::new(context(dir.path(), Platform::apple_silicon()), mlx_model()).unwrap();
        let err = backend.start(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::NotInitialized));
        backend.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stale_socket_removal_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("mlx-server.sock");
        remove_stale_socket(&socket).await.unwrap();
        std::fs::write(&socket, b"").unwrap();
        remove_stale_socket(&socket).await.unwrap();
        assert!(!socket.exists());
    }
}
