//! Façade binding a catalog model to a backend adapter.
//!
//! All lifecycle transitions go through one `tokio::sync::Mutex`, so a
//! `setup_model` racing a `start` simply queues behind it.

mod monitor;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toke_core::{
    BackendError, BackendResult, BackendState, Endpoint, ModelOption, ProgressCallback,
    ReadinessTiming, StatusCallback, SystemInfo, SystemProbePort, catalog, model_by_id,
    quick_setup_model,
};
use tracing::{info, warn};

use crate::backend::{AdapterContext, Backend};

/// Cadence of the final connection check in [`Orchestrator::quick_setup`].
pub const QUICK_SETUP_READINESS: ReadinessTiming = ReadinessTiming {
    interval: Duration::from_millis(500),
    timeout: Duration::from_secs(30),
};

#[derive(Debug, Default)]
struct State {
    backend: Option<Backend>,
    running: bool,
    session: Option<CancellationToken>,
    monitor: Option<JoinHandle<()>>,
}

impl State {
    fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
        self.monitor = None;
    }
}

struct Inner {
    ctx: AdapterContext,
    probe: Arc<dyn SystemProbePort>,
    state: Mutex<State>,
}

/// Owns the bound backend and its health monitor.
///
/// Cheap to clone; clones share the same backend.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("ctx", &self.inner.ctx)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(ctx: AdapterContext, probe: Arc<dyn SystemProbePort>) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                probe,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn context(&self) -> &AdapterContext {
        &self.inner.ctx
    }

    /// Probe the host the data directory lives on.
    pub fn probe_system(&self) -> BackendResult<SystemInfo> {
        Ok(self.inner.probe.probe(self.inner.ctx.layout.root())?)
    }

    /// Catalog for this orchestrator's platform.
    pub fn catalog(&self) -> Vec<ModelOption> {
        catalog(self.inner.ctx.platform)
    }

    /// Bind `model`, stopping any running backend first, and install its
    /// server and weights.
    ///
    /// Server bytes are reported at a tenth of their size on top of the
    /// model size, so one bar covers both downloads.
    pub async fn setup_model(
        &self,
        cancel: &CancellationToken,
        model: &ModelOption,
        progress: ProgressCallback,
    ) -> BackendResult<()> {
        let ctx = &self.inner.ctx;
        ctx.layout.ensure_all()?;

        let mut state = self.inner.state.lock().await;
        Self::stop_locked(&mut state).await?;
        state.backend = None;

        let mut backend = Backend::for_model(ctx.clone(), model.clone())?;

        info!(provider = %model.provider, model = %model.id, "Checking server installation");
        let model_size = model.size;
        let scaled = Arc::clone(&progress);
        let server_progress: ProgressCallback = Arc::new(move |downloaded: u64, total: u64| {
            scaled(downloaded / 10, model_size + total / 10);
        });
        backend.ensure_server(cancel, &server_progress).await?;

        info!(model = %model.name, size = %toke_core::format_size(model.size), "Checking model files");
        backend.ensure_model(cancel, &progress).await?;

        state.backend = Some(backend);
        Ok(())
    }

    /// [`setup_model`](Self::setup_model) by catalog id.
    pub async fn setup_model_by_id(
        &self,
        cancel: &CancellationToken,
        model_id: &str,
        progress: ProgressCallback,
    ) -> BackendResult<ModelOption> {
        let models = self.catalog();
        let model = model_by_id(&models, model_id)
            .cloned()
            .ok_or_else(|| BackendError::UnknownModel(model_id.to_string()))?;
        self.setup_model(cancel, &model, progress).await?;
        Ok(model)
    }

    /// Start the bound backend and its health monitor. No-op when running.
    pub async fn start(&self, cancel: &CancellationToken) -> BackendResult<()> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let Some(backend) = state.backend.as_mut() else {
            return Err(BackendError::NotInitialized);
        };
        if state.running && backend.is_running().await {
            return Ok(());
        }

        info!(provider = %backend.provider(), "Starting local AI backend");
        backend.start(cancel).await?;

        state.end_session();
        let session = cancel.child_token();
        let settings = &self.inner.ctx.settings;
        state.monitor = Some(monitor::spawn(
            Arc::downgrade(&self.inner),
            session.clone(),
            settings.effective_health_interval(),
            settings.effective_restart_policy(),
        ));
        state.session = Some(session);
        state.running = true;
        Ok(())
    }

    /// Stop the backend and its monitor. No-op when not running.
    pub async fn stop(&self) -> BackendResult<()> {
        let mut state = self.inner.state.lock().await;
        Self::stop_locked(&mut state).await
    }

    async fn stop_locked(state: &mut State) -> BackendResult<()> {
        state.end_session();
        if !state.running {
            return Ok(());
        }
        state.running = false;
        match state.backend.as_mut() {
            Some(backend) => backend.stop().await,
            None => Ok(()),
        }
    }

    /// API endpoint of the running backend.
    pub async fn get_endpoint(&self) -> BackendResult<Endpoint> {
        let state = self.inner.state.lock().await;
        match state.backend.as_ref() {
            Some(backend) if state.running => Ok(backend.endpoint()),
            _ => Err(BackendError::NotRunning),
        }
    }

    /// Running flag set, process alive, and the endpoint answering.
    pub async fn is_running(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        if !state.running {
            return false;
        }
        match state.backend.as_mut() {
            Some(backend) => backend.is_running().await,
            _ => false,
        }
    }

    pub async fn state(&self) -> Option<BackendState> {
        let state = self.inner.state.lock().await;
        state.backend.as_ref().map(Backend::state)
    }

    pub async fn pid(&self) -> Option<u32> {
        let state = self.inner.state.lock().await;
        state.backend.as_ref().and_then(Backend::pid)
    }

    /// Model bound by the last successful `setup_model`.
    pub async fn current_model(&self) -> Option<ModelOption> {
        let state = self.inner.state.lock().await;
        state.backend.as_ref().map(|b| b.model().clone())
    }

    /// Probe, pick a model, install it, start it and confirm it answers.
    ///
    /// `status` receives each phase name once; `progress` receives the byte
    /// counts of the model download.
    pub async fn quick_setup(
        &self,
        cancel: &CancellationToken,
        status: StatusCallback,
        progress: ProgressCallback,
    ) -> BackendResult<ModelOption> {
        let info = self.probe_system()?;
        if info.is_estimated() {
            warn!(estimated = ?info.estimated, "Some system figures are estimates");
        }
        let models = self.catalog();
        let model = quick_setup_model(&info, &models).ok_or(BackendError::NoSuitableModel)?;
        info!(model = %model.id, provider = %model.provider, "Quick setup selected model");

        status("Preparing setup...");

        let last = Arc::new(StdMutex::new(String::new()));
        let download_status = Arc::clone(&status);
        let forward: ProgressCallback = Arc::new(move |downloaded: u64, total: u64| {
            progress(downloaded, total);
            let phase = if total > 0 && downloaded >= total {
                "Model ready!"
            } else {
                "Downloading model..."
            };
            let changed = last.lock().is_ok_and(|mut last| {
                if last.as_str() == phase {
                    false
                } else {
                    *last = phase.to_string();
                    true
                }
            });
            if changed {
                download_status(phase);
            }
        });
        self.setup_model(cancel, &model, forward).await?;

        status("Starting AI server...");
        self.start(cancel).await?;

        status("Verifying connection...");
        self.wait_until_running(cancel, QUICK_SETUP_READINESS).await?;

        status("Ready!");
        Ok(model)
    }

    /// Poll [`is_running`](Self::is_running) until it holds or `timing.timeout` passes.
    pub async fn wait_until_running(
        &self,
        cancel: &CancellationToken,
        timing: ReadinessTiming,
    ) -> BackendResult<()> {
        let deadline = tokio::time::Instant::now() + timing.timeout;
        loop {
            if self.is_running().await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                let provider = self
                    .current_model()
                    .await
                    .map(|m| m.provider)
                    .ok_or(BackendError::NotInitialized)?;
                return Err(BackendError::ReadinessTimeout {
                    provider,
                    timeout: timing.timeout,
                });
            }
            tokio::select! {
                () = cancel.cancelled() => return Err(BackendError::Cancelled),
                () = tokio::time::sleep(timing.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toke_core::ports::SystemProbeResult;
    use toke_core::{BackendSettings, DataLayout, Estimated, Platform, noop_progress};

    use crate::install::ServerLocator;

    struct FixedProbe(SystemInfo);

    impl SystemProbePort for FixedProbe {
        fn probe(&self, _data_dir: &std::path::Path) -> SystemProbeResult<SystemInfo> {
            Ok(self.0.clone())
        }
    }

    fn orchestrator(dir: &std::path::Path) -> Orchestrator {
        let layout = DataLayout::new(dir.join("data"));
        let ctx = AdapterContext::new(layout.clone(), BackendSettings::default())
            .unwrap()
            .with_platform(Platform::generic())
            .with_locator(ServerLocator::with_exe_dir(layout, None));
        let info = SystemInfo {
            total_ram: 16 << 30,
            available_ram: 8 << 30,
            cpu_cores: 8,
            is_apple_silicon: false,
            has_nvidia_gpu: false,
            has_amd_gpu: false,
            free_disk_space: 100 << 30,
            estimated: Estimated::empty(),
        };
        Orchestrator::new(ctx, Arc::new(FixedProbe(info)))
    }

    #[tokio::test]
    async fn start_without_setup_is_not_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let err = orch.start(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::NotInitialized));
    }

    #[tokio::test]
    async fn stop_and_endpoint_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        orch.stop().await.unwrap();
        assert!(matches!(orch.get_endpoint().await, Err(BackendError::NotRunning)));
        assert!(!orch.is_running().await);
        assert!(orch.current_model().await.is_none());
    }

    #[tokio::test]
    async fn mlx_model_on_generic_host_is_platform_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let mlx = catalog(Platform::apple_silicon())
            .into_iter()
            .find(|m| m.id == "glm-4.5-air-3bit")
            .unwrap();

        let err = orch
            .setup_model(&CancellationToken::new(), &mlx, noop_progress())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::PlatformUnsupported { .. }));
        assert!(dir.path().join("data/models").is_dir());
        assert!(orch.current_model().await.is_none());
    }

    #[tokio::test]
    async fn unknown_model_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let err = orch
            .setup_model_by_id(&CancellationToken::new(), "gpt-5", noop_progress())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::UnknownModel(id) if id == "gpt-5"));
    }
}
