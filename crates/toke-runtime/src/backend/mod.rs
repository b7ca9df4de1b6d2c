//! Provider adapters behind one closed enum.
//!
//! Each adapter composes the installer and a [`Supervisor`](crate::process::Supervisor)
//! for its provider. [`Backend`] dispatches the shared contract by `match`.

mod context;
mod llama;
mod mlx;

pub use context::AdapterContext;
pub use llama::{LlamaCppBackend, release_asset};
pub use mlx::MlxBackend;

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use toke_core::{
    BackendResult, BackendState, Endpoint, ModelOption, ProgressCallback, Provider,
};

#[derive(Debug)]
pub enum Backend {
    Mlx(MlxBackend),
    LlamaCpp(LlamaCppBackend),
}

impl Backend {
    /// Adapter for `model`'s provider.
    pub fn for_model(ctx: AdapterContext, model: ModelOption) -> BackendResult<Self> {
        Ok(match model.provider {
            Provider::Mlx => Self::Mlx(MlxBackend::new(ctx, model)?),
            Provider::LlamaCpp => Self::LlamaCpp(LlamaCppBackend::new(ctx, model)),
        })
    }

    pub const fn provider(&self) -> Provider {
        match self {
            Self::Mlx(_) => Provider::Mlx,
            Self::LlamaCpp(_) => Provider::LlamaCpp,
        }
    }

    pub const fn model(&self) -> &ModelOption {
        match self {
            Self::Mlx(b) => b.model(),
            Self::LlamaCpp(b) => b.model(),
        }
    }

    pub async fn ensure_server(
        &mut self,
        cancel: &CancellationToken,
        progress: &ProgressCallback,
    ) -> BackendResult<PathBuf> {
        match self {
            Self::Mlx(b) => b.ensure_server().await,
            Self::LlamaCpp(b) => b.ensure_server(cancel, progress).await,
        }
    }

    pub async fn ensure_model(
        &mut self,
        cancel: &CancellationToken,
        progress: &ProgressCallback,
    ) -> BackendResult<PathBuf> {
        match self {
            Self::Mlx(b) => b.ensure_model(cancel, progress).await,
            Self::LlamaCpp(b) => b.ensure_model(cancel, progress).await,
        }
    }

    pub async fn start(&mut self, cancel: &CancellationToken) -> BackendResult<()> {
        match self {
            Self::Mlx(b) => b.start(cancel).await,
            Self::LlamaCpp(b) => b.start(cancel).await,
        }
    }

    pub async fn stop(&mut self) -> BackendResult<()> {
        match self {
            Self::Mlx(b) => b.stop().await,
            Self::LlamaCpp(b) => b.stop().await,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Mlx(b) => b.endpoint(),
            Self::LlamaCpp(b) => b.endpoint(),
        }
    }

    pub async fn is_running(&mut self) -> bool {
        match self {
            Self::Mlx(b) => b.is_running().await,
            Self::LlamaCpp(b) => b.is_running().await,
        }
    }

    pub fn is_process_alive(&mut self) -> bool {
        match self {
            Self::Mlx(b) => b.is_process_alive(),
            Self::LlamaCpp(b) => b.is_process_alive(),
        }
    }

    pub const fn state(&self) -> BackendState {
        match self {
            Self::Mlx(b) => b.state(),
            Self::LlamaCpp(b) => b.state(),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        match self {
            Self::Mlx(b) => b.pid(),
            Self::LlamaCpp(b) => b.pid(),
        }
    }
}
