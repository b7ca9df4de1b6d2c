//! Serve command handler.
//!
//! Installs and starts a backend, prints its endpoint, then blocks until
//! Ctrl-C and shuts the process down cleanly.

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toke_core::{BackendError, ModelOption};
use tracing::{info, warn};

use crate::bootstrap::CliContext;
use crate::progress::CliProgress;

/// Cancel `cancel` on the first Ctrl-C. The watcher ends with the token.
pub fn cancel_on_ctrl_c(cancel: &CancellationToken) -> JoinHandle<()> {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = cancel.cancelled() => {}
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                    return;
                }
                info!("Interrupt received, shutting down");
                cancel.cancel();
            }
        }
    })
}

async fn install_and_start(
    ctx: &CliContext,
    model: Option<&str>,
    cancel: &CancellationToken,
) -> Result<ModelOption, BackendError> {
    let orchestrator = ctx.orchestrator();
    let progress = CliProgress::new();

    let result = match model {
        None => {
            orchestrator
                .quick_setup(cancel, progress.status_callback(), progress.progress_callback())
                .await
        }
        Some(id) => {
            match orchestrator
                .setup_model_by_id(cancel, id, progress.progress_callback())
                .await
            {
                Ok(model) => {
                    progress.finish("installed");
                    progress.message("Starting AI server...");
                    orchestrator.start(cancel).await.map(|()| model)
                }
                Err(e) => Err(e),
            }
        }
    };

    match &result {
        Ok(_) => progress.finish("ready"),
        Err(_) => progress.abandon("failed"),
    }
    result
}

pub async fn execute(ctx: &CliContext, model: Option<String>) -> Result<()> {
    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(&cancel);

    let model = match install_and_start(ctx, model.as_deref(), &cancel).await {
        Ok(model) => model,
        Err(BackendError::Cancelled) => {
            ctx.orchestrator().stop().await?;
            println!("Cancelled.");
            return Ok(());
        }
        Err(e) => {
            cancel.cancel();
            if let Err(stop_err) = ctx.orchestrator().stop().await {
                warn!(error = %stop_err, "Failed to stop backend after setup error");
            }
            return Err(e.into());
        }
    };

    let endpoint = ctx.orchestrator().get_endpoint().await?;
    println!();
    println!("  {} is running ({})", model.name, model.provider.display_name());
    println!("  Endpoint: {endpoint}");
    println!();
    println!("  Press Ctrl+C to stop");

    cancel.cancelled().await;
    let _ = watcher.await;

    ctx.orchestrator().stop().await?;
    println!("Server stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn watcher_exits_with_the_token() {
        let cancel = CancellationToken::new();
        let watcher = cancel_on_ctrl_c(&cancel);
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .expect("watcher should stop once cancelled")
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_model_fails_before_touching_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = crate::bootstrap(crate::CliConfig {
            data_dir: Some(dir.path().to_path_buf()),
            settings_file: None,
        })
        .await
        .unwrap();

        let err = execute(&ctx, Some("no-such-model".to_string()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no-such-model"));
        assert!(!ctx.orchestrator().is_running().await);
    }
}
