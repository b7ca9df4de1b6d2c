//! Setup command handler.
//!
//! Installs the server and weights for one catalog model, leaving it ready
//! for `toke serve --model <id>`.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use toke_core::format_size;

use crate::bootstrap::CliContext;
use crate::progress::CliProgress;

use super::serve::cancel_on_ctrl_c;

pub async fn execute(ctx: &CliContext, model_id: &str) -> Result<()> {
    let cancel = CancellationToken::new();
    let _watcher = cancel_on_ctrl_c(&cancel);
    let _guard = cancel.clone().drop_guard();

    let progress = CliProgress::new();
    let result = ctx
        .orchestrator()
        .setup_model_by_id(&cancel, model_id, progress.progress_callback())
        .await;

    match result {
        Ok(model) => {
            progress.finish("installed");
            println!(
                "{} is installed ({} on disk, needs {} RAM).",
                model.name,
                format_size(model.size),
                format_size(model.memory)
            );
            Ok(())
        }
        Err(e) => {
            progress.abandon("setup failed");
            Err(e.into())
        }
    }
}
