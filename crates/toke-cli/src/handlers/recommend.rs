//! Recommend command handler.

use anyhow::Result;
use toke_core::{format_requirement, quick_setup_model, recommend_models};
use tracing::warn;

use crate::bootstrap::CliContext;

pub fn execute(ctx: &CliContext) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let info = orchestrator.probe_system()?;
    if info.is_estimated() {
        warn!(estimated = ?info.estimated, "Some system figures are estimates");
    }

    let models = orchestrator.catalog();
    let picks = recommend_models(&info, &models);
    if picks.is_empty() {
        println!("No catalog model fits this machine.");
        return Ok(());
    }

    let default = quick_setup_model(&info, &models).map(|m| m.id);
    for model in &picks {
        let mark = if default.as_deref() == Some(model.id.as_str()) {
            "  (default for `toke serve`)"
        } else {
            ""
        };
        println!("{} [{}]{mark}", model.name, model.id);
        println!("    {}", model.description);
        println!("    {}", format_requirement(model, &info));
    }
    Ok(())
}
