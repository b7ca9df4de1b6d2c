//! Models command handler.
//!
//! Lists the catalog grouped by tier, with the recommended pick marked.

use std::fmt::Write as _;

use anyhow::Result;
use toke_core::{ModelOption, Tier, format_size, models_by_tier};

use crate::bootstrap::CliContext;

pub fn render(models: &[ModelOption], include_unavailable: bool) -> String {
    let mut out = String::new();
    for tier in Tier::ALL {
        let listed: Vec<_> = models_by_tier(models, tier)
            .into_iter()
            .filter(|m| include_unavailable || m.available)
            .collect();
        if listed.is_empty() {
            continue;
        }

        let _ = writeln!(out, "{} - {}", tier.display_name(), tier.description());
        for model in listed {
            let mark = if model.recommended { "*" } else { " " };
            let _ = write!(
                out,
                " {mark} {:<24} {:<10} {:>9} download, {:>9} RAM  {}",
                model.id,
                model.provider.display_name(),
                format_size(model.size),
                format_size(model.memory),
                model.name,
            );
            if let Some(reason) = model.unavailable_reason.as_deref().filter(|_| !model.available) {
                let _ = write!(out, " (unavailable: {reason})");
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

pub fn execute(ctx: &CliContext, all: bool) -> Result<()> {
    let models = ctx.orchestrator().catalog();
    print!("{}", render(&models, all));
    println!("* recommended");
    Ok(())
}
