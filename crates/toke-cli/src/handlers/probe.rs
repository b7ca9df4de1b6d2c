//! Probe command handler.

use std::fmt::Write as _;

use anyhow::Result;
use toke_core::{Estimated, SystemInfo, format_size};

use crate::bootstrap::CliContext;

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Human-readable capability report; estimated figures are marked `(est.)`.
pub fn render(info: &SystemInfo) -> String {
    let est = |flag: Estimated| if info.estimated.contains(flag) { " (est.)" } else { "" };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Total RAM:      {}{}",
        format_size(info.total_ram),
        est(Estimated::TOTAL_RAM)
    );
    let _ = writeln!(
        out,
        "Available RAM:  {}{}",
        format_size(info.available_ram),
        est(Estimated::AVAILABLE_RAM)
    );
    let _ = writeln!(out, "CPU cores:      {}", info.cpu_cores);
    let _ = writeln!(out, "Apple Silicon:  {}", yes_no(info.is_apple_silicon));
    let _ = writeln!(out, "NVIDIA GPU:     {}", yes_no(info.has_nvidia_gpu));
    let _ = writeln!(out, "AMD GPU:        {}", yes_no(info.has_amd_gpu));
    let _ = writeln!(
        out,
        "Free disk:      {}{}",
        format_size(info.free_disk_space),
        est(Estimated::FREE_DISK)
    );
    out
}

pub fn execute(ctx: &CliContext) -> Result<()> {
    let info = ctx.orchestrator().probe_system()?;
    print!("{}", render(&info));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn estimates_are_marked() {
        let info = SystemInfo {
            total_ram: 16 * GIB,
            available_ram: 8 * GIB,
            cpu_cores: 10,
            is_apple_silicon: true,
            has_nvidia_gpu: false,
            has_amd_gpu: false,
            free_disk_space: 100 * GIB,
            estimated: Estimated::FREE_DISK,
        };
        let out = render(&info);
        assert!(out.contains("Total RAM:      16.0 GB\n"));
        assert!(out.contains("Apple Silicon:  yes\n"));
        assert!(out.contains("Free disk:      100.0 GB (est.)\n"));
    }
}
