//! Paths command handler.
//!
//! Prints every directory toke reads or writes in `key = value` form.

use std::fmt::Write as _;

use anyhow::Result;
use toke_core::DataLayout;

use crate::bootstrap::CliContext;

pub fn render(layout: &DataLayout) -> String {
    let mut out = String::new();
    let rows = [
        ("data_root", layout.root().to_path_buf()),
        ("bin_dir", layout.bin_dir()),
        ("backends_dir", layout.backends_dir()),
        ("models_dir", layout.models_dir()),
        ("cache_dir", layout.cache_dir()),
        ("mlx_socket", layout.mlx_socket_path()),
    ];
    for (key, path) in rows {
        let _ = writeln!(out, "{key} = {}", path.display());
    }
    out
}

pub fn execute(ctx: &CliContext) -> Result<()> {
    print!("{}", render(&ctx.layout));
    Ok(())
}
