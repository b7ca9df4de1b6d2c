//! GPU vendor detection.

use std::process::Command;

fn command_succeeds(cmd: &str, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// `lspci` output, lowercased, or `None` when unavailable.
#[cfg(target_os = "linux")]
fn lspci_lowercase() -> Option<String> {
    let output = Command::new("lspci").output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_lowercase())
}

/// Detect if NVIDIA GPU hardware is present (regardless of CUDA installation).
pub fn detect_nvidia_gpu() -> bool {
    if command_succeeds("nvidia-smi", &["--list-gpus"]) {
        return true;
    }

    #[cfg(target_os = "linux")]
    {
        if lspci_lowercase().is_some_and(|out| out.contains("nvidia")) {
            return true;
        }
    }

    false
}

/// Detect AMD GPU hardware via ROCm tooling or the PCI listing.
pub fn detect_amd_gpu() -> bool {
    if command_succeeds("rocm-smi", &["--showproductname"]) {
        return true;
    }

    #[cfg(target_os = "linux")]
    {
        if lspci_lowercase().is_some_and(|out| {
            out.lines().any(|line| {
                (line.contains("vga") || line.contains("display") || line.contains("3d"))
                    && (line.contains("amd") || line.contains("ati") || line.contains("radeon"))
            })
        }) {
            return true;
        }
    }

    false
}
