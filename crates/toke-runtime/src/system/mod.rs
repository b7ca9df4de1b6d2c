//! System probe implementation for toke-runtime.
//!
//! `DefaultSystemProbe` implements `SystemProbePort` from toke-core by
//! reading platform memory counters, listing disks and running the usual GPU
//! vendor tools.

mod disk;
mod gpu;
mod memory;

use std::path::Path;

use toke_core::ports::{SystemProbePort, SystemProbeResult};
use toke_core::{Estimated, SystemInfo};
use tracing::debug;

use gpu::{detect_amd_gpu, detect_nvidia_gpu};
use memory::MemoryReading;

/// Default implementation of `SystemProbePort`.
///
/// Best-effort: figures that cannot be measured fall back to conservative
/// values and are flagged in [`SystemInfo::estimated`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSystemProbe;

impl DefaultSystemProbe {
    pub const fn new() -> Self {
        Self
    }
}

impl SystemProbePort for DefaultSystemProbe {
    fn probe(&self, data_dir: &Path) -> SystemProbeResult<SystemInfo> {
        let mut estimated = Estimated::empty();

        let (total_ram, available_ram) = memory_figures(memory::read_memory(), &mut estimated);

        let free_disk_space = disk::free_space_for(data_dir).unwrap_or_else(|| {
            estimated |= Estimated::FREE_DISK;
            disk::FALLBACK_FREE_SPACE
        });

        let info = SystemInfo {
            total_ram,
            available_ram,
            cpu_cores: num_cpus::get(),
            is_apple_silicon: is_apple_silicon(),
            has_nvidia_gpu: detect_nvidia_gpu(),
            has_amd_gpu: detect_amd_gpu(),
            free_disk_space,
            estimated,
        };

        debug!(
            total_ram = info.total_ram,
            available_ram = info.available_ram,
            free_disk = info.free_disk_space,
            cores = info.cpu_cores,
            apple_silicon = info.is_apple_silicon,
            estimated = ?info.estimated,
            "Probed system capabilities"
        );

        Ok(info)
    }
}

/// Total and available RAM, substituting estimates for whatever the reading
/// lacks. Available RAM defaults to half the total.
fn memory_figures(reading: Option<MemoryReading>, estimated: &mut Estimated) -> (u64, u64) {
    let reading = reading.unwrap_or_else(|| {
        *estimated |= Estimated::TOTAL_RAM;
        MemoryReading {
            total: memory::FALLBACK_TOTAL_RAM,
            available: None,
        }
    });
    let available = reading.available.unwrap_or_else(|| {
        *estimated |= Estimated::AVAILABLE_RAM;
        reading.total / 2
    });
    (reading.total, available)
}

/// Apple Silicon, including x86_64 builds running under Rosetta.
fn is_apple_silicon() -> bool {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        return true;
    }
    #[cfg(target_os = "macos")]
    {
        if memory::sysctl("hw.optional.arm64").as_deref() == Some("1") {
            return true;
        }
    }
    false
}
