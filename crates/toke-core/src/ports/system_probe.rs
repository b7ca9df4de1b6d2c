//! System probe port for host capability detection.
//!
//! The core decides which models fit a host from a [`SystemInfo`] snapshot;
//! producing that snapshot (reading `/proc`, running `sysctl`, listing disks)
//! is the adapter's job.

use std::path::Path;

use thiserror::Error;

use crate::system::SystemInfo;

/// Errors that can occur during system probing.
///
/// Probes are expected to degrade to estimates rather than fail; the default
/// adapter never does. Adapters without any fallback figure report this.
#[derive(Debug, Error)]
pub enum SystemProbeError {
    /// System memory query failed.
    #[error("Memory query failed: {0}")]
    MemoryQueryFailed(String),
}

/// Result type for system probe operations.
pub type SystemProbeResult<T> = Result<T, SystemProbeError>;

/// Port for probing host hardware.
pub trait SystemProbePort: Send + Sync {
    /// Snapshot RAM, CPU, GPU and free space on the filesystem holding
    /// `data_dir`. Never cached; every call probes again.
    fn probe(&self, data_dir: &Path) -> SystemProbeResult<SystemInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Provider, catalog};
    use crate::system::{Estimated, recommend_models};
    use mockall::mock;
    use std::path::PathBuf;

    mock! {
        Probe {}
        impl SystemProbePort for Probe {
            fn probe(&self, data_dir: &Path) -> SystemProbeResult<SystemInfo>;
        }
    }

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn recommendations_follow_probed_capabilities() {
        let mut probe = MockProbe::new();
        probe
            .expect_probe()
            .withf(|dir| dir == Path::new("/data/toke"))
            .times(1)
            .returning(|_| {
                Ok(SystemInfo {
                    total_ram: 8 * GIB,
                    available_ram: 4 * GIB,
                    cpu_cores: 4,
                    is_apple_silicon: false,
                    has_nvidia_gpu: true,
                    has_amd_gpu: false,
                    free_disk_space: 50 * GIB,
                    estimated: Estimated::FREE_DISK,
                })
            });

        let dir = PathBuf::from("/data/toke");
        let info = probe.probe(&dir).unwrap();
        let models = catalog(info.platform());
        let picks = recommend_models(&info, &models);

        assert!(info.is_estimated());
        assert!(!picks.is_empty());
        assert!(picks.iter().all(|m| m.provider == Provider::LlamaCpp));
        assert!(picks.iter().all(|m| m.memory <= info.total_ram));
    }

    #[test]
    fn adapter_errors_render_context() {
        let mut probe = MockProbe::new();
        probe.expect_probe().returning(|dir| {
            Err(SystemProbeError::MemoryQueryFailed(format!(
                "no counters under {}",
                dir.display()
            )))
        });

        let err = probe.probe(Path::new("/nowhere")).unwrap_err();
        assert_eq!(err.to_string(), "Memory query failed: no counters under /nowhere");

        let err = crate::BackendError::from(err);
        assert!(matches!(err, crate::BackendError::Probe(_)));
    }
}
