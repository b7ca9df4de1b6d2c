//! Per-backend lifecycle state machine around a [`ProcessLease`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use toke_core::{BackendError, BackendResult, BackendState, Provider};
use tracing::{info, warn};

use super::lease::{LaunchSpec, ProcessLease};
use super::readiness::ReadinessProbe;

/// Owns at most one running backend process and its [`BackendState`].
#[derive(Debug)]
pub struct Supervisor {
    provider: Provider,
    state: BackendState,
    lease: Option<ProcessLease>,
}

impl Supervisor {
    pub const fn new(provider: Provider) -> Self {
        Self {
            provider,
            state: BackendState::NotInstalled,
            lease: None,
        }
    }

    pub const fn state(&self) -> BackendState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.lease.as_ref().map(ProcessLease::pid)
    }

    /// Record that server and model are on disk.
    pub fn mark_installed(&mut self) {
        if self.state == BackendState::NotInstalled {
            self.state = BackendState::Installed;
        }
    }

    /// Whether a lease is held and its process is still alive.
    ///
    /// A process found dead is released and the state moves to `Failed`.
    pub fn is_alive(&mut self) -> bool {
        let Some(lease) = self.lease.as_mut() else {
            return false;
        };
        if !lease.has_exited() {
            return true;
        }
        warn!(provider = %self.provider, pid = lease.pid(), "Backend process exited unexpectedly");
        self.lease = None;
        self.state = BackendState::Failed;
        false
    }

    /// Launch `spec` and wait until `probe` reports ready.
    ///
    /// No-op while a live process is held. On readiness failure or
    /// cancellation the process is torn down and the state is `Failed`.
    pub async fn start(
        &mut self,
        spec: &LaunchSpec,
        probe: &ReadinessProbe,
        grace: Duration,
        cancel: &CancellationToken,
    ) -> BackendResult<()> {
        if self.is_alive() {
            return Ok(());
        }
        if !self.state.is_installed() {
            return Err(BackendError::NotInitialized);
        }

        self.state = BackendState::Starting;
        let mut lease = match ProcessLease::spawn(self.provider, spec) {
            Ok(lease) => lease,
            Err(e) => {
                self.state = BackendState::Failed;
                return Err(e);
            }
        };
        info!(provider = %self.provider, pid = lease.pid(), program = %spec.program.display(), "Backend process started");

        let ready = probe.wait_for_ready(cancel, || lease.has_exited()).await;
        match ready {
            Ok(()) => {
                self.lease = Some(lease);
                self.state = BackendState::Running;
                Ok(())
            }
            Err(e) => {
                let pid = lease.pid();
                if let Err(release_err) = lease.release(grace).await {
                    warn!(provider = %self.provider, pid, error = %release_err, "Failed to tear down backend");
                }
                self.state = BackendState::Failed;
                Err(e)
            }
        }
    }

    /// Interrupt, wait `grace`, then kill. Always ends `Stopped` with the
    /// lease released; a never-started backend is a no-op.
    pub async fn stop(&mut self, grace: Duration) -> BackendResult<()> {
        let Some(lease) = self.lease.take() else {
            if self.state.is_installed() {
                self.state = BackendState::Stopped;
            }
            return Ok(());
        };

        self.state = BackendState::Stopping;
        let pid = lease.pid();
        match lease.release(grace).await {
            Ok(status) => info!(provider = %self.provider, pid, %status, "Backend stopped"),
            Err(e) => warn!(provider = %self.provider, pid, error = %e, "Error while stopping backend"),
        }
        self.state = BackendState::Stopped;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use toke_core::{Endpoint, ReadinessTiming};

    use crate::process::readiness::ReadinessCheck;

    fn unreachable_probe(timeout_ms: u64) -> ReadinessProbe {
        ReadinessProbe::new(
            Provider::LlamaCpp,
            Endpoint::loopback(1),
            ReadinessCheck::Health,
            ReadinessTiming {
                interval: Duration::from_millis(50),
                timeout: Duration::from_millis(timeout_ms),
            },
            Client::new(),
        )
    }

    #[tokio::test]
    async fn start_requires_install() {
        let mut supervisor = Supervisor::new(Provider::LlamaCpp);
        let err = supervisor
            .start(
                &LaunchSpec::new("sleep").arg("30"),
                &unreachable_probe(100),
                Duration::from_secs(1),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotInitialized));
        assert_eq!(supervisor.state(), BackendState::NotInstalled);
    }

    #[tokio::test]
    async fn stop_without_start_is_ok() {
        let mut supervisor = Supervisor::new(Provider::Mlx);
        supervisor.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(supervisor.state(), BackendState::NotInstalled);

        supervisor.mark_installed();
        supervisor.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(supervisor.state(), BackendState::Stopped);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn readiness_timeout_leaves_failed_without_process() {
        let mut supervisor = Supervisor::new(Provider::LlamaCpp);
        supervisor.mark_installed();

        let err = supervisor
            .start(
                &LaunchSpec::new("sleep").arg("30"),
                &unreachable_probe(300),
                Duration::from_secs(1),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::ReadinessTimeout { .. }));
        assert_eq!(supervisor.state(), BackendState::Failed);
        assert!(supervisor.pid().is_none());
        assert!(!supervisor.is_alive());
    }
}
