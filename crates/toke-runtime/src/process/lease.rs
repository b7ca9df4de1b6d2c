//! Scoped ownership of a spawned backend process.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::{CancellationToken, DropGuard};
use toke_core::{BackendError, BackendResult, Provider};

use super::logs::spawn_log_readers;
use super::shutdown::shutdown_child;

/// Program, arguments and environment for one backend launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
    pub current_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Value of `--flag` in the argument list.
    pub fn flag_value(&self, flag: &str) -> Option<&OsString> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// A running backend child.
///
/// Dropping the lease kills the child and stops its log drains; [`release`]
/// does the same gracefully.
///
/// [`release`]: ProcessLease::release
#[derive(Debug)]
pub struct ProcessLease {
    child: Child,
    pid: u32,
    provider: Provider,
    logs: DropGuard,
}

impl ProcessLease {
    /// Launch `spec` and start forwarding its output to `tracing`.
    pub fn spawn(provider: Provider, spec: &LaunchSpec) -> BackendResult<Self> {
        let mut child = spec.command().spawn().map_err(|e| {
            BackendError::spawn_failed(provider, format!("{}: {e}", spec.program.display()))
        })?;
        let pid = child
            .id()
            .ok_or_else(|| BackendError::spawn_failed(provider, "child exited before reporting a pid"))?;

        let logs = CancellationToken::new();
        spawn_log_readers(&mut child, provider, &logs);

        Ok(Self {
            child,
            pid,
            provider,
            logs: logs.drop_guard(),
        })
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    pub const fn provider(&self) -> Provider {
        self.provider
    }

    /// Whether the OS reports the child gone. Reaps it if so.
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Interrupt the child, kill it after `grace`, and reap it.
    pub async fn release(self, grace: Duration) -> io::Result<ExitStatus> {
        let Self { child, logs, .. } = self;
        let status = shutdown_child(child, grace).await;
        drop(logs);
        status
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_reports_pid_and_release_reaps() {
        let spec = LaunchSpec::new("sleep").arg("30");
        let mut lease = ProcessLease::spawn(Provider::LlamaCpp, &spec).unwrap();
        assert!(lease.pid() > 0);
        assert!(!lease.has_exited());

        let status = lease.release(Duration::from_secs(5)).await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn missing_program_is_spawn_failure() {
        let spec = LaunchSpec::new("/nonexistent/toke-server");
        let err = ProcessLease::spawn(Provider::Mlx, &spec).unwrap_err();
        assert!(matches!(err, BackendError::SpawnFailed { provider: Provider::Mlx, .. }));
    }

    #[tokio::test]
    async fn exited_child_is_detected() {
        let spec = LaunchSpec::new("true");
        let mut lease = ProcessLease::spawn(Provider::LlamaCpp, &spec).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(lease.has_exited());
    }

    #[test]
    fn flag_value_finds_following_argument() {
        let spec = LaunchSpec::new("llama-server")
            .arg("--port")
            .arg("11434")
            .arg("--jinja");
        assert_eq!(spec.flag_value("--port"), Some(&OsString::from("11434")));
        assert!(spec.flag_value("--jinja").is_none());
        assert!(spec.flag_value("--model").is_none());
    }
}
