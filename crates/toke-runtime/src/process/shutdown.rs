//! Interrupt-then-kill shutdown for backend children.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tokio::time::timeout;
#[cfg(unix)]
use tracing::debug;

/// Stop a child with SIGINT, escalating to SIGKILL after `grace`.
///
/// Backends treat SIGINT like Ctrl-C and flush before exiting. The child is
/// always reaped. On non-Unix targets the child is killed immediately.
pub async fn shutdown_child(mut child: Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        interrupt_then_kill(&mut child, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        child.kill().await?;
        child.wait().await
    }
}

#[cfg(unix)]
async fn interrupt_then_kill(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        // Already reaped by a previous try_wait.
        return child.wait().await;
    };
    let pid = i32::try_from(pid).map_err(|_| io::Error::other("pid out of range"))?;

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGINT) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        return result;
    }

    debug!(pid, grace_ms = grace.as_millis(), "Process ignored SIGINT, killing");
    child.kill().await?;
    child.wait().await
}
