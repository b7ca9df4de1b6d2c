//! Background liveness polling with bounded restarts.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use toke_core::RestartPolicy;
use tracing::{debug, error, info, warn};

use super::Inner;

enum Health {
    Healthy,
    /// Process alive but the endpoint did not answer.
    Unresponsive,
    Dead,
    /// Backend unbound or session over.
    Gone,
}

/// Poll every `every` until `cancel` fires or the orchestrator is dropped.
///
/// A dead process is restarted after `policy`'s backoff. Attempts reset
/// whenever a poll finds the backend healthy; once the budget is spent the
/// backend is marked stopped and the monitor exits.
pub(super) fn spawn(
    inner: Weak<Inner>,
    cancel: CancellationToken,
    every: Duration,
    policy: RestartPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match check(&inner, &cancel).await {
                Health::Healthy => attempt = 0,
                Health::Unresponsive => {
                    warn!("Backend process is alive but not answering health checks");
                }
                Health::Gone => break,
                Health::Dead => {
                    let Some(delay) = policy.delay_for(attempt) else {
                        error!(attempts = attempt, "Backend keeps crashing, giving up on restarts");
                        mark_stopped(&inner, &cancel).await;
                        break;
                    };
                    attempt += 1;
                    warn!(attempt, delay_ms = delay.as_millis(), "Backend stopped unexpectedly, restarting");

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = sleep(delay) => {}
                    }
                    if !restart(&inner, &cancel).await {
                        break;
                    }
                }
            }
        }
        debug!("Health monitor stopped");
    })
}

async fn check(inner: &Weak<Inner>, cancel: &CancellationToken) -> Health {
    let Some(inner) = inner.upgrade() else {
        return Health::Gone;
    };
    let mut state = inner.state.lock().await;
    if cancel.is_cancelled() || !state.running {
        return Health::Gone;
    }
    let Some(backend) = state.backend.as_mut() else {
        return Health::Gone;
    };
    if backend.is_running().await {
        Health::Healthy
    } else if backend.is_process_alive() {
        Health::Unresponsive
    } else {
        Health::Dead
    }
}

/// Returns false when the monitor should exit.
async fn restart(inner: &Weak<Inner>, cancel: &CancellationToken) -> bool {
    let Some(inner) = inner.upgrade() else {
        return false;
    };
    let mut state = inner.state.lock().await;
    if cancel.is_cancelled() || !state.running {
        return false;
    }
    let Some(backend) = state.backend.as_mut() else {
        return false;
    };
    match backend.start(cancel).await {
        Ok(()) => info!(pid = ?backend.pid(), "Backend restarted"),
        Err(e) => error!(error = %e, "Failed to restart backend"),
    }
    true
}

async fn mark_stopped(inner: &Weak<Inner>, cancel: &CancellationToken) {
    let Some(inner) = inner.upgrade() else { return };
    let mut state = inner.state.lock().await;
    if !cancel.is_cancelled() {
        state.running = false;
    }
}
