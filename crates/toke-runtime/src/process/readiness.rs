//! Readiness and liveness checks against a backend's HTTP surface.
//!
//! TCP endpoints go through `reqwest`. Unix-socket endpoints get a single
//! `hyper` HTTP/1.1 connection over `tokio::net::UnixStream`.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use toke_core::{BackendError, BackendResult, Endpoint, Provider, ReadinessTiming};
use tracing::{debug, info};

/// Upper bound for a single check.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// What counts as "ready" for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessCheck {
    /// `GET /health` answers 2xx.
    Health,
    /// `GET /v1/models` answers 2xx with at least one model listed.
    ModelList,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

impl ReadinessCheck {
    pub const fn route(self) -> &'static str {
        match self {
            Self::Health => "/health",
            Self::ModelList => "/v1/models",
        }
    }

    fn accepts(self, status: u16, body: &[u8]) -> bool {
        if !(200..300).contains(&status) {
            return false;
        }
        match self {
            Self::Health => true,
            Self::ModelList => serde_json::from_slice::<ModelList>(body)
                .is_ok_and(|list| !list.data.is_empty()),
        }
    }
}

/// Polls one backend endpoint until it reports ready.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    provider: Provider,
    endpoint: Endpoint,
    check: ReadinessCheck,
    timing: ReadinessTiming,
    client: Client,
}

impl ReadinessProbe {
    pub const fn new(
        provider: Provider,
        endpoint: Endpoint,
        check: ReadinessCheck,
        timing: ReadinessTiming,
        client: Client,
    ) -> Self {
        Self {
            provider,
            endpoint,
            check,
            timing,
            client,
        }
    }

    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub const fn timing(&self) -> ReadinessTiming {
        self.timing
    }

    /// Same probe with a different cadence.
    #[must_use]
    pub fn with_timing(mut self, timing: ReadinessTiming) -> Self {
        self.timing = timing;
        self
    }

    /// One check, bounded by [`CHECK_TIMEOUT`]. Any transport error is "not ready".
    pub async fn check_once(&self) -> bool {
        let route = self.check.route();
        let reply = match &self.endpoint {
            Endpoint::Http { .. } => {
                let Some(url) = self.endpoint.http_url(route) else {
                    return false;
                };
                http_get(&self.client, &url).await
            }
            Endpoint::Unix { socket } => timeout(CHECK_TIMEOUT, unix_get(socket, route))
                .await
                .ok()
                .and_then(Result::ok),
        };

        match reply {
            Some((status, body)) => {
                let ready = self.check.accepts(status, &body);
                if !ready {
                    debug!(provider = %self.provider, status, route, "Backend not ready yet");
                }
                ready
            }
            None => false,
        }
    }

    /// Poll every `timing.interval` until ready, `timing.timeout` elapses,
    /// `cancel` fires, or `exited` reports the process gone.
    pub async fn wait_for_ready(
        &self,
        cancel: &CancellationToken,
        mut exited: impl FnMut() -> bool,
    ) -> BackendResult<()> {
        let deadline = Instant::now() + self.timing.timeout;
        let mut ticker = interval(self.timing.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(provider = %self.provider, endpoint = %self.endpoint, "Waiting for backend to become ready");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(BackendError::Cancelled),
                () = sleep_until(deadline) => {
                    return Err(BackendError::ReadinessTimeout {
                        provider: self.provider,
                        timeout: self.timing.timeout,
                    });
                }
                _ = ticker.tick() => {}
            }

            if exited() {
                return Err(BackendError::spawn_failed(
                    self.provider,
                    "process exited before becoming ready",
                ));
            }
            let ready = tokio::select! {
                ready = self.check_once() => ready,
                () = sleep_until(deadline) => false,
            };
            if ready {
                info!(provider = %self.provider, "Backend is ready");
                return Ok(());
            }
        }
    }
}

async fn http_get(client: &Client, url: &str) -> Option<(u16, Vec<u8>)> {
    let response = client.get(url).timeout(CHECK_TIMEOUT).send().await.ok()?;
    let status = response.status().as_u16();
    let body = response.bytes().await.ok()?;
    Some((status, body.to_vec()))
}

/// One request over a fresh connection. The connection task ends once the
/// body is read and the sender is dropped, so keep-alive servers do not
/// hold the check open.
#[cfg(unix)]
async fn unix_get(socket: &std::path::Path, route: &str) -> anyhow::Result<(u16, Vec<u8>)> {
    use http_body_util::{BodyExt, Empty};
    use hyper::body::Bytes;
    use hyper::client::conn::http1;
    use hyper_util::rt::TokioIo;
    use tokio::net::UnixStream;

    let stream = UnixStream::connect(socket).await?;
    let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await?;

    let request = hyper::Request::get(route)
        .header(hyper::header::HOST, "localhost")
        .body(Empty::<Bytes>::new())?;
    let exchange = async move {
        let response = sender.send_request(request).await?;
        let status = response.status().as_u16();
        let body = response.into_body().collect().await?.to_bytes();
        anyhow::Ok((status, body.to_vec()))
    };

    let (reply, closed) = tokio::join!(exchange, conn);
    if let Err(e) = closed {
        debug!(error = %e, socket = %socket.display(), "Unix socket connection ended with error");
    }
    reply
}

#[cfg(not(unix))]
async fn unix_get(_socket: &std::path::Path, _route: &str) -> anyhow::Result<(u16, Vec<u8>)> {
    anyhow::bail!("unix sockets are not supported on this platform")
}
