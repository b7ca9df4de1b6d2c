//! Canonical address of a running backend's OpenAI-compatible API.
//!
//! The string form is what collaborators receive from `get_endpoint`. Its
//! scheme tells HTTP code which transport to dial:
//!
//! - `http://127.0.0.1:11434/v1` for TCP
//! - `unix:///path/to/mlx-server.sock:/v1` for a Unix domain socket

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const API_PREFIX: &str = "/v1";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Http { host: String, port: u16 },
    Unix { socket: PathBuf },
}

impl Endpoint {
    pub fn loopback(port: u16) -> Self {
        Self::Http {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    pub fn unix(socket: impl Into<PathBuf>) -> Self {
        Self::Unix {
            socket: socket.into(),
        }
    }

    pub const fn is_unix(&self) -> bool {
        matches!(self, Self::Unix { .. })
    }

    /// Socket path for Unix endpoints.
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            Self::Unix { socket } => Some(socket),
            Self::Http { .. } => None,
        }
    }

    /// Absolute URL of `route` for TCP endpoints, e.g. `/health`.
    pub fn http_url(&self, route: &str) -> Option<String> {
        match self {
            Self::Http { host, port } => Some(format!("http://{host}:{port}{route}")),
            Self::Unix { .. } => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { host, port } => write!(f, "http://{host}:{port}{API_PREFIX}"),
            Self::Unix { socket } => write!(f, "unix://{}:{API_PREFIX}", socket.display()),
        }
    }
}

/// Error returned when an endpoint string has an unknown shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid backend endpoint: {0}")]
pub struct InvalidEndpoint(pub String);

impl FromStr for Endpoint {
    type Err = InvalidEndpoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidEndpoint(s.to_string());

        if let Some(rest) = s.strip_prefix("unix://") {
            let socket = rest.strip_suffix(":/v1").unwrap_or(rest);
            if socket.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::unix(socket));
        }

        let rest = s.strip_prefix("http://").ok_or_else(invalid)?;
        let authority = rest.strip_suffix(API_PREFIX).unwrap_or(rest);
        let (host, port) = authority.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self::Http {
            host: host.to_string(),
            port,
        })
    }
}
