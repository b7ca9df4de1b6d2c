//! Lifecycle state of a single backend instance.

use std::fmt;

use serde::{Deserialize, Serialize};

/// ```text
/// NotInstalled -> Installed -> Starting -> Running -> Stopping -> Stopped
///                                  |           |
///                                  +-> Failed <+
/// ```
///
/// `Stopped` and `Failed` may go back to `Starting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
    #[default]
    NotInstalled,
    Installed,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl BackendState {
    /// Whether server and model are on disk, i.e. `start` may proceed.
    pub const fn is_installed(self) -> bool {
        !matches!(self, Self::NotInstalled)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotInstalled => "not installed",
            Self::Installed => "installed",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
