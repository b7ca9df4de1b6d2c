//! Backend process supervision.
//!
//! - [`ProcessLease`]: scoped ownership of a spawned child
//! - [`ReadinessProbe`]: polls the backend's health or model-list route
//! - [`Supervisor`]: the per-backend state machine tying the two together

mod lease;
mod logs;
mod readiness;
mod shutdown;
mod supervisor;

pub use lease::{LaunchSpec, ProcessLease};
pub use logs::{LogLevel, classify_line};
pub use readiness::{CHECK_TIMEOUT, ReadinessCheck, ReadinessProbe};
pub use shutdown::shutdown_child;
pub use supervisor::Supervisor;
