//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define what the core expects from infrastructure. They use only
//! domain types; implementations live in `toke-runtime`.

pub mod system_probe;

pub use system_probe::{SystemProbeError, SystemProbePort, SystemProbeResult};
