//! Runtime side of toke's backend orchestration.
//!
//! Implements what `toke-core` only describes: probing the host, installing
//! servers and model weights, supervising backend processes, and the
//! [`Orchestrator`] that ties them together.

#![deny(unsafe_code)]

pub mod backend;
pub mod install;
pub mod orchestrator;
pub mod process;
pub mod system;

pub use backend::{AdapterContext, Backend, LlamaCppBackend, MlxBackend};
pub use install::{EmbeddedBundle, HubManifestSource, ManifestEntry, ManifestSource, ServerLocator};
pub use orchestrator::{Orchestrator, QUICK_SETUP_READINESS};
pub use process::{LaunchSpec, ProcessLease, ReadinessCheck, ReadinessProbe, Supervisor};
pub use system::DefaultSystemProbe;
