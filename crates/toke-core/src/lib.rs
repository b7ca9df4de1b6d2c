//! Core domain types for toke's local backend orchestration.
//!
//! This crate is pure: it owns the model catalog, capability data and
//! recommendation rules, the data-directory layout, settings, and the error
//! taxonomy. Anything that touches the network or spawns processes lives in
//! `toke-runtime` and plugs in through the traits in [`ports`].

#![deny(unused_crate_dependencies)]

pub mod catalog;
pub mod endpoint;
pub mod error;
pub mod format;
pub mod paths;
pub mod ports;
pub mod progress;
pub mod settings;
pub mod state;
pub mod system;

// Re-export commonly used types for convenience
pub use catalog::{
    ModelOption, Platform, Provider, Tier, catalog, model_by_id, models_by_tier,
    recommended_by_tier, recommended_model,
};
pub use endpoint::Endpoint;
pub use error::{BackendError, BackendResult};
pub use format::format_size;
pub use paths::{DataLayout, PathError, data_root, resolve_data_root};
pub use ports::{SystemProbeError, SystemProbePort};
pub use progress::{
    REPORT_INTERVAL, ProgressCallback, StatusCallback, ThrottledProgress, noop_progress,
};
pub use settings::{
    BackendSettings, MlxTransport, ReadinessTiming, RestartPolicy, SettingsError,
    validate_settings,
};
pub use state::BackendState;
pub use system::{
    Estimated, SystemInfo, format_requirement, quick_setup_model, recommend_models,
};

#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tempfile as _;
