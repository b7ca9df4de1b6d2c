//! Install pipeline: server bundles, verified archives and model weights.

mod archive;
mod bundle;
mod checksum;
mod http;
mod manifest;
mod model;

pub use archive::{ArchiveSource, EXECUTABLE_NAMES, extract_tar_gz};
pub use bundle::{EXPECTED_FILES, EmbeddedBundle, ServerLocator};
pub use checksum::{download_verified, is_placeholder_checksum};
pub use http::{USER_AGENT, build_client, partial_path};
pub use manifest::{
    HubManifestSource, LfsInfo, ManifestEntry, ManifestSource, fallback_manifest,
    manifest_api_url, necessary_files,
};
pub use model::{STALE_PARTIAL_AGE, ensure_gguf_model, ensure_snapshot_model, is_model_complete};
