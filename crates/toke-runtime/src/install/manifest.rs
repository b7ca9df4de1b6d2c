//! Remote file listings for multi-file model repositories.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use toke_core::{BackendError, BackendResult};
use tracing::{debug, warn};

use super::archive::is_safe;

const HUB_PREFIX: &str = "https://huggingface.co/";
const HUB_API_PREFIX: &str = "https://huggingface.co/api/models/";

const GIB: u64 = 1024 * 1024 * 1024;

/// LFS pointer metadata; its size is the real file size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LfsInfo {
    #[serde(default)]
    pub size: u64,
}

/// One entry of a repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub lfs: Option<LfsInfo>,
}

fn default_kind() -> String {
    "file".to_string()
}

impl ManifestEntry {
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            kind: default_kind(),
            path: path.into(),
            size,
            lfs: None,
        }
    }

    /// LFS size when present and non-zero, otherwise the listed size.
    pub fn effective_size(&self) -> u64 {
        self.lfs
            .as_ref()
            .map(|lfs| lfs.size)
            .filter(|&n| n > 0)
            .unwrap_or(self.size)
    }

    pub fn is_directory(&self) -> bool {
        self.kind == "directory"
    }
}

/// Source of repository file listings.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// List files of the repository at `repo_url`.
    async fn list_files(&self, repo_url: &str) -> BackendResult<Vec<ManifestEntry>>;
}

/// `https://huggingface.co/<repo>` to its tree API URL.
pub fn manifest_api_url(repo_url: &str) -> Option<String> {
    let repo = repo_url.trim_end_matches('/').strip_prefix(HUB_PREFIX)?;
    if repo.is_empty() {
        return None;
    }
    Some(format!("{HUB_API_PREFIX}{repo}/tree/main"))
}

/// Lists files through the Hugging Face tree API.
#[derive(Debug, Clone)]
pub struct HubManifestSource {
    client: Client,
}

impl HubManifestSource {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestSource for HubManifestSource {
    async fn list_files(&self, repo_url: &str) -> BackendResult<Vec<ManifestEntry>> {
        let failed = |reason: String| BackendError::ManifestFetchFailed {
            repo: repo_url.to_string(),
            reason,
        };

        let api_url =
            manifest_api_url(repo_url).ok_or_else(|| failed("not a model hub URL".to_string()))?;
        debug!(url = %api_url, "Fetching model manifest");

        let response = self
            .client
            .get(&api_url)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {status}: {body}")));
        }

        response
            .json::<Vec<ManifestEntry>>()
            .await
            .map_err(|e| failed(format!("invalid manifest: {e}")))
    }
}

/// File list assumed when the manifest cannot be fetched.
///
/// 7B repositories are usually split into three shards; everything else is
/// assumed to ship a single weight file.
pub fn fallback_manifest(repo_url: &str) -> Vec<ManifestEntry> {
    let mut files = vec![
        ManifestEntry::file("config.json", 10_000),
        ManifestEntry::file("tokenizer.json", 1_000_000),
        ManifestEntry::file("tokenizer_config.json", 10_000),
        ManifestEntry::file("special_tokens_map.json", 5_000),
        ManifestEntry::file("model.safetensors.index.json", 50_000),
    ];

    if repo_url.contains("7B") {
        files.extend((1..=3).map(|part| {
            ManifestEntry::file(format!("model-{part:05}-of-00003.safetensors"), 2 * GIB)
        }));
    } else {
        files.push(ManifestEntry::file("model.safetensors", 5 * GIB));
    }

    files
}

/// Keep configs, weights and tokenizer files; drop docs, dotfiles,
/// directories and paths that would land outside the model directory.
pub fn necessary_files(entries: Vec<ManifestEntry>) -> Vec<ManifestEntry> {
    entries
        .into_iter()
        .filter(|entry| {
            let path = entry.path.as_str();
            if !is_safe(Path::new(path)) {
                warn!(path, "Skipping manifest entry outside the model directory");
                return false;
            }
            if entry.is_directory()
                || path.ends_with(".md")
                || path.ends_with(".txt")
                || path.starts_with('.')
            {
                return false;
            }
            path.ends_with(".json") || path.ends_with(".safetensors") || path.contains("tokenizer")
        })
        .collect()
}
