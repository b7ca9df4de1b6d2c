//! Verified archive downloads.

use std::path::Path;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use toke_core::{BackendError, BackendResult, ProgressCallback, ThrottledProgress};
use tracing::{info, warn};

use super::http::{into_backend_error, partial_path, stream_to_file};

/// Values shipped in release metadata before a real digest is known.
const PLACEHOLDERS: &[&str] = &["placeholder", "todo", "tbd", "unknown", "none"];

/// Normalize `sha256:ABC...` style values to bare lowercase hex.
fn normalize(checksum: &str) -> String {
    let trimmed = checksum.trim();
    trimmed
        .strip_prefix("sha256:")
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// Whether `checksum` cannot be used to verify anything.
pub fn is_placeholder_checksum(checksum: &str) -> bool {
    let value = normalize(checksum);
    value.is_empty()
        || PLACEHOLDERS.contains(&value.as_str())
        || value.chars().all(|c| c == '0')
        || value.len() != 64
        || !value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Download `url` to `dest` while hashing it with SHA-256.
///
/// Bytes go to `<dest>.partial` and are renamed into place only after the
/// digest matches. On mismatch, error or cancellation the partial file is
/// removed, so `dest` never holds unverified content when a digest was given.
///
/// A missing or placeholder checksum is logged as unverified, or rejected
/// with `UnverifiedChecksum` when `require_verified` is set. Returns the
/// actual digest.
pub async fn download_verified(
    client: &Client,
    url: &str,
    dest: &Path,
    expected: Option<&str>,
    require_verified: bool,
    cancel: &CancellationToken,
    progress: &ProgressCallback,
) -> BackendResult<String> {
    let file_name = dest
        .file_name()
        .map_or_else(|| url.to_string(), |n| n.to_string_lossy().into_owned());

    let expected = expected
        .filter(|c| !is_placeholder_checksum(c))
        .map(normalize);
    if expected.is_none() {
        if require_verified {
            return Err(BackendError::UnverifiedChecksum { file: file_name });
        }
        warn!(file = %file_name, "No usable checksum configured, download will be unverified");
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }
    let partial = partial_path(dest);

    let mut hasher = Sha256::new();
    let result = fetch_into(client, url, &partial, cancel, progress, &mut hasher).await;
    if let Err(err) = result {
        let _ = fs::remove_file(&partial).await;
        return Err(into_backend_error(err, &file_name));
    }

    let actual = format!("{:x}", hasher.finalize());
    if let Some(expected) = expected {
        if expected != actual {
            let _ = fs::remove_file(&partial).await;
            return Err(BackendError::ChecksumMismatch {
                file: file_name,
                expected,
                actual,
            });
        }
        info!(file = %file_name, "Checksum verified");
    }

    fs::rename(&partial, dest).await?;
    Ok(actual)
}

async fn fetch_into(
    client: &Client,
    url: &str,
    partial: &Path,
    cancel: &CancellationToken,
    progress: &ProgressCallback,
    hasher: &mut Sha256,
) -> anyhow::Result<()> {
    let response = client.get(url).send().await?.error_for_status()?;
    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(partial).await?;
    let mut throttled = ThrottledProgress::new(progress.clone());

    let written = stream_to_file(response, &mut file, cancel, |chunk, written| {
        hasher.update(chunk);
        throttled.report(written, total);
    })
    .await?;

    throttled.finish(written, total.max(written));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_detected() {
        assert!(is_placeholder_checksum(""));
        assert!(is_placeholder_checksum("placeholder"));
        assert!(is_placeholder_checksum("TODO"));
        assert!(is_placeholder_checksum(&"0".repeat(64)));
        assert!(is_placeholder_checksum("abc123"));
    }

    #[test]
    fn real_digests_are_accepted() {
        let digest = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert!(!is_placeholder_checksum(digest));
        assert!(!is_placeholder_checksum(&format!(
            "sha256:{}",
            digest.to_uppercase()
        )));
    }

    #[tokio::test]
    async fn unverified_download_is_refused_when_required() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("llama-server.tar.gz");
        let client = Client::new();

        let err = download_verified(
            &client,
            "http://127.0.0.1:9/never-contacted",
            &dest,
            Some("placeholder"),
            true,
            &CancellationToken::new(),
            &toke_core::noop_progress(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BackendError::UnverifiedChecksum { .. }));
        assert!(!dest.exists());
    }
}
