//! Model weight installation.
//!
//! Multi-file repositories (MLX) are fetched file by file from a manifest;
//! single-file GGUF weights are fetched with resume support.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, bail};
use reqwest::{Client, StatusCode, header};
use tokio::fs::{self, OpenOptions};
use tokio_util::sync::CancellationToken;
use toke_core::{BackendError, BackendResult, ModelOption, ProgressCallback, ThrottledProgress};
use tracing::{debug, info, warn};

use super::http::{into_backend_error, partial_path, stream_to_file};
use super::manifest::{ManifestSource, fallback_manifest, necessary_files};

/// Partial GGUF downloads untouched for this long restart from zero.
pub const STALE_PARTIAL_AGE: Duration = Duration::from_secs(5 * 60);

/// Whether `dir` holds a loadable multi-file model: `config.json`,
/// `tokenizer.json` and either `model.safetensors` or the first shard of a
/// split weight set.
pub fn is_model_complete(dir: &Path) -> bool {
    let essentials = ["config.json", "tokenizer.json"];
    if !essentials.iter().all(|name| dir.join(name).is_file()) {
        return false;
    }
    if dir.join("model.safetensors").is_file() {
        return true;
    }
    std::fs::read_dir(dir).is_ok_and(|entries| {
        entries.flatten().any(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("model-00001-of-") && name.ends_with(".safetensors")
        })
    })
}

/// Download every necessary file of `model` into `dir`.
///
/// A complete directory returns immediately with `(size, size)` reported and
/// no network traffic. Files already present with the listed size are
/// skipped. Progress is the aggregate over all files.
pub async fn ensure_snapshot_model(
    client: &Client,
    manifests: &dyn ManifestSource,
    model: &ModelOption,
    dir: &Path,
    cancel: &CancellationToken,
    progress: &ProgressCallback,
) -> BackendResult<PathBuf> {
    if is_model_complete(dir) {
        info!(path = %dir.display(), "Model already downloaded");
        progress(model.size, model.size);
        return Ok(dir.to_path_buf());
    }

    fs::create_dir_all(dir).await?;

    let entries = match manifests.list_files(&model.url).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, url = %model.url, "Failed to get file list, using fallback");
            fallback_manifest(&model.url)
        }
    };
    let files = necessary_files(entries);
    if files.is_empty() {
        return Err(BackendError::EmptyManifest {
            model: model.id.clone(),
        });
    }

    let listed: u64 = files.iter().map(|f| f.effective_size()).sum();
    let total = if listed == 0 { model.size } else { listed };
    info!(model = %model.id, files = files.len(), total, "Downloading model files");

    let mut throttled = ThrottledProgress::new(progress.clone());
    throttled.report(0, total);

    let mut done: u64 = 0;
    for file in &files {
        if cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }

        let dest = dir.join(&file.path);
        let size = file.effective_size();
        if let Ok(meta) = fs::metadata(&dest).await
            && meta.len() == size
        {
            debug!(file = %file.path, "Skipping file already on disk");
            done += size;
            throttled.report(done, total);
            continue;
        }

        let url = format!("{}/resolve/main/{}", model.url.trim_end_matches('/'), file.path);
        debug!(file = %file.path, size, "Downloading model file");
        let base = done;
        let written = download_file(client, &url, &dest, cancel, |n| {
            throttled.report(base + n, total);
        })
        .await
        .map_err(|e| into_backend_error(e, &file.path))?;
        done += written;
    }

    throttled.finish(done.max(total), done.max(total));

    if !is_model_complete(dir) {
        return Err(BackendError::IncompleteModel {
            model: model.id.clone(),
            path: dir.to_path_buf(),
        });
    }

    info!(model = %model.id, path = %dir.display(), "Model downloaded successfully");
    Ok(dir.to_path_buf())
}

/// Fetch `url` into `<dest>.partial`, then rename to `dest`.
async fn download_file(
    client: &Client,
    url: &str,
    dest: &Path,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(u64),
) -> anyhow::Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .context("Failed to create model directory")?;
    }

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        bail!("HTTP {}", response.status());
    }

    let partial = partial_path(dest);
    let mut file = fs::File::create(&partial)
        .await
        .context("Failed to create download file")?;
    let written = stream_to_file(response, &mut file, cancel, |_, n| on_progress(n)).await?;
    drop(file);

    fs::rename(&partial, dest)
        .await
        .context("Failed to move download into place")?;
    Ok(written)
}

/// Download a single-file GGUF model to `<dir>/<file name>`.
///
/// Bytes accumulate in `<file>.partial`; a fresh partial resumes through an
/// HTTP Range request, a stale one is discarded, and a 416 restarts from
/// zero. The final file only appears once the body is complete, so its
/// presence alone marks the model as installed.
pub async fn ensure_gguf_model(
    client: &Client,
    model: &ModelOption,
    dir: &Path,
    cancel: &CancellationToken,
    progress: &ProgressCallback,
) -> BackendResult<PathBuf> {
    let file_name = model
        .file_name()
        .ok_or_else(|| BackendError::download_failed(&model.id, "model URL names no file"))?;
    let dest = dir.join(file_name);

    if fs::metadata(&dest).await.is_ok_and(|m| m.is_file()) {
        info!(path = %dest.display(), "Model already downloaded");
        progress(model.size, model.size);
        return Ok(dest);
    }

    fs::create_dir_all(dir).await?;
    fetch_gguf(client, model, &dest, cancel, progress)
        .await
        .map_err(|e| into_backend_error(e, file_name))?;

    info!(path = %dest.display(), "Model downloaded successfully");
    Ok(dest)
}

/// Resume offset for `partial`, discarding it when stale.
async fn resume_offset(partial: &Path) -> u64 {
    let Ok(meta) = fs::metadata(partial).await else {
        return 0;
    };
    let age = meta
        .modified()
        .ok()
        .and_then(|t| SystemTime::now().duration_since(t).ok())
        .unwrap_or_default();

    if age > STALE_PARTIAL_AGE {
        info!(path = %partial.display(), age_secs = age.as_secs(), "Removing stale partial download");
        let _ = fs::remove_file(partial).await;
        return 0;
    }
    meta.len()
}

async fn fetch_gguf(
    client: &Client,
    model: &ModelOption,
    dest: &Path,
    cancel: &CancellationToken,
    progress: &ProgressCallback,
) -> anyhow::Result<()> {
    let partial = partial_path(dest);
    let mut start = resume_offset(&partial).await;

    let request = |offset: u64| {
        let mut req = client.get(&model.url);
        if offset > 0 {
            req = req.header(header::RANGE, format!("bytes={offset}-"));
        }
        req.send()
    };

    let mut response = request(start).await.context("Failed to start download")?;
    if response.status() == StatusCode::RANGE_NOT_SATISFIABLE && start > 0 {
        info!("Server rejected resume, starting from beginning");
        let _ = fs::remove_file(&partial).await;
        start = 0;
        response = request(0).await.context("Failed to restart download")?;
    }

    let status = response.status();
    if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
        bail!("HTTP {status}");
    }
    if status == StatusCode::OK && start > 0 {
        debug!("Server ignored range request, restarting from zero");
        start = 0;
    }
    if start > 0 {
        info!(offset = start, "Resuming download");
    }

    let total = response
        .content_length()
        .map_or(model.size, |len| start + len);

    let opened = if start > 0 {
        OpenOptions::new().append(true).open(&partial).await
    } else {
        fs::File::create(&partial).await
    };
    let mut file = opened.context("Failed to open partial download")?;

    let mut throttled = ThrottledProgress::new(progress.clone());
    throttled.report(start, total);
    let written = stream_to_file(response, &mut file, cancel, |_, n| {
        throttled.report(start + n, total);
    })
    .await?;
    drop(file);

    let downloaded = start + written;
    throttled.finish(downloaded, total.max(downloaded));

    fs::rename(&partial, dest)
        .await
        .context("Failed to move download into place")?;
    Ok(())
}
