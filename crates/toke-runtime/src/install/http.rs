//! Shared HTTP plumbing for installers.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::{Client, Response};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use toke_core::BackendError;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("toke/", env!("CARGO_PKG_VERSION"));

/// Build the client shared by manifest fetches and downloads.
///
/// Only the connect phase is bounded; multi-gigabyte bodies may legitimately
/// take hours.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .build()
}

/// `<dest>.partial`, where bytes land until a download is complete.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name: OsString = dest.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Stream `response` into `file`, calling `on_chunk` after each write with
/// the chunk and the running byte count. Returns the number of bytes written.
///
/// Cancellation yields `BackendError::Cancelled` inside the `anyhow::Error`;
/// use [`into_backend_error`] to recover it.
pub async fn stream_to_file(
    response: Response,
    file: &mut File,
    cancel: &CancellationToken,
    mut on_chunk: impl FnMut(&[u8], u64),
) -> Result<u64> {
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(BackendError::Cancelled.into()),
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk.context("Error reading download stream")?;
        file.write_all(&chunk)
            .await
            .context("Error writing to download file")?;
        written += chunk.len() as u64;
        on_chunk(&chunk, written);
    }

    file.flush().await.context("Error flushing download file")?;
    Ok(written)
}

/// Convert internal download errors into a `BackendError`, keeping typed
/// errors (cancellation, checksum) intact and naming `file` otherwise.
pub fn into_backend_error(err: anyhow::Error, file: &str) -> BackendError {
    match err.downcast::<BackendError>() {
        Ok(backend) => backend,
        Err(other) => BackendError::download_failed(file, format!("{other:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/m/model.gguf")),
            PathBuf::from("/m/model.gguf.partial")
        );
    }

    #[test]
    fn typed_errors_survive_conversion() {
        let err = anyhow::Error::from(BackendError::Cancelled);
        assert!(matches!(
            into_backend_error(err, "x"),
            BackendError::Cancelled
        ));

        let err = anyhow::anyhow!("connection reset").context("Error reading download stream");
        match into_backend_error(err, "config.json") {
            BackendError::DownloadFailed { file, reason } => {
                assert_eq!(file, "config.json");
                assert!(reason.contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
