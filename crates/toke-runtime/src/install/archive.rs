//! gzip tar extraction for server bundles.

use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use toke_core::{BackendError, BackendResult};
use tracing::{debug, warn};

/// File names restored as executable (0755) after extraction.
pub const EXECUTABLE_NAMES: &[&str] = &["llama-server", "mlx-server", "mlx_server.py"];

/// Where archive bytes come from.
#[derive(Debug, Clone)]
pub enum ArchiveSource {
    /// Bytes already in memory, e.g. embedded in the application binary.
    Bytes(Arc<[u8]>),
    /// A `.tar.gz` on disk.
    File(PathBuf),
}

impl ArchiveSource {
    fn describe(&self) -> String {
        match self {
            Self::Bytes(_) => "embedded bundle".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Extract a gzip tar archive into `dest` on the blocking pool.
///
/// Directories are created, regular files written, and recognized
/// executables marked 0755. Entries with absolute paths or `..` components
/// are skipped. Returns the relative paths of the files written.
pub async fn extract_tar_gz(source: ArchiveSource, dest: &Path) -> BackendResult<Vec<PathBuf>> {
    let archive_name = source.describe();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || match source {
        ArchiveSource::Bytes(bytes) => unpack(Cursor::new(bytes), &dest),
        ArchiveSource::File(path) => unpack(File::open(path)?, &dest),
    })
    .await
    .map_err(|e| BackendError::ExtractionFailed {
        archive: archive_name.clone(),
        reason: format!("Join error: {e}"),
    })?
    .map_err(|e| BackendError::ExtractionFailed {
        archive: archive_name,
        reason: e.to_string(),
    })
}

/// Relative path that stays below the directory it is joined to.
pub(super) fn is_safe(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some()
        && components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn unpack<R: Read>(reader: R, dest: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dest)?;
    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut written = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = entry.path()?.into_owned();
        if !is_safe(&rel) {
            warn!(path = %rel.display(), "Skipping archive entry outside destination");
            continue;
        }
        let target = dest.join(&rel);

        match entry.header().entry_type() {
            EntryType::Directory => fs::create_dir_all(&target)?,
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&target)?;
                io::copy(&mut entry, &mut out)?;
                mark_executable_if_known(&target)?;
                written.push(rel);
            }
            other => debug!(path = %rel.display(), kind = ?other, "Skipping archive entry"),
        }
    }

    Ok(written)
}

#[cfg(unix)]
fn mark_executable_if_known(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let known = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| EXECUTABLE_NAMES.contains(&n));
    if known {
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn mark_executable_if_known(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Build a gzip tar in memory from `(path, contents)` pairs.
#[cfg(test)]
pub(crate) fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *contents).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}
