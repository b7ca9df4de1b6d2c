//! Free space on the filesystem holding the data directory.

use std::path::{Path, PathBuf};

use sysinfo::Disks;
use tracing::debug;

/// Assumed free space when no disk can be matched to the data directory.
pub const FALLBACK_FREE_SPACE: u64 = 50 * 1024 * 1024 * 1024;

/// Available bytes on the disk whose mount point is the longest prefix of
/// `data_dir`. The directory does not have to exist yet.
pub fn free_space_for(data_dir: &Path) -> Option<u64> {
    let target = existing_ancestor(data_dir);
    let disks = Disks::new_with_refreshed_list();
    let mounts: Vec<(PathBuf, u64)> = disks
        .list()
        .iter()
        .map(|d| (d.mount_point().to_path_buf(), d.available_space()))
        .collect();

    let free = select_mount(&target, &mounts);
    if free.is_none() {
        debug!(path = %target.display(), "No mounted disk matches data directory");
    }
    free
}

fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find_map(|p| p.canonicalize().ok())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Free space of the mount point that is the deepest ancestor of `target`.
pub fn select_mount(target: &Path, mounts: &[(PathBuf, u64)]) -> Option<u64> {
    mounts
        .iter()
        .filter(|(mount, _)| target.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .map(|(_, free)| *free)
}
