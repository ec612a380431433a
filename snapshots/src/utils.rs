use crate::types::Usage;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Compute the disk usage of a directory tree.
///
/// Hard links are only counted once.
pub fn disk_usage(root: &Path) -> io::Result<Usage> {
    let mut usage = Usage::default();
    let mut inodes = HashSet::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(path) = pending.pop() {
        let metadata = fs::symlink_metadata(&path)?;

        if inodes.insert((metadata.dev(), metadata.ino())) {
            usage.inodes += 1;
            usage.size += metadata.len();
        }

        if metadata.is_dir() {
            for entry in fs::read_dir(&path)? {
                pending.push(entry?.path());
            }
        }
    }

    Ok(usage)
}

/// Get the paths of the entries of a directory, sorted.
///
/// Paths are kept as read, names that are not valid UTF-8 included.
pub fn read_dir_paths(path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<PathBuf>>>()?;
    paths.sort();
    Ok(paths)
}

/// Remove every directory, logging the ones that can't be removed.
pub fn remove_all(dirs: Vec<PathBuf>) {
    for dir in dirs {
        log::debug!("removing directory {}", dir.display());
        if let Err(e) = fs::remove_dir_all(&dir) {
            log::warn!("failed to remove directory {}: {}", dir.display(), e);
        }
    }
}
