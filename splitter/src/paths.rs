use snapshots::{Error, Result, SNAPSHOTS_DIR};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

/// The directory, relative to the root, holding the relocated writable content.
pub const WRITABLE_DIR: &str = "writable";

/// `Roots` knows where the read-tree and the write-tree live under the storage root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roots {
    root: PathBuf,
}

impl Roots {
    pub fn new(root: &Path) -> Self {
        Roots {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `root/writable`, the prefix of every relocated path.
    pub fn writable(&self) -> PathBuf {
        self.root.join(WRITABLE_DIR)
    }

    /// `root/snapshots`, owned by the underlying snapshotter.
    pub fn read_tree(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    /// `root/writable/snapshots`
    pub fn write_tree(&self) -> PathBuf {
        self.writable().join(SNAPSHOTS_DIR)
    }

    /// Create both trees if they are missing.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.read_tree(), self.write_tree()] {
            if !dir.exists() {
                log::debug!("creating directory = {}", dir.display());
                create_dir_all(&dir).map_err(|e| {
                    Error::CreateDirectory(format!("{}: {}", dir.display(), e))
                })?;
            }
        }
        Ok(())
    }
}
