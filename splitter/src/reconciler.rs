use crate::paths::Roots;
use snapshots::{Error, MetaTransaction, Result, Transactor};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The function used to physically delete an orphan directory.
pub type RemoveDir = fn(&Path) -> io::Result<()>;

/// The default `RemoveDir`, deleting the directory and all its content.
pub fn remove_dir_all(path: &Path) -> io::Result<()> {
    fs::remove_dir_all(path)
}

/// The directories of both trees whose identifier is no longer live.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Orphans {
    pub read: Vec<PathBuf>,
    pub write: Vec<PathBuf>,
}

impl Orphans {
    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

/// `Reconciler` deletes the directories of the read-tree and the write-tree
/// which don't match a live snapshot identifier.
///
/// Orphans are computed while holding a writable transaction, so the identifiers and the
/// directory listings are consistent. They are deleted once the transaction is released.
pub struct Reconciler<'a, T> {
    roots: &'a Roots,
    ms: &'a T,
    remove_dir: RemoveDir,
}

impl<'a, T: Transactor> Reconciler<'a, T> {
    pub fn new(roots: &'a Roots, ms: &'a T, remove_dir: RemoveDir) -> Self {
        Reconciler {
            roots,
            ms,
            remove_dir,
        }
    }

    /// Remove the metadata of `key`, then delete every orphan directory.
    ///
    /// Nothing is deleted if the metadata can't be removed.
    pub fn remove_snapshot(&self, key: &str) -> Result<()> {
        let orphans = self.ms.with_transaction(true, |tx| {
            let (id, kind) = tx.remove(key)?;
            log::debug!("removed {} snapshot {} with id {}", kind, key, id);

            self.orphans(tx)
        })?;

        self.remove_orphans(orphans);
        Ok(())
    }

    /// Delete every orphan directory.
    pub fn cleanup(&self) -> Result<()> {
        // A writable transaction keeps new snapshots from being created while scanning.
        let orphans = self.ms.with_transaction(true, |tx| self.orphans(tx))?;

        self.remove_orphans(orphans);
        Ok(())
    }

    /// Compute the orphans of both trees. Must run inside a writable transaction.
    fn orphans(&self, tx: &T::Transaction) -> Result<Orphans> {
        let ids = tx.id_map()?;

        Ok(Orphans {
            read: orphans_of(&self.roots.read_tree(), &ids)?,
            write: orphans_of(&self.roots.write_tree(), &ids)?,
        })
    }

    /// Delete the orphans, a failure is logged and does not stop the others.
    fn remove_orphans(&self, orphans: Orphans) {
        if orphans.is_empty() {
            return;
        }

        for dir in orphans.read.iter().chain(orphans.write.iter()) {
            log::debug!("removing orphan directory {}", dir.display());
            if let Err(e) = (self.remove_dir)(dir) {
                log::warn!("failed to remove directory {}: {}", dir.display(), e);
            }
        }
    }
}

/// List the directories of `tree` not named after a live identifier.
fn orphans_of(tree: &Path, ids: &HashMap<String, String>) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(tree).map_err(|e| Error::ReadDirectory(format!("{}: {}", tree.display(), e)))?;

    let mut orphans = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| Error::ReadDirectory(format!("{}: {}", tree.display(), e)))?;
        // A name which is not UTF-8 can't be a snapshot identifier
        let live = entry.file_name().to_str().map_or(false, |n| ids.contains_key(n));
        if !live {
            orphans.push(entry.path());
        }
    }
    orphans.sort();

    Ok(orphans)
}
