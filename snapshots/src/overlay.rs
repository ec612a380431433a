use crate::filters;
use crate::storage::{MetaStore, Snapshot, Transaction};
use crate::types::{Info, Kind, Labels, Mount, Usage};
use crate::utils::{disk_usage, read_dir_paths, remove_all};
use crate::{
    Error, MetaTransaction, Result, Snapshotter, Transactor, SNAPSHOTS_DIR, STATE_FILE,
};
use std::fs::{create_dir_all, remove_dir_all};
use std::path::{Path, PathBuf};

/// The label pointing at the upper directory of a snapshot, set when `Config::upperdir_label` is enabled.
pub const UPPERDIR_LABEL: &str = "containerd.io/snapshot/overlay.upperdir";

/// `Config` holds the options of an `OverlaySnapshotter`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Defer the removal of snapshot directories until `cleanup` is called.
    pub async_remove: bool,
    /// Add the `UPPERDIR_LABEL` label to new snapshots.
    pub upperdir_label: bool,
}

/// `OverlaySnapshotter` manages overlay snapshots under a root directory.
///
/// Each snapshot lives in `root/snapshots/<id>`, with its content in `fs` and,
/// for active snapshots, the overlay work directory in `work`.
#[derive(Debug)]
pub struct OverlaySnapshotter {
    root: PathBuf,
    ms: MetaStore,
    config: Config,
}

impl OverlaySnapshotter {
    /// Create a snapshotter rooted at `root`.
    ///
    /// This will ensure the root and snapshots directories exist and load the metadata state.
    pub fn new(root: &Path, config: Config) -> Result<Self> {
        let snapshots_dir = root.join(SNAPSHOTS_DIR);
        if !snapshots_dir.exists() {
            log::debug!("creating snapshots directory = {}", snapshots_dir.display());
            create_dir_all(&snapshots_dir).map_err(|e| Error::CreateDirectory(e.to_string()))?;
        }

        let ms = MetaStore::new(root.join(STATE_FILE))?;

        Ok(OverlaySnapshotter {
            root: root.to_path_buf(),
            ms,
            config,
        })
    }

    fn snapshot_dir(&self, id: &str) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR).join(id)
    }

    fn upper_path(&self, id: &str) -> PathBuf {
        self.snapshot_dir(id).join("fs")
    }

    fn work_path(&self, id: &str) -> PathBuf {
        self.snapshot_dir(id).join("work")
    }

    fn create_snapshot(
        &self,
        kind: Kind,
        key: &str,
        parent: &str,
        labels: Labels,
    ) -> Result<Vec<Mount>> {
        let snapshot = self.ms.with_transaction(true, |tx| {
            let snapshot = tx.create_snapshot(kind, key, parent, labels)?;

            if self.config.upperdir_label {
                let upperdir = self.upper_path(&snapshot.id);
                tx.set_label(key, UPPERDIR_LABEL, &upperdir.to_string_lossy())?;
            }

            let dir = self.snapshot_dir(&snapshot.id);
            if let Err(e) = self.create_snapshot_dirs(&snapshot) {
                if let Err(rm) = remove_dir_all(&dir) {
                    log::warn!("failed to remove snapshot directory {}: {}", dir.display(), rm);
                }
                return Err(e);
            }

            Ok(snapshot)
        })?;

        Ok(self.mounts_of(&snapshot))
    }

    fn create_snapshot_dirs(&self, snapshot: &Snapshot) -> Result<()> {
        create_dir_all(self.upper_path(&snapshot.id))
            .map_err(|e| Error::CreateDirectory(e.to_string()))?;
        if snapshot.kind == Kind::Active {
            create_dir_all(self.work_path(&snapshot.id))
                .map_err(|e| Error::CreateDirectory(e.to_string()))?;
        }
        Ok(())
    }

    /// Build the mounts of a snapshot.
    fn mounts_of(&self, snapshot: &Snapshot) -> Vec<Mount> {
        if snapshot.parent_ids.is_empty() {
            let flag = match snapshot.kind {
                Kind::View => "ro",
                _ => "rw",
            };
            return vec![bind(&self.upper_path(&snapshot.id), flag)];
        }

        let mut options = Vec::new();
        if snapshot.kind == Kind::Active {
            options.push(format!(
                "workdir={}",
                self.work_path(&snapshot.id).display()
            ));
            options.push(format!(
                "upperdir={}",
                self.upper_path(&snapshot.id).display()
            ));
        } else if snapshot.parent_ids.len() == 1 {
            return vec![bind(&self.upper_path(&snapshot.parent_ids[0]), "ro")];
        }

        let lowerdir = snapshot
            .parent_ids
            .iter()
            .map(|id| self.upper_path(id).display().to_string())
            .collect::<Vec<String>>()
            .join(":");
        options.push(format!("lowerdir={}", lowerdir));

        vec![Mount {
            typ: "overlay".to_string(),
            source: "overlay".to_string(),
            options,
        }]
    }

    /// List the snapshot directories which don't belong to any live snapshot.
    ///
    /// Must be called while holding a writable transaction.
    fn cleanup_directories(&self, tx: &Transaction) -> Result<Vec<PathBuf>> {
        let ids = tx.id_map()?;
        let snapshots_dir = self.root.join(SNAPSHOTS_DIR);

        let dirs = read_dir_paths(&snapshots_dir)
            .map_err(|e| Error::ReadDirectory(format!("{}: {}", snapshots_dir.display(), e)))?;

        // A name which is not UTF-8 can't be a snapshot identifier
        Ok(dirs
            .into_iter()
            .filter(|d| {
                d.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(true, |n| !ids.contains_key(n))
            })
            .collect())
    }
}

fn bind(source: &Path, flag: &str) -> Mount {
    Mount {
        typ: "bind".to_string(),
        source: source.display().to_string(),
        options: vec![flag.to_string(), "rbind".to_string()],
    }
}

impl Snapshotter for OverlaySnapshotter {
    fn stat(&self, key: &str) -> Result<Info> {
        self.ms
            .with_transaction(false, |tx| tx.get_info(key))
            .map(|(_, info, _)| info)
    }

    fn update(&self, info: Info, fieldpaths: &[String]) -> Result<Info> {
        self.ms
            .with_transaction(true, |tx| tx.update_info(info, fieldpaths))
    }

    fn usage(&self, key: &str) -> Result<Usage> {
        let (id, info, usage) = self.ms.with_transaction(false, |tx| tx.get_info(key))?;

        match info.kind {
            Kind::Active => disk_usage(&self.upper_path(&id))
                .map_err(|e| Error::Usage(format!("snapshot {}: {}", key, e))),
            _ => Ok(usage),
        }
    }

    fn mounts(&self, key: &str) -> Result<Vec<Mount>> {
        let snapshot = self.ms.with_transaction(false, |tx| tx.get_snapshot(key))?;
        Ok(self.mounts_of(&snapshot))
    }

    fn prepare(&self, key: &str, parent: &str, labels: Labels) -> Result<Vec<Mount>> {
        self.create_snapshot(Kind::Active, key, parent, labels)
    }

    fn view(&self, key: &str, parent: &str, labels: Labels) -> Result<Vec<Mount>> {
        self.create_snapshot(Kind::View, key, parent, labels)
    }

    fn commit(&self, name: &str, key: &str, labels: Labels) -> Result<()> {
        self.ms.with_transaction(true, |tx| {
            let (id, _, _) = tx.get_info(key)?;
            let usage = disk_usage(&self.upper_path(&id))
                .map_err(|e| Error::Usage(format!("snapshot {}: {}", key, e)))?;

            tx.commit_active(key, name, usage, labels)?;
            log::debug!("committed snapshot {} as {}", key, name);
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut removals = Vec::new();

        self.ms.with_transaction(true, |tx| {
            tx.remove(key)?;
            if !self.config.async_remove {
                removals = self.cleanup_directories(tx)?;
            }
            Ok(())
        })?;

        remove_all(removals);
        Ok(())
    }

    fn walk(&self, f: &mut dyn FnMut(&Info) -> Result<()>, filters: &[String]) -> Result<()> {
        let parsed = filters::parse_all(filters)?;

        self.ms.with_transaction(false, |tx| {
            tx.walk_info(&mut |info: &Info| match filters::match_any(&parsed, info) {
                true => f(info),
                false => Ok(()),
            })
        })
    }

    fn cleanup(&self) -> Result<()> {
        // A writable transaction keeps new snapshots from being created while scanning.
        let cleanup = self
            .ms
            .with_transaction(true, |tx| self.cleanup_directories(tx))?;

        remove_all(cleanup);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.ms.save()
    }
}

impl Transactor for OverlaySnapshotter {
    type Transaction = Transaction;

    fn with_transaction<T, F>(&self, writable: bool, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        self.ms.with_transaction(writable, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn snapshotter(config: Config) -> (TempDir, OverlaySnapshotter) {
        let dir = TempDir::new("rwsplit_overlay").unwrap();
        let sn = OverlaySnapshotter::new(dir.path(), config).unwrap();
        (dir, sn)
    }

    fn committed(sn: &OverlaySnapshotter, name: &str, parent: &str) {
        let key = format!("{}-active", name);
        sn.prepare(&key, parent, Labels::new()).unwrap();
        sn.commit(name, &key, Labels::new()).unwrap();
    }

    #[test]
    fn test_prepare_without_parent_is_a_bind_mount() {
        let (dir, sn) = snapshotter(Config::default());

        let mounts = sn.prepare("a", "", Labels::new()).unwrap();

        let upper = dir.path().join("snapshots/1/fs");
        assert_eq!(
            mounts,
            vec![Mount {
                typ: "bind".to_string(),
                source: upper.display().to_string(),
                options: vec!["rw".to_string(), "rbind".to_string()],
            }]
        );
        assert!(upper.is_dir());
        assert!(dir.path().join("snapshots/1/work").is_dir());
    }

    #[test]
    fn test_prepare_with_parents_is_an_overlay_mount() {
        let (dir, sn) = snapshotter(Config::default());
        committed(&sn, "base", "");
        committed(&sn, "middle", "base");

        let mounts = sn.prepare("c", "middle", Labels::new()).unwrap();

        let root = dir.path().display().to_string();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].typ, "overlay");
        assert_eq!(
            mounts[0].options,
            vec![
                format!("workdir={}/snapshots/3/work", root),
                format!("upperdir={}/snapshots/3/fs", root),
                format!("lowerdir={}/snapshots/2/fs:{}/snapshots/1/fs", root, root),
            ]
        );
        assert_eq!(sn.mounts("c").unwrap(), mounts);
    }

    #[test]
    fn test_view_mounts() {
        let (dir, sn) = snapshotter(Config::default());
        committed(&sn, "base", "");

        let mounts = sn.view("v1", "base", Labels::new()).unwrap();
        assert_eq!(mounts[0].typ, "bind");
        assert_eq!(mounts[0].options, vec!["ro", "rbind"]);
        assert_eq!(
            mounts[0].source,
            dir.path().join("snapshots/1/fs").display().to_string()
        );
        assert!(!dir.path().join("snapshots/2/work").exists());

        committed(&sn, "top", "base");
        let mounts = sn.view("v2", "top", Labels::new()).unwrap();
        assert_eq!(mounts[0].typ, "overlay");
        assert_eq!(mounts[0].options.len(), 1);
        assert!(mounts[0].options[0].starts_with("lowerdir="));
    }

    #[test]
    fn test_prepare_existing_key_fails() {
        let (_dir, sn) = snapshotter(Config::default());
        sn.prepare("a", "", Labels::new()).unwrap();

        assert!(matches!(
            sn.prepare("a", "", Labels::new()),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_mounts_of_committed_snapshot_fails() {
        let (_dir, sn) = snapshotter(Config::default());
        committed(&sn, "base", "");

        assert!(matches!(sn.mounts("base"), Err(Error::InvalidKind(_))));
        assert!(matches!(sn.mounts("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_commit_records_usage() {
        let (dir, sn) = snapshotter(Config::default());
        sn.prepare("a", "", Labels::new()).unwrap();
        std::fs::write(dir.path().join("snapshots/1/fs/file"), vec![0u8; 42]).unwrap();

        let active = sn.usage("a").unwrap();
        sn.commit("base", "a", Labels::new()).unwrap();

        assert_eq!(active.inodes, 2);
        assert_eq!(sn.usage("base").unwrap(), active);
        assert_eq!(sn.stat("base").unwrap().kind, Kind::Committed);
        assert!(matches!(sn.stat("a"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_synchronous_remove_deletes_directories() {
        let (dir, sn) = snapshotter(Config::default());
        sn.prepare("a", "", Labels::new()).unwrap();

        sn.remove("a").unwrap();

        assert!(!dir.path().join("snapshots/1").exists());
    }

    #[test]
    fn test_asynchronous_remove_defers_to_cleanup() {
        let (dir, sn) = snapshotter(Config {
            async_remove: true,
            ..Default::default()
        });
        sn.prepare("a", "", Labels::new()).unwrap();
        sn.prepare("b", "", Labels::new()).unwrap();

        sn.remove("a").unwrap();
        assert!(dir.path().join("snapshots/1").exists());

        sn.cleanup().unwrap();
        assert!(!dir.path().join("snapshots/1").exists());
        assert!(dir.path().join("snapshots/2").exists());
    }

    #[test]
    fn test_cleanup_removes_non_utf8_directories() {
        use std::os::unix::ffi::OsStrExt;

        let (dir, sn) = snapshotter(Config::default());
        sn.prepare("a", "", Labels::new()).unwrap();
        let odd = dir
            .path()
            .join("snapshots")
            .join(std::ffi::OsStr::from_bytes(b"\xff"));
        create_dir_all(odd.join("fs")).unwrap();

        sn.cleanup().unwrap();

        assert!(!odd.exists());
        assert!(dir.path().join("snapshots/1").exists());
    }

    #[test]
    fn test_upperdir_label() {
        let (dir, sn) = snapshotter(Config {
            upperdir_label: true,
            ..Default::default()
        });
        sn.prepare("a", "", Labels::new()).unwrap();

        let info = sn.stat("a").unwrap();
        assert_eq!(
            info.labels.get(UPPERDIR_LABEL),
            Some(&dir.path().join("snapshots/1/fs").display().to_string())
        );
    }

    #[test]
    fn test_walk_with_filters() {
        let (_dir, sn) = snapshotter(Config::default());
        committed(&sn, "base", "");
        sn.prepare("a", "base", Labels::new()).unwrap();
        sn.view("v", "base", Labels::new()).unwrap();

        let mut names = Vec::new();
        sn.walk(
            &mut |info: &Info| {
                names.push(info.name.clone());
                Ok(())
            },
            &["kind==active".to_string(), "kind==view".to_string()],
        )
        .unwrap();

        assert_eq!(names, vec!["a", "v"]);
    }

    #[test]
    fn test_state_survives_reopen() {
        let (dir, sn) = snapshotter(Config::default());
        sn.prepare("a", "", Labels::new()).unwrap();
        sn.close().unwrap();
        drop(sn);

        let sn = OverlaySnapshotter::new(dir.path(), Config::default()).unwrap();
        assert_eq!(sn.stat("a").unwrap().kind, Kind::Active);
        sn.prepare("b", "", Labels::new()).unwrap();
        assert!(dir.path().join("snapshots/2").exists());
    }

    #[test]
    fn test_corrupt_state_file_fails_to_open() {
        let (dir, sn) = snapshotter(Config::default());
        sn.prepare("a", "", Labels::new()).unwrap();
        drop(sn);
        std::fs::write(dir.path().join(STATE_FILE), "{ \"snapshots\": {").unwrap();

        let result = OverlaySnapshotter::new(dir.path(), Config::default());

        assert!(matches!(result, Err(Error::ParseStateFile(_))));
        assert!(dir.path().join("snapshots/1/fs").is_dir());
    }
}
