//! Read/write splitting for overlay snapshots.
//!
//! `SplitSnapshotter` wraps an overlay snapshotter and moves the writable part of its mounts,
//! the `upperdir` and `workdir`, from `root/snapshots` to `root/writable/snapshots`. Read-only
//! layers and per-container writable data can then live on different volumes, while the runtime
//! still gets a single overlay mount.
//!
//! Removal and cleanup are taken over so that both trees are garbage collected against the
//! live snapshot identifiers.

use snapshots::{
    Config, Info, Labels, Mount, OverlaySnapshotter, Result, Snapshotter, Transactor, Usage,
};
use std::path::Path;

pub mod mounts;
pub mod paths;
pub mod reconciler;

pub use mounts::{is_extraction_key, translate, MountOption, EXTRACT_PREFIX};
pub use paths::{Roots, WRITABLE_DIR};
pub use reconciler::{Orphans, Reconciler, RemoveDir};

/// Build an `OverlaySnapshotter` rooted at `root` and wrap it into a `SplitSnapshotter`.
///
/// `config` is given as is to the overlay snapshotter.
pub fn new_snapshotter(root: &Path, config: Config) -> Result<SplitSnapshotter<OverlaySnapshotter>> {
    let inner = OverlaySnapshotter::new(root, config)?;
    SplitSnapshotter::new(root, inner)
}

/// `SplitSnapshotter` decorates a snapshotter, relocating the writable directories of its
/// overlay mounts into a separate tree.
///
/// The inner snapshotter must give access to its metadata transactions, they are used to
/// serialize garbage collection against snapshot creation.
pub struct SplitSnapshotter<S> {
    inner: S,
    roots: Roots,
    remove_dir: RemoveDir,
}

impl<S> SplitSnapshotter<S>
where
    S: Snapshotter + Transactor,
{
    /// Wrap `inner`, whose storage lives under `root`.
    ///
    /// This will ensure the read-tree and the write-tree exist.
    pub fn new(root: &Path, inner: S) -> Result<Self> {
        let roots = Roots::new(root);
        roots.ensure()?;

        Ok(SplitSnapshotter {
            inner,
            roots,
            remove_dir: reconciler::remove_dir_all,
        })
    }

    /// Replace the function deleting orphan directories.
    pub fn with_remove_dir(mut self, remove_dir: RemoveDir) -> Self {
        self.remove_dir = remove_dir;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    fn reconciler(&self) -> Reconciler<'_, S> {
        Reconciler::new(&self.roots, &self.inner, self.remove_dir)
    }
}

impl<S> Snapshotter for SplitSnapshotter<S>
where
    S: Snapshotter + Transactor,
{
    fn stat(&self, key: &str) -> Result<Info> {
        self.inner.stat(key)
    }

    fn update(&self, info: Info, fieldpaths: &[String]) -> Result<Info> {
        self.inner.update(info, fieldpaths)
    }

    fn usage(&self, key: &str) -> Result<Usage> {
        self.inner.usage(key)
    }

    fn mounts(&self, key: &str) -> Result<Vec<Mount>> {
        let mounts = self.inner.mounts(key)?;
        translate(&self.roots, key, mounts)
    }

    fn prepare(&self, key: &str, parent: &str, labels: Labels) -> Result<Vec<Mount>> {
        let mounts = self.inner.prepare(key, parent, labels)?;
        translate(&self.roots, key, mounts)
    }

    fn view(&self, key: &str, parent: &str, labels: Labels) -> Result<Vec<Mount>> {
        let mounts = self.inner.view(key, parent, labels)?;
        translate(&self.roots, key, mounts)
    }

    fn commit(&self, name: &str, key: &str, labels: Labels) -> Result<()> {
        self.inner.commit(name, key, labels)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.reconciler().remove_snapshot(key)
    }

    fn walk(&self, f: &mut dyn FnMut(&Info) -> Result<()>, filters: &[String]) -> Result<()> {
        self.inner.walk(f, filters)
    }

    fn cleanup(&self) -> Result<()> {
        self.reconciler().cleanup()
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}
