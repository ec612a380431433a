use std::collections::HashMap;

mod filters;
pub mod overlay;
mod state;
mod storage;
mod types;
mod utils;

pub use overlay::{Config, OverlaySnapshotter};
pub use storage::{Snapshot, Transaction};
pub use types::{Info, Kind, Labels, Mount, Usage};

/// The directory, relative to the snapshotter root, holding one sub directory per snapshot identifier.
pub const SNAPSHOTS_DIR: &str = "snapshots";
/// The file where the snapshot metadata will be stored.
pub(crate) const STATE_FILE: &str = "metadata.json";

#[derive(Debug)]
pub enum Error {
    /// No snapshot exists with the given key
    NotFound(String),
    /// A snapshot already exists with the given key or name
    AlreadyExists(String),
    /// The parent of a snapshot is not a committed snapshot
    InvalidParent(String),
    /// The snapshot kind does not allow the requested operation
    InvalidKind(String),
    /// The snapshot can't be removed while other snapshots are built on it
    HasChildren(String),
    /// An unsupported field path was given to an update
    InvalidFieldPath(String),
    /// A walk filter could not be parsed
    InvalidFilter(String),
    /// A metadata mutation was attempted inside a read-only transaction
    ReadOnlyTransaction,
    /// An error occurred during the creation of a snapshot directory
    CreateDirectory(String),
    /// An error occurred when listing a snapshot directory
    ReadDirectory(String),
    /// An error occurred when computing the disk usage of a snapshot
    Usage(String),
    /// An error occurred when the writable upper or work directory of a mount could not be created
    WritableDirectoryCreation(String),
    /// An error occurred when trying to open the state file
    OpenStateFile(String),
    /// The state file exists but its content can't be parsed
    ParseStateFile(String),
    /// An error occurred when trying to serialize the state
    SerializeState(String),
    /// An error occurred when trying to write the state into the file
    WriteStateFile(String),
    /// Fail to acquire the metadata store lock
    LockPoisoned(String),
}

/// A common result type for our crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The `Snapshotter` trait defines the operations a layered filesystem snapshotter provides.
///
/// Every method returning mounts gives back descriptors ready to be mounted by the runtime,
/// the snapshotter itself never calls `mount`.
pub trait Snapshotter: Send + Sync {
    /// Get the information about a snapshot.
    fn stat(&self, key: &str) -> Result<Info>;
    /// Update the labels of a snapshot, `fieldpaths` selects which labels are touched.
    fn update(&self, info: Info, fieldpaths: &[String]) -> Result<Info>;
    /// Get the resources used by a snapshot.
    fn usage(&self, key: &str) -> Result<Usage>;
    /// Get the mounts of an active or view snapshot.
    fn mounts(&self, key: &str) -> Result<Vec<Mount>>;
    /// Create an active snapshot on top of `parent`. An empty parent starts from scratch.
    fn prepare(&self, key: &str, parent: &str, labels: Labels) -> Result<Vec<Mount>>;
    /// Create a read-only snapshot on top of `parent`.
    fn view(&self, key: &str, parent: &str, labels: Labels) -> Result<Vec<Mount>>;
    /// Turn the active snapshot `key` into the committed snapshot `name`.
    fn commit(&self, name: &str, key: &str, labels: Labels) -> Result<()>;
    /// Remove a snapshot.
    fn remove(&self, key: &str) -> Result<()>;
    /// Call `f` for every snapshot matching one of the `filters`.
    fn walk(&self, f: &mut dyn FnMut(&Info) -> Result<()>, filters: &[String]) -> Result<()>;
    /// Remove the directories left behind by removed snapshots.
    fn cleanup(&self) -> Result<()>;
    /// Release the resources held by the snapshotter.
    fn close(&self) -> Result<()>;
}

/// `Transactor` gives access to the metadata store backing a snapshotter.
///
/// A writable transaction is exclusive: no other transaction may run while it is held.
/// When `f` fails, every change it made is discarded.
pub trait Transactor: Send + Sync {
    type Transaction: MetaTransaction;

    fn with_transaction<T, F>(&self, writable: bool, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Transaction) -> Result<T>;
}

/// The metadata operations available inside a transaction.
pub trait MetaTransaction {
    /// Remove the metadata of `key`, returning its identifier and kind.
    fn remove(&mut self, key: &str) -> Result<(String, Kind)>;
    /// Get every live identifier, mapped to the key owning it.
    fn id_map(&self) -> Result<HashMap<String, String>>;
}
