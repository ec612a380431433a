use crate::types::{Info, Kind, Labels, Usage};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The `MetadataManager` defines the contract that must be implemented by
/// our state implementation.
pub(crate) trait MetadataManager {
    /// Add a snapshot to the state, under its key.
    fn add_snapshot(&mut self, key: &str, snapshot: SnapshotMetadata) -> &mut Self;
    /// Remove a snapshot from the state by it's key.
    fn remove_snapshot(&mut self, key: &str) -> Option<SnapshotMetadata>;
    /// Check if the state contains a snapshot by it's key
    fn has_snapshot(&self, key: &str) -> bool;
    /// Get a snapshot from the state by it's key
    fn snapshot(&self, key: &str) -> Option<&SnapshotMetadata>;
    /// Get a mutable snapshot from the state by it's key
    fn snapshot_mut(&mut self, key: &str) -> Option<&mut SnapshotMetadata>;
    /// Get a new snapshot index
    fn snapshot_index(&mut self) -> usize;
}

/// `SnapshotMetadata` struct holds information's about a snapshot in the state.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub(crate) struct SnapshotMetadata {
    /// The identifier of the snapshot, also the name of its directory
    pub id: String,
    pub kind: Kind,
    /// The key of the parent snapshot
    pub parent: Option<String>,
    pub labels: Labels,
    pub created: SystemTime,
    pub updated: SystemTime,
    /// The usage recorded when the snapshot was committed
    #[serde(default)]
    pub usage: Usage,
}

impl SnapshotMetadata {
    pub fn new(id: String, kind: Kind, parent: Option<String>, labels: Labels) -> Self {
        let now = SystemTime::now();
        SnapshotMetadata {
            id,
            kind,
            parent,
            labels,
            created: now,
            updated: now,
            usage: Usage::default(),
        }
    }

    /// Build the public information's of the snapshot stored under `key`.
    pub fn info(&self, key: &str) -> Info {
        Info {
            kind: self.kind,
            name: key.to_string(),
            parent: self.parent.clone(),
            labels: self.labels.clone(),
            created: self.created,
            updated: self.updated,
        }
    }
}

/// `State` is responsible about storing information's about snapshots.
#[derive(Clone, Default, Deserialize, Debug, Serialize, PartialEq)]
pub(crate) struct State {
    /// An hashmap that holds every snapshots, by key
    snapshots: HashMap<String, SnapshotMetadata>,
    /// An index to track the last snapshot identifier
    index: usize,
}

impl State {
    /// Save the state into the file.
    ///
    /// The state is written to a temporary file next to `path`, then renamed over it,
    /// so the file on disk always holds a complete state.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let serialized = serde_json::to_string_pretty(&self)
            .map_err(|e| Error::SerializeState(e.to_string()))?;

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| Error::OpenStateFile(e.to_string()))?;
        file.write_all(serialized.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| Error::WriteStateFile(e.to_string()))?;

        fs::rename(&tmp_path, path).map_err(|e| Error::WriteStateFile(e.to_string()))
    }

    /// Iterate over every snapshot, with its key.
    pub fn snapshots(&self) -> impl Iterator<Item = (&String, &SnapshotMetadata)> {
        self.snapshots.iter()
    }
}

impl MetadataManager for State {
    fn add_snapshot(&mut self, key: &str, snapshot: SnapshotMetadata) -> &mut State {
        self.snapshots.insert(key.to_string(), snapshot);
        self
    }

    fn remove_snapshot(&mut self, key: &str) -> Option<SnapshotMetadata> {
        self.snapshots.remove(key)
    }

    fn has_snapshot(&self, key: &str) -> bool {
        self.snapshots.contains_key(key)
    }

    fn snapshot(&self, key: &str) -> Option<&SnapshotMetadata> {
        self.snapshots.get(key)
    }

    fn snapshot_mut(&mut self, key: &str) -> Option<&mut SnapshotMetadata> {
        self.snapshots.get_mut(key)
    }

    fn snapshot_index(&mut self) -> usize {
        self.index += 1;
        self.index
    }
}

impl TryFrom<&PathBuf> for State {
    type Error = crate::Error;

    /// Load the state from a file.
    ///
    /// A missing or empty file is a fresh state. Any other content must parse, otherwise
    /// every snapshot directory would look unreferenced.
    fn try_from(state_file: &PathBuf) -> Result<Self, Self::Error> {
        let content = match fs::read_to_string(state_file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(State::default()),
            Err(e) => return Err(Error::OpenStateFile(e.to_string())),
        };

        if content.trim().is_empty() {
            return Ok(State::default());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::ParseStateFile(format!("{}: {}", state_file.display(), e))
        })
    }
}
