use crate::state::{MetadataManager, SnapshotMetadata, State};
use crate::types::{Info, Kind, Labels, Usage};
use crate::{Error, MetaTransaction, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::SystemTime;

/// `Snapshot` is what a mount-producing operation needs to know about a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub kind: Kind,
    pub id: String,
    /// The identifiers of the parents, nearest first
    pub parent_ids: Vec<String>,
}

/// `MetaStore` persists the snapshots state and serializes access to it.
///
/// Writable transactions hold the write lock for their whole duration, so they are mutually
/// exclusive with any other transaction.
#[derive(Debug)]
pub(crate) struct MetaStore {
    state_file: PathBuf,
    state: RwLock<State>,
}

impl MetaStore {
    pub fn new(state_file: PathBuf) -> Result<Self> {
        let state = State::try_from(&state_file)?;

        Ok(MetaStore {
            state_file,
            state: RwLock::new(state),
        })
    }

    /// Run `f` in a transaction.
    ///
    /// A writable transaction works on a copy of the state, which replaces the current one
    /// and is saved to the disk only if `f` succeeds.
    pub fn with_transaction<T, F>(&self, writable: bool, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        if !writable {
            let state = self
                .state
                .read()
                .map_err(|e| Error::LockPoisoned(e.to_string()))?;
            let mut tx = Transaction {
                state: state.clone(),
                writable: false,
            };
            return f(&mut tx);
        }

        let mut state = self
            .state
            .write()
            .map_err(|e| Error::LockPoisoned(e.to_string()))?;
        let mut tx = Transaction {
            state: state.clone(),
            writable: true,
        };

        let result = f(&mut tx)?;

        tx.state.save(&self.state_file)?;
        *state = tx.state;

        Ok(result)
    }

    /// Save the current state into the state file.
    pub fn save(&self) -> Result<()> {
        self.state
            .read()
            .map_err(|e| Error::LockPoisoned(e.to_string()))?
            .save(&self.state_file)
    }
}

/// A unit of work against the snapshots metadata.
#[derive(Debug)]
pub struct Transaction {
    state: State,
    writable: bool,
}

impl Transaction {
    fn ensure_writable(&self) -> Result<()> {
        match self.writable {
            true => Ok(()),
            false => Err(Error::ReadOnlyTransaction),
        }
    }

    fn metadata(&self, key: &str) -> Result<&SnapshotMetadata> {
        self.state
            .snapshot(key)
            .ok_or_else(|| Error::NotFound(format!("snapshot {} does not exist", key)))
    }

    /// Create the metadata of a new active or view snapshot.
    ///
    /// An empty `parent` creates a snapshot without parent.
    pub fn create_snapshot(
        &mut self,
        kind: Kind,
        key: &str,
        parent: &str,
        labels: Labels,
    ) -> Result<Snapshot> {
        self.ensure_writable()?;

        if kind == Kind::Committed {
            return Err(Error::InvalidKind(format!(
                "snapshot {} can't be created as committed",
                key
            )));
        }
        if self.state.has_snapshot(key) {
            return Err(Error::AlreadyExists(format!("snapshot {} already exists", key)));
        }

        let parent = match parent.is_empty() {
            true => None,
            false => {
                let parent_kind = self.metadata(parent)?.kind;
                if parent_kind != Kind::Committed {
                    return Err(Error::InvalidParent(format!(
                        "parent {} is {}, not committed",
                        parent, parent_kind
                    )));
                }
                Some(parent.to_string())
            }
        };

        let id = self.state.snapshot_index().to_string();
        log::debug!("creating {} snapshot {} with id {}", kind, key, id);

        self.state
            .add_snapshot(key, SnapshotMetadata::new(id, kind, parent, labels));

        self.get_snapshot(key)
    }

    /// Get an active or view snapshot, with the identifiers of all its parents.
    pub fn get_snapshot(&self, key: &str) -> Result<Snapshot> {
        let metadata = self.metadata(key)?;
        if metadata.kind == Kind::Committed {
            return Err(Error::InvalidKind(format!(
                "snapshot {} is committed, not active or view",
                key
            )));
        }

        let mut parent_ids = Vec::new();
        let mut parent = metadata.parent.as_deref();
        while let Some(name) = parent {
            let p = self.metadata(name)?;
            parent_ids.push(p.id.clone());
            parent = p.parent.as_deref();
        }

        Ok(Snapshot {
            kind: metadata.kind,
            id: metadata.id.clone(),
            parent_ids,
        })
    }

    /// Get the identifier, the public information's and the recorded usage of a snapshot.
    pub fn get_info(&self, key: &str) -> Result<(String, Info, Usage)> {
        let metadata = self.metadata(key)?;
        Ok((metadata.id.clone(), metadata.info(key), metadata.usage))
    }

    /// Set a single label on a snapshot.
    pub fn set_label(&mut self, key: &str, name: &str, value: &str) -> Result<()> {
        self.ensure_writable()?;
        let metadata = self
            .state
            .snapshot_mut(key)
            .ok_or_else(|| Error::NotFound(format!("snapshot {} does not exist", key)))?;
        metadata.labels.insert(name.to_string(), value.to_string());
        metadata.updated = SystemTime::now();
        Ok(())
    }

    /// Update the labels of the snapshot named by `info.name`.
    ///
    /// With no field paths all labels are replaced, `labels` does the same and
    /// `labels.<name>` only sets, or removes when absent from `info`, one label.
    pub fn update_info(&mut self, info: Info, fieldpaths: &[String]) -> Result<Info> {
        self.ensure_writable()?;
        let metadata = self
            .state
            .snapshot_mut(&info.name)
            .ok_or_else(|| Error::NotFound(format!("snapshot {} does not exist", info.name)))?;

        let mut labels = metadata.labels.clone();
        if fieldpaths.is_empty() {
            labels = info.labels.clone();
        }
        for path in fieldpaths {
            if path == "labels" {
                labels = info.labels.clone();
            } else if let Some(name) = path.strip_prefix("labels.") {
                match info.labels.get(name) {
                    Some(value) => labels.insert(name.to_string(), value.clone()),
                    None => labels.remove(name),
                };
            } else {
                return Err(Error::InvalidFieldPath(format!(
                    "cannot update {} field on snapshot {}",
                    path, info.name
                )));
            }
        }

        metadata.labels = labels;
        metadata.updated = SystemTime::now();

        Ok(metadata.info(&info.name))
    }

    /// Commit the active snapshot `key` under `name`, keeping its identifier.
    pub fn commit_active(
        &mut self,
        key: &str,
        name: &str,
        usage: Usage,
        labels: Labels,
    ) -> Result<String> {
        self.ensure_writable()?;

        if self.state.has_snapshot(name) {
            return Err(Error::AlreadyExists(format!("snapshot {} already exists", name)));
        }
        let kind = self.metadata(key)?.kind;
        if kind != Kind::Active {
            return Err(Error::InvalidKind(format!(
                "snapshot {} is {}, not active",
                key, kind
            )));
        }

        let active = self
            .state
            .remove_snapshot(key)
            .ok_or_else(|| Error::NotFound(format!("snapshot {} does not exist", key)))?;

        let mut committed =
            SnapshotMetadata::new(active.id.clone(), Kind::Committed, active.parent, labels);
        committed.usage = usage;
        self.state.add_snapshot(name, committed);

        Ok(active.id)
    }

    /// Call `f` with the information's of every snapshot, ordered by name.
    pub fn walk_info(&self, f: &mut dyn FnMut(&Info) -> Result<()>) -> Result<()> {
        let mut infos = self
            .state
            .snapshots()
            .map(|(key, metadata)| metadata.info(key))
            .collect::<Vec<Info>>();
        infos.sort_by(|a, b| a.name.cmp(&b.name));

        for info in &infos {
            f(info)?;
        }
        Ok(())
    }
}

impl MetaTransaction for Transaction {
    fn remove(&mut self, key: &str) -> Result<(String, Kind)> {
        self.ensure_writable()?;
        self.metadata(key)?;

        if self
            .state
            .snapshots()
            .any(|(_, s)| s.parent.as_deref() == Some(key))
        {
            return Err(Error::HasChildren(format!(
                "cannot remove snapshot {} with child",
                key
            )));
        }

        let removed = self
            .state
            .remove_snapshot(key)
            .ok_or_else(|| Error::NotFound(format!("snapshot {} does not exist", key)))?;

        Ok((removed.id, removed.kind))
    }

    fn id_map(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .state
            .snapshots()
            .map(|(key, s)| (s.id.clone(), key.clone()))
            .collect())
    }
}
