use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

/// Labels attached to a snapshot.
pub type Labels = HashMap<String, String>;

/// `Mount` describes a filesystem mount, as it would be given to `mount(8)`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Mount {
    /// The FS type for the mount point
    #[serde(rename = "type")]
    pub typ: String,
    /// The mount source
    pub source: String,
    /// The mount options, in the `key=value` or `flag` format
    pub options: Vec<String>,
}

/// The kind of a snapshot.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Kind {
    #[serde(rename = "view")]
    View,
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "committed")]
    Committed,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::View => "view",
            Kind::Active => "active",
            Kind::Committed => "committed",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Info` holds the public information's about a snapshot.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Info {
    pub kind: Kind,
    /// The key of an active or view snapshot, or the name of a committed one
    pub name: String,
    /// The name of the committed parent, if any
    pub parent: Option<String>,
    pub labels: Labels,
    pub created: SystemTime,
    pub updated: SystemTime,
}

/// The resources used by a snapshot on the disk.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Usage {
    /// Number of inodes
    pub inodes: u64,
    /// Size in bytes
    pub size: u64,
}
