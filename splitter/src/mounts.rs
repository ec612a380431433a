use crate::paths::Roots;
use snapshots::{Error, Mount, Result};
use std::fmt;
use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

/// Keys of image extraction snapshots start with this prefix once the namespace is stripped.
pub const EXTRACT_PREFIX: &str = "extract-";

const OVERLAY_TYPE: &str = "overlay";
const UPPERDIR: &str = "upperdir";
const WORKDIR: &str = "workdir";

/// A single mount option, either `key=value` or a bare flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountOption {
    key: String,
    value: Option<String>,
}

impl MountOption {
    pub fn new(key: &str, value: &str) -> Self {
        MountOption {
            key: key.to_string(),
            value: Some(value.to_string()),
        }
    }

    pub fn parse(option: &str) -> Self {
        match option.split_once('=') {
            Some((key, value)) => MountOption::new(key, value),
            None => MountOption {
                key: option.to_string(),
                value: None,
            },
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for MountOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => f.write_str(&self.key),
        }
    }
}

/// Check if a snapshot key belongs to an image extraction.
///
/// The namespace is everything up to the first `/`.
pub fn is_extraction_key(key: &str) -> bool {
    let stripped = key.split_once('/').map_or(key, |(_, rest)| rest);
    stripped.starts_with(EXTRACT_PREFIX)
}

/// Relocate the upper and work directories of an overlay mount into the write-tree.
///
/// Only a single overlay mount is rewritten, extraction snapshots are left untouched.
/// Each relocated directory is created if missing. Options already pointing into
/// `root/writable` are kept as is, so translating twice changes nothing.
pub fn translate(roots: &Roots, key: &str, mut mounts: Vec<Mount>) -> Result<Vec<Mount>> {
    if mounts.len() != 1 || mounts[0].typ != OVERLAY_TYPE || is_extraction_key(key) {
        return Ok(mounts);
    }

    let writable = roots.writable();

    for option in mounts[0].options.iter_mut() {
        let parsed = MountOption::parse(option);
        if parsed.key() != UPPERDIR && parsed.key() != WORKDIR {
            continue;
        }
        let path = match parsed.value() {
            Some(value) => Path::new(value),
            None => continue,
        };
        if path.starts_with(&writable) {
            continue;
        }

        let suffix = match path.strip_prefix(roots.root()) {
            Ok(suffix) => suffix,
            Err(_) => {
                log::debug!(
                    "{} of snapshot {} is outside of {}, keeping it",
                    option,
                    key,
                    roots.root().display()
                );
                continue;
            }
        };

        let relocated = writable.join(suffix);
        DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(&relocated)
            .map_err(|e| {
                Error::WritableDirectoryCreation(format!(
                    "failed to create {} {}: {}",
                    parsed.key(),
                    relocated.display(),
                    e
                ))
            })?;

        log::debug!(
            "relocating {} of snapshot {} to {}",
            parsed.key(),
            key,
            relocated.display()
        );
        *option = MountOption::new(parsed.key(), &relocated.to_string_lossy()).to_string();
    }

    Ok(mounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    fn overlay(root: &Path, id: &str) -> Vec<Mount> {
        let root = root.display();
        vec![Mount {
            typ: "overlay".to_string(),
            source: "overlay".to_string(),
            options: vec![
                "index=off".to_string(),
                format!("workdir={}/snapshots/{}/work", root, id),
                format!("upperdir={}/snapshots/{}/fs", root, id),
                format!("lowerdir={}/snapshots/1/fs", root),
            ],
        }]
    }

    #[test]
    fn test_parse_mount_options() {
        let option = MountOption::parse("upperdir=/a=b");
        assert_eq!(option.key(), "upperdir");
        assert_eq!(option.value(), Some("/a=b"));
        assert_eq!(option.to_string(), "upperdir=/a=b");

        let flag = MountOption::parse("rbind");
        assert_eq!(flag.key(), "rbind");
        assert_eq!(flag.value(), None);
        assert_eq!(flag.to_string(), "rbind");
    }

    #[test]
    fn test_extraction_keys() {
        assert!(is_extraction_key("default/extract-12345 sha256:abc"));
        assert!(is_extraction_key("extract-12345"));
        assert!(!is_extraction_key("default/container-extract-1"));
        assert!(!is_extraction_key("extract/container"));
    }

    #[test]
    fn test_translate_relocates_upper_and_work() {
        let dir = TempDir::new("rwsplit_translate").unwrap();
        let roots = Roots::new(dir.path());
        let root = dir.path().display();

        let mounts = translate(&roots, "default/2", overlay(dir.path(), "2")).unwrap();

        assert_eq!(
            mounts[0].options,
            vec![
                "index=off".to_string(),
                format!("workdir={}/writable/snapshots/2/work", root),
                format!("upperdir={}/writable/snapshots/2/fs", root),
                format!("lowerdir={}/snapshots/1/fs", root),
            ]
        );
        assert!(dir.path().join("writable/snapshots/2/fs").is_dir());
        assert!(dir.path().join("writable/snapshots/2/work").is_dir());
    }

    #[test]
    fn test_translate_is_idempotent() {
        let dir = TempDir::new("rwsplit_translate").unwrap();
        let roots = Roots::new(dir.path());

        let once = translate(&roots, "default/2", overlay(dir.path(), "2")).unwrap();
        fs::remove_dir_all(roots.writable()).unwrap();

        let twice = translate(&roots, "default/2", once.clone()).unwrap();

        assert_eq!(once, twice);
        assert!(!roots.writable().exists());
    }

    #[test]
    fn test_translate_skips_non_overlay_and_multiple_mounts() {
        let dir = TempDir::new("rwsplit_translate").unwrap();
        let roots = Roots::new(dir.path());

        let mut bind = overlay(dir.path(), "2");
        bind[0].typ = "bind".to_string();
        assert_eq!(translate(&roots, "default/2", bind.clone()).unwrap(), bind);

        let mut two = overlay(dir.path(), "2");
        two.extend(overlay(dir.path(), "3"));
        assert_eq!(translate(&roots, "default/2", two.clone()).unwrap(), two);

        assert!(translate(&roots, "default/2", vec![]).unwrap().is_empty());
        assert!(!roots.writable().exists());
    }

    #[test]
    fn test_translate_skips_extraction() {
        let dir = TempDir::new("rwsplit_translate").unwrap();
        let roots = Roots::new(dir.path());
        let mounts = overlay(dir.path(), "2");

        let translated = translate(&roots, "default/extract-1 sha256:abc", mounts.clone()).unwrap();

        assert_eq!(translated, mounts);
        assert!(!roots.writable().exists());
    }

    #[test]
    fn test_translate_keeps_paths_outside_root() {
        let dir = TempDir::new("rwsplit_translate").unwrap();
        let roots = Roots::new(&dir.path().join("root"));
        let mounts = vec![Mount {
            typ: "overlay".to_string(),
            source: "overlay".to_string(),
            options: vec![format!("upperdir={}/elsewhere/fs", dir.path().display())],
        }];

        assert_eq!(translate(&roots, "default/2", mounts.clone()).unwrap(), mounts);
    }

    #[test]
    fn test_translate_fails_when_directory_cannot_be_created() {
        let dir = TempDir::new("rwsplit_translate").unwrap();
        let roots = Roots::new(dir.path());
        // A file where the write-tree should be
        fs::write(roots.writable(), "").unwrap();

        let result = translate(&roots, "default/2", overlay(dir.path(), "2"));

        assert!(matches!(result, Err(Error::WritableDirectoryCreation(_))));
    }
}
