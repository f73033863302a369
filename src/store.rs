//! Sidecar store: file access scoped to one photo folder.
//!
//! Every operation goes through a permission step first. Granted access is
//! remembered for the lifetime of the store, so a folder is asked about at
//! most once per access level; a denial is not remembered and surfaces as
//! [`Error::PermissionDenied`], leaving the folder untouched.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Level of access requested from the user or OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// List and read files.
    Read,
    /// Also create, overwrite and delete files.
    ReadWrite,
}

impl Access {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::ReadWrite => "read_write",
        }
    }
}

/// A file in a store directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    /// File name within the directory.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<DateTime<Utc>>,
}

/// File access scoped to one directory.
pub trait SidecarStore: Send + Sync {
    /// Directory this store is scoped to.
    fn root(&self) -> &Path;

    /// Ask for access. May be denied, in which case nothing else happens.
    fn request_permission(&self, access: Access) -> Result<()>;

    /// List regular, non-hidden files, sorted by name.
    fn list(&self) -> Result<Vec<StoreEntry>>;

    /// Read a file. `Ok(None)` if it does not exist.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Whether a file (or anything else) exists under this name.
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.read(name)?.is_some())
    }

    /// Create or replace a file. Readers never observe a partial file.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Delete a file. `Ok(false)` if it was already gone.
    fn delete(&self, name: &str) -> Result<bool>;
}

/// Callback asked whether to grant access to a folder.
pub type PromptFn = Box<dyn Fn(&Path, Access) -> bool + Send + Sync>;

/// How a [`DirStore`] answers permission requests.
pub enum PermissionMode {
    /// Grant every request the OS allows.
    Allow,
    /// Refuse every request.
    Deny,
    /// Ask the callback.
    Ask(PromptFn),
}

impl std::fmt::Debug for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => f.write_str("Allow"),
            Self::Deny => f.write_str("Deny"),
            Self::Ask(_) => f.write_str("Ask(..)"),
        }
    }
}

#[derive(Debug, Default)]
struct Grants {
    read: bool,
    read_write: bool,
}

impl Grants {
    fn covers(&self, access: Access) -> bool {
        match access {
            Access::Read => self.read || self.read_write,
            Access::ReadWrite => self.read_write,
        }
    }

    fn grant(&mut self, access: Access) {
        match access {
            Access::Read => self.read = true,
            Access::ReadWrite => self.read_write = true,
        }
    }
}

/// Filesystem-backed store.
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
    mode: PermissionMode,
    grants: Mutex<Grants>,
}

impl DirStore {
    /// Create a store for a directory. No filesystem access happens until the
    /// first operation.
    pub fn new(root: impl Into<PathBuf>, mode: PermissionMode) -> Self {
        Self {
            root: root.into(),
            mode,
            grants: Mutex::new(Grants::default()),
        }
    }

    /// Store that grants every request the OS allows.
    pub fn allow_all(root: impl Into<PathBuf>) -> Self {
        Self::new(root, PermissionMode::Allow)
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn denied(&self) -> Error {
        Error::PermissionDenied {
            path: self.root.clone(),
        }
    }

    fn check_os_access(&self, access: Access) -> Result<()> {
        let metadata = fs::metadata(&self.root).map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => self.denied(),
            _ => Error::Io(e),
        })?;
        if !metadata.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a directory: {}", self.root.display()),
            )));
        }
        if access == Access::ReadWrite && metadata.permissions().readonly() {
            return Err(self.denied());
        }
        Ok(())
    }
}

impl SidecarStore for DirStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn request_permission(&self, access: Access) -> Result<()> {
        let mut grants = self.grants.lock().map_err(|_| {
            Error::Io(io::Error::other("permission state poisoned"))
        })?;
        if grants.covers(access) {
            return Ok(());
        }

        self.check_os_access(access)?;

        let granted = match &self.mode {
            PermissionMode::Allow => true,
            PermissionMode::Deny => false,
            PermissionMode::Ask(prompt) => prompt(&self.root, access),
        };
        if !granted {
            tracing::warn!(folder = %self.root.display(), access = access.as_str(), "permission denied");
            return Err(self.denied());
        }

        tracing::debug!(folder = %self.root.display(), access = access.as_str(), "permission granted");
        grants.grant(access);
        Ok(())
    }

    fn list(&self) -> Result<Vec<StoreEntry>> {
        self.request_permission(Access::Read)?;

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(StoreEntry {
                name,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_of(name)?;
        self.request_permission(Access::Read)?;

        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name)?;
        self.request_permission(Access::Read)?;
        Ok(fs::symlink_metadata(&path).is_ok())
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(name)?;
        self.request_permission(Access::ReadWrite)?;

        let mut file = tempfile::NamedTempFile::new_in(&self.root)?;
        file.write_all(bytes)?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(file = name, bytes = bytes.len(), "file written");
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name)?;
        self.request_permission(Access::ReadWrite)?;

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(file = name, "file deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reject names that would escape the store directory.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || Path::new(name).is_absolute();
    if invalid {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::allow_all(dir.path());

        assert_eq!(store.read("a.xmp").unwrap(), None);
        store.write("a.xmp", b"first").unwrap();
        store.write("a.xmp", b"second").unwrap();
        assert_eq!(store.read("a.xmp").unwrap().as_deref(), Some(&b"second"[..]));

        assert!(store.exists("a.xmp").unwrap());
        assert!(store.delete("a.xmp").unwrap());
        assert!(!store.delete("a.xmp").unwrap());
        assert!(!store.exists("a.xmp").unwrap());
        assert_eq!(store.read("a.xmp").unwrap(), None);
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::allow_all(dir.path());
        store.write("a.xmp", b"data").unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a.xmp"]);
    }

    #[test]
    fn test_list_sorted_skips_hidden_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), b"12345").unwrap();
        fs::write(dir.path().join("a.jpg"), b"1").unwrap();
        fs::write(dir.path().join(".DS_Store"), b"").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let store = DirStore::allow_all(dir.path());
        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.jpg");
        assert_eq!(entries[1].name, "b.jpg");
        assert_eq!(entries[1].size, 5);
    }

    #[test]
    fn test_denied_store_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path(), PermissionMode::Deny);

        let err = store.write("a.xmp", b"data").unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
        assert!(err.is_recoverable());
        assert!(!dir.path().join("a.xmp").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_prompt_asked_once_per_access_level() {
        let dir = tempfile::tempdir().unwrap();
        let asked = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&asked);
        let store = DirStore::new(
            dir.path(),
            PermissionMode::Ask(Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            })),
        );

        store.write("a.xmp", b"1").unwrap();
        store.write("b.xmp", b"2").unwrap();
        store.read("a.xmp").unwrap();
        store.list().unwrap();
        assert_eq!(asked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prompt_read_only_grant() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.xmp"), b"x").unwrap();
        let store = DirStore::new(
            dir.path(),
            PermissionMode::Ask(Box::new(|_, access| access == Access::Read)),
        );

        assert!(store.read("a.xmp").unwrap().is_some());
        assert!(matches!(store.delete("a.xmp"), Err(Error::PermissionDenied { .. })));
        assert!(dir.path().join("a.xmp").exists());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::allow_all(dir.path().join("nope"));
        assert!(matches!(store.list(), Err(Error::Io(_))));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("IMG_1.jpg").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("../escape.xmp").is_err());
        assert!(validate_name("sub/a.xmp").is_err());
        assert!(validate_name("a\\b.xmp").is_err());

        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::allow_all(dir.path());
        assert!(matches!(store.read("../x"), Err(Error::InvalidName(_))));
    }
}
