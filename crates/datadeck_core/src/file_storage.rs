use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::broadcast;

use crate::config::APP_DIR;
use crate::{CatalogError, KeyValueStorage, StorageChange};

/// Durable key/value storage backed by one JSON file per key.
///
/// Writes go through a temp file and a rename so a crash never leaves a
/// half-written snapshot behind.
pub struct FileStorage {
    root: PathBuf,
    changes: broadcast::Sender<StorageChange>,
}

impl FileStorage {
    /// Opens `<data_dir>/datadeck/storage`, creating it if needed.
    pub fn new() -> Result<Self, CatalogError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| CatalogError::IoError("Could not find data directory".into()))?;

        Self::open(data_dir.join(APP_DIR).join("storage"))
    }

    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let (changes, _) = broadcast::channel(16);
        Ok(Self { root, changes })
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{}.json", file))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, CatalogError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CatalogError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CatalogError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Other processes are not observed; the receiver only closes on drop.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
