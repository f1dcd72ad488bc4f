//! TOML files of keyed records
//!
//! Webhooks and users are both stored as one table of records keyed by
//! their ID:
//!
//! ```toml
//! [webhooks."0190a6e4-8c1f-7d2e-9f3a-1b2c3d4e5f60"]
//! containerId = "abcdefghijkl"
//! ```
//!
//! The file may be edited while the daemon runs; lookups reload it when its
//! modification time changes.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Errors reading or writing a record file
#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid record {key} in {path}: {reason}")]
    Invalid {
        path: PathBuf,
        key: String,
        reason: String,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize records: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("record {0} already exists")]
    AlreadyExists(String),
}

/// A value stored in a [`RecordFile`]
pub trait Record: Clone + Serialize + DeserializeOwned + Send + 'static {
    /// Name of the table holding the records
    const TABLE: &'static str;

    fn key(&self) -> &str;

    /// Called with the table key after loading, the key is not stored in the body
    fn set_key(&mut self, key: &str);

    /// Reject a loaded record
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug)]
struct Snapshot<T> {
    records: BTreeMap<String, T>,
    /// Modification time of the file when it was last read
    modified: Option<SystemTime>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            modified: None,
        }
    }
}

/// Records loaded from a TOML file
#[derive(Debug)]
pub struct RecordFile<T> {
    path: PathBuf,
    snapshot: Mutex<Snapshot<T>>,
}

impl<T: Record> RecordFile<T> {
    /// Open the file, a missing file holds no records
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read, parsed or validated
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RecordStoreError> {
        let path = path.into();
        let snapshot = read_snapshot(&path).await?;
        Ok(Self {
            path,
            snapshot: Mutex::new(snapshot),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a record, reloading the file first if it changed
    ///
    /// A reload failure is logged and the previous contents are used.
    pub async fn find(&self, key: &str) -> Option<T> {
        let mut snapshot = self.snapshot.lock().await;

        if let Err(e) = self.reload_if_changed(&mut snapshot).await {
            error!(error = %e, table = T::TABLE, "error reading records file");
        }

        snapshot.records.get(key).cloned()
    }

    /// Number of records currently loaded
    pub async fn len(&self) -> usize {
        self.snapshot.lock().await.records.len()
    }

    /// Add a record and write the file
    ///
    /// # Errors
    /// Returns `AlreadyExists` for a duplicate key, or the I/O error
    pub async fn create(&self, record: T) -> Result<T, RecordStoreError> {
        let mut snapshot = self.snapshot.lock().await;
        self.reload_if_changed(&mut snapshot).await?;

        if snapshot.records.contains_key(record.key()) {
            return Err(RecordStoreError::AlreadyExists(record.key().to_string()));
        }

        let mut records = snapshot.records.clone();
        records.insert(record.key().to_string(), record.clone());
        let contents = toml::to_string_pretty(&BTreeMap::from([(T::TABLE, records)]))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| RecordStoreError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        fs::write(&self.path, contents)
            .await
            .map_err(|source| RecordStoreError::Write {
                path: self.path.clone(),
                source,
            })?;

        *snapshot = read_snapshot(&self.path).await?;
        Ok(record)
    }

    async fn reload_if_changed(&self, snapshot: &mut Snapshot<T>) -> Result<(), RecordStoreError> {
        let modified = modified_time(&self.path).await?;
        if modified != snapshot.modified {
            info!(path = %self.path.display(), table = T::TABLE, "found changes, reloading");
            *snapshot = read_snapshot(&self.path).await?;
        }
        Ok(())
    }
}

async fn modified_time(path: &Path) -> Result<Option<SystemTime>, RecordStoreError> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.modified().ok()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RecordStoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn read_snapshot<T: Record>(path: &Path) -> Result<Snapshot<T>, RecordStoreError> {
    let modified = modified_time(path).await?;
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::default()),
        Err(source) => {
            return Err(RecordStoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let mut tables: BTreeMap<String, BTreeMap<String, T>> =
        toml::from_str(&content).map_err(|source| RecordStoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut records = tables.remove(T::TABLE).unwrap_or_default();
    for (key, record) in &mut records {
        record.set_key(key);
        record
            .validate()
            .map_err(|reason| RecordStoreError::Invalid {
                path: path.to_path_buf(),
                key: key.clone(),
                reason,
            })?;
    }

    Ok(Snapshot { records, modified })
}
