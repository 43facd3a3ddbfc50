//! Keyed JSON state file
//!
//! A single JSON object on disk. Each key holds an arbitrary serialized value
//! and is read and written as a whole.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::StoreError;

/// Durable keyed state backed by one JSON file
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    values: Map<String, Value>,
}

impl StateFile {
    /// Open the state file at `path`, starting empty if it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "StateFile::open: called");

        if !path.exists() {
            debug!("StateFile::open: no file yet, starting empty");
            return Ok(Self {
                path,
                values: Map::new(),
            });
        }

        let content = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;

        if content.trim().is_empty() {
            return Ok(Self {
                path,
                values: Map::new(),
            });
        }

        let values = match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => map,
            _ => return Err(StoreError::NotAnObject { path }),
        };

        debug!(keys = values.len(), "StateFile::open: loaded");
        Ok(Self { path, values })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and deserialize the value stored under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.values.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| StoreError::InvalidValue {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Replace the value under `key` and rewrite the file
    pub fn update<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        debug!(%key, "StateFile::update: called");
        self.values.insert(key.to_string(), serde_json::to_value(value)?);
        self.write()
    }

    fn write(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        }

        let lock_path = sibling(&self.path, "lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StoreError::Lock {
                path: lock_path.clone(),
                source,
            })?;
        lock.lock_exclusive().map_err(|source| StoreError::Lock {
            path: lock_path.clone(),
            source,
        })?;

        let content = serde_json::to_string_pretty(&self.values)?;
        let tmp_path = sibling(&self.path, "tmp");
        let result = fs::write(&tmp_path, content)
            .and_then(|_| fs::rename(&tmp_path, &self.path))
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            });

        // Unlock errors are not actionable; the lock is released on close anyway
        let _ = FileExt::unlock(&lock);
        debug!(path = %self.path.display(), ok = result.is_ok(), "StateFile::write: done");
        result
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
