//! Durable string key/value media backing the local cache and settings.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const DATA_DIR_NAME: &str = "scanreturn";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediumError {
    #[error("medium_unavailable:{0}")]
    Unavailable(String),
    #[error("medium_invalid_key:{0}")]
    InvalidKey(String),
    #[error("medium_read_failed:{key}:{message}")]
    Read { key: String, message: String },
    #[error("medium_write_failed:{key}:{message}")]
    Write { key: String, message: String },
}

/// Minimal durable storage contract, shaped after browser local storage.
pub trait KeyValueMedium: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, MediumError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), MediumError>;
    fn remove_item(&self, key: &str) -> Result<(), MediumError>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, MediumError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'));
        if !valid || key.starts_with('.') {
            return Err(MediumError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueMedium for FileMedium {
    fn get_item(&self, key: &str) -> Result<Option<String>, MediumError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(MediumError::Read {
                key: key.to_string(),
                message: error.to_string(),
            }),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let path = self.path_for(key)?;
        let write_error = |error: std::io::Error| MediumError::Write {
            key: key.to_string(),
            message: error.to_string(),
        };
        fs::create_dir_all(&self.dir).map_err(write_error)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value).map_err(write_error)?;
        fs::rename(&staging, &path).map_err(write_error)
    }

    fn remove_item(&self, key: &str) -> Result<(), MediumError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(MediumError::Write {
                key: key.to_string(),
                message: error.to_string(),
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryMedium {
    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueMedium for MemoryMedium {
    fn get_item(&self, key: &str) -> Result<Option<String>, MediumError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), MediumError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), MediumError> {
        self.entries().remove(key);
        Ok(())
    }
}

#[must_use]
pub fn default_data_dir() -> PathBuf {
    if let Some(mut data_dir) = dirs::data_local_dir() {
        data_dir.push(DATA_DIR_NAME);
        return data_dir;
    }

    if let Some(mut home_dir) = dirs::home_dir() {
        home_dir.push(format!(".{DATA_DIR_NAME}"));
        return home_dir;
    }

    PathBuf::from(DATA_DIR_NAME)
}
