use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionSnapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt session record {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid session key '{0}'")]
    InvalidKey(String),
}

/// What the store keeps per session: the snapshot and when it was last used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub snapshot: SessionSnapshot,
    pub touched_at: DateTime<Utc>,
}

/// Persists snapshots keyed by an opaque session key.
///
/// Callers serialize load → mutate → save per key; implementations do not
/// lock individual sessions.
pub trait SessionStore: Send {
    fn load(&self, key: &str) -> Result<Option<SessionRecord>, StoreError>;
    fn save(&mut self, key: &str, record: &SessionRecord) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    /// Removes every record last touched before `cutoff`, returning their keys.
    fn purge_expired(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError>;
}

impl<T: SessionStore + ?Sized> SessionStore for Box<T> {
    fn load(&self, key: &str) -> Result<Option<SessionRecord>, StoreError> {
        (**self).load(key)
    }

    fn save(&mut self, key: &str, record: &SessionRecord) -> Result<(), StoreError> {
        (**self).save(key, record)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn purge_expired(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        (**self).purge_expired(cutoff)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    records: HashMap<String, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, key: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn save(&mut self, key: &str, record: &SessionRecord) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), record.clone());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }

    fn purge_expired(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let expired: Vec<String> = self
            .records
            .iter()
            .filter(|(_, record)| record.touched_at < cutoff)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.records.remove(key);
        }
        Ok(expired)
    }
}

/// One pretty-printed JSON file per session under `dir`.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("session_{key}.json")))
    }

    fn read_record(&self, key: &str, path: &Path) -> Result<SessionRecord, StoreError> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, key: &str) -> Result<Option<SessionRecord>, StoreError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        self.read_record(key, &path).map(Some)
    }

    fn save(&mut self, key: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let json = serde_json::to_string_pretty(record).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        fs::write(path, json)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn purge_expired(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let mut expired = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let key = match path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("session_"))
                .and_then(|name| name.strip_suffix(".json"))
            {
                Some(key) => key.to_string(),
                None => continue,
            };
            // unreadable records are left for an operator to inspect
            if let Ok(record) = self.read_record(&key, &path) {
                if record.touched_at < cutoff {
                    fs::remove_file(&path)?;
                    expired.push(key);
                }
            }
        }
        expired.sort();
        Ok(expired)
    }
}
