//! Durable session history.
//!
//! The whole [`History`](SessionStore::list_sessions) lives under a single
//! storage key and is overwritten wholesale on every mutation.  The store reads
//! it once when opened and serves all reads from memory afterwards.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::observability::{STORE_WRITES, STORE_WRITE_ERRORS};
use crate::types::{Message, Session, derive_title};
use crate::utils::time::now_millis;

/// The storage key that holds the serialized history.
pub const HISTORY_KEY: &str = "chatHistory";

/// A key/value store holding whole serialized values.
pub trait HistoryStorage: Send {
    /// Reads the value under `key`, or `None` if nothing was ever stored.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the value under `key`.
    ///
    /// Implementations must never leave a partially written value behind.
    fn store(&self, key: &str, value: &str) -> Result<()>;
}

/// Keeps one `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates storage rooted at `dir`.  The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file that backs `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl HistoryStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::io(
                format!("failed to read {}", path.display()),
                err,
            )),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            Error::io(format!("failed to create {}", self.dir.display()), err)
        })?;
        let path = self.path_for(key);
        let tmp_path = self.dir.join(format!(".{key}.json.tmp"));
        let write = || -> io::Result<()> {
            let mut tmp_file = File::create(&tmp_path)?;
            tmp_file.write_all(value.as_bytes())?;
            tmp_file.sync_all()?;
            drop(tmp_file);
            fs::rename(&tmp_path, &path)
        };
        write().map_err(|err| {
            let _ = fs::remove_file(&tmp_path);
            Error::io(format!("failed to write {}", path.display()), err)
        })
    }
}

/// Volatile storage, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage that already holds `value` under `key`.
    pub fn with_value(key: &str, value: impl Into<String>) -> Self {
        let storage = Self::new();
        storage.lock().insert(key.to_string(), value.into());
        storage
    }

    /// Returns the raw value under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl HistoryStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: HistoryStorage + Sync> HistoryStorage for std::sync::Arc<S> {
    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        (**self).store(key, value)
    }
}

/// The session history, cached in memory and persisted on every change.
pub struct SessionStore {
    storage: Box<dyn HistoryStorage>,
    history: Vec<Session>,
}

impl SessionStore {
    /// Opens the store, reading the persisted history once.
    ///
    /// Unparseable history is an error rather than an empty start, so a
    /// corrupt file is never silently overwritten.
    pub fn open(storage: impl HistoryStorage + 'static) -> Result<Self> {
        let history = match storage.load(HISTORY_KEY)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                Error::serialization("failed to parse saved history", Some(Box::new(e)))
            })?,
            None => Vec::new(),
        };
        tracing::debug!(sessions = history.len(), "opened session store");
        Ok(Self {
            storage: Box::new(storage),
            history,
        })
    }

    /// Returns the history, newest session first.
    pub fn list_sessions(&self) -> &[Session] {
        &self.history
    }

    /// Looks up a session by id.
    pub fn get(&self, id: &str) -> Option<&Session> {
        self.history.iter().find(|s| s.id == id)
    }

    /// Returns the number of stored sessions.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true when no sessions are stored.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Saves a conversation and returns the stored session.
    ///
    /// When `current_id` names an existing session, its messages are replaced
    /// in place.  Otherwise a new session with a fresh id and a derived title
    /// is prepended.  The full history is persisted before the in-memory copy
    /// changes, so a failed write leaves the store as it was.
    pub fn upsert_session(
        &mut self,
        current_id: Option<&str>,
        messages: &[Message],
    ) -> Result<Session> {
        let mut updated = self.history.clone();
        let position = current_id.and_then(|id| updated.iter().position(|s| s.id == id));
        let session = match position {
            Some(index) => {
                let existing = &mut updated[index];
                existing.messages = messages.to_vec();
                existing.clone()
            }
            None => {
                let session = Session {
                    id: Uuid::new_v4().to_string(),
                    title: derive_title(messages),
                    created_at: now_millis(),
                    messages: messages.to_vec(),
                };
                updated.insert(0, session.clone());
                session
            }
        };
        self.persist(&updated)?;
        self.history = updated;
        tracing::debug!(session_id = %session.id, messages = session.messages.len(), "saved session");
        Ok(session)
    }

    /// Removes a session.  Unknown ids are not an error.
    pub fn delete_session(&mut self, id: &str) -> Result<()> {
        let remaining: Vec<Session> = self
            .history
            .iter()
            .filter(|s| s.id != id)
            .cloned()
            .collect();
        if remaining.len() == self.history.len() {
            tracing::debug!(session_id = %id, "delete of unknown session");
        }
        self.persist(&remaining)?;
        self.history = remaining;
        Ok(())
    }

    fn persist(&self, history: &[Session]) -> Result<()> {
        STORE_WRITES.click();
        let serialized = serde_json::to_string(history)?;
        self.storage
            .store(HISTORY_KEY, &serialized)
            .inspect_err(|err| {
                STORE_WRITE_ERRORS.click();
                tracing::warn!(error = %err, "failed to persist history");
            })
    }
}
