//! Whole-file JSON logs
//!
//! Each log is a single JSON document of the form `{"<key>": [entry, ...]}`.
//! Appends and updates are read-modify-write cycles finished by an atomic
//! replace, serialized in-process by a mutex. Cross-process exclusion is the
//! job of the log directory lock.
//!
//! Entries are stored as raw JSON values and only deserialized on demand, so
//! an entry written by a newer or older schema survives a rewrite untouched.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::atomic_write::write_file_atomic;
use crate::error::LogError;

/// A JSON array log stored under `key` in the file at `path`.
#[derive(Debug)]
pub struct JsonLog<T> {
    path: PathBuf,
    key: &'static str,
    guard: Mutex<()>,
    _entry: PhantomData<fn() -> T>,
}

impl<T> JsonLog<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>, key: &'static str) -> Self {
        Self {
            path: path.into(),
            key,
            guard: Mutex::new(()),
            _entry: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// All entries that deserialize as `T`, oldest first.
    ///
    /// A missing file is an empty log. A corrupted file is an error here;
    /// [`entries`](Self::entries) is the fail-open variant.
    pub fn load(&self) -> Result<Vec<T>, LogError> {
        let _held = self.lock();
        let doc = self.read_document()?;
        Ok(self.decode_entries(&doc))
    }

    /// Like [`load`](Self::load) but logs and returns an empty list on error.
    #[must_use]
    pub fn entries(&self) -> Vec<T> {
        match self.load() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(log = %self.path.display(), error = %e, "Failed to read log, treating it as empty");
                Vec::new()
            }
        }
    }

    /// Append one entry.
    pub fn append(&self, entry: &T) -> Result<(), LogError> {
        let value = self.to_value(entry)?;
        self.modify(|entries| {
            entries.push(value);
            true
        })
        .map(|_| ())
    }

    /// Apply `update` to the most recent entry matching `matches`.
    ///
    /// Returns false when no entry matched; the file is left untouched.
    pub fn update_last<M, F>(&self, matches: M, update: F) -> Result<bool, LogError>
    where
        M: Fn(&T) -> bool,
        F: FnOnce(&mut T),
    {
        let mut update = Some(update);
        let mut failure = None;
        let changed = self.modify(|entries| {
            for slot in entries.iter_mut().rev() {
                let Ok(mut entry) = serde_json::from_value::<T>(slot.clone()) else {
                    continue;
                };
                if !matches(&entry) {
                    continue;
                }
                if let Some(update) = update.take() {
                    update(&mut entry);
                }
                match serde_json::to_value(&entry) {
                    Ok(value) => {
                        *slot = value;
                        return true;
                    }
                    Err(e) => {
                        failure = Some(e.to_string());
                        return false;
                    }
                }
            }
            false
        })?;

        if let Some(reason) = failure {
            return Err(LogError::Serialize {
                path: self.path.clone(),
                reason,
            });
        }
        Ok(changed)
    }

    /// Replace the most recent entry matching `matches` with `entry`, or
    /// append it when none matches.
    pub fn upsert<M>(&self, entry: &T, matches: M) -> Result<(), LogError>
    where
        M: Fn(&T) -> bool,
    {
        let value = self.to_value(entry)?;
        self.modify(|entries| {
            let position = entries.iter().rposition(|slot| {
                serde_json::from_value::<T>(slot.clone())
                    .map(|existing| matches(&existing))
                    .unwrap_or(false)
            });
            match position {
                Some(index) => entries[index] = value,
                None => entries.push(value),
            }
            true
        })
        .map(|_| ())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.guard
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn to_value(&self, entry: &T) -> Result<Value, LogError> {
        serde_json::to_value(entry).map_err(|e| LogError::Serialize {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Run `edit` against the raw entry array and persist when it reports a
    /// change. A corrupted file is moved aside and replaced by a fresh log.
    fn modify<F>(&self, edit: F) -> Result<bool, LogError>
    where
        F: FnOnce(&mut Vec<Value>) -> bool,
    {
        let _held = self.lock();

        let mut doc = match self.read_document() {
            Ok(doc) => doc,
            Err(LogError::Parse { reason, .. }) => {
                self.quarantine(&reason);
                Map::new()
            }
            Err(e) => return Err(e),
        };

        let mut entries = match doc.remove(self.key) {
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                warn!(
                    log = %self.path.display(),
                    key = self.key,
                    found = %json_kind(&other),
                    "Log key is not an array, starting a fresh list"
                );
                Vec::new()
            }
            None => Vec::new(),
        };

        let changed = edit(&mut entries);
        doc.insert(self.key.to_string(), Value::Array(entries));

        if changed {
            let rendered =
                serde_json::to_string_pretty(&Value::Object(doc)).map_err(|e| {
                    LogError::Serialize {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    }
                })?;
            write_file_atomic(&self.path, &(rendered + "\n")).map_err(|e| LogError::Write {
                path: self.path.clone(),
                reason: format!("{e:#}"),
            })?;
        }
        Ok(changed)
    }

    fn read_document(&self) -> Result<Map<String, Value>, LogError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(LogError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(doc)) => Ok(doc),
            Ok(other) => Err(LogError::Parse {
                path: self.path.clone(),
                reason: format!("expected a JSON object, found {}", json_kind(&other)),
            }),
            Err(e) => Err(LogError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn decode_entries(&self, doc: &Map<String, Value>) -> Vec<T> {
        let Some(Value::Array(raw)) = doc.get(self.key) else {
            return Vec::new();
        };
        raw.iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(log = %self.path.display(), index, error = %e, "Skipping unreadable log entry");
                    None
                }
            })
            .collect()
    }

    fn quarantine(&self, reason: &str) {
        let mut aside = self.path.clone().into_os_string();
        aside.push(".corrupt");
        let aside = PathBuf::from(aside);
        match std::fs::rename(&self.path, &aside) {
            Ok(()) => warn!(
                log = %self.path.display(),
                moved_to = %aside.display(),
                reason,
                "Corrupted log moved aside, starting a fresh log"
            ),
            Err(e) => warn!(
                log = %self.path.display(),
                reason,
                error = %e,
                "Corrupted log could not be moved aside and will be overwritten"
            ),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
