use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::events::Message;

/// Durable transcript kept in a single JSON file.
///
/// Every save is a full snapshot; there are no partial writes. A detached
/// store has no file: it loads nothing and its saves and clears are no-ops.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: Option<PathBuf>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        HistoryStore {
            path: Some(path.into()),
        }
    }

    /// Store that never touches disk
    pub fn detached() -> Self {
        HistoryStore { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Overwrite the stored transcript with `messages`
    pub fn save(&self, messages: &[Message]) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                operation: "creating history directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(messages)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|source| StoreError::Io {
            operation: "writing history",
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| StoreError::Io {
            operation: "replacing history",
            path: path.to_path_buf(),
            source,
        })?;

        tracing::trace!(count = messages.len(), path = %path.display(), "history saved");
        Ok(())
    }

    /// Read the stored transcript. Missing or unreadable content yields an
    /// empty transcript; the failure is only logged.
    pub fn load(&self) -> Vec<Message> {
        let Some(path) = self.path.as_deref() else {
            return Vec::new();
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read history");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Message>>(&content) {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "discarding malformed history");
                Vec::new()
            }
        }
    }

    /// Remove the stored transcript
    pub fn clear(&self) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                operation: "removing history",
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Sender;

    fn store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested").join("history.json"));
        (dir, store)
    }

    #[test]
    fn save_then_load_keeps_order() {
        let (_dir, store) = store();
        let messages = vec![
            Message::new(Sender::Bot, "welcome", "09:00 AM"),
            Message::new(Sender::User, "hello\nworld", "09:01 AM"),
            Message::new(Sender::Bot, "see https://example.com", "09:01 AM"),
        ];

        store.save(&messages).unwrap();
        assert_eq!(store.load(), messages);
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let (_dir, store) = store();
        store
            .save(&[Message::new(Sender::User, "first", "t")])
            .unwrap();
        store
            .save(&[Message::new(Sender::User, "second", "t")])
            .unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].text, "second");
    }

    #[test]
    fn missing_file_loads_empty() {
        let (_dir, store) = store();
        assert!(store.load().is_empty());
    }

    #[test]
    fn malformed_content_loads_empty() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().unwrap().parent().unwrap()).unwrap();
        fs::write(store.path().unwrap(), "{not json").unwrap();
        assert!(store.load().is_empty());

        fs::write(store.path().unwrap(), r#"[{"sender":"alien","text":"x","time":"t"}]"#).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn clear_removes_file_and_tolerates_absence() {
        let (_dir, store) = store();
        store.save(&[Message::new(Sender::Bot, "x", "t")]).unwrap();
        store.clear().unwrap();
        assert!(!store.path().unwrap().exists());
        store.clear().unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn detached_store_keeps_nothing() {
        let store = HistoryStore::detached();
        assert!(store.path().is_none());

        store.save(&[Message::new(Sender::User, "x", "t")]).unwrap();
        assert!(store.load().is_empty());
        store.clear().unwrap();
    }
}
