//! Durable key-value slots for the annotation collection.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StorageError;

/// Name of the slot holding the serialized annotation collection
pub const ANNOTATIONS_SLOT: &str = "divineInsightAnnotations";

/// A single named slot holding one serialized value.
///
/// Reads happen once at startup; every mutation overwrites the slot wholesale.
pub trait AnnotationSlot {
    fn read(&self) -> Result<Option<String>, StorageError>;
    fn write(&mut self, contents: &str) -> Result<(), StorageError>;
}

impl<T: AnnotationSlot + ?Sized> AnnotationSlot for Box<T> {
    fn read(&self) -> Result<Option<String>, StorageError> {
        (**self).read()
    }

    fn write(&mut self, contents: &str) -> Result<(), StorageError> {
        (**self).write(contents)
    }
}

/// Key-value table in a local sqlite database
pub struct SqliteSlot {
    conn: Connection,
    key: String,
}

impl SqliteSlot {
    pub fn open(path: &Path, key: &str) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;

        debug!(path = %path.display(), key, "opened annotation slot");
        Ok(Self {
            conn,
            key: key.to_string(),
        })
    }

    /// `<data dir>/divine-insight/annotations.db`
    pub fn default_path() -> Result<PathBuf, StorageError> {
        let data_dir = dirs::data_dir().ok_or(StorageError::NoDataDir)?;
        Ok(data_dir.join("divine-insight").join("annotations.db"))
    }
}

impl AnnotationSlot for SqliteSlot {
    fn read(&self) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![self.key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, contents: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![self.key, contents],
        )?;
        Ok(())
    }
}

/// Process-local slot, used when no durable storage is available and in tests
#[derive(Debug, Default)]
pub struct MemorySlot {
    contents: Option<String>,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Some(contents.into()),
            ..Self::default()
        }
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn set_failing_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl AnnotationSlot for MemorySlot {
    fn read(&self) -> Result<Option<String>, StorageError> {
        if self.fail_reads {
            return Err(StorageError::Unavailable("slot is unreadable".to_string()));
        }
        Ok(self.contents.clone())
    }

    fn write(&mut self, contents: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Unavailable("slot is unwritable".to_string()));
        }
        self.contents = Some(contents.to_string());
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_slot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let slot = SqliteSlot::open(&dir.path().join("a.db"), ANNOTATIONS_SLOT).unwrap();
        assert_eq!(slot.read().unwrap(), None);
    }

    #[test]
    fn test_sqlite_slot_overwrites_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("a.db");

        {
            let mut slot = SqliteSlot::open(&path, ANNOTATIONS_SLOT).unwrap();
            slot.write("[1]").unwrap();
            slot.write("[1,2]").unwrap();
        }

        let slot = SqliteSlot::open(&path, ANNOTATIONS_SLOT).unwrap();
        assert_eq!(slot.read().unwrap().as_deref(), Some("[1,2]"));
    }

    #[test]
    fn test_sqlite_slots_are_keyed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.db");
        let mut first = SqliteSlot::open(&path, "first").unwrap();
        first.write("one").unwrap();

        let second = SqliteSlot::open(&path, "second").unwrap();
        assert_eq!(second.read().unwrap(), None);
    }

    #[test]
    fn test_memory_slot_failure_injection() {
        let mut slot = MemorySlot::with_contents("[]").failing_writes();
        assert!(slot.write("[1]").is_err());
        assert_eq!(slot.contents(), Some("[]"));
        assert_eq!(slot.write_count(), 0);

        let slot = MemorySlot::new().failing_reads();
        assert!(slot.read().is_err());
    }

    #[test]
    fn test_boxed_slot_delegates() {
        let mut slot: Box<dyn AnnotationSlot> = Box::new(MemorySlot::new());
        slot.write("[]").unwrap();
        assert_eq!(slot.read().unwrap().as_deref(), Some("[]"));
    }
}
