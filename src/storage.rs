// Key-value persistence backends

use crate::models::now_ms;
use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A durable slot store: whole values are read and overwritten by key
pub trait KeyValueStore {
    /// Read the value stored under `key`, or `None` if nothing was ever saved
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`
    ///
    /// When this returns `Ok`, a later `load` must observe `value`.
    fn save(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).save(key, value)
    }
}

pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Storage key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Storage key too long: {} (max 64 chars)", key));
    }
    if !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid storage key: {} (must be alphanumeric with _/-)", key));
    }
    Ok(())
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local storage, lost on drop
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    slots: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.slots.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Session lock
// ============================================================================

/// Exclusive advisory lock on a data directory, held from load to last save
///
/// Uses `.session.lock`, separate from the per-write lock of [`FileStorage`],
/// so a holder can still save through a `FileStorage` on the same directory.
#[derive(Debug)]
pub struct SessionLock {
    _file: fs::File,
    path: PathBuf,
}

impl SessionLock {
    /// Block until the lock on `dir` is free
    pub fn acquire<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let (file, path) = Self::open_lock_file(dir.as_ref())?;
        file.lock_exclusive().context("Failed to acquire session lock")?;
        debug!(path = ?path, "Acquired session lock");
        Ok(Self { _file: file, path })
    }

    /// Take the lock on `dir` only if nobody else holds it
    pub fn try_acquire<P: AsRef<Path>>(dir: P) -> Result<Option<Self>> {
        let (file, path) = Self::open_lock_file(dir.as_ref())?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file, path })),
            Err(_) => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_lock_file(dir: &Path) -> Result<(fs::File, PathBuf)> {
        fs::create_dir_all(dir).context("Failed to create storage directory")?;
        let path = dir.join(".session.lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .context("Failed to open session lock file")?;
        Ok((file, path))
    }
}

// ============================================================================
// File per key
// ============================================================================

/// One `<key>.json` file per slot inside a directory
///
/// Writes go to a temporary file that is renamed over the slot, under an
/// exclusive lock on `.lock` in the same directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open or create a storage directory
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).context("Failed to create storage directory")?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(raw))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(".lock"))
            .context("Failed to open lock file")?;
        lock.lock_exclusive().context("Failed to acquire file lock")?;

        let path = self.slot_path(key);
        let tmp_path = self.dir.join(format!(".{}.json.tmp", key));
        {
            let mut tmp = fs::File::create(&tmp_path).context("Failed to create temporary slot file")?;
            tmp.write_all(value.as_bytes())?;
            tmp.sync_all()?; // Ensure data is flushed to disk before the rename
        }
        fs::rename(&tmp_path, &path).with_context(|| format!("Failed to replace {}", path.display()))?;

        debug!(key, bytes = value.len(), path = ?path, "Saved slot");

        // Lock is released when `lock` is dropped
        Ok(())
    }
}

// ============================================================================
// SQLite
// ============================================================================

/// Slots stored as rows of a single `kv` table
pub struct SqliteStorage {
    db: Connection,
}

impl SqliteStorage {
    /// Open or create a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let db = Connection::open(path).context("Failed to open SQLite database")?;
        Self::with_connection(db)
    }

    /// Database that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::with_connection(db)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        debug!("Creating kv schema");
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SqliteStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let value: Option<String> = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.db.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, now_ms()],
        )?;
        debug!(key, bytes = value.len(), "Saved slot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(storage: &mut dyn KeyValueStore) {
        assert_eq!(storage.load("tasks").unwrap(), None);

        storage.save("tasks", "[1]").unwrap();
        assert_eq!(storage.load("tasks").unwrap().as_deref(), Some("[1]"));

        storage.save("tasks", "[2]").unwrap();
        assert_eq!(storage.load("tasks").unwrap().as_deref(), Some("[2]"));

        assert_eq!(storage.load("other").unwrap(), None);
    }

    #[test]
    fn test_memory_storage() {
        exercise(&mut MemoryStorage::new());
    }

    #[test]
    fn test_sqlite_in_memory_storage() {
        exercise(&mut SqliteStorage::open_in_memory().unwrap());
    }

    #[test]
    fn test_file_storage() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp.path().join("data")).unwrap();
        exercise(&mut storage);

        assert!(storage.slot_path("tasks").exists());
        // Temporary file does not linger after the rename
        assert!(!temp.path().join("data/.tasks.json.tmp").exists());
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut storage = FileStorage::open(temp.path()).unwrap();
            storage.save("tasks", "persisted").unwrap();
        }
        let storage = FileStorage::open(temp.path()).unwrap();
        assert_eq!(storage.load("tasks").unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_sqlite_storage_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("nested/todo.db");
        {
            let mut storage = SqliteStorage::open(&db_path).unwrap();
            storage.save("tasks", "persisted").unwrap();
        }
        let storage = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(storage.load("tasks").unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_boxed_storage() {
        let mut boxed: Box<dyn KeyValueStore> = Box::new(MemoryStorage::new());
        boxed.save("tasks", "x").unwrap();
        assert_eq!(boxed.load("tasks").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("tasks").is_ok());
        assert!(validate_key("my-tasks_2").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key(&"a".repeat(65)).is_err());

        let mut storage = MemoryStorage::new();
        assert!(storage.save("bad/key", "x").is_err());
    }

    #[test]
    fn test_session_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();

        let held = SessionLock::acquire(temp.path()).unwrap();
        assert!(held.path().exists());
        assert!(SessionLock::try_acquire(temp.path()).unwrap().is_none());

        // Saving through the slot store still works while the session is held
        let mut storage = FileStorage::open(temp.path()).unwrap();
        storage.save("tasks", "[]").unwrap();

        drop(held);
        assert!(SessionLock::try_acquire(temp.path()).unwrap().is_some());
    }

    #[test]
    fn test_memory_storage_validates_key_on_load() {
        let storage = MemoryStorage::new();
        assert!(storage.load("bad/key").is_err());
        assert!(storage.load("").is_err());
        assert_eq!(storage.load("tasks").unwrap(), None);
    }
}
