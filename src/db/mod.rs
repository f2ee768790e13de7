/// Persistence for the counter collection: a key/value slot store.
mod memory;
mod migrations;
mod slot;

use std::path::{Path, PathBuf};

use crate::error::StorageError;

pub use memory::MemorySlot;
pub use slot::SqliteSlot;

/// A store of named text slots. The engine keeps its whole collection in a
/// single slot and rewrites it after every change.
pub trait SlotStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<S: SlotStorage + ?Sized> SlotStorage for Box<S> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }
}

/// Opens (or creates) the SQLite database and runs migrations.
pub fn init(db_path: &Path) -> Result<SqliteSlot, StorageError> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    SqliteSlot::open(db_path)
}

/// Returns the default database path inside the user's data directory.
/// Falls back to `./tally.db` when no data dir is found.
pub fn default_db_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(data_dir) => data_dir.join("tally").join("tally.db"),
        None => PathBuf::from("tally.db"),
    }
}
