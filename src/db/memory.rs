use std::collections::HashMap;

use super::SlotStorage;
use crate::error::StorageError;

/// In-memory slot storage for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemorySlot {
    slots: HashMap<String, String>,
    writes: usize,
}

impl MemorySlot {
    pub fn with_slot(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut slots = HashMap::new();
        slots.insert(key.into(), value.into());
        Self { slots, writes: 0 }
    }

    /// Number of writes since creation.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.slots.get(key).map(String::as_str)
    }
}

impl SlotStorage for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.slots.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}
