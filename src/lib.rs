//! Tally: named counters with goals, an audit log of every change and timed
//! sessions, kept in a single local storage slot.
pub mod cli;
pub mod clock;
pub mod color;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod repair;
pub mod stats;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::{MemorySlot, SlotStorage, SqliteSlot};
pub use error::{ImportError, StorageError};
pub use store::{CounterStore, SessionEnd, StoreSettings};
pub use types::{Counter, CounterPatch, CounterQuery, CounterSession, LogEntry, NewCounter};
