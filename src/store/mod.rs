//! The counter store: the single owner of the collection.
//!
//! Every mutation goes through a method here, is applied in memory, and is
//! immediately followed by a full write of the collection to the slot
//! storage. Storage failures are logged and never undo the in-memory change.
mod counting;
mod sessions;

use chrono::DateTime;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::db::SlotStorage;
use crate::error::ImportError;
use crate::ids::generate_id;
use crate::repair;
use crate::types::{
    Counter, CounterId, CounterPatch, CounterQuery, DEFAULT_CATEGORY, DEFAULT_COLOR, DEFAULT_ICON,
    DEFAULT_NAME, Millis, NewCounter,
};

pub use sessions::SessionEnd;

pub const STORAGE_KEY: &str = "ethereal_tally_counters_v2";
/// Older slot names, read only when the current one is absent.
pub const LEGACY_STORAGE_KEYS: &[&str] = &["ethereal_tally_counters"];
pub const DEFAULT_LOG_CAP: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreSettings {
    pub storage_key: String,
    /// Most recent log entries kept per counter.
    pub log_cap: usize,
    /// Most recent sessions kept per counter, unbounded when `None`.
    pub session_cap: Option<usize>,
    /// Ended sessions shorter than this are dropped from history.
    pub min_session_seconds: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            storage_key: STORAGE_KEY.to_string(),
            log_cap: DEFAULT_LOG_CAP,
            session_cap: None,
            min_session_seconds: 0,
        }
    }
}

pub struct CounterStore<S, C = SystemClock> {
    counters: Vec<Counter>,
    storage: S,
    clock: C,
    settings: StoreSettings,
    revision: u64,
}

impl<S: SlotStorage> CounterStore<S> {
    pub fn open(storage: S, settings: StoreSettings) -> Self {
        Self::with_clock(storage, SystemClock, settings)
    }
}

impl<S: SlotStorage, C: Clock> CounterStore<S, C> {
    /// Loads whatever the storage holds. Missing or unreadable data yields an
    /// empty collection; readable data is repaired entry by entry.
    pub fn with_clock(storage: S, clock: C, settings: StoreSettings) -> Self {
        let counters = load_collection(&storage, &settings.storage_key);
        Self {
            counters,
            storage,
            clock,
            settings,
            revision: 0,
        }
    }

    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    pub fn get(&self, id: &str) -> Option<&Counter> {
        self.counters.iter().find(|c| c.id == id)
    }

    /// Counters matching `query`, in `order`.
    pub fn query(&self, query: &CounterQuery) -> Vec<&Counter> {
        let mut found: Vec<&Counter> = self
            .counters
            .iter()
            .filter(|c| match query {
                CounterQuery::All => true,
                CounterQuery::Active => !c.is_archived,
                CounterQuery::Archived => c.is_archived,
                CounterQuery::ByCategory(category) => {
                    !c.is_archived && c.category.eq_ignore_ascii_case(category)
                }
            })
            .collect();
        found.sort_by_key(|c| c.order);
        found
    }

    /// Bumped once per applied mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    pub fn create(&mut self, draft: NewCounter) -> CounterId {
        let counter = Counter {
            id: generate_id(),
            name: non_blank(draft.name).unwrap_or_else(|| DEFAULT_NAME.to_string()),
            count: draft.count.unwrap_or(0),
            goal: draft.goal.filter(|goal| *goal > 0),
            color: non_blank(draft.color).unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            icon: non_blank(draft.icon).unwrap_or_else(|| DEFAULT_ICON.to_string()),
            category: non_blank(draft.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            created_at: self.clock.now(),
            is_archived: false,
            logs: Vec::new(),
            sessions: Vec::new(),
            order: self.counters.len(),
            active_session_id: None,
        };
        let id = counter.id.clone();
        self.counters.push(counter);
        self.commit("create");
        id
    }

    pub fn update(&mut self, id: &str, patch: CounterPatch) -> bool {
        let Some(counter) = self.counter_mut(id) else {
            return false;
        };
        if let Some(name) = non_blank(patch.name) {
            counter.name = name;
        }
        if let Some(goal) = patch.goal {
            counter.goal = goal.filter(|goal| *goal > 0);
        }
        if let Some(color) = non_blank(patch.color) {
            counter.color = color;
        }
        if let Some(icon) = non_blank(patch.icon) {
            counter.icon = icon;
        }
        if let Some(category) = non_blank(patch.category) {
            counter.category = category;
        }
        if let Some(archived) = patch.is_archived {
            counter.is_archived = archived;
        }
        if let Some(order) = patch.order {
            counter.order = order;
        }
        self.commit("update");
        true
    }

    pub fn set_archived(&mut self, id: &str, archived: bool) -> bool {
        self.update(id, CounterPatch::default().archived(archived))
    }

    /// Removes the counter together with its logs and sessions. Other
    /// counters keep their `order`.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(index) = self.counters.iter().position(|c| c.id == id) else {
            return false;
        };
        self.counters.remove(index);
        self.commit("delete");
        true
    }

    /// Drops every counter. Nothing is backed up.
    pub fn clear_all(&mut self) {
        let dropped = self.counters.len();
        self.counters.clear();
        info!(dropped, "cleared all counters");
        self.commit("clear_all");
    }

    /// Replaces the whole collection with `text`, or leaves it untouched and
    /// reports why not.
    pub fn try_import(&mut self, text: &str) -> Result<usize, ImportError> {
        let counters = repair::parse_collection(text)?;
        let imported = counters.len();
        self.counters = counters;
        info!(imported, "imported counters");
        self.commit("import");
        Ok(imported)
    }

    pub fn import_data(&mut self, text: &str) -> bool {
        match self.try_import(text) {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "import rejected");
                false
            }
        }
    }

    /// The collection as indented JSON, in the same shape as the stored slot.
    pub fn export_data(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.counters)
    }

    fn counter_mut(&mut self, id: &str) -> Option<&mut Counter> {
        let found = self.counters.iter_mut().find(|c| c.id == id);
        if found.is_none() {
            debug!(id, "no counter with this id");
        }
        found
    }

    fn commit(&mut self, operation: &'static str) {
        self.revision += 1;
        debug!(
            operation,
            revision = self.revision,
            counters = self.counters.len(),
            "state changed"
        );
        self.save();
    }

    fn save(&mut self) {
        let payload = match serde_json::to_string(&self.counters) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize counters");
                return;
            }
        };
        if let Err(err) = self.storage.write(&self.settings.storage_key, &payload) {
            warn!(error = %err, key = %self.settings.storage_key, "failed to persist counters");
        }
    }
}

/// File name for an export taken at `now`, e.g. `tally-backup-2024-03-09.json`.
pub fn backup_file_name(now: Millis) -> String {
    let date = DateTime::from_timestamp_millis(now)
        .unwrap_or_default()
        .format("%Y-%m-%d");
    format!("tally-backup-{date}.json")
}

fn load_collection<S: SlotStorage>(storage: &S, key: &str) -> Vec<Counter> {
    let keys = std::iter::once(key).chain(LEGACY_STORAGE_KEYS.iter().copied());
    for candidate in keys {
        let payload = match storage.read(candidate) {
            Ok(Some(payload)) => payload,
            Ok(None) => continue,
            Err(err) => {
                warn!(error = %err, key = candidate, "failed to read stored counters");
                return Vec::new();
            }
        };
        if candidate != key {
            info!(legacy = candidate, "loading counters from a previous slot");
        }
        return match repair::parse_collection(&payload) {
            Ok(counters) => {
                info!(counters = counters.len(), "loaded counters");
                counters
            }
            Err(err) => {
                warn!(error = %err, key = candidate, "stored counters are unreadable, starting empty");
                Vec::new()
            }
        };
    }
    Vec::new()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
