use serde::{Deserialize, Serialize};

pub type CounterId = String;
pub type LogId = String;
pub type SessionId = String;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

pub const DEFAULT_NAME: &str = "Untitled Counter";
pub const DEFAULT_COLOR: &str = "#0F172A";
pub const DEFAULT_ICON: &str = "Circle";
pub const DEFAULT_CATEGORY: &str = "General";

/// A named tally with an optional goal and its full history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    pub id: CounterId,
    pub name: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<u64>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub created_at: Millis,
    #[serde(default)]
    pub is_archived: bool,
    /// Newest first.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Newest first.
    #[serde(default)]
    pub sessions: Vec<CounterSession>,
    #[serde(default)]
    pub order: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_session_id: Option<SessionId>,
}

impl Counter {
    pub fn active_session(&self) -> Option<&CounterSession> {
        let active = self.active_session_id.as_deref()?;
        self.sessions.iter().find(|s| s.id == active)
    }

    pub fn goal_met(&self) -> bool {
        self.goal.is_some_and(|goal| self.count >= goal)
    }
}

/// One applied increment, decrement or reset.
///
/// `increment` is the requested delta. For a clamped decrement it is larger in
/// magnitude than the change actually applied; `new_value` is always the count
/// that resulted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: LogId,
    pub timestamp: Millis,
    pub increment: i64,
    pub new_value: u64,
}

/// A timed interval over a counter's value. The end fields are filled in
/// together when the session is closed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSession {
    pub id: SessionId,
    pub start_time: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Millis>,
    pub start_value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_value: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Whole seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl CounterSession {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Net change of the counter over the session, once it is closed.
    /// Saturates at the bounds of `i64`.
    pub fn delta(&self) -> Option<i64> {
        let start = self.start_value;
        self.end_value.map(|end| {
            if end >= start {
                0i64.saturating_add_unsigned(end - start)
            } else {
                0i64.saturating_sub_unsigned(start - end)
            }
        })
    }
}

/// Fields accepted when creating a counter. Anything left unset is defaulted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewCounter {
    pub name: Option<String>,
    pub count: Option<u64>,
    pub goal: Option<u64>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub category: Option<String>,
}

impl NewCounter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn goal(mut self, goal: u64) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// The mutable subset of a counter. Identity, creation time, the count and
/// the history can only change through their dedicated operations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CounterPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the goal.
    pub goal: Option<Option<u64>>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub is_archived: Option<bool>,
    pub order: Option<usize>,
}

impl CounterPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn goal(mut self, goal: Option<u64>) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn archived(mut self, archived: bool) -> Self {
        self.is_archived = Some(archived);
        self
    }

    pub fn order(mut self, order: usize) -> Self {
        self.order = Some(order);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CounterQuery {
    All,
    Active,
    Archived,
    /// Active counters whose category matches, ignoring case.
    ByCategory(String),
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}
