//! Core types for the journal.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Maximum length of entry content, in characters.
pub const MAX_CONTENT_LEN: usize = 500;

/// Kind of journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Task,
    Event,
    Note,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Task => "task",
            EntryType::Event => "event",
            EntryType::Note => "note",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "task" => Some(EntryType::Task),
            "event" => Some(EntryType::Event),
            "note" => Some(EntryType::Note),
            _ => None,
        }
    }
}

/// Lifecycle state of a task row.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Incomplete,
    Complete,
    Migrated,
    Scheduled,
    Cancelled,
}

impl TaskState {
    pub const ALL: [TaskState; 5] = [
        TaskState::Incomplete,
        TaskState::Complete,
        TaskState::Migrated,
        TaskState::Scheduled,
        TaskState::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Incomplete => "incomplete",
            TaskState::Complete => "complete",
            TaskState::Migrated => "migrated",
            TaskState::Scheduled => "scheduled",
            TaskState::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        TaskState::ALL.into_iter().find(|state| state.as_str() == s)
    }

    /// Row superseded by a newer row in its lineage.
    pub fn is_closed(&self) -> bool {
        matches!(self, TaskState::Migrated | TaskState::Scheduled)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event state, tracked separately from task state.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    #[default]
    Upcoming,
    Attended,
    Missed,
    Cancelled,
    Migrated,
}

impl EventState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::Upcoming => "upcoming",
            EventState::Attended => "attended",
            EventState::Missed => "missed",
            EventState::Cancelled => "cancelled",
            EventState::Migrated => "migrated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upcoming" => Some(EventState::Upcoming),
            "attended" => Some(EventState::Attended),
            "missed" => Some(EventState::Missed),
            "cancelled" => Some(EventState::Cancelled),
            "migrated" => Some(EventState::Migrated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Meeting,
    Appointment,
    Birthday,
    Deadline,
    Other,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Meeting => "meeting",
            EventCategory::Appointment => "appointment",
            EventCategory::Birthday => "birthday",
            EventCategory::Deadline => "deadline",
            EventCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "meeting" => Some(EventCategory::Meeting),
            "appointment" => Some(EventCategory::Appointment),
            "birthday" => Some(EventCategory::Birthday),
            "deadline" => Some(EventCategory::Deadline),
            "other" => Some(EventCategory::Other),
            _ => None,
        }
    }
}

/// Tag orthogonal to state. Declaration order is the canonical storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signifier {
    Priority,
    Inspiration,
    Explore,
}

impl Signifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signifier::Priority => "priority",
            Signifier::Inspiration => "inspiration",
            Signifier::Explore => "explore",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "priority" => Some(Signifier::Priority),
            "inspiration" => Some(Signifier::Inspiration),
            "explore" => Some(Signifier::Explore),
            _ => None,
        }
    }
}

/// Sort and deduplicate signifiers.
pub fn normalize_signifiers(signifiers: &mut Vec<Signifier>) {
    signifiers.sort();
    signifiers.dedup();
}

/// A journal row. Tasks are entries with `entry_type == Task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub user_id: String,
    pub entry_type: EntryType,
    pub date: NaiveDate,
    pub content: String,
    pub state: TaskState,
    #[serde(default)]
    pub migration_count: u32,
    #[serde(default)]
    pub signifiers: Vec<Signifier>,
    /// Shared by every row produced from one logical task.
    pub lineage_id: String,

    // Event-only fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_state: Option<EventState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_end_time: Option<NaiveTime>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_category: Option<EventCategory>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_pattern: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Entry {
    pub fn is_task(&self) -> bool {
        self.entry_type == EntryType::Task
    }

    pub fn has_signifier(&self, signifier: Signifier) -> bool {
        self.signifiers.contains(&signifier)
    }
}

/// Input for creating an entry. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub entry_type: EntryType,
    pub date: NaiveDate,
    pub content: String,
    #[serde(default)]
    pub state: TaskState,
    #[serde(default)]
    pub migration_count: u32,
    #[serde(default)]
    pub signifiers: Vec<Signifier>,
    /// Lineage to join; `None` starts a new lineage keyed by the new id.
    #[serde(default)]
    pub lineage_id: Option<String>,
    #[serde(default)]
    pub event: Option<EventDetails>,
}

impl NewEntry {
    pub fn task(date: NaiveDate, content: impl Into<String>) -> Self {
        Self {
            entry_type: EntryType::Task,
            date,
            content: content.into(),
            state: TaskState::Incomplete,
            migration_count: 0,
            signifiers: Vec::new(),
            lineage_id: None,
            event: None,
        }
    }

    pub fn with_signifiers(mut self, signifiers: Vec<Signifier>) -> Self {
        self.signifiers = signifiers;
        self
    }

    pub fn with_migration_count(mut self, count: u32) -> Self {
        self.migration_count = count;
        self
    }

    /// Successor row for a lineage transition: same content and tags,
    /// new date, fresh `incomplete` state.
    pub fn successor_of(task: &Entry, date: NaiveDate, migration_count: u32) -> Self {
        Self {
            entry_type: task.entry_type,
            date,
            content: task.content.clone(),
            state: TaskState::Incomplete,
            migration_count,
            signifiers: task.signifiers.clone(),
            lineage_id: Some(task.lineage_id.clone()),
            event: None,
        }
    }
}

/// Event metadata. Recurrence is stored, never expanded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    #[serde(default)]
    pub event_state: Option<EventState>,
    #[serde(default)]
    pub event_time: Option<NaiveTime>,
    #[serde(default)]
    pub event_end_time: Option<NaiveTime>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub event_category: Option<EventCategory>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_pattern: Option<String>,
}

/// Partial update. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signifiers: Option<Vec<Signifier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_state: Option<EventState>,
}

impl EntryPatch {
    pub fn state(state: TaskState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    /// Close-out patch for a lineage transition.
    pub fn close(state: TaskState, migration_count: u32) -> Self {
        Self {
            state: Some(state),
            migration_count: Some(migration_count),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to an in-memory row.
    pub fn apply_to(&self, entry: &mut Entry) {
        if let Some(date) = self.date {
            entry.date = date;
        }
        if let Some(ref content) = self.content {
            entry.content = content.clone();
        }
        if let Some(state) = self.state {
            entry.state = state;
        }
        if let Some(count) = self.migration_count {
            entry.migration_count = count;
        }
        if let Some(ref signifiers) = self.signifiers {
            entry.signifiers = signifiers.clone();
        }
        if let Some(event_state) = self.event_state {
            entry.event_state = Some(event_state);
        }
    }
}

/// Query filter for `JournalStore::get_entries`. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryFilter {
    #[serde(default)]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub state: Option<TaskState>,
    /// Strictly before this date.
    #[serde(default)]
    pub before: Option<NaiveDate>,
    /// Inclusive lower bound.
    #[serde(default)]
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound.
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub lineage_id: Option<String>,
}

impl EntryFilter {
    /// Stale incomplete tasks: `type = task, state = incomplete, date < before`.
    pub fn pending_before(before: NaiveDate) -> Self {
        Self {
            entry_type: Some(EntryType::Task),
            state: Some(TaskState::Incomplete),
            before: Some(before),
            ..Default::default()
        }
    }

    pub fn tasks() -> Self {
        Self {
            entry_type: Some(EntryType::Task),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        self.entry_type.is_none_or(|t| entry.entry_type == t)
            && self.state.is_none_or(|s| entry.state == s)
            && self.before.is_none_or(|d| entry.date < d)
            && self.from.is_none_or(|d| entry.date >= d)
            && self.to.is_none_or(|d| entry.date <= d)
            && self
                .lineage_id
                .as_deref()
                .is_none_or(|l| entry.lineage_id == l)
    }
}

/// Kind of ledger action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationType {
    Migrate,
    Schedule,
    Cancel,
}

impl MigrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationType::Migrate => "migrate",
            MigrationType::Schedule => "schedule",
            MigrationType::Cancel => "cancel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "migrate" => Some(MigrationType::Migrate),
            "schedule" => Some(MigrationType::Schedule),
            "cancel" => Some(MigrationType::Cancel),
            _ => None,
        }
    }
}

impl std::fmt::Display for MigrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger record as stored. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: String,
    /// Id of the row being closed out, not the spawned one.
    pub task_id: String,
    pub user_id: String,
    pub original_date: NaiveDate,
    /// `None` for cancel.
    pub migrated_to_date: Option<NaiveDate>,
    pub migration_type: MigrationType,
    pub created_at: i64,
}

/// Ledger record before the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMigrationRecord {
    pub task_id: String,
    pub original_date: NaiveDate,
    pub migrated_to_date: Option<NaiveDate>,
    pub migration_type: MigrationType,
}

/// Aggregate ledger counts for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStats {
    pub total_migrations: u64,
    pub migrated: u64,
    pub scheduled: u64,
    pub cancelled: u64,
}
