//! Read-only projections over the entry collection.
//!
//! Nothing here writes. Callers recompute whenever the data or the
//! parameters change.

use crate::types::{Entry, EntryType, EventState, Signifier, TaskState};
use crate::wizard::Month;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

pub const SEARCH_LIMIT: usize = 20;
pub const RECENT_LIMIT: usize = 10;
pub const DATE_GROUP_LIMIT: usize = 30;

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").expect("regex"));

/// Entries on exactly `date`.
pub fn daily(date: NaiveDate, entries: &[Entry]) -> Vec<Entry> {
    entries.iter().filter(|e| e.date == date).cloned().collect()
}

/// Entries in the same month and year.
pub fn monthly(month: Month, entries: &[Entry]) -> Vec<Entry> {
    entries
        .iter()
        .filter(|e| month.contains(e.date))
        .cloned()
        .collect()
}

/// Entries in `year`.
pub fn future(year: i32, entries: &[Entry]) -> Vec<Entry> {
    entries
        .iter()
        .filter(|e| e.date.year() == year)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthSummary {
    pub month: String,
    pub total: usize,
    pub tasks: usize,
    pub events: usize,
    pub notes: usize,
}

/// Per-month counts for the future log, January through December.
pub fn future_months(year: i32, entries: &[Entry]) -> Vec<MonthSummary> {
    (1..=12)
        .map(|m| {
            let month = Month { year, month: m };
            let rows: Vec<&Entry> = entries.iter().filter(|e| month.contains(e.date)).collect();
            let count = |t: EntryType| rows.iter().filter(|e| e.entry_type == t).count();
            MonthSummary {
                month: month.to_string(),
                total: rows.len(),
                tasks: count(EntryType::Task),
                events: count(EntryType::Event),
                notes: count(EntryType::Note),
            }
        })
        .collect()
}

/// Daily-log filter. Empty sets mean no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    #[serde(default)]
    pub search: Option<String>,
    /// Applies to tasks only.
    #[serde(default)]
    pub states: BTreeSet<TaskState>,
    /// Applies to events only; a missing event state counts as upcoming.
    #[serde(default)]
    pub event_states: BTreeSet<EventState>,
}

impl LogFilter {
    pub fn is_active(&self) -> bool {
        self.search.as_deref().is_some_and(|q| !q.trim().is_empty())
            || !self.states.is_empty()
            || !self.event_states.is_empty()
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        if let Some(query) = self.search.as_deref().map(str::trim)
            && !query.is_empty()
            && !entry.content.to_lowercase().contains(&query.to_lowercase())
        {
            return false;
        }
        match entry.entry_type {
            EntryType::Task if !self.states.is_empty() => self.states.contains(&entry.state),
            EntryType::Event if !self.event_states.is_empty() => self
                .event_states
                .contains(&entry.event_state.unwrap_or_default()),
            _ => true,
        }
    }

    pub fn apply(&self, entries: &[Entry]) -> Vec<Entry> {
        entries.iter().filter(|e| self.matches(e)).cloned().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeGroups {
    pub tasks: Vec<Entry>,
    pub events: Vec<Entry>,
    pub notes: Vec<Entry>,
}

pub fn group_by_type(entries: &[Entry]) -> TypeGroups {
    let mut groups = TypeGroups::default();
    for entry in entries {
        let bucket = match entry.entry_type {
            EntryType::Task => &mut groups.tasks,
            EntryType::Event => &mut groups.events,
            EntryType::Note => &mut groups.notes,
        };
        bucket.push(entry.clone());
    }
    groups
}

/// Whether an event's start lies before `now`. Non-events are never past.
pub fn is_past_event(entry: &Entry, now: NaiveDateTime) -> bool {
    if entry.entry_type != EntryType::Event {
        return false;
    }
    let at = entry.event_time.unwrap_or(NaiveTime::MIN);
    entry.date.and_time(at) < now
}

/// Case-insensitive content search, first matches only.
pub fn search(query: &str, entries: &[Entry]) -> Vec<Entry> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    entries
        .iter()
        .filter(|e| e.content.to_lowercase().contains(&query))
        .take(SEARCH_LIMIT)
        .cloned()
        .collect()
}

/// Newest entries by date.
pub fn recent(entries: &[Entry]) -> Vec<Entry> {
    let mut rows = entries.to_vec();
    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows.truncate(RECENT_LIMIT);
    rows
}

pub fn priority(entries: &[Entry]) -> Vec<Entry> {
    entries
        .iter()
        .filter(|e| e.has_signifier(Signifier::Priority))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateGroup {
    pub date: NaiveDate,
    pub entries: Vec<Entry>,
}

/// Entries grouped per date, most recent dates first.
pub fn by_date(entries: &[Entry]) -> Vec<DateGroup> {
    let mut grouped: BTreeMap<NaiveDate, Vec<Entry>> = BTreeMap::new();
    for entry in entries {
        grouped.entry(entry.date).or_default().push(entry.clone());
    }
    grouped
        .into_iter()
        .rev()
        .take(DATE_GROUP_LIMIT)
        .map(|(date, entries)| DateGroup { date, entries })
        .collect()
}

/// Lowercased `#tags` found in content, sorted and deduplicated.
pub fn hashtags(entries: &[Entry]) -> Vec<String> {
    let tags: BTreeSet<String> = entries
        .iter()
        .flat_map(|e| HASHTAG.find_iter(&e.content).map(|m| m.as_str().to_lowercase()))
        .collect();
    tags.into_iter().collect()
}
