//! Monthly bulk migration wizard.

use crate::engine::{BulkAction, BulkOutcome, MigrationEngine};
use crate::error::{JournalError, Result};
use crate::storage::JournalStore;
use crate::types::{Entry, EntryFilter, EntryType, Signifier, TaskState};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::info;

pub const SUGGESTION_THRESHOLD: u32 = 2;

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(JournalError::invalid_field(
                "month",
                format!("{}-{:02} is not a valid month", year, month),
            ));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .checked_sub_days(Days::new(1))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = JournalError;

    /// `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || JournalError::invalid_field("month", format!("expected YYYY-MM, got {:?}", s));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Month::new(year, month)
    }
}

/// Tasks in `month` that are neither complete nor cancelled, oldest first.
pub fn monthly_candidates(month: Month, tasks: &[Entry]) -> Vec<Entry> {
    let mut rows: Vec<Entry> = tasks
        .iter()
        .filter(|e| e.entry_type == EntryType::Task && month.contains(e.date))
        .filter(|e| !matches!(e.state, TaskState::Complete | TaskState::Cancelled))
        .cloned()
        .collect();
    rows.sort_by_key(|e| e.date);
    rows
}

pub fn is_suggested(task: &Entry, threshold: u32) -> bool {
    task.migration_count >= threshold || task.has_signifier(Signifier::Priority)
}

/// Ids of candidates worth carrying forward.
pub fn suggestions(candidates: &[Entry], threshold: u32) -> BTreeSet<String> {
    candidates
        .iter()
        .filter(|t| is_suggested(t, threshold))
        .map(|t| t.id.clone())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WizardStats {
    pub total: usize,
    pub never_migrated: usize,
    pub migrated_once: usize,
    pub migrated_multiple: usize,
    pub high_priority: usize,
}

pub fn stats(candidates: &[Entry]) -> WizardStats {
    let mut stats = WizardStats {
        total: candidates.len(),
        ..Default::default()
    };
    for task in candidates {
        match task.migration_count {
            0 => stats.never_migrated += 1,
            1 => stats.migrated_once += 1,
            _ => stats.migrated_multiple += 1,
        }
        if task.has_signifier(Signifier::Priority) {
            stats.high_priority += 1;
        }
    }
    stats
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Review,
    Preview,
}

/// Bulk actions the wizard exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardAction {
    Migrate,
    Cancel,
}

impl FromStr for WizardAction {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "migrate" => Ok(WizardAction::Migrate),
            "cancel" => Ok(WizardAction::Cancel),
            other => Err(JournalError::invalid_field(
                "action",
                format!("expected migrate or cancel, got {:?}", other),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MigrationWizard {
    month: Month,
    candidates: Vec<Entry>,
    selected: BTreeSet<String>,
    step: WizardStep,
    suggestion_threshold: u32,
}

impl MigrationWizard {
    pub fn new(month: Month, tasks: &[Entry], suggestion_threshold: u32) -> Self {
        Self {
            month,
            candidates: monthly_candidates(month, tasks),
            selected: BTreeSet::new(),
            step: WizardStep::Review,
            suggestion_threshold,
        }
    }

    /// Load the month's tasks from storage.
    pub async fn open<S: JournalStore + ?Sized>(
        engine: &MigrationEngine<S>,
        month: Month,
        suggestion_threshold: u32,
    ) -> Result<Self> {
        let filter = EntryFilter {
            from: Some(month.first_day()),
            to: Some(month.last_day()),
            ..EntryFilter::tasks()
        };
        let tasks = engine.entries(&filter).await?;
        let wizard = Self::new(month, &tasks, suggestion_threshold);
        info!(month = %month, candidates = wizard.candidates.len(), "Opened migration wizard");
        Ok(wizard)
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn candidates(&self) -> &[Entry] {
        &self.candidates
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    pub fn suggestions(&self) -> BTreeSet<String> {
        suggestions(&self.candidates, self.suggestion_threshold)
    }

    pub fn stats(&self) -> WizardStats {
        stats(&self.candidates)
    }

    fn require_candidate(&self, id: &str) -> Result<()> {
        if self.candidates.iter().any(|t| t.id == id) {
            Ok(())
        } else {
            Err(JournalError::NotFound(id.to_string()))
        }
    }

    pub fn toggle(&mut self, id: &str) -> Result<()> {
        self.require_candidate(id)?;
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
        }
        Ok(())
    }

    /// Replace the selection with `ids`. Unknown ids are rejected.
    pub fn set_selection<I, T>(&mut self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut next = BTreeSet::new();
        for id in ids {
            let id = id.as_ref();
            self.require_candidate(id)?;
            next.insert(id.to_string());
        }
        self.selected = next;
        Ok(())
    }

    pub fn select_all(&mut self) {
        self.selected = self.candidates.iter().map(|t| t.id.clone()).collect();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    /// Selection becomes exactly the suggested set.
    pub fn apply_suggestions(&mut self) {
        self.selected = self.suggestions();
    }

    pub fn preview(&mut self) -> Result<()> {
        if self.selected.is_empty() {
            return Err(JournalError::invalid_field("selection", "nothing selected"));
        }
        self.step = WizardStep::Preview;
        Ok(())
    }

    pub fn back(&mut self) {
        self.step = WizardStep::Review;
    }

    /// Selected tasks in candidate order.
    pub fn selected_tasks(&self) -> Vec<&Entry> {
        self.candidates
            .iter()
            .filter(|t| self.selected.contains(&t.id))
            .collect()
    }

    /// Run `action` on the selection, then clear it and return to review.
    pub async fn apply<S: JournalStore + ?Sized>(
        &mut self,
        engine: &MigrationEngine<S>,
        action: WizardAction,
    ) -> Result<BulkOutcome> {
        let ids: Vec<String> = self.selected_tasks().into_iter().map(|t| t.id.clone()).collect();
        if ids.is_empty() {
            return Err(JournalError::invalid_field("selection", "nothing selected"));
        }

        let bulk = match action {
            WizardAction::Migrate => BulkAction::Migrate(self.month.next().first_day()),
            WizardAction::Cancel => BulkAction::Cancel,
        };
        let outcome = engine.apply_bulk(&ids, bulk).await?;

        self.candidates
            .retain(|t| !outcome.succeeded.iter().any(|id| *id == t.id));
        self.selected.clear();
        self.step = WizardStep::Review;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(id: &str, on: NaiveDate, state: TaskState, count: u32, priority: bool) -> Entry {
        Entry {
            id: id.into(),
            user_id: "u1".into(),
            entry_type: EntryType::Task,
            date: on,
            content: id.into(),
            state,
            migration_count: count,
            signifiers: if priority { vec![Signifier::Priority] } else { vec![] },
            lineage_id: id.into(),
            event_state: None,
            event_time: None,
            event_end_time: None,
            is_all_day: false,
            event_category: None,
            is_recurring: false,
            recurring_pattern: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn month_bounds_and_rollover() {
        let oct: Month = "2025-10".parse().unwrap();
        assert_eq!(oct.first_day(), date(2025, 10, 1));
        assert_eq!(oct.last_day(), date(2025, 10, 31));
        assert_eq!(oct.next().to_string(), "2025-11");

        let dec = Month::new(2025, 12).unwrap();
        assert_eq!(dec.next(), Month { year: 2026, month: 1 });
        assert_eq!(Month::new(2024, 2).unwrap().last_day(), date(2024, 2, 29));

        assert!("2025-13".parse::<Month>().is_err());
        assert!("October".parse::<Month>().is_err());
    }

    #[test]
    fn candidates_skip_done_and_out_of_month() {
        let oct = Month::new(2025, 10).unwrap();
        let tasks = vec![
            task("open", date(2025, 10, 5), TaskState::Incomplete, 0, false),
            task("closed", date(2025, 10, 6), TaskState::Migrated, 1, false),
            task("done", date(2025, 10, 7), TaskState::Complete, 0, false),
            task("gone", date(2025, 10, 8), TaskState::Cancelled, 0, false),
            task("nov", date(2025, 11, 1), TaskState::Incomplete, 0, false),
        ];
        let ids: Vec<_> = monthly_candidates(oct, &tasks)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["open", "closed"]);
    }

    #[test]
    fn suggestion_boundary() {
        assert!(!is_suggested(
            &task("a", date(2025, 10, 1), TaskState::Incomplete, 1, false),
            SUGGESTION_THRESHOLD
        ));
        assert!(is_suggested(
            &task("a", date(2025, 10, 1), TaskState::Incomplete, 2, false),
            SUGGESTION_THRESHOLD
        ));
        assert!(is_suggested(
            &task("a", date(2025, 10, 1), TaskState::Incomplete, 0, true),
            SUGGESTION_THRESHOLD
        ));
    }

    #[test]
    fn stats_bucket_by_count() {
        let on = date(2025, 10, 3);
        let tasks = vec![
            task("a", on, TaskState::Incomplete, 0, true),
            task("b", on, TaskState::Incomplete, 1, false),
            task("c", on, TaskState::Incomplete, 2, false),
            task("d", on, TaskState::Incomplete, 5, true),
        ];
        assert_eq!(
            stats(&tasks),
            WizardStats {
                total: 4,
                never_migrated: 1,
                migrated_once: 1,
                migrated_multiple: 2,
                high_priority: 2,
            }
        );
    }

    #[test]
    fn selection_controls() {
        let on = date(2025, 10, 3);
        let tasks = vec![
            task("a", on, TaskState::Incomplete, 0, false),
            task("b", on, TaskState::Incomplete, 3, false),
        ];
        let mut wizard = MigrationWizard::new(Month::of(on), &tasks, SUGGESTION_THRESHOLD);

        wizard.toggle("a").unwrap();
        assert!(wizard.selected().contains("a"));
        wizard.apply_suggestions();
        assert_eq!(wizard.selected().iter().collect::<Vec<_>>(), vec!["b"]);
        wizard.select_all();
        assert_eq!(wizard.selected().len(), 2);
        wizard.deselect_all();
        assert!(wizard.preview().is_err());

        assert!(wizard.toggle("zzz").is_err());
        wizard.set_selection(["a"]).unwrap();
        wizard.preview().unwrap();
        assert_eq!(wizard.step(), WizardStep::Preview);
        wizard.back();
        assert_eq!(wizard.step(), WizardStep::Review);
    }
}
