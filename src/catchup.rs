//! Daily catch-up: walk stale incomplete tasks one decision at a time.
//!
//! Processed bookkeeping lives only in the session. Abandoning a session
//! keeps whatever was already applied.

use crate::engine::MigrationEngine;
use crate::error::{JournalError, Result};
use crate::state;
use crate::storage::JournalStore;
use crate::types::{Entry, EntryType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

pub const LURKER_THRESHOLD: u32 = 3;

/// Carried forward often enough to deserve a warning.
pub fn is_lurker(task: &Entry, threshold: u32) -> bool {
    task.migration_count >= threshold
}

/// Incomplete tasks dated strictly before `viewed`, oldest first.
pub fn candidates(viewed: NaiveDate, tasks: &[Entry]) -> Vec<Entry> {
    let mut stale: Vec<Entry> = tasks
        .iter()
        .filter(|e| e.entry_type == EntryType::Task)
        .filter(|e| state::is_actionable(e.state) && e.date < viewed)
        .cloned()
        .collect();
    stale.sort_by_key(|e| e.date);
    stale
}

#[derive(Debug, Clone, Serialize)]
pub struct CatchUpItem {
    pub task: Entry,
    pub lurker: bool,
    pub days_since: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "date", rename_all = "snake_case")]
pub enum Decision {
    MigrateToday,
    Schedule(NaiveDate),
    KeepAsIs,
    Cancel,
}

impl Decision {
    /// Parse the CLI form: `migrate`, `keep`, `cancel` or a `YYYY-MM-DD` date.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "migrate" => Some(Decision::MigrateToday),
            "keep" => Some(Decision::KeepAsIs),
            "cancel" => Some(Decision::Cancel),
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
                .ok()
                .map(Decision::Schedule),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub percent: u8,
}

#[derive(Debug, Clone)]
pub struct CatchUpSession {
    viewed_date: NaiveDate,
    tasks: Vec<Entry>,
    processed: HashSet<String>,
    selected: Option<String>,
    lurker_threshold: u32,
}

impl CatchUpSession {
    /// Build a session over `tasks`, keeping only the stale ones.
    pub fn new(viewed_date: NaiveDate, tasks: &[Entry], lurker_threshold: u32) -> Self {
        Self {
            viewed_date,
            tasks: candidates(viewed_date, tasks),
            processed: HashSet::new(),
            selected: None,
            lurker_threshold,
        }
    }

    /// `None` when nothing is stale.
    pub fn trigger(viewed_date: NaiveDate, tasks: &[Entry], lurker_threshold: u32) -> Option<Self> {
        let session = Self::new(viewed_date, tasks, lurker_threshold);
        (!session.tasks.is_empty()).then_some(session)
    }

    /// Scan storage for `viewed_date` and start a session.
    pub async fn begin<S: JournalStore + ?Sized>(
        engine: &MigrationEngine<S>,
        viewed_date: NaiveDate,
        lurker_threshold: u32,
    ) -> Result<Self> {
        let pending = engine.get_pending_migrations(viewed_date).await?;
        let session = Self::new(viewed_date, &pending, lurker_threshold);
        info!(
            viewed_date = %viewed_date,
            total = session.tasks.len(),
            "Started catch-up session"
        );
        Ok(session)
    }

    /// Reset for a new viewed date.
    pub fn retrigger(&mut self, viewed_date: NaiveDate, tasks: &[Entry]) {
        *self = Self::new(viewed_date, tasks, self.lurker_threshold);
    }

    pub fn viewed_date(&self) -> NaiveDate {
        self.viewed_date
    }

    fn item(&self, task: &Entry) -> CatchUpItem {
        CatchUpItem {
            task: task.clone(),
            lurker: is_lurker(task, self.lurker_threshold),
            days_since: (self.viewed_date - task.date).num_days().abs(),
        }
    }

    /// Every task in the session, processed or not.
    pub fn items(&self) -> Vec<CatchUpItem> {
        self.tasks.iter().map(|t| self.item(t)).collect()
    }

    pub fn remaining(&self) -> Vec<CatchUpItem> {
        self.tasks
            .iter()
            .filter(|t| !self.processed.contains(&t.id))
            .map(|t| self.item(t))
            .collect()
    }

    /// The selected task if still open, otherwise the oldest unprocessed one.
    pub fn current(&self) -> Option<CatchUpItem> {
        let selected = self
            .selected
            .as_deref()
            .and_then(|id| self.tasks.iter().find(|t| t.id == id))
            .filter(|t| !self.processed.contains(&t.id));
        selected
            .or_else(|| self.tasks.iter().find(|t| !self.processed.contains(&t.id)))
            .map(|t| self.item(t))
    }

    /// Jump to a specific unprocessed task.
    pub fn select(&mut self, task_id: &str) -> Result<()> {
        let open = self
            .tasks
            .iter()
            .any(|t| t.id == task_id && !self.processed.contains(&t.id));
        if !open {
            return Err(JournalError::NotFound(task_id.to_string()));
        }
        self.selected = Some(task_id.to_string());
        Ok(())
    }

    pub fn progress(&self) -> Progress {
        let total = self.tasks.len();
        let processed = self.processed.len();
        let percent = if total == 0 {
            100
        } else {
            ((processed as f64 / total as f64) * 100.0).round() as u8
        };
        Progress {
            processed,
            total,
            percent,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.processed.len() >= self.tasks.len()
    }

    /// Apply `decision` to the current task.
    pub async fn decide<S: JournalStore + ?Sized>(
        &mut self,
        engine: &MigrationEngine<S>,
        decision: Decision,
    ) -> Result<Option<Entry>> {
        let current = self
            .current()
            .ok_or_else(|| JournalError::NotFound("no task awaiting a decision".to_string()))?;
        self.decide_for(engine, &current.task.id, decision).await
    }

    /// Apply `decision` to a named task in the session.
    ///
    /// On failure the task stays unprocessed so it can be retried or skipped.
    pub async fn decide_for<S: JournalStore + ?Sized>(
        &mut self,
        engine: &MigrationEngine<S>,
        task_id: &str,
        decision: Decision,
    ) -> Result<Option<Entry>> {
        let task = self
            .tasks
            .iter()
            .find(|t| t.id == task_id && !self.processed.contains(&t.id))
            .cloned()
            .ok_or_else(|| JournalError::NotFound(task_id.to_string()))?;

        let spawned = match decision {
            Decision::MigrateToday => Some(engine.migrate(&task.id, task.date, self.viewed_date).await?),
            Decision::Schedule(date) => {
                if date < self.viewed_date {
                    return Err(JournalError::invalid_field(
                        "scheduled_date",
                        format!("{} is before {}", date, self.viewed_date),
                    ));
                }
                Some(engine.schedule(&task.id, task.date, date).await?)
            }
            Decision::KeepAsIs => None,
            Decision::Cancel => {
                engine.cancel(&task.id, task.date).await?;
                None
            }
        };

        self.processed.insert(task.id.clone());
        if self.selected.as_deref() == Some(task.id.as_str()) {
            self.selected = None;
        }

        if self.is_finished() {
            info!(
                viewed_date = %self.viewed_date,
                total = self.tasks.len(),
                "Catch-up session complete"
            );
        }
        Ok(spawned)
    }
}
