//! Migration engine and the simple-update capability.
//!
//! Only `migrate`, `schedule` and `cancel` write to the ledger or bump the
//! migration counter. Everything else is a plain row update.

use crate::clock::SharedClock;
use crate::error::{ErrorBody, JournalError, Result};
use crate::ledger;
use crate::state::{self, TransitionKind};
use crate::storage::{JournalStore, LineagePlan, require_entry};
use crate::types::{
    Entry, EntryFilter, EntryPatch, EntryType, EventDetails, EventState, MAX_CONTENT_LEN,
    MigrationRecord, MigrationStats, MigrationType, NewEntry, Signifier, TaskState,
};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Authenticated user for the current caller, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user_id: Option<String>,
}

impl Session {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn require_user(&self) -> Result<&str> {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(JournalError::NotAuthenticated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub strict_transitions: bool,
    pub reject_past_schedule: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            strict_transitions: false,
            reject_past_schedule: true,
        }
    }
}

/// Action applied to every id in a bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "date", rename_all = "snake_case")]
pub enum BulkAction {
    Migrate(NaiveDate),
    Schedule(NaiveDate),
    Cancel,
}

impl BulkAction {
    pub fn migration_type(&self) -> MigrationType {
        match self {
            BulkAction::Migrate(_) => MigrationType::Migrate,
            BulkAction::Schedule(_) => MigrationType::Schedule,
            BulkAction::Cancel => MigrationType::Cancel,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub task_id: String,
    pub error: ErrorBody,
}

/// Per-task results of a bulk run. One failure never stops the rest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Trim and length-check entry content.
pub fn validate_content(content: &str) -> Result<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(JournalError::invalid_field("content", "must not be empty"));
    }
    let len = trimmed.chars().count();
    if len > MAX_CONTENT_LEN {
        return Err(JournalError::invalid_field(
            "content",
            format!("{} characters exceeds the {} limit", len, MAX_CONTENT_LEN),
        ));
    }
    Ok(trimmed.to_string())
}

/// Transition a direct state write corresponds to, if it has one.
fn direct_kind(from: TaskState, to: TaskState) -> Option<TransitionKind> {
    match to {
        TaskState::Complete => Some(TransitionKind::Complete),
        TaskState::Cancelled => Some(TransitionKind::Cancel),
        TaskState::Incomplete if from == TaskState::Cancelled => Some(TransitionKind::Reactivate),
        TaskState::Incomplete => Some(TransitionKind::Uncomplete),
        TaskState::Migrated | TaskState::Scheduled => None,
    }
}

pub struct MigrationEngine<S: ?Sized> {
    store: Arc<S>,
    session: Session,
    clock: SharedClock,
    options: EngineOptions,
}

impl<S: ?Sized> Clone for MigrationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            session: self.session.clone(),
            clock: Arc::clone(&self.clock),
            options: self.options,
        }
    }
}

impl<S: JournalStore + ?Sized> MigrationEngine<S> {
    pub fn new(store: Arc<S>, session: Session, clock: SharedClock) -> Self {
        Self {
            store,
            session,
            clock,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn user_id(&self) -> Result<&str> {
        self.session.require_user()
    }

    async fn load_task(&self, user_id: &str, task_id: &str) -> Result<Entry> {
        let entry = require_entry(&*self.store, user_id, task_id).await?;
        if !entry.is_task() {
            return Err(JournalError::NotFound(task_id.to_string()));
        }
        Ok(entry)
    }

    /// Close the row, spawn its successor at `target`, and log it.
    async fn carry_forward(
        &self,
        kind: MigrationType,
        task_id: &str,
        original_date: NaiveDate,
        target: NaiveDate,
    ) -> Result<Entry> {
        let user_id = self.user_id()?;
        let task = self.load_task(user_id, task_id).await?;

        let transition = match kind {
            MigrationType::Schedule => TransitionKind::Schedule,
            _ => TransitionKind::Migrate,
        };
        let closing = state::check(task.state, transition, self.options.strict_transitions)?;

        let count = task.migration_count + 1;
        let plan = LineagePlan {
            task_id: task.id.clone(),
            close: EntryPatch::close(closing, count),
            spawn: Some(NewEntry::successor_of(&task, target, count)),
            record: ledger::record_for(kind, &task.id, original_date, Some(target)),
        };

        let spawned = self.store.apply_plan(user_id, plan).await?.ok_or_else(|| {
            JournalError::persistence(format!("no successor returned for {}", task_id))
        })?;

        info!(
            user_id,
            task_id,
            action = %kind,
            new_task_id = %spawned.id,
            migration_count = count,
            target = %target,
            "Carried task forward"
        );
        Ok(spawned)
    }

    /// Close `task_id` as migrated and spawn a fresh row on `target_date`.
    ///
    /// `original_date` is recorded in the ledger as given; it is not checked
    /// against the stored row.
    pub async fn migrate(
        &self,
        task_id: &str,
        original_date: NaiveDate,
        target_date: NaiveDate,
    ) -> Result<Entry> {
        self.carry_forward(MigrationType::Migrate, task_id, original_date, target_date)
            .await
    }

    /// Like [`migrate`](Self::migrate) but closes the row as scheduled.
    pub async fn schedule(
        &self,
        task_id: &str,
        original_date: NaiveDate,
        scheduled_date: NaiveDate,
    ) -> Result<Entry> {
        if self.options.reject_past_schedule && scheduled_date < original_date {
            return Err(JournalError::invalid_field(
                "scheduled_date",
                format!("{} is before {}", scheduled_date, original_date),
            ));
        }
        self.carry_forward(MigrationType::Schedule, task_id, original_date, scheduled_date)
            .await
    }

    pub async fn cancel(&self, task_id: &str, original_date: NaiveDate) -> Result<()> {
        let user_id = self.user_id()?;
        let task = self.load_task(user_id, task_id).await?;
        let to = state::check(task.state, TransitionKind::Cancel, self.options.strict_transitions)?;

        let plan = LineagePlan {
            task_id: task.id.clone(),
            close: EntryPatch::state(to),
            spawn: None,
            record: ledger::record_for(MigrationType::Cancel, &task.id, original_date, None),
        };
        self.store.apply_plan(user_id, plan).await?;

        info!(user_id, task_id, action = "cancel", "Cancelled task");
        Ok(())
    }

    /// Quick action: migrate to the day after the row's own date.
    pub async fn migrate_to_next_day(&self, task_id: &str) -> Result<Entry> {
        let user_id = self.user_id()?;
        let task = self.load_task(user_id, task_id).await?;
        let next = task
            .date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| JournalError::invalid_field("date", "no following day"))?;
        self.migrate(task_id, task.date, next).await
    }

    /// Stale incomplete tasks strictly before `before`, oldest first.
    pub async fn get_pending_migrations(&self, before: NaiveDate) -> Result<Vec<Entry>> {
        let user_id = self.user_id()?;
        let rows = self
            .store
            .get_entries(user_id, &EntryFilter::pending_before(before))
            .await?;
        debug!(user_id, before = %before, count = rows.len(), "Loaded pending migrations");
        Ok(rows)
    }

    /// Run `action` on each id in order, collecting failures.
    pub async fn apply_bulk(&self, ids: &[String], action: BulkAction) -> Result<BulkOutcome> {
        let user_id = self.user_id()?.to_string();
        let mut outcome = BulkOutcome::default();

        for task_id in ids {
            match self.apply_one(&user_id, task_id, action).await {
                Ok(()) => outcome.succeeded.push(task_id.clone()),
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        task_id = %task_id,
                        action = %action.migration_type(),
                        error = %e,
                        "Bulk action failed for task"
                    );
                    outcome.failed.push(BulkFailure {
                        task_id: task_id.clone(),
                        error: e.to_body(),
                    });
                }
            }
        }

        info!(
            user_id = %user_id,
            action = %action.migration_type(),
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Bulk action finished"
        );
        Ok(outcome)
    }

    async fn apply_one(&self, user_id: &str, task_id: &str, action: BulkAction) -> Result<()> {
        let task = self.load_task(user_id, task_id).await?;
        match action {
            BulkAction::Migrate(target) => {
                self.migrate(task_id, task.date, target).await?;
            }
            BulkAction::Schedule(date) => {
                self.schedule(task_id, task.date, date).await?;
            }
            BulkAction::Cancel => self.cancel(task_id, task.date).await?,
        }
        Ok(())
    }

    // Simple updates. None of these touch the ledger or the counter.

    pub async fn add_entry(&self, mut entry: NewEntry) -> Result<Entry> {
        let user_id = self.user_id()?;
        entry.content = validate_content(&entry.content)?;
        entry.migration_count = 0;
        entry.lineage_id = None;
        if entry.entry_type == EntryType::Event {
            let event = entry.event.get_or_insert_with(EventDetails::default);
            event.event_state.get_or_insert(EventState::Upcoming);
        }

        let created = self.store.create_entry(user_id, entry).await?;
        info!(user_id, entry_id = %created.id, entry_type = created.entry_type.as_str(), "Added entry");
        Ok(created)
    }

    pub async fn add_task(
        &self,
        date: NaiveDate,
        content: &str,
        signifiers: Vec<Signifier>,
    ) -> Result<Entry> {
        self.add_entry(NewEntry::task(date, content).with_signifiers(signifiers))
            .await
    }

    pub async fn add_event(
        &self,
        date: NaiveDate,
        content: &str,
        details: EventDetails,
    ) -> Result<Entry> {
        let mut entry = NewEntry::task(date, content);
        entry.entry_type = EntryType::Event;
        entry.event = Some(details);
        self.add_entry(entry).await
    }

    pub async fn get_entry(&self, id: &str) -> Result<Entry> {
        let user_id = self.user_id()?;
        require_entry(&*self.store, user_id, id).await
    }

    pub async fn entries(&self, filter: &EntryFilter) -> Result<Vec<Entry>> {
        let user_id = self.user_id()?;
        self.store.get_entries(user_id, filter).await
    }

    async fn write(&self, id: &str, patch: EntryPatch) -> Result<Entry> {
        let user_id = self.user_id()?;
        self.store.update_entry(user_id, id, patch).await?;
        require_entry(&*self.store, user_id, id).await
    }

    pub async fn edit_content(&self, id: &str, content: &str) -> Result<Entry> {
        let content = validate_content(content)?;
        self.get_entry(id).await?;
        self.write(
            id,
            EntryPatch {
                content: Some(content),
                ..Default::default()
            },
        )
        .await
    }

    /// Add the signifier if absent, remove it if present.
    pub async fn toggle_signifier(&self, id: &str, signifier: Signifier) -> Result<Entry> {
        let entry = self.get_entry(id).await?;
        let mut signifiers = entry.signifiers.clone();
        if entry.has_signifier(signifier) {
            signifiers.retain(|s| *s != signifier);
        } else {
            signifiers.push(signifier);
        }
        self.write(
            id,
            EntryPatch {
                signifiers: Some(signifiers),
                ..Default::default()
            },
        )
        .await
    }

    /// `complete` flips to `incomplete`; anything else becomes `complete`.
    pub async fn toggle_complete(&self, id: &str) -> Result<Entry> {
        let user_id = self.user_id()?;
        let task = self.load_task(user_id, id).await?;
        let kind = state::toggle_kind(task.state);
        let to = state::check(task.state, kind, self.options.strict_transitions)?;
        let updated = self.write(id, EntryPatch::state(to)).await?;
        info!(user_id, task_id = id, from = %task.state, to = %to, "Toggled completion");
        Ok(updated)
    }

    /// `cancelled -> incomplete` on the same row.
    pub async fn reactivate(&self, id: &str) -> Result<Entry> {
        let user_id = self.user_id()?;
        let task = self.load_task(user_id, id).await?;
        let to = state::check(
            task.state,
            TransitionKind::Reactivate,
            self.options.strict_transitions,
        )?;
        let updated = self.write(id, EntryPatch::state(to)).await?;
        info!(user_id, task_id = id, "Reactivated task");
        Ok(updated)
    }

    /// Unguarded state write. Strict mode limits it to the direct transitions.
    pub async fn set_state_direct(&self, id: &str, to: TaskState) -> Result<Entry> {
        let user_id = self.user_id()?;
        let task = self.load_task(user_id, id).await?;
        if self.options.strict_transitions {
            match direct_kind(task.state, to) {
                Some(kind) => {
                    state::check(task.state, kind, true)?;
                }
                None => return Err(JournalError::invalid_transition(task.state, to)),
            }
        }
        let updated = self.write(id, EntryPatch::state(to)).await?;
        info!(user_id, task_id = id, from = %task.state, to = %to, "Set task state");
        Ok(updated)
    }

    /// Generic partial update from the UI layer.
    pub async fn patch_entry(&self, id: &str, mut patch: EntryPatch) -> Result<Entry> {
        if patch.migration_count.is_some() {
            return Err(JournalError::invalid_field(
                "migration_count",
                "only changed by migrate or schedule",
            ));
        }
        if let Some(ref content) = patch.content {
            patch.content = Some(validate_content(content)?);
        }

        let entry = self.get_entry(id).await?;
        if let Some(to) = patch.state
            && entry.is_task()
            && self.options.strict_transitions
        {
            match direct_kind(entry.state, to) {
                Some(kind) => {
                    state::check(entry.state, kind, true)?;
                }
                None => return Err(JournalError::invalid_transition(entry.state, to)),
            }
        }
        if patch.is_empty() {
            return Ok(entry);
        }
        self.write(id, patch).await
    }

    /// Move an event to another day and mark it migrated.
    pub async fn reschedule_event(&self, id: &str, new_date: NaiveDate) -> Result<Entry> {
        let entry = self.get_entry(id).await?;
        if entry.entry_type != EntryType::Event {
            return Err(JournalError::invalid_field("entry_type", "not an event"));
        }
        let updated = self
            .write(
                id,
                EntryPatch {
                    date: Some(new_date),
                    event_state: Some(EventState::Migrated),
                    ..Default::default()
                },
            )
            .await?;
        info!(event_id = id, from = %entry.date, to = %new_date, "Rescheduled event");
        Ok(updated)
    }

    /// Remove a row. Ledger rows referencing it are kept.
    pub async fn delete_entry(&self, id: &str) -> Result<()> {
        let user_id = self.user_id()?;
        self.store.delete_entry(user_id, id).await?;
        info!(user_id, entry_id = id, "Deleted entry");
        Ok(())
    }

    pub async fn history(&self, task_id: &str) -> Result<Vec<MigrationRecord>> {
        let user_id = self.user_id()?;
        self.store.get_migration_history(user_id, task_id).await
    }

    pub async fn stats(&self) -> Result<MigrationStats> {
        let user_id = self.user_id()?;
        self.store.get_migration_stats(user_id).await
    }

    pub async fn lineage(&self, lineage_id: &str) -> Result<ledger::Lineage> {
        let user_id = self.user_id()?;
        ledger::lineage(&*self.store, user_id, lineage_id).await
    }
}
