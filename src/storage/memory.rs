//! In-process store backed by vectors behind a lock.
//!
//! Used by tests. Supports one-shot failure injection per operation so
//! partial-write behaviour can be exercised.

use super::JournalStore;
use crate::error::{JournalError, Result};
use crate::types::{
    Entry, EntryFilter, EntryPatch, MigrationRecord, MigrationStats, NewEntry,
    NewMigrationRecord, normalize_signifiers,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Update,
    AppendHistory,
}

#[derive(Default)]
struct MemoryState {
    entries: Vec<Entry>,
    history: Vec<MigrationRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    faults: Mutex<HashSet<StoreOp>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows verbatim, keeping their ids.
    pub async fn seed(&self, entries: impl IntoIterator<Item = Entry>) {
        let mut state = self.state.write().await;
        state.entries.extend(entries);
    }

    /// Make the next call of `op` fail with a persistence error.
    pub fn fail_next(&self, op: StoreOp) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(op);
        }
    }

    fn check_fault(&self, op: StoreOp) -> Result<()> {
        let fired = self
            .faults
            .lock()
            .map_err(|_| JournalError::persistence("fault table lock poisoned"))?
            .remove(&op);
        if fired {
            return Err(JournalError::Persistence(format!("injected failure on {:?}", op)));
        }
        Ok(())
    }

    /// Snapshot of every row for every user, in insertion order.
    pub async fn all_entries(&self) -> Vec<Entry> {
        self.state.read().await.entries.clone()
    }

    pub async fn all_history(&self) -> Vec<MigrationRecord> {
        self.state.read().await.history.clone()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl JournalStore for MemoryStore {
    async fn create_entry(&self, user_id: &str, entry: NewEntry) -> Result<Entry> {
        self.check_fault(StoreOp::Create)?;

        let id = Uuid::now_v7().to_string();
        let now = now_ms();
        let mut signifiers = entry.signifiers;
        normalize_signifiers(&mut signifiers);
        let event = entry.event.unwrap_or_default();

        let row = Entry {
            lineage_id: entry.lineage_id.unwrap_or_else(|| id.clone()),
            id,
            user_id: user_id.to_string(),
            entry_type: entry.entry_type,
            date: entry.date,
            content: entry.content,
            state: entry.state,
            migration_count: entry.migration_count,
            signifiers,
            event_state: event.event_state,
            event_time: event.event_time,
            event_end_time: event.event_end_time,
            is_all_day: event.is_all_day,
            event_category: event.event_category,
            is_recurring: event.is_recurring,
            recurring_pattern: event.recurring_pattern,
            created_at: now,
            updated_at: now,
        };

        self.state.write().await.entries.push(row.clone());
        Ok(row)
    }

    async fn update_entry(&self, user_id: &str, id: &str, patch: EntryPatch) -> Result<()> {
        self.check_fault(StoreOp::Update)?;

        let mut state = self.state.write().await;
        let row = state
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.user_id == user_id)
            .ok_or_else(|| JournalError::NotFound(id.to_string()))?;
        patch.apply_to(row);
        normalize_signifiers(&mut row.signifiers);
        row.updated_at = now_ms();
        Ok(())
    }

    async fn get_entry(&self, user_id: &str, id: &str) -> Result<Option<Entry>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .find(|e| e.id == id && e.user_id == user_id)
            .cloned())
    }

    async fn get_entries(&self, user_id: &str, filter: &EntryFilter) -> Result<Vec<Entry>> {
        let state = self.state.read().await;
        let mut rows: Vec<Entry> = state
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && filter.matches(e))
            .cloned()
            .collect();
        rows.sort_by_key(|e| (e.date, e.created_at));
        Ok(rows)
    }

    async fn delete_entry(&self, user_id: &str, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|e| !(e.id == id && e.user_id == user_id));
        if state.entries.len() == before {
            return Err(JournalError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn append_migration_history(
        &self,
        user_id: &str,
        record: NewMigrationRecord,
    ) -> Result<MigrationRecord> {
        self.check_fault(StoreOp::AppendHistory)?;

        let stored = MigrationRecord {
            id: Uuid::now_v7().to_string(),
            task_id: record.task_id,
            user_id: user_id.to_string(),
            original_date: record.original_date,
            migrated_to_date: record.migrated_to_date,
            migration_type: record.migration_type,
            created_at: now_ms(),
        };
        self.state.write().await.history.push(stored.clone());
        Ok(stored)
    }

    async fn get_migration_history(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<Vec<MigrationRecord>> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|r| r.user_id == user_id && r.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn list_migration_history(&self, user_id: &str) -> Result<Vec<MigrationRecord>> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_migration_stats(&self, user_id: &str) -> Result<MigrationStats> {
        let state = self.state.read().await;
        Ok(crate::ledger::tally(
            state.history.iter().filter(|r| r.user_id == user_id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MigrationType, TaskState};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    #[tokio::test]
    async fn created_rows_start_their_own_lineage() {
        let store = MemoryStore::new();
        let row = store
            .create_entry("u1", NewEntry::task(day(21), "call mum"))
            .await
            .unwrap();
        assert_eq!(row.lineage_id, row.id);
        assert_eq!(row.user_id, "u1");
    }

    #[tokio::test]
    async fn rows_are_scoped_per_user() {
        let store = MemoryStore::new();
        let row = store
            .create_entry("u1", NewEntry::task(day(21), "call mum"))
            .await
            .unwrap();
        assert!(store.get_entry("u2", &row.id).await.unwrap().is_none());
        assert!(matches!(
            store.update_entry("u2", &row.id, EntryPatch::state(TaskState::Complete)).await,
            Err(JournalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Create);
        assert!(store.create_entry("u1", NewEntry::task(day(1), "a")).await.is_err());
        assert!(store.create_entry("u1", NewEntry::task(day(1), "a")).await.is_ok());
    }

    #[tokio::test]
    async fn default_plan_leaves_closed_row_when_spawn_fails() {
        let store = MemoryStore::new();
        let row = store
            .create_entry("u1", NewEntry::task(day(21), "draft"))
            .await
            .unwrap();
        store.fail_next(StoreOp::Create);

        let plan = super::super::LineagePlan {
            task_id: row.id.clone(),
            close: EntryPatch::close(TaskState::Migrated, 1),
            spawn: Some(NewEntry::successor_of(&row, day(22), 1)),
            record: NewMigrationRecord {
                task_id: row.id.clone(),
                original_date: day(21),
                migrated_to_date: Some(day(22)),
                migration_type: MigrationType::Migrate,
            },
        };
        assert!(store.apply_plan("u1", plan).await.is_err());

        let closed = store.get_entry("u1", &row.id).await.unwrap().unwrap();
        assert_eq!(closed.state, TaskState::Migrated);
        assert_eq!(store.all_entries().await.len(), 1);
        assert!(store.all_history().await.is_empty());
    }
}
