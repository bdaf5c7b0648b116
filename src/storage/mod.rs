//! Storage interface consumed by the migration core.
//!
//! Implemented by the SQLite [`Database`](crate::db::Database) and by
//! [`MemoryStore`]. Every call is scoped to one user.

mod memory;

pub use memory::{MemoryStore, StoreOp};

use crate::error::{JournalError, Result};
use crate::types::{
    Entry, EntryFilter, EntryPatch, MigrationRecord, MigrationStats, NewEntry,
    NewMigrationRecord,
};
use async_trait::async_trait;

/// One lineage transition, expressed as the three writes it needs.
///
/// Writes happen in field order: close-out, spawn, ledger. A crash between
/// steps leaves the old row closed with no successor rather than two open
/// rows; `repair` finds and fixes those.
#[derive(Debug, Clone, PartialEq)]
pub struct LineagePlan {
    pub task_id: String,
    pub close: EntryPatch,
    pub spawn: Option<NewEntry>,
    pub record: NewMigrationRecord,
}

#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Insert a row. Returns it with the assigned id and timestamps.
    async fn create_entry(&self, user_id: &str, entry: NewEntry) -> Result<Entry>;

    /// Partial update. Fails with `NotFound` if the row does not exist.
    async fn update_entry(&self, user_id: &str, id: &str, patch: EntryPatch) -> Result<()>;

    async fn get_entry(&self, user_id: &str, id: &str) -> Result<Option<Entry>>;

    /// Rows matching `filter`, ordered by date, then creation time.
    async fn get_entries(&self, user_id: &str, filter: &EntryFilter) -> Result<Vec<Entry>>;

    async fn delete_entry(&self, user_id: &str, id: &str) -> Result<()>;

    /// Insert-only ledger write.
    async fn append_migration_history(
        &self,
        user_id: &str,
        record: NewMigrationRecord,
    ) -> Result<MigrationRecord>;

    /// Ledger rows for one closed row, oldest first.
    async fn get_migration_history(&self, user_id: &str, task_id: &str)
    -> Result<Vec<MigrationRecord>>;

    /// Every ledger row for the user, oldest first.
    async fn list_migration_history(&self, user_id: &str) -> Result<Vec<MigrationRecord>>;

    async fn get_migration_stats(&self, user_id: &str) -> Result<MigrationStats>;

    /// Run a lineage transition. Returns the spawned row, if any.
    ///
    /// The default runs the three writes sequentially with no rollback;
    /// stores with transactions override it.
    async fn apply_plan(&self, user_id: &str, plan: LineagePlan) -> Result<Option<Entry>> {
        self.update_entry(user_id, &plan.task_id, plan.close).await?;
        let spawned = match plan.spawn {
            Some(new_entry) => Some(self.create_entry(user_id, new_entry).await?),
            None => None,
        };
        self.append_migration_history(user_id, plan.record).await?;
        Ok(spawned)
    }
}

/// Fetch a row, mapping a missing id to `NotFound`.
pub async fn require_entry<S: JournalStore + ?Sized>(
    store: &S,
    user_id: &str,
    id: &str,
) -> Result<Entry> {
    store
        .get_entry(user_id, id)
        .await?
        .ok_or_else(|| JournalError::NotFound(id.to_string()))
}
