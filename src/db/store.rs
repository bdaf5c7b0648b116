//! `JournalStore` for SQLite.
//!
//! rusqlite is blocking, so each call hops onto the blocking pool with a
//! cloned handle.

use super::Database;
use super::entries::{insert_entry_internal, update_entry_internal};
use super::ledger::append_record_internal;
use crate::error::Result;
use crate::storage::{JournalStore, LineagePlan};
use crate::types::{
    Entry, EntryFilter, EntryPatch, MigrationRecord, MigrationStats, NewEntry,
    NewMigrationRecord,
};
use async_trait::async_trait;

impl Database {
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(db)).await?
    }
}

#[async_trait]
impl JournalStore for Database {
    async fn create_entry(&self, user_id: &str, entry: NewEntry) -> Result<Entry> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.insert_entry(&user_id, entry)).await
    }

    async fn update_entry(&self, user_id: &str, id: &str, patch: EntryPatch) -> Result<()> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.blocking(move |db| db.patch_entry(&user_id, &id, &patch))
            .await
    }

    async fn get_entry(&self, user_id: &str, id: &str) -> Result<Option<Entry>> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.blocking(move |db| db.find_entry(&user_id, &id)).await
    }

    async fn get_entries(&self, user_id: &str, filter: &EntryFilter) -> Result<Vec<Entry>> {
        let (user_id, filter) = (user_id.to_string(), filter.clone());
        self.blocking(move |db| db.list_entries(&user_id, &filter))
            .await
    }

    async fn delete_entry(&self, user_id: &str, id: &str) -> Result<()> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.blocking(move |db| db.remove_entry(&user_id, &id)).await
    }

    async fn append_migration_history(
        &self,
        user_id: &str,
        record: NewMigrationRecord,
    ) -> Result<MigrationRecord> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.append_migration(&user_id, record))
            .await
    }

    async fn get_migration_history(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<Vec<MigrationRecord>> {
        let (user_id, task_id) = (user_id.to_string(), task_id.to_string());
        self.blocking(move |db| db.migration_history(&user_id, &task_id))
            .await
    }

    async fn list_migration_history(&self, user_id: &str) -> Result<Vec<MigrationRecord>> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.all_migrations(&user_id)).await
    }

    async fn get_migration_stats(&self, user_id: &str) -> Result<MigrationStats> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.migration_stats(&user_id)).await
    }

    /// All three writes commit together or not at all.
    async fn apply_plan(&self, user_id: &str, plan: LineagePlan) -> Result<Option<Entry>> {
        let user_id = user_id.to_string();
        self.blocking(move |db| {
            db.with_conn_mut(|conn| {
                let tx = conn.transaction()?;

                update_entry_internal(&tx, &user_id, &plan.task_id, &plan.close)?;
                let spawned = match plan.spawn {
                    Some(new_entry) => Some(insert_entry_internal(&tx, &user_id, new_entry)?),
                    None => None,
                };
                append_record_internal(&tx, &user_id, plan.record)?;

                tx.commit()?;
                Ok(spawned)
            })
        })
        .await
    }
}
