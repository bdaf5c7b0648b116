//! Migration ledger: record construction, aggregation and lineage lookup.

use crate::error::{JournalError, Result};
use crate::storage::JournalStore;
use crate::types::{
    Entry, EntryFilter, MigrationRecord, MigrationStats, MigrationType, NewMigrationRecord,
};
use chrono::NaiveDate;
use serde::Serialize;

/// Ledger record for an action on `task_id`. `target` is ignored for cancel.
pub fn record_for(
    kind: MigrationType,
    task_id: &str,
    original_date: NaiveDate,
    target: Option<NaiveDate>,
) -> NewMigrationRecord {
    let migrated_to_date = match kind {
        MigrationType::Cancel => None,
        MigrationType::Migrate | MigrationType::Schedule => target,
    };
    NewMigrationRecord {
        task_id: task_id.to_string(),
        original_date,
        migrated_to_date,
        migration_type: kind,
    }
}

/// Fold ledger rows into aggregate counts.
pub fn tally<'a>(records: impl IntoIterator<Item = &'a MigrationRecord>) -> MigrationStats {
    let mut stats = MigrationStats::default();
    for record in records {
        stats.total_migrations += 1;
        match record.migration_type {
            MigrationType::Migrate => stats.migrated += 1,
            MigrationType::Schedule => stats.scheduled += 1,
            MigrationType::Cancel => stats.cancelled += 1,
        }
    }
    stats
}

/// Migration count the row was created with. Closing a row bumps its own
/// counter, so a migrated or scheduled row was spawned one lower.
pub fn spawn_count(row: &Entry) -> u32 {
    if row.state.is_closed() {
        row.migration_count.saturating_sub(1)
    } else {
        row.migration_count
    }
}

/// The row that superseded `closed`, if it exists in `chain`.
///
/// The successor was spawned at the closed row's bumped count, whether or
/// not it has since been carried forward itself.
pub fn successor_in<'a>(chain: &'a [Entry], closed: &Entry) -> Option<&'a Entry> {
    chain.iter().find(|row| {
        row.id != closed.id
            && row.lineage_id == closed.lineage_id
            && spawn_count(row) == closed.migration_count
    })
}

/// Every row of one logical task plus the ledger rows recorded against them.
#[derive(Debug, Clone, Serialize)]
pub struct Lineage {
    pub lineage_id: String,
    /// Ordered by position in the chain; the last row is the live instance.
    pub rows: Vec<Entry>,
    pub records: Vec<MigrationRecord>,
}

impl Lineage {
    pub fn current(&self) -> Option<&Entry> {
        self.rows.last()
    }

    /// Number of carry-forwards along the chain.
    pub fn depth(&self) -> u32 {
        self.current().map(|row| row.migration_count).unwrap_or(0)
    }
}

/// Rows sharing `lineage_id` in chain order. Dates are not used; a task can
/// be carried to an earlier day.
pub async fn chain<S: JournalStore + ?Sized>(
    store: &S,
    user_id: &str,
    lineage_id: &str,
) -> Result<Vec<Entry>> {
    let filter = EntryFilter {
        lineage_id: Some(lineage_id.to_string()),
        ..Default::default()
    };
    let mut rows = store.get_entries(user_id, &filter).await?;
    rows.sort_by_key(|row| {
        (
            spawn_count(row),
            !row.state.is_closed(),
            row.created_at,
            row.id.clone(),
        )
    });
    Ok(rows)
}

/// Load a lineage with its ledger rows. `NotFound` if no row carries the id.
pub async fn lineage<S: JournalStore + ?Sized>(
    store: &S,
    user_id: &str,
    lineage_id: &str,
) -> Result<Lineage> {
    let rows = chain(store, user_id, lineage_id).await?;
    if rows.is_empty() {
        return Err(JournalError::NotFound(lineage_id.to_string()));
    }

    let mut records = Vec::new();
    for row in &rows {
        records.extend(store.get_migration_history(user_id, &row.id).await?);
    }
    records.sort_by_key(|r| r.created_at);

    tracing::debug!(lineage_id, rows = rows.len(), records = records.len(), "Loaded lineage");
    Ok(Lineage {
        lineage_id: lineage_id.to_string(),
        rows,
        records,
    })
}

/// Live instance of the logical task `task_id` belongs to.
pub async fn current_instance<S: JournalStore + ?Sized>(
    store: &S,
    user_id: &str,
    task_id: &str,
) -> Result<Entry> {
    let row = crate::storage::require_entry(store, user_id, task_id).await?;
    let rows = chain(store, user_id, &row.lineage_id).await?;
    Ok(rows.into_iter().last().unwrap_or(row))
}
