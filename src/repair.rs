//! Reconciliation for interrupted lineage transitions.
//!
//! Stores without transactions can stop between close-out, spawn and ledger
//! write. `scan` finds closed rows left in that state and `apply` finishes
//! the missing writes. Closed rows themselves are never modified.

use crate::error::Result;
use crate::ledger;
use crate::storage::JournalStore;
use crate::types::{Entry, EntryFilter, MigrationRecord, MigrationType, NewEntry, TaskState};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// Closed row with no ledger record against its id.
    MissingLedger { task: Entry },
    /// Closed row whose lineage has no row spawned at its migration count.
    MissingSuccessor {
        task: Entry,
        /// Target date from the ledger, when one was written.
        target: Option<NaiveDate>,
    },
}

impl Finding {
    pub fn task(&self) -> &Entry {
        match self {
            Finding::MissingLedger { task } | Finding::MissingSuccessor { task, .. } => task,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub spawned: Vec<Entry>,
    pub records: Vec<MigrationRecord>,
}

fn kind_for(state: TaskState) -> MigrationType {
    if state == TaskState::Scheduled {
        MigrationType::Schedule
    } else {
        MigrationType::Migrate
    }
}

pub async fn scan<S: JournalStore + ?Sized>(store: &S, user_id: &str) -> Result<Vec<Finding>> {
    let tasks = store.get_entries(user_id, &EntryFilter::tasks()).await?;
    let history = store.list_migration_history(user_id).await?;

    let mut findings = Vec::new();
    for closed in tasks.iter().filter(|t| t.state.is_closed()) {
        let record = history
            .iter()
            .rfind(|r| r.task_id == closed.id && r.migration_type != MigrationType::Cancel);

        if record.is_none() {
            findings.push(Finding::MissingLedger {
                task: closed.clone(),
            });
        }

        let chain: Vec<Entry> = tasks
            .iter()
            .filter(|t| t.lineage_id == closed.lineage_id)
            .cloned()
            .collect();
        if ledger::successor_in(&chain, closed).is_none() {
            findings.push(Finding::MissingSuccessor {
                task: closed.clone(),
                target: record.and_then(|r| r.migrated_to_date),
            });
        }
    }

    debug!(user_id, findings = findings.len(), "Scanned lineages for gaps");
    Ok(findings)
}

/// Finish the writes named by `findings`. Successors without a known
/// target land on `today`.
pub async fn apply<S: JournalStore + ?Sized>(
    store: &S,
    user_id: &str,
    findings: &[Finding],
    today: NaiveDate,
) -> Result<RepairReport> {
    let mut report = RepairReport::default();

    for finding in findings {
        if let Finding::MissingSuccessor { task, target } = finding {
            let date = target.unwrap_or(today);
            let spawned = store
                .create_entry(
                    user_id,
                    NewEntry::successor_of(task, date, task.migration_count),
                )
                .await?;
            info!(
                user_id,
                task_id = %task.id,
                new_task_id = %spawned.id,
                date = %date,
                "Spawned missing successor"
            );
            report.spawned.push(spawned);
        }
    }

    for finding in findings {
        if let Finding::MissingLedger { task } = finding {
            let chain = ledger::chain(store, user_id, &task.lineage_id).await?;
            let target = ledger::successor_in(&chain, task)
                .map(|s| s.date)
                .unwrap_or(today);
            let record = store
                .append_migration_history(
                    user_id,
                    ledger::record_for(kind_for(task.state), &task.id, task.date, Some(target)),
                )
                .await?;
            info!(
                user_id,
                task_id = %task.id,
                action = %record.migration_type,
                "Appended missing ledger record"
            );
            report.records.push(record);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LineagePlan, MemoryStore, StoreOp};
    use crate::types::EntryPatch;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    async fn interrupted_migration(store: &MemoryStore, fail: StoreOp) -> Entry {
        let task = store
            .create_entry("u1", NewEntry::task(day(21), "write essay"))
            .await
            .unwrap();
        store.fail_next(fail);
        let plan = LineagePlan {
            task_id: task.id.clone(),
            close: EntryPatch::close(TaskState::Migrated, 1),
            spawn: Some(NewEntry::successor_of(&task, day(22), 1)),
            record: ledger::record_for(MigrationType::Migrate, &task.id, day(21), Some(day(22))),
        };
        assert!(store.apply_plan("u1", plan).await.is_err());
        task
    }

    #[tokio::test]
    async fn clean_store_has_no_findings() {
        let store = MemoryStore::new();
        store
            .create_entry("u1", NewEntry::task(day(21), "fine"))
            .await
            .unwrap();
        assert!(scan(&store, "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_spawn_is_repaired() {
        let store = MemoryStore::new();
        let task = interrupted_migration(&store, StoreOp::Create).await;

        let findings = scan(&store, "u1").await.unwrap();
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.task().id == task.id));

        let report = apply(&store, "u1", &findings, day(25)).await.unwrap();
        assert_eq!(report.spawned.len(), 1);
        assert_eq!(report.spawned[0].date, day(25));
        assert_eq!(report.spawned[0].migration_count, 1);
        assert_eq!(report.spawned[0].state, TaskState::Incomplete);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].migrated_to_date, Some(day(25)));

        assert!(scan(&store, "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_ledger_write_is_repaired() {
        let store = MemoryStore::new();
        let task = interrupted_migration(&store, StoreOp::AppendHistory).await;

        let findings = scan(&store, "u1").await.unwrap();
        assert_eq!(findings, vec![Finding::MissingLedger {
            task: store.get_entry("u1", &task.id).await.unwrap().unwrap()
        }]);

        let report = apply(&store, "u1", &findings, day(25)).await.unwrap();
        assert!(report.spawned.is_empty());
        assert_eq!(report.records[0].migrated_to_date, Some(day(22)));
        assert_eq!(report.records[0].original_date, day(21));
        assert!(scan(&store, "u1").await.unwrap().is_empty());
    }
}
