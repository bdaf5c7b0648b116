//! Integration tests for the SQLite store.
//!
//! These tests go through the `JournalStore` trait and the engine, using
//! in-memory and temporary-file databases.

use bujo_migrate::clock::FixedClock;
use bujo_migrate::db::Database;
use bujo_migrate::engine::{MigrationEngine, Session};
use bujo_migrate::error::JournalError;
use bujo_migrate::ledger;
use bujo_migrate::storage::JournalStore;
use bujo_migrate::types::{
    EntryFilter, EntryPatch, EntryType, EventCategory, EventDetails, EventState, MigrationType,
    NewEntry, Signifier, TaskState,
};
use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use tempfile::TempDir;

fn oct(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
}

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn engine_for(db: Database, user: &str) -> MigrationEngine<Database> {
    MigrationEngine::new(
        Arc::new(db),
        Session::user(user),
        Arc::new(FixedClock::on(oct(25))),
    )
}

mod entry_tests {
    use super::*;

    #[tokio::test]
    async fn event_fields_round_trip() {
        let db = setup_db();
        let mut entry = NewEntry::task(oct(24), "standup");
        entry.entry_type = EntryType::Event;
        entry.event = Some(EventDetails {
            event_state: Some(EventState::Upcoming),
            event_time: NaiveTime::from_hms_opt(9, 15, 0),
            event_end_time: NaiveTime::from_hms_opt(9, 30, 0),
            is_all_day: false,
            event_category: Some(EventCategory::Meeting),
            is_recurring: true,
            recurring_pattern: Some("weekdays".into()),
        });

        let created = db.create_entry("u1", entry).await.unwrap();
        let loaded = db.get_entry("u1", &created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.event_category, Some(EventCategory::Meeting));
        assert_eq!(loaded.recurring_pattern.as_deref(), Some("weekdays"));
        assert_eq!(loaded.lineage_id, loaded.id);
    }

    #[tokio::test]
    async fn signifiers_are_stored_in_canonical_order() {
        let db = setup_db();
        let entry = NewEntry::task(oct(24), "idea").with_signifiers(vec![
            Signifier::Explore,
            Signifier::Priority,
            Signifier::Explore,
        ]);
        let created = db.create_entry("u1", entry).await.unwrap();
        assert_eq!(
            created.signifiers,
            vec![Signifier::Priority, Signifier::Explore]
        );
    }

    #[tokio::test]
    async fn rows_are_scoped_to_their_user() {
        let db = setup_db();
        let mine = db
            .create_entry("u1", NewEntry::task(oct(20), "mine"))
            .await
            .unwrap();
        db.create_entry("u2", NewEntry::task(oct(20), "theirs"))
            .await
            .unwrap();

        let rows = db.get_entries("u1", &EntryFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(db.get_entry("u2", &mine.id).await.unwrap().is_none());

        let err = db
            .update_entry("u2", &mine.id, EntryPatch::state(TaskState::Complete))
            .await
            .unwrap_err();
        assert!(matches!(err, JournalError::NotFound(_)));
    }

    #[tokio::test]
    async fn filters_combine() {
        let db = setup_db();
        for (day, content) in [(18, "a"), (20, "b"), (22, "c")] {
            db.create_entry("u1", NewEntry::task(oct(day), content))
                .await
                .unwrap();
        }
        let mut note = NewEntry::task(oct(19), "note");
        note.entry_type = EntryType::Note;
        db.create_entry("u1", note).await.unwrap();

        let window = EntryFilter {
            from: Some(oct(19)),
            to: Some(oct(21)),
            ..Default::default()
        };
        let rows = db.get_entries("u1", &window).await.unwrap();
        assert_eq!(
            rows.iter().map(|e| e.content.as_str()).collect::<Vec<_>>(),
            ["note", "b"]
        );

        let pending = db
            .get_entries("u1", &EntryFilter::pending_before(oct(22)))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
    }
}

mod migration_tests {
    use super::*;

    #[tokio::test]
    async fn state_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journal.db");

        let (task_id, lineage_id) = {
            let engine = engine_for(Database::open(&path).unwrap(), "u1");
            let task = engine.add_task(oct(20), "persist me", vec![]).await.unwrap();
            let spawned = engine.migrate(&task.id, oct(20), oct(25)).await.unwrap();
            assert_eq!(spawned.lineage_id, task.lineage_id);
            (task.id, task.lineage_id)
        };

        let engine = engine_for(Database::open(&path).unwrap(), "u1");
        let history = engine.history(&task_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].migration_type, MigrationType::Migrate);

        let lineage = engine.lineage(&lineage_id).await.unwrap();
        assert_eq!(lineage.rows.len(), 2);
        assert_eq!(lineage.current().unwrap().date, oct(25));
        assert_eq!(lineage.records.len(), 1);
    }

    #[tokio::test]
    async fn current_instance_follows_the_lineage() {
        let db = setup_db();
        let engine = engine_for(db.clone(), "u1");
        let first = engine.add_task(oct(20), "chain", vec![]).await.unwrap();
        let second = engine.migrate(&first.id, oct(20), oct(21)).await.unwrap();
        let third = engine.schedule(&second.id, oct(21), oct(28)).await.unwrap();

        let live = ledger::current_instance(&db, "u1", &first.id).await.unwrap();
        assert_eq!(live.id, third.id);
        assert_eq!(live.migration_count, 2);
    }

    #[tokio::test]
    async fn stats_are_per_user() {
        let db = setup_db();
        let ana = engine_for(db.clone(), "ana");
        let sam = engine_for(db.clone(), "sam");

        let t = ana.add_task(oct(20), "a", vec![]).await.unwrap();
        ana.migrate(&t.id, oct(20), oct(21)).await.unwrap();
        let u = sam.add_task(oct(20), "s", vec![]).await.unwrap();
        sam.cancel(&u.id, oct(20)).await.unwrap();

        let stats = ana.stats().await.unwrap();
        assert_eq!((stats.total_migrations, stats.migrated, stats.cancelled), (1, 1, 0));
        let stats = sam.stats().await.unwrap();
        assert_eq!((stats.total_migrations, stats.migrated, stats.cancelled), (1, 0, 1));
    }

    #[tokio::test]
    async fn deleting_a_closed_row_keeps_its_ledger() {
        let db = setup_db();
        let engine = engine_for(db, "u1");
        let t = engine.add_task(oct(20), "gone", vec![]).await.unwrap();
        engine.migrate(&t.id, oct(20), oct(21)).await.unwrap();
        engine.delete_entry(&t.id).await.unwrap();

        assert!(matches!(
            engine.get_entry(&t.id).await,
            Err(JournalError::NotFound(_))
        ));
        assert_eq!(engine.history(&t.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reschedule_event_marks_it_migrated() {
        let db = setup_db();
        let engine = engine_for(db, "u1");
        let event = engine
            .add_event(oct(24), "dentist", EventDetails::default())
            .await
            .unwrap();
        assert_eq!(event.event_state, Some(EventState::Upcoming));

        let moved = engine.reschedule_event(&event.id, oct(30)).await.unwrap();
        assert_eq!(moved.date, oct(30));
        assert_eq!(moved.event_state, Some(EventState::Migrated));
        assert_eq!(engine.stats().await.unwrap().total_migrations, 0);
    }
}
