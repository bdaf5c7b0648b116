//! Migration ledger persistence.

use super::{Database, bad_value, date_from_sql, date_to_sql, now_ms};
use crate::error::Result;
use crate::types::{MigrationRecord, MigrationStats, MigrationType, NewMigrationRecord};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

fn parse_record_row(row: &Row) -> rusqlite::Result<MigrationRecord> {
    let original_date: String = row.get("original_date")?;
    let migrated_to_date: Option<String> = row.get("migrated_to_date")?;
    let migration_type: String = row.get("migration_type")?;

    Ok(MigrationRecord {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        original_date: date_from_sql(3, &original_date)?,
        migrated_to_date: migrated_to_date
            .map(|d| date_from_sql(4, &d))
            .transpose()?,
        migration_type: MigrationType::parse(&migration_type)
            .ok_or_else(|| bad_value(5, "migration type", &migration_type))?,
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn append_record_internal(
    conn: &Connection,
    user_id: &str,
    record: NewMigrationRecord,
) -> Result<MigrationRecord> {
    let stored = MigrationRecord {
        id: Uuid::now_v7().to_string(),
        task_id: record.task_id,
        user_id: user_id.to_string(),
        original_date: record.original_date,
        migrated_to_date: record.migrated_to_date,
        migration_type: record.migration_type,
        created_at: now_ms(),
    };

    conn.execute(
        "INSERT INTO migration_history
            (id, task_id, user_id, original_date, migrated_to_date, migration_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            stored.id,
            stored.task_id,
            stored.user_id,
            date_to_sql(stored.original_date),
            stored.migrated_to_date.map(date_to_sql),
            stored.migration_type.as_str(),
            stored.created_at,
        ],
    )?;

    Ok(stored)
}

impl Database {
    pub fn append_migration(&self, user_id: &str, record: NewMigrationRecord) -> Result<MigrationRecord> {
        self.with_conn(|conn| append_record_internal(conn, user_id, record))
    }

    /// Ledger rows recorded against one closed row, oldest first.
    pub fn migration_history(&self, user_id: &str, task_id: &str) -> Result<Vec<MigrationRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM migration_history
                 WHERE user_id = ?1 AND task_id = ?2
                 ORDER BY created_at ASC, id ASC",
            )?;
            let records = stmt
                .query_map(params![user_id, task_id], parse_record_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    pub fn all_migrations(&self, user_id: &str) -> Result<Vec<MigrationRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM migration_history
                 WHERE user_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let records = stmt
                .query_map(params![user_id], parse_record_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    pub fn migration_stats(&self, user_id: &str) -> Result<MigrationStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN migration_type = 'migrate' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN migration_type = 'schedule' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN migration_type = 'cancel' THEN 1 ELSE 0 END), 0)
                 FROM migration_history WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(MigrationStats {
                        total_migrations: row.get::<_, i64>(0)? as u64,
                        migrated: row.get::<_, i64>(1)? as u64,
                        scheduled: row.get::<_, i64>(2)? as u64,
                        cancelled: row.get::<_, i64>(3)? as u64,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    fn record(task_id: &str, kind: MigrationType, to: Option<NaiveDate>) -> NewMigrationRecord {
        NewMigrationRecord {
            task_id: task_id.to_string(),
            original_date: day(21),
            migrated_to_date: to,
            migration_type: kind,
        }
    }

    #[test]
    fn stats_count_by_type() {
        let db = Database::open_in_memory().unwrap();
        db.append_migration("u1", record("a", MigrationType::Migrate, Some(day(22))))
            .unwrap();
        db.append_migration("u1", record("b", MigrationType::Migrate, Some(day(22))))
            .unwrap();
        db.append_migration("u1", record("c", MigrationType::Schedule, Some(day(30))))
            .unwrap();
        db.append_migration("u1", record("d", MigrationType::Cancel, None))
            .unwrap();
        db.append_migration("u2", record("e", MigrationType::Cancel, None))
            .unwrap();

        let stats = db.migration_stats("u1").unwrap();
        assert_eq!(
            stats,
            MigrationStats {
                total_migrations: 4,
                migrated: 2,
                scheduled: 1,
                cancelled: 1,
            }
        );
        assert_eq!(db.migration_stats("nobody").unwrap(), MigrationStats::default());
    }

    #[test]
    fn history_is_scoped_to_the_closed_row() {
        let db = Database::open_in_memory().unwrap();
        db.append_migration("u1", record("a", MigrationType::Migrate, Some(day(22))))
            .unwrap();
        db.append_migration("u1", record("b", MigrationType::Cancel, None))
            .unwrap();

        let history = db.migration_history("u1", "a").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].migrated_to_date, Some(day(22)));
        assert!(db.migration_history("u2", "a").unwrap().is_empty());
    }

    #[test]
    fn ledger_rows_cannot_be_rewritten() {
        let db = Database::open_in_memory().unwrap();
        db.append_migration("u1", record("a", MigrationType::Migrate, Some(day(22))))
            .unwrap();

        let result = db.with_conn(|conn| {
            conn.execute("UPDATE migration_history SET migration_type = 'cancel'", [])?;
            Ok(())
        });
        assert!(result.is_err());

        let result = db.with_conn(|conn| {
            conn.execute("DELETE FROM migration_history", [])?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(db.all_migrations("u1").unwrap().len(), 1);
    }

    #[test]
    fn cancel_rows_must_not_carry_a_target_date() {
        let db = Database::open_in_memory().unwrap();
        let result = db.append_migration("u1", record("a", MigrationType::Cancel, Some(day(22))));
        assert!(result.is_err());
    }
}
