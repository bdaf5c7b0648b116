//! Entry CRUD.

use super::{Database, bad_value, date_from_sql, date_to_sql, now_ms};
use crate::error::{JournalError, Result};
use crate::types::{
    Entry, EntryFilter, EntryPatch, EntryType, EventCategory, EventState, NewEntry, Signifier,
    TaskState, normalize_signifiers,
};
use chrono::NaiveTime;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

const TIME_FORMAT: &str = "%H:%M";

fn time_from_sql(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveTime>> {
    raw.map(|s| {
        NaiveTime::parse_from_str(&s, TIME_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

fn time_to_sql(time: Option<NaiveTime>) -> Option<String> {
    time.map(|t| t.format(TIME_FORMAT).to_string())
}

fn signifiers_to_sql(signifiers: &[Signifier]) -> Result<String> {
    Ok(serde_json::to_string(signifiers)?)
}

pub fn parse_entry_row(row: &Row) -> rusqlite::Result<Entry> {
    let entry_type: String = row.get("entry_type")?;
    let date: String = row.get("entry_date")?;
    let state: String = row.get("state")?;
    let signifiers_json: String = row.get("signifiers")?;
    let event_state: Option<String> = row.get("event_state")?;
    let event_category: Option<String> = row.get("event_category")?;

    let signifiers: Vec<Signifier> = serde_json::from_str(&signifiers_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Entry {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        entry_type: EntryType::parse(&entry_type)
            .ok_or_else(|| bad_value(2, "entry type", &entry_type))?,
        date: date_from_sql(3, &date)?,
        content: row.get("content")?,
        state: TaskState::parse(&state).ok_or_else(|| bad_value(5, "task state", &state))?,
        migration_count: row.get("migration_count")?,
        signifiers,
        lineage_id: row.get("lineage_id")?,
        event_state: event_state
            .map(|s| EventState::parse(&s).ok_or_else(|| bad_value(9, "event state", &s)))
            .transpose()?,
        event_time: time_from_sql(10, row.get("event_time")?)?,
        event_end_time: time_from_sql(11, row.get("event_end_time")?)?,
        is_all_day: row.get("is_all_day")?,
        event_category: event_category
            .map(|s| EventCategory::parse(&s).ok_or_else(|| bad_value(13, "event category", &s)))
            .transpose()?,
        is_recurring: row.get("is_recurring")?,
        recurring_pattern: row.get("recurring_pattern")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to get an entry using an existing connection (avoids deadlock).
pub(crate) fn get_entry_internal(conn: &Connection, user_id: &str, id: &str) -> Result<Option<Entry>> {
    let mut stmt = conn.prepare("SELECT * FROM entries WHERE id = ?1 AND user_id = ?2")?;

    match stmt.query_row(params![id, user_id], parse_entry_row) {
        Ok(entry) => Ok(Some(entry)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn insert_entry_internal(conn: &Connection, user_id: &str, entry: NewEntry) -> Result<Entry> {
    let id = Uuid::now_v7().to_string();
    let lineage_id = entry.lineage_id.clone().unwrap_or_else(|| id.clone());
    let mut signifiers = entry.signifiers.clone();
    normalize_signifiers(&mut signifiers);
    let event = entry.event.clone().unwrap_or_default();
    let now = now_ms();

    conn.execute(
        "INSERT INTO entries (
            id, user_id, entry_type, entry_date, content, state, migration_count,
            signifiers, lineage_id, event_state, event_time, event_end_time,
            is_all_day, event_category, is_recurring, recurring_pattern,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
        params![
            id,
            user_id,
            entry.entry_type.as_str(),
            date_to_sql(entry.date),
            entry.content,
            entry.state.as_str(),
            entry.migration_count,
            signifiers_to_sql(&signifiers)?,
            lineage_id,
            event.event_state.map(|s| s.as_str()),
            time_to_sql(event.event_time),
            time_to_sql(event.event_end_time),
            event.is_all_day,
            event.event_category.map(|c| c.as_str()),
            event.is_recurring,
            event.recurring_pattern,
            now,
        ],
    )?;

    get_entry_internal(conn, user_id, &id)?
        .ok_or_else(|| JournalError::persistence(format!("entry {} vanished after insert", id)))
}

pub(crate) fn update_entry_internal(
    conn: &Connection,
    user_id: &str,
    id: &str,
    patch: &EntryPatch,
) -> Result<()> {
    let mut sets: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    let mut push = |column: &str, value: Box<dyn rusqlite::ToSql>| {
        param_values.push(value);
        sets.push(format!("{} = ?{}", column, param_values.len()));
    };

    if let Some(date) = patch.date {
        push("entry_date", Box::new(date_to_sql(date)));
    }
    if let Some(ref content) = patch.content {
        push("content", Box::new(content.clone()));
    }
    if let Some(state) = patch.state {
        push("state", Box::new(state.as_str()));
    }
    if let Some(count) = patch.migration_count {
        push("migration_count", Box::new(count));
    }
    if let Some(ref signifiers) = patch.signifiers {
        let mut signifiers = signifiers.clone();
        normalize_signifiers(&mut signifiers);
        push("signifiers", Box::new(signifiers_to_sql(&signifiers)?));
    }
    if let Some(event_state) = patch.event_state {
        push("event_state", Box::new(event_state.as_str()));
    }
    push("updated_at", Box::new(now_ms()));

    let sql = format!(
        "UPDATE entries SET {} WHERE id = ?{} AND user_id = ?{}",
        sets.join(", "),
        param_values.len() + 1,
        param_values.len() + 2
    );
    param_values.push(Box::new(id.to_string()));
    param_values.push(Box::new(user_id.to_string()));

    let param_refs: Vec<&dyn rusqlite::ToSql> = param_values.iter().map(|b| b.as_ref()).collect();
    let changed = conn.execute(&sql, param_refs.as_slice())?;
    if changed == 0 {
        return Err(JournalError::NotFound(id.to_string()));
    }
    Ok(())
}

impl Database {
    pub fn insert_entry(&self, user_id: &str, entry: NewEntry) -> Result<Entry> {
        self.with_conn(|conn| insert_entry_internal(conn, user_id, entry))
    }

    pub fn find_entry(&self, user_id: &str, id: &str) -> Result<Option<Entry>> {
        self.with_conn(|conn| get_entry_internal(conn, user_id, id))
    }

    pub fn patch_entry(&self, user_id: &str, id: &str, patch: &EntryPatch) -> Result<()> {
        self.with_conn(|conn| update_entry_internal(conn, user_id, id, patch))
    }

    pub fn remove_entry(&self, user_id: &str, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM entries WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            if changed == 0 {
                return Err(JournalError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    /// List entries matching a filter, ordered by date then creation time.
    pub fn list_entries(&self, user_id: &str, filter: &EntryFilter) -> Result<Vec<Entry>> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM entries WHERE user_id = ?1");
            let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

            if let Some(entry_type) = filter.entry_type {
                param_values.push(Box::new(entry_type.as_str()));
                sql.push_str(&format!(" AND entry_type = ?{}", param_values.len()));
            }
            if let Some(state) = filter.state {
                param_values.push(Box::new(state.as_str()));
                sql.push_str(&format!(" AND state = ?{}", param_values.len()));
            }
            if let Some(before) = filter.before {
                param_values.push(Box::new(date_to_sql(before)));
                sql.push_str(&format!(" AND entry_date < ?{}", param_values.len()));
            }
            if let Some(from) = filter.from {
                param_values.push(Box::new(date_to_sql(from)));
                sql.push_str(&format!(" AND entry_date >= ?{}", param_values.len()));
            }
            if let Some(to) = filter.to {
                param_values.push(Box::new(date_to_sql(to)));
                sql.push_str(&format!(" AND entry_date <= ?{}", param_values.len()));
            }
            if let Some(ref lineage_id) = filter.lineage_id {
                param_values.push(Box::new(lineage_id.clone()));
                sql.push_str(&format!(" AND lineage_id = ?{}", param_values.len()));
            }

            sql.push_str(" ORDER BY entry_date ASC, created_at ASC, id ASC");

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> =
                param_values.iter().map(|b| b.as_ref()).collect();

            let entries = stmt
                .query_map(param_refs.as_slice(), parse_entry_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(entries)
        })
    }
}
