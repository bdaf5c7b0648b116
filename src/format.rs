//! Output formatting utilities for markdown and JSON.

use crate::catchup::{CatchUpItem, Progress};
use crate::engine::BulkOutcome;
use crate::ledger::Lineage;
use crate::repair::{Finding, RepairReport};
use crate::types::{Entry, EntryType, MigrationRecord, MigrationStats, Signifier, TaskState};
use crate::views::TypeGroups;
use crate::wizard::{Month, WizardStats};
use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeSet;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

/// Render `value` as pretty JSON, or call `markdown` for the text form.
pub fn render<T: Serialize>(
    format: OutputFormat,
    value: &T,
    markdown: impl FnOnce() -> String,
) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputFormat::Markdown => markdown(),
    }
}

fn bullet(entry: &Entry) -> &'static str {
    match entry.entry_type {
        EntryType::Task => match entry.state {
            TaskState::Incomplete => "•",
            TaskState::Complete => "×",
            TaskState::Migrated => ">",
            TaskState::Scheduled => "<",
            TaskState::Cancelled => "-",
        },
        EntryType::Event => "○",
        EntryType::Note => "–",
    }
}

fn signifier_marks(signifiers: &[Signifier]) -> String {
    signifiers
        .iter()
        .map(|s| match s {
            Signifier::Priority => '*',
            Signifier::Inspiration => '!',
            Signifier::Explore => '?',
        })
        .collect()
}

/// One entry as a markdown list item.
pub fn format_entry_short(entry: &Entry) -> String {
    let marks = signifier_marks(&entry.signifiers);
    let content = if entry.is_task() && entry.state == TaskState::Cancelled {
        format!("~~{}~~", entry.content)
    } else {
        entry.content.clone()
    };

    let mut line = format!("- {}{} {}", marks, bullet(entry), content);
    if let Some(time) = entry.event_time {
        line.push_str(&format!(" @ {}", time.format("%H:%M")));
    }
    if entry.migration_count > 0 {
        line.push_str(&format!(" (migrated {}x)", entry.migration_count));
    }
    line.push_str(&format!(" `{}`\n", entry.id));
    line
}

pub fn format_entry_markdown(entry: &Entry) -> String {
    let mut md = String::new();

    md.push_str(&format!("## {}: {}\n", entry.entry_type.as_str(), entry.content));
    md.push_str(&format!("- **id**: `{}`\n", entry.id));
    md.push_str(&format!("- **date**: {}\n", entry.date));
    if entry.is_task() {
        md.push_str(&format!("- **state**: {}\n", entry.state));
        md.push_str(&format!("- **migrations**: {}\n", entry.migration_count));
        md.push_str(&format!("- **lineage**: `{}`\n", entry.lineage_id));
    }
    if !entry.signifiers.is_empty() {
        let tags: Vec<&str> = entry.signifiers.iter().map(|s| s.as_str()).collect();
        md.push_str(&format!("- **signifiers**: {}\n", tags.join(", ")));
    }
    if let Some(state) = entry.event_state {
        md.push_str(&format!("- **event state**: {}\n", state.as_str()));
    }

    md
}

pub fn format_entries_markdown(title: &str, entries: &[Entry]) -> String {
    let mut md = format!("# {} ({})\n\n", title, entries.len());
    if entries.is_empty() {
        md.push_str("_Nothing here._\n");
    }
    for entry in entries {
        md.push_str(&format_entry_short(entry));
    }
    md
}

pub fn format_groups_markdown(title: &str, groups: &TypeGroups) -> String {
    let mut md = format!("# {}\n\n", title);
    for (heading, rows) in [
        ("Tasks", &groups.tasks),
        ("Events", &groups.events),
        ("Notes", &groups.notes),
    ] {
        if rows.is_empty() {
            continue;
        }
        md.push_str(&format!("## {}\n\n", heading));
        for entry in rows {
            md.push_str(&format_entry_short(entry));
        }
        md.push('\n');
    }
    md
}

pub fn format_catchup_markdown(date: chrono::NaiveDate, items: &[CatchUpItem], progress: &Progress) -> String {
    let mut md = format!("# Catch-up for {}\n\n", date);
    if items.is_empty() {
        md.push_str("All caught up.\n");
        return md;
    }
    md.push_str(&format!(
        "Progress: {}/{} ({}%)\n\n",
        progress.processed, progress.total, progress.percent
    ));
    for item in items {
        let warning = if item.lurker { " ⚠ lurker" } else { "" };
        md.push_str(&format!(
            "- {} ({} days ago, migrated {}x){} `{}`\n",
            item.task.content, item.days_since, item.task.migration_count, warning, item.task.id
        ));
    }
    md
}

pub fn format_wizard_markdown(
    month: Month,
    candidates: &[Entry],
    suggested: &BTreeSet<String>,
    stats: &WizardStats,
) -> String {
    let mut md = format!("# Migration wizard for {}\n\n", month);
    md.push_str(&format!(
        "- **total**: {}\n- **never migrated**: {}\n- **migrated once**: {}\n- **migrated 2+**: {}\n- **high priority**: {}\n\n",
        stats.total,
        stats.never_migrated,
        stats.migrated_once,
        stats.migrated_multiple,
        stats.high_priority
    ));
    for task in candidates {
        let mark = if suggested.contains(&task.id) { "[suggested] " } else { "" };
        md.push_str(&format!("{}{}", mark, format_entry_short(task)));
    }
    md
}

pub fn format_history_markdown(task_id: &str, records: &[MigrationRecord]) -> String {
    let mut md = format!("# History for `{}`\n\n", task_id);
    if records.is_empty() {
        md.push_str("_No migrations recorded._\n");
    }
    for record in records {
        md.push_str(&format_record_short(record));
    }
    md
}

fn format_record_short(record: &MigrationRecord) -> String {
    match record.migrated_to_date {
        Some(to) => format!(
            "- {} {} -> {} `{}`\n",
            record.migration_type, record.original_date, to, record.task_id
        ),
        None => format!(
            "- {} on {} `{}`\n",
            record.migration_type, record.original_date, record.task_id
        ),
    }
}

pub fn format_stats_markdown(stats: &MigrationStats) -> String {
    format!(
        "# Migration stats\n\n- **total**: {}\n- **migrated**: {}\n- **scheduled**: {}\n- **cancelled**: {}\n",
        stats.total_migrations, stats.migrated, stats.scheduled, stats.cancelled
    )
}

pub fn format_lineage_markdown(lineage: &Lineage) -> String {
    let mut md = format!("# Lineage `{}`\n\n", lineage.lineage_id);
    for row in &lineage.rows {
        md.push_str(&format!(
            "- {} {} [{}] `{}`\n",
            row.date, row.content, row.state, row.id
        ));
    }
    if !lineage.records.is_empty() {
        md.push_str("\n## Ledger\n\n");
        for record in &lineage.records {
            md.push_str(&format_record_short(record));
        }
    }
    md
}

pub fn format_bulk_markdown(outcome: &BulkOutcome) -> String {
    let mut md = format!(
        "{} succeeded, {} failed\n",
        outcome.succeeded.len(),
        outcome.failed.len()
    );
    for failure in &outcome.failed {
        md.push_str(&format!("- `{}`: {}\n", failure.task_id, failure.error.message));
    }
    md
}

pub fn format_repair_markdown(findings: &[Finding], report: Option<&RepairReport>) -> String {
    let mut md = format!("# Repair ({} findings)\n\n", findings.len());
    for finding in findings {
        let what = match finding {
            Finding::MissingLedger { .. } => "missing ledger record",
            Finding::MissingSuccessor { .. } => "missing successor row",
        };
        md.push_str(&format!("- {} for `{}`\n", what, finding.task().id));
    }
    if let Some(report) = report {
        md.push_str(&format!(
            "\nSpawned {} rows, appended {} ledger records.\n",
            report.spawned.len(),
            report.records.len()
        ));
    }
    md
}
