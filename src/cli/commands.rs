//! One-shot journal commands.
//!
//! Each command runs against an engine and returns its rendered output, so
//! the binary only has to print it.

use super::{AddArgs, CatchUpArgs, JournalCommand, WizardArgs};
use crate::catchup::CatchUpSession;
use crate::config::JournalConfig;
use crate::engine::MigrationEngine;
use crate::error::{ErrorBody, JournalError, Result};
use crate::format::{self, OutputFormat};
use crate::repair;
use crate::storage::JournalStore;
use crate::types::{EntryFilter, EntryType, EventDetails, NewEntry, Signifier};
use crate::views::{self, LogFilter};
use crate::wizard::{MigrationWizard, Month};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

/// Run `command` and render the result in `output`.
pub async fn execute<S: JournalStore + ?Sized>(
    command: JournalCommand,
    engine: &MigrationEngine<S>,
    journal: &JournalConfig,
    output: OutputFormat,
) -> Result<String> {
    match command {
        JournalCommand::Add(args) => add(engine, args, output).await,
        JournalCommand::Day { date, search } => {
            let date = date.unwrap_or_else(|| engine.today());
            let filter = EntryFilter {
                from: Some(date),
                to: Some(date),
                ..Default::default()
            };
            let rows = views::daily(date, &engine.entries(&filter).await?);
            let rows = LogFilter {
                search,
                ..Default::default()
            }
            .apply(&rows);
            let groups = views::group_by_type(&rows);
            Ok(format::render(output, &groups, || {
                format::format_groups_markdown(&date.format("%A, %B %-d, %Y").to_string(), &groups)
            }))
        }
        JournalCommand::Month { month } => {
            let month = month.unwrap_or_else(|| Month::of(engine.today()));
            let filter = EntryFilter {
                from: Some(month.first_day()),
                to: Some(month.last_day()),
                ..Default::default()
            };
            let rows = views::monthly(month, &engine.entries(&filter).await?);
            Ok(format::render(output, &rows, || {
                format::format_entries_markdown(&format!("Monthly log {}", month), &rows)
            }))
        }
        JournalCommand::Future { year } => {
            let year = year.unwrap_or_else(|| engine.today().year());
            let filter = EntryFilter {
                from: Some(Month::new(year, 1)?.first_day()),
                to: Some(Month::new(year, 12)?.last_day()),
                ..Default::default()
            };
            let rows = views::future(year, &engine.entries(&filter).await?);
            let months = views::future_months(year, &rows);
            let value = json!({ "year": year, "months": months, "entries": rows });
            Ok(format::render(output, &value, || {
                let mut md = format!("# Future log {}\n\n", year);
                for summary in months.iter().filter(|m| m.total > 0) {
                    md.push_str(&format!(
                        "- **{}**: {} tasks, {} events, {} notes\n",
                        summary.month, summary.tasks, summary.events, summary.notes
                    ));
                }
                md.push('\n');
                md.push_str(&format::format_entries_markdown("Entries", &rows));
                md
            }))
        }
        JournalCommand::Pending { before } => {
            let before = before.unwrap_or_else(|| engine.today());
            let rows = engine.get_pending_migrations(before).await?;
            Ok(format::render(output, &rows, || {
                format::format_entries_markdown(&format!("Pending before {}", before), &rows)
            }))
        }
        JournalCommand::CatchUp(args) => catch_up(engine, journal, args, output).await,
        JournalCommand::Migrate { id, to, from } => {
            let spawned = match to {
                None => engine.migrate_to_next_day(&id).await?,
                Some(target) => {
                    let original = original_date(engine, &id, from).await?;
                    engine.migrate(&id, original, target).await?
                }
            };
            Ok(format::render(output, &spawned, || {
                format::format_entry_markdown(&spawned)
            }))
        }
        JournalCommand::Schedule { id, date, from } => {
            let original = original_date(engine, &id, from).await?;
            let spawned = engine.schedule(&id, original, date).await?;
            Ok(format::render(output, &spawned, || {
                format::format_entry_markdown(&spawned)
            }))
        }
        JournalCommand::Cancel { id, from } => {
            let original = original_date(engine, &id, from).await?;
            engine.cancel(&id, original).await?;
            let entry = engine.get_entry(&id).await?;
            Ok(format::render(output, &entry, || {
                format::format_entry_markdown(&entry)
            }))
        }
        JournalCommand::Complete { id } => {
            let entry = engine.toggle_complete(&id).await?;
            Ok(format::render(output, &entry, || {
                format::format_entry_markdown(&entry)
            }))
        }
        JournalCommand::Reactivate { id } => {
            let entry = engine.reactivate(&id).await?;
            Ok(format::render(output, &entry, || {
                format::format_entry_markdown(&entry)
            }))
        }
        JournalCommand::Wizard(args) => wizard(engine, journal, args, output).await,
        JournalCommand::History { task_id } => {
            let records = engine.history(&task_id).await?;
            Ok(format::render(output, &records, || {
                format::format_history_markdown(&task_id, &records)
            }))
        }
        JournalCommand::Stats => {
            let stats = engine.stats().await?;
            Ok(format::render(output, &stats, || {
                format::format_stats_markdown(&stats)
            }))
        }
        JournalCommand::Lineage { lineage_id } => {
            let lineage = engine.lineage(&lineage_id).await?;
            Ok(format::render(output, &lineage, || {
                format::format_lineage_markdown(&lineage)
            }))
        }
        JournalCommand::Repair { apply } => {
            let user_id = engine.user_id()?;
            let findings = repair::scan(&**engine.store(), user_id).await?;
            let report = if apply && !findings.is_empty() {
                Some(repair::apply(&**engine.store(), user_id, &findings, engine.today()).await?)
            } else {
                None
            };
            let value = json!({ "findings": findings, "report": report });
            Ok(format::render(output, &value, || {
                format::format_repair_markdown(&findings, report.as_ref())
            }))
        }
    }
}

async fn original_date<S: JournalStore + ?Sized>(
    engine: &MigrationEngine<S>,
    id: &str,
    given: Option<NaiveDate>,
) -> Result<NaiveDate> {
    match given {
        Some(date) => Ok(date),
        None => Ok(engine.get_entry(id).await?.date),
    }
}

async fn add<S: JournalStore + ?Sized>(
    engine: &MigrationEngine<S>,
    args: AddArgs,
    output: OutputFormat,
) -> Result<String> {
    let date = args.date.unwrap_or_else(|| engine.today());
    let mut signifiers = Vec::new();
    if args.priority {
        signifiers.push(Signifier::Priority);
    }
    if args.inspiration {
        signifiers.push(Signifier::Inspiration);
    }
    if args.explore {
        signifiers.push(Signifier::Explore);
    }

    let mut entry = NewEntry::task(date, args.content).with_signifiers(signifiers);
    if args.event {
        entry.entry_type = EntryType::Event;
        entry.event = Some(EventDetails {
            event_time: args.time,
            is_all_day: args.time.is_none(),
            ..Default::default()
        });
    } else if args.note {
        entry.entry_type = EntryType::Note;
    }

    let created = engine.add_entry(entry).await?;
    Ok(format::render(output, &created, || {
        format::format_entry_markdown(&created)
    }))
}

#[derive(Debug, Serialize)]
struct DecisionFailure {
    task_id: String,
    error: ErrorBody,
}

async fn catch_up<S: JournalStore + ?Sized>(
    engine: &MigrationEngine<S>,
    journal: &JournalConfig,
    args: CatchUpArgs,
    output: OutputFormat,
) -> Result<String> {
    let date = args.date.unwrap_or_else(|| engine.today());
    let mut session = CatchUpSession::begin(engine, date, journal.lurker_threshold).await?;

    let mut applied = Vec::new();
    let mut failed = Vec::new();
    for (task_id, decision) in args.apply {
        match session.decide_for(engine, &task_id, decision).await {
            Ok(_) => applied.push(task_id),
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Catch-up decision failed");
                failed.push(DecisionFailure {
                    task_id,
                    error: e.to_body(),
                });
            }
        }
    }

    let remaining = session.remaining();
    let progress = session.progress();
    let value = json!({
        "viewed_date": date,
        "applied": applied,
        "failed": failed,
        "remaining": remaining,
        "progress": progress,
    });
    Ok(format::render(output, &value, || {
        let mut md = String::new();
        for id in &applied {
            md.push_str(&format!("Applied decision to `{}`\n", id));
        }
        for failure in &failed {
            md.push_str(&format!(
                "Failed `{}`: {}\n",
                failure.task_id, failure.error.message
            ));
        }
        if !md.is_empty() {
            md.push('\n');
        }
        md.push_str(&format::format_catchup_markdown(date, &remaining, &progress));
        md
    }))
}

async fn wizard<S: JournalStore + ?Sized>(
    engine: &MigrationEngine<S>,
    journal: &JournalConfig,
    args: WizardArgs,
    output: OutputFormat,
) -> Result<String> {
    let month = args.month.unwrap_or_else(|| Month::of(engine.today()));
    let mut wizard = MigrationWizard::open(engine, month, journal.suggestion_threshold).await?;

    let Some(action) = args.apply else {
        let suggested = wizard.suggestions();
        let stats = wizard.stats();
        let value = json!({
            "month": month.to_string(),
            "candidates": wizard.candidates(),
            "suggestions": suggested,
            "stats": stats,
        });
        return Ok(format::render(output, &value, || {
            format::format_wizard_markdown(month, wizard.candidates(), &suggested, &stats)
        }));
    };

    if args.suggested {
        wizard.apply_suggestions();
    } else if args.all {
        wizard.select_all();
    } else if !args.ids.is_empty() {
        wizard.set_selection(&args.ids)?;
    } else {
        return Err(JournalError::invalid_field(
            "selection",
            "pass --suggested, --all or --ids",
        ));
    }
    wizard.preview()?;

    let outcome = wizard.apply(engine, action).await?;
    Ok(format::render(output, &outcome, || {
        format::format_bulk_markdown(&outcome)
    }))
}
