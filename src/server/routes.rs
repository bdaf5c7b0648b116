//! Request handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{ApiError, ApiResult, AppState};
use crate::catchup::{CatchUpItem, CatchUpSession, Decision, Progress};
use crate::engine::BulkOutcome;
use crate::error::JournalError;
use crate::ledger::Lineage;
use crate::repair::{self, Finding, RepairReport};
use crate::types::{Entry, EntryFilter, EntryPatch, MigrationRecord, MigrationStats, NewEntry};
use crate::views::{self, LogFilter, MonthSummary, TypeGroups};
use crate::wizard::{MigrationWizard, Month, WizardAction, WizardStats, WizardStep};

// Entries

pub async fn list_entries(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<EntryFilter>,
) -> ApiResult<Vec<Entry>> {
    Ok(Json(state.engine(&headers).entries(&filter).await?))
}

pub async fn create_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(entry): Json<NewEntry>,
) -> Result<(StatusCode, Json<Entry>), ApiError> {
    let created = state.engine(&headers).add_entry(entry).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Entry> {
    Ok(Json(state.engine(&headers).get_entry(&id).await?))
}

pub async fn patch_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<EntryPatch>,
) -> ApiResult<Entry> {
    Ok(Json(state.engine(&headers).patch_entry(&id, patch).await?))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.engine(&headers).delete_entry(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Task transitions

/// Optional body for migrate, schedule and cancel. `original_date` defaults
/// to the row's own date.
#[derive(Debug, Default, Deserialize)]
pub struct MoveRequest {
    #[serde(default)]
    pub original_date: Option<NaiveDate>,
    /// Required for schedule. Migrate without a target moves to the next day.
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
}

pub async fn migrate_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<MoveRequest>>,
) -> ApiResult<Entry> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let engine = state.engine(&headers);
    let spawned = match req.target_date {
        None => engine.migrate_to_next_day(&id).await?,
        Some(target) => {
            let original = match req.original_date {
                Some(date) => date,
                None => engine.get_entry(&id).await?.date,
            };
            engine.migrate(&id, original, target).await?
        }
    };
    Ok(Json(spawned))
}

pub async fn schedule_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<MoveRequest>>,
) -> ApiResult<Entry> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let engine = state.engine(&headers);
    let target = req
        .target_date
        .ok_or_else(|| JournalError::invalid_field("target_date", "required for schedule"))?;
    let original = match req.original_date {
        Some(date) => date,
        None => engine.get_entry(&id).await?.date,
    };
    Ok(Json(engine.schedule(&id, original, target).await?))
}

pub async fn cancel_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<MoveRequest>>,
) -> ApiResult<Entry> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let engine = state.engine(&headers);
    let original = match req.original_date {
        Some(date) => date,
        None => engine.get_entry(&id).await?.date,
    };
    engine.cancel(&id, original).await?;
    Ok(Json(engine.get_entry(&id).await?))
}

/// Toggles between complete and incomplete.
pub async fn toggle_complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Entry> {
    Ok(Json(state.engine(&headers).toggle_complete(&id).await?))
}

pub async fn reactivate_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Entry> {
    Ok(Json(state.engine(&headers).reactivate(&id).await?))
}

// Views

#[derive(Debug, Default, Deserialize)]
pub struct DailyQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DailyView {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub groups: TypeGroups,
}

pub async fn daily_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DailyQuery>,
) -> ApiResult<DailyView> {
    let engine = state.engine(&headers);
    let date = query.date.unwrap_or_else(|| engine.today());
    let filter = EntryFilter {
        from: Some(date),
        to: Some(date),
        ..Default::default()
    };
    let rows = views::daily(date, &engine.entries(&filter).await?);
    let log_filter = LogFilter {
        search: query.search,
        ..Default::default()
    };
    Ok(Json(DailyView {
        date,
        groups: views::group_by_type(&log_filter.apply(&rows)),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    /// `YYYY-MM`; defaults to the current month.
    #[serde(default)]
    pub month: Option<String>,
}

fn month_or_current(raw: Option<&str>, today: NaiveDate) -> Result<Month, JournalError> {
    match raw {
        Some(s) => s.parse(),
        None => Ok(Month::of(today)),
    }
}

pub async fn monthly_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Vec<Entry>> {
    let engine = state.engine(&headers);
    let month = month_or_current(query.month.as_deref(), engine.today())?;
    let filter = EntryFilter {
        from: Some(month.first_day()),
        to: Some(month.last_day()),
        ..Default::default()
    };
    Ok(Json(views::monthly(month, &engine.entries(&filter).await?)))
}

#[derive(Debug, Default, Deserialize)]
pub struct YearQuery {
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct FutureView {
    pub year: i32,
    pub months: Vec<MonthSummary>,
    pub entries: Vec<Entry>,
}

pub async fn future_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<YearQuery>,
) -> ApiResult<FutureView> {
    let engine = state.engine(&headers);
    let year = query.year.unwrap_or_else(|| engine.today().year());
    let january = Month::new(year, 1)?;
    let december = Month::new(year, 12)?;
    let filter = EntryFilter {
        from: Some(january.first_day()),
        to: Some(december.last_day()),
        ..Default::default()
    };
    let rows = engine.entries(&filter).await?;
    Ok(Json(FutureView {
        year,
        months: views::future_months(year, &rows),
        entries: views::future(year, &rows),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct PendingQuery {
    #[serde(default)]
    pub before: Option<NaiveDate>,
}

pub async fn pending(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Vec<Entry>> {
    let engine = state.engine(&headers);
    let before = query.before.unwrap_or_else(|| engine.today());
    Ok(Json(engine.get_pending_migrations(before).await?))
}

// Catch-up

#[derive(Debug, Serialize)]
pub struct CatchUpView {
    pub viewed_date: NaiveDate,
    pub current: Option<CatchUpItem>,
    pub remaining: Vec<CatchUpItem>,
    pub progress: Progress,
    pub finished: bool,
}

impl From<&CatchUpSession> for CatchUpView {
    fn from(session: &CatchUpSession) -> Self {
        Self {
            viewed_date: session.viewed_date(),
            current: session.current(),
            remaining: session.remaining(),
            progress: session.progress(),
            finished: session.is_finished(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CatchUpStart {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

pub async fn catch_up_start(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CatchUpStart>>,
) -> ApiResult<CatchUpView> {
    let engine = state.engine(&headers);
    let user_id = engine.user_id()?.to_string();
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let date = req.date.unwrap_or_else(|| engine.today());
    let session =
        CatchUpSession::begin(&engine, date, state.config.journal.lurker_threshold).await?;
    let view = CatchUpView::from(&session);
    state.catch_up.lock().await.insert(user_id, session);
    Ok(Json(view))
}

fn no_session(kind: &str) -> ApiError {
    ApiError(JournalError::NotFound(format!("no active {} session", kind)))
}

pub async fn catch_up_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<CatchUpView> {
    let engine = state.engine(&headers);
    let user_id = engine.user_id()?;
    let guard = state.catch_up.lock().await;
    let session = guard.get(user_id).ok_or_else(|| no_session("catch-up"))?;
    Ok(Json(CatchUpView::from(session)))
}

/// `decision` takes `migrate`, `keep`, `cancel` or a `YYYY-MM-DD` date.
/// Without `task_id` the current task is decided.
#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    #[serde(default)]
    pub task_id: Option<String>,
    pub decision: String,
}

#[derive(Debug, Serialize)]
pub struct DecideResponse {
    pub spawned: Option<Entry>,
    #[serde(flatten)]
    pub session: CatchUpView,
}

pub async fn catch_up_decide(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DecideRequest>,
) -> ApiResult<DecideResponse> {
    let engine = state.engine(&headers);
    let user_id = engine.user_id()?;
    let decision = Decision::parse(&req.decision).ok_or_else(|| {
        JournalError::invalid_field("decision", format!("unrecognised {:?}", req.decision))
    })?;

    let mut guard = state.catch_up.lock().await;
    let session = guard.get_mut(user_id).ok_or_else(|| no_session("catch-up"))?;
    let spawned = match req.task_id {
        Some(ref task_id) => session.decide_for(&engine, task_id, decision).await?,
        None => session.decide(&engine, decision).await?,
    };
    Ok(Json(DecideResponse {
        spawned,
        session: CatchUpView::from(&*session),
    }))
}

// Wizard

#[derive(Debug, Serialize)]
pub struct WizardView {
    pub month: String,
    pub step: WizardStep,
    pub candidates: Vec<Entry>,
    pub selected: BTreeSet<String>,
    pub suggestions: BTreeSet<String>,
    pub stats: WizardStats,
}

impl From<&MigrationWizard> for WizardView {
    fn from(wizard: &MigrationWizard) -> Self {
        Self {
            month: wizard.month().to_string(),
            step: wizard.step(),
            candidates: wizard.candidates().to_vec(),
            selected: wizard.selected().clone(),
            suggestions: wizard.suggestions(),
            stats: wizard.stats(),
        }
    }
}

pub async fn wizard_open(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(query): Json<MonthQuery>,
) -> ApiResult<WizardView> {
    let engine = state.engine(&headers);
    let user_id = engine.user_id()?.to_string();
    let month = month_or_current(query.month.as_deref(), engine.today())?;
    let wizard =
        MigrationWizard::open(&engine, month, state.config.journal.suggestion_threshold).await?;
    let view = WizardView::from(&wizard);
    state.wizard.lock().await.insert(user_id, wizard);
    Ok(Json(view))
}

pub async fn wizard_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<WizardView> {
    let engine = state.engine(&headers);
    let user_id = engine.user_id()?;
    let guard = state.wizard.lock().await;
    let wizard = guard.get(user_id).ok_or_else(|| no_session("wizard"))?;
    Ok(Json(WizardView::from(wizard)))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Selection {
    Toggle { id: String },
    Set { ids: Vec<String> },
    All,
    Clear,
    Suggested,
    Preview,
    Back,
}

pub async fn wizard_select(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(selection): Json<Selection>,
) -> ApiResult<WizardView> {
    let engine = state.engine(&headers);
    let user_id = engine.user_id()?;
    let mut guard = state.wizard.lock().await;
    let wizard = guard.get_mut(user_id).ok_or_else(|| no_session("wizard"))?;
    match selection {
        Selection::Toggle { id } => wizard.toggle(&id)?,
        Selection::Set { ids } => wizard.set_selection(ids)?,
        Selection::All => wizard.select_all(),
        Selection::Clear => wizard.deselect_all(),
        Selection::Suggested => wizard.apply_suggestions(),
        Selection::Preview => wizard.preview()?,
        Selection::Back => wizard.back(),
    }
    Ok(Json(WizardView::from(&*wizard)))
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub action: WizardAction,
}

pub async fn wizard_apply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ApplyRequest>,
) -> ApiResult<BulkOutcome> {
    let engine = state.engine(&headers);
    let user_id = engine.user_id()?;
    let mut guard = state.wizard.lock().await;
    let wizard = guard.get_mut(user_id).ok_or_else(|| no_session("wizard"))?;
    Ok(Json(wizard.apply(&engine, req.action).await?))
}

// Ledger

pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> ApiResult<Vec<MigrationRecord>> {
    Ok(Json(state.engine(&headers).history(&task_id).await?))
}

pub async fn stats(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<MigrationStats> {
    Ok(Json(state.engine(&headers).stats().await?))
}

pub async fn lineage(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(lineage_id): Path<String>,
) -> ApiResult<Lineage> {
    Ok(Json(state.engine(&headers).lineage(&lineage_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RepairRequest {
    /// Scan only when false.
    #[serde(default)]
    pub apply: bool,
}

#[derive(Debug, Serialize)]
pub struct RepairResponse {
    pub findings: Vec<Finding>,
    pub report: Option<RepairReport>,
}

pub async fn repair(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RepairRequest>>,
) -> ApiResult<RepairResponse> {
    let engine = state.engine(&headers);
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let user_id = engine.user_id()?;
    let findings = repair::scan(&**engine.store(), user_id).await?;
    let report = if req.apply && !findings.is_empty() {
        Some(repair::apply(&**engine.store(), user_id, &findings, engine.today()).await?)
    } else {
        None
    };
    Ok(Json(RepairResponse { findings, report }))
}
