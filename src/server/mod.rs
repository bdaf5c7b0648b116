//! HTTP API for the journal UI.
//!
//! JSON endpoints over the migration core. Catch-up and wizard sessions are
//! held in server memory, at most one of each per user.

mod routes;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::catchup::CatchUpSession;
use crate::clock::SharedClock;
use crate::config::Config;
use crate::engine::{MigrationEngine, Session};
use crate::error::{ErrorCode, JournalError};
use crate::storage::JournalStore;
use crate::wizard::MigrationWizard;

/// Request header naming the acting user. Falls back to `journal.user`.
pub const USER_HEADER: &str = "x-bujo-user";

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn JournalStore>,
    config: Arc<Config>,
    clock: SharedClock,
    /// Keyed by user id.
    catch_up: Arc<Mutex<HashMap<String, CatchUpSession>>>,
    wizard: Arc<Mutex<HashMap<String, MigrationWizard>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn JournalStore>, config: Config, clock: SharedClock) -> Self {
        Self {
            store,
            config: Arc::new(config),
            clock,
            catch_up: Arc::new(Mutex::new(HashMap::new())),
            wizard: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn session(&self, headers: &HeaderMap) -> Session {
        let header = headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        match header.or(self.config.journal.user.as_deref()) {
            Some(user) => Session::user(user),
            None => Session::anonymous(),
        }
    }

    /// Engine bound to the request's user.
    fn engine(&self, headers: &HeaderMap) -> MigrationEngine<dyn JournalStore> {
        MigrationEngine::new(
            Arc::clone(&self.store),
            self.session(headers),
            Arc::clone(&self.clock),
        )
        .with_options(self.config.journal.engine_options())
    }
}

/// `JournalError` as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub JournalError);

impl From<JournalError> for ApiError {
    fn from(err: JournalError) -> Self {
        Self(err)
    }
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::NotAuthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::InvalidTransition => StatusCode::CONFLICT,
        ErrorCode::InvalidFieldValue => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::PersistenceFailure | ErrorCode::ConfigError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.0.to_body();
        let status = status_for(body.code);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/entries",
            get(routes::list_entries).post(routes::create_entry),
        )
        .route(
            "/api/entries/{id}",
            get(routes::get_entry)
                .patch(routes::patch_entry)
                .delete(routes::delete_entry),
        )
        .route("/api/tasks/{id}/migrate", post(routes::migrate_task))
        .route("/api/tasks/{id}/schedule", post(routes::schedule_task))
        .route("/api/tasks/{id}/cancel", post(routes::cancel_task))
        .route("/api/tasks/{id}/complete", post(routes::toggle_complete))
        .route("/api/tasks/{id}/reactivate", post(routes::reactivate_task))
        .route("/api/views/daily", get(routes::daily_view))
        .route("/api/views/monthly", get(routes::monthly_view))
        .route("/api/views/future", get(routes::future_view))
        .route("/api/pending", get(routes::pending))
        .route(
            "/api/catch-up",
            get(routes::catch_up_status).post(routes::catch_up_start),
        )
        .route("/api/catch-up/decide", post(routes::catch_up_decide))
        .route(
            "/api/wizard",
            get(routes::wizard_status).post(routes::wizard_open),
        )
        .route("/api/wizard/select", post(routes::wizard_select))
        .route("/api/wizard/apply", post(routes::wizard_apply))
        .route("/api/history/{task_id}", get(routes::history))
        .route("/api/stats", get(routes::stats))
        .route("/api/lineage/{lineage_id}", get(routes::lineage))
        .route("/api/repair", post(routes::repair))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(state: AppState, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Journal API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Journal API stopped");
    Ok(())
}

/// Start the server in the background.
///
/// Returns a sender that triggers graceful shutdown, and the bound address.
pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Journal API listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Journal API shutting down");
            })
            .await
        {
            error!("Journal API error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_statuses() {
        assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorCode::NotAuthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorCode::InvalidTransition), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorCode::InvalidFieldValue),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(ErrorCode::PersistenceFailure),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
