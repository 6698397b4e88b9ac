//! HTTP surface: a single `POST /query` route.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::backend::Connector;
use crate::error::RelayError;
use crate::manager::ConnectionManager;
use crate::policy::StatementPolicy;
use crate::request::sql_from_body;
use crate::results::ResultSet;

/// Request bodies above this many bytes are refused with 413.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Shared handler state.
pub struct AppState<C: Connector> {
    pub db: Arc<ConnectionManager<C>>,
    pub policy: Arc<StatementPolicy>,
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            policy: Arc::clone(&self.policy),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RowsResponse {
    pub rows: ResultSet,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::InvalidRequest | RelayError::PolicyError(_) => StatusCode::BAD_REQUEST,
            RelayError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Build the router. Exposed separately from [`serve`] so it can be driven in-process.
pub fn router<C: Connector>(db: Arc<ConnectionManager<C>>, policy: StatementPolicy) -> Router {
    let state = AppState {
        db,
        policy: Arc::new(policy),
    };
    Router::new()
        .route("/query", post(run_query::<C>))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /query`: validate the body, then forward the SQL verbatim.
async fn run_query<C: Connector>(
    State(state): State<AppState<C>>,
    body: Bytes,
) -> Result<Json<RowsResponse>, RelayError> {
    let sql = sql_from_body(&body).inspect_err(|_| {
        tracing::error!(
            "Received invalid query payload: {}",
            String::from_utf8_lossy(&body)
        );
    })?;
    state.policy.check(&sql).inspect_err(|e| {
        tracing::warn!("Rejected query: {}", e);
    })?;

    if !state.db.is_connected() {
        tracing::error!("No DB connection available to run query");
        return Err(RelayError::NotConnected);
    }

    tracing::info!("Executing query: {}", sql);
    match state.db.query(&sql).await {
        Ok(rows) => {
            tracing::info!("Query returned {} rows", rows.len());
            Ok(Json(RowsResponse { rows }))
        }
        Err(e) => {
            tracing::error!("Query error: {}", e);
            Err(e)
        }
    }
}

/// Bind `0.0.0.0:port` and serve until Ctrl-C or SIGTERM, then close the pool.
///
/// # Errors
/// Returns `RelayError::IoError` if the listener cannot be bound or the server fails.
pub async fn serve<C: Connector>(
    db: Arc<ConnectionManager<C>>,
    policy: StatementPolicy,
    port: u16,
) -> Result<(), RelayError> {
    let app = router(Arc::clone(&db), policy);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://localhost:{}", port);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    db.close().await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutting down");
}
