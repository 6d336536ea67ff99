use crate::{
    app::App,
    ingest::{IngestError, IngestOutcome},
    search::{SearchError, SearchOutcome},
    store::MetadataError,
    visit::VisitCapture,
};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    app: Arc<App>,
}

async fn start_app(app: App) {
    let listen_addr = app.config().listen_addr.clone();
    let shared_state = Arc::new(SharedState { app: Arc::new(app) });

    async fn shutdown_signal() {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    let router = Router::new()
        .route("/api/visits/ingest", post(ingest))
        .route("/api/visits/search", post(search))
        .route("/api/visits/backfill", post(backfill))
        .route("/api/health", get(health))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await.unwrap();
    log::info!("listening on {listen_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

pub fn start_daemon(app: App) {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async { start_app(app).await });
}

/// Wraps domain errors with their HTTP status mapping.
#[derive(Debug)]
struct HttpError(StatusCode, String);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<IngestError> for HttpError {
    fn from(err: IngestError) -> Self {
        match &err {
            IngestError::Validation(_) => HttpError(StatusCode::BAD_REQUEST, err.to_string()),
            IngestError::Storage { .. } => {
                log::error!("{err:?}");
                HttpError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

impl From<SearchError> for HttpError {
    fn from(err: SearchError) -> Self {
        match &err {
            SearchError::EmptyQuery => HttpError(StatusCode::BAD_REQUEST, err.to_string()),
            _ => {
                log::error!("{err:?}");
                HttpError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

impl From<MetadataError> for HttpError {
    fn from(err: MetadataError) -> Self {
        log::error!("{err:?}");
        HttpError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

async fn ingest(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<VisitCapture>,
) -> Result<Response, HttpError> {
    log::debug!("ingest: url={} id={:?}", payload.url, payload.id);

    let app = state.app.clone();
    tokio::task::block_in_place(move || {
        let outcome = app.ingest(payload)?;
        let response = match outcome {
            IngestOutcome::Committed { id } => (
                StatusCode::CREATED,
                Json(json!({ "id": id })),
            ),
            IngestOutcome::Duplicate { existing_id } => (
                StatusCode::OK,
                Json(json!({
                    "message": "Exact duplicate; content already logged.",
                    "existingLogId": existing_id,
                })),
            ),
            IngestOutcome::NearDuplicate { distance, .. } => (
                StatusCode::OK,
                Json(json!({
                    "message": format!(
                        "Near-duplicate of the latest visit for this URL (distance {distance}); not logged."
                    ),
                })),
            ),
        };
        Ok(response.into_response())
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    query: String,
    top_k: Option<usize>,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Response, HttpError> {
    log::debug!("search: query={:?} top_k={:?}", payload.query, payload.top_k);

    let app = state.app.clone();
    tokio::task::block_in_place(move || {
        let response = match app.search(&payload.query, payload.top_k)? {
            SearchOutcome::Results(results) => Json(json!({ "results": results })),
            SearchOutcome::NoResults => Json(json!({
                "message": "No results found.",
                "results": [],
            })),
        };
        Ok(response.into_response())
    })
}

async fn backfill(State(state): State<Arc<SharedState>>) -> Result<Response, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || {
        let report = app.backfill()?;
        Ok(Json(report).into_response())
    })
}

async fn health(State(state): State<Arc<SharedState>>) -> Result<Response, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || {
        let total = app.total()?;
        Ok(Json(json!({ "status": "ok", "records": total })).into_response())
    })
}
