//! Session endpoints: upload, generate, preview

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{AppState, ErrorResponse, SessionView};
use crate::error::{ErrorInfo, SessionError};
use crate::ingest::IngestError;
use crate::session::PreviewTarget;

/// Build the session router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/upload", post(upload))
        .route("/generate", post(generate))
        .route("/preview", put(open_preview).delete(close_preview))
        .route("/escape", post(escape))
}

/// Upload request; the browser reads the file into a data URI
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub data_uri: Option<String>,
}

/// Upload rejection
#[derive(Debug, Serialize)]
pub struct UploadRejected {
    pub error: ErrorInfo,
    pub session: SessionView,
}

/// Generation accepted
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub run_id: Uuid,
}

/// Preview request
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub target: PreviewTarget,
}

/// Current session
async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    Json(SessionView::from(&state.session.snapshot()))
}

/// Replace the uploaded photo
async fn upload(State(state): State<AppState>, Json(req): Json<UploadRequest>) -> impl IntoResponse {
    let result = match req.data_uri.as_deref().map(str::trim) {
        Some(uri) if !uri.is_empty() => state.session.upload(uri).map(|_| ()),
        _ => Err(state.session.reject_upload(&IngestError::NoFile)),
    };

    let session = SessionView::from(&state.session.snapshot());
    match result {
        Ok(()) => (StatusCode::OK, Json(session)).into_response(),
        Err(error) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(UploadRejected { error, session }),
        )
            .into_response(),
    }
}

/// Start a run for the current upload
async fn generate(State(state): State<AppState>) -> impl IntoResponse {
    match state.generator.spawn() {
        Ok(run_id) => {
            info!("Accepted run {}", run_id);
            (StatusCode::ACCEPTED, Json(GenerateResponse { run_id })).into_response()
        }
        Err(e) => session_error(e),
    }
}

/// Enlarge an image
async fn open_preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> impl IntoResponse {
    match state.session.open_preview(req.target) {
        Ok(_) => (
            StatusCode::OK,
            Json(SessionView::from(&state.session.snapshot())),
        )
            .into_response(),
        Err(e) => session_error(e),
    }
}

/// Close button or background click
async fn close_preview(State(state): State<AppState>) -> impl IntoResponse {
    state.session.close_preview();
    Json(SessionView::from(&state.session.snapshot()))
}

/// Escape key
async fn escape(State(state): State<AppState>) -> impl IntoResponse {
    state.session.escape();
    Json(SessionView::from(&state.session.snapshot()))
}

fn session_error(e: SessionError) -> axum::response::Response {
    let status = match e {
        SessionError::RunInProgress | SessionError::PreviewUnavailable(_) => StatusCode::CONFLICT,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}
