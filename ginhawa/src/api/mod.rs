//! HTTP API module - REST endpoints and WebSocket

mod images;
mod session;
mod websocket;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::error::ErrorInfo;
use crate::images::ImageData;
use crate::pipeline::Generator;
use crate::session::{Phase, PreviewTarget, Session, SessionSnapshot};
pub use websocket::{ClientMessage, ServerMessage};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    pub generator: Generator,
    /// Request body limit for the session endpoints
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(generator: Generator, max_upload_bytes: usize) -> Self {
        Self {
            session: generator.session().clone(),
            generator,
            max_upload_bytes,
        }
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/ws", get(websocket::ws_handler))
        .merge(session::router().layer(DefaultBodyLimit::max(state.max_upload_bytes)))
        .nest("/images", images::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Summary of the current upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadView {
    pub id: Uuid,
    pub mime_type: String,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// Where to fetch one of the session's images
///
/// The bytes are served by `/images/{slot}`; the `v` tag changes whenever
/// the image behind the slot does.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRef {
    pub url: String,
    pub mime_type: String,
    pub size_bytes: usize,
}

impl ImageRef {
    fn new(slot: PreviewTarget, tag: Uuid, image: &ImageData) -> Self {
        Self {
            url: format!("/images/{}?v={}", slot.as_str(), tag),
            mime_type: image.mime_type.clone(),
            size_bytes: image.len(),
        }
    }
}

/// Session as rendered for clients
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub revision: u64,
    pub phase: Phase,
    pub is_loading: bool,
    pub loading_message: Option<&'static str>,
    pub upload: Option<UploadView>,
    pub uploaded_image: Option<ImageRef>,
    pub generated_image: Option<ImageRef>,
    pub error: Option<ErrorInfo>,
    pub preview: Option<PreviewTarget>,
    pub active_run: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SessionSnapshot> for SessionView {
    fn from(snapshot: &SessionSnapshot) -> Self {
        let phase = snapshot.phase();
        Self {
            revision: snapshot.revision,
            phase,
            is_loading: phase.is_loading(),
            loading_message: phase.loading_message(),
            upload: snapshot.upload.as_ref().map(|u| UploadView {
                id: u.id,
                mime_type: u.image.mime_type.clone(),
                size_bytes: u.image.len(),
                uploaded_at: u.uploaded_at,
            }),
            uploaded_image: snapshot
                .upload
                .as_ref()
                .map(|u| ImageRef::new(PreviewTarget::Uploaded, u.id, &u.image)),
            generated_image: snapshot
                .generated_by()
                .zip(snapshot.generated_image())
                .map(|(run_id, image)| ImageRef::new(PreviewTarget::Generated, run_id, image)),
            error: snapshot.error().cloned(),
            preview: snapshot.preview,
            active_run: snapshot.active_run,
            updated_at: snapshot.updated_at,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "ginhawa",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            phase: state.session.snapshot().phase(),
        }),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    phase: Phase,
}
