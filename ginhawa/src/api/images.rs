//! Image serving endpoint
//!
//! GET /images/{uploaded|generated} - Serve the session's current image

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};

use super::AppState;
use crate::session::PreviewTarget;

/// Build the images router
pub fn router() -> Router<AppState> {
    Router::new().route("/{slot}", get(get_image))
}

/// Serve one of the session's images
async fn get_image(
    Path(slot): Path<PreviewTarget>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let snapshot = state.session.snapshot();
    match snapshot.image_for(slot) {
        Some(image) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, image.mime_type.clone()),
                // Contents change with every upload and run
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            image.bytes.clone(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("No {} image", slot.as_str()),
        )
            .into_response(),
    }
}
