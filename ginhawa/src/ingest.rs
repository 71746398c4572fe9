//! File ingestion
//!
//! Turns a user-selected file into the data URI the rest of the system
//! consumes. The format is sniffed from the file contents, with the file
//! extension as a fallback for formats without a recognizable signature.

use std::path::Path;

use image::ImageFormat;
use thiserror::Error;
use tracing::debug;

use crate::error::{ErrorInfo, ErrorKind};
use crate::images::{is_image_mime, ImageData};

/// Ingestion failures
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no file selected")]
    NoFile,

    #[error("not an image: {0}")]
    NotAnImage(String),

    #[error("failed to read file: {0}")]
    ReadFailure(#[from] std::io::Error),
}

impl IngestError {
    /// Whether the rejected file should also evict the current upload
    pub fn clears_upload(&self) -> bool {
        !matches!(self, IngestError::NoFile)
    }

    /// User-facing classification
    pub fn to_error_info(&self) -> ErrorInfo {
        match self {
            IngestError::NoFile => ErrorInfo::new(
                ErrorKind::InvalidInput,
                "No file selected. Please choose an image file.",
            ),
            IngestError::NotAnImage(_) => ErrorInfo::not_an_image(),
            IngestError::ReadFailure(_) => ErrorInfo::new(
                ErrorKind::InvalidInput,
                "Failed to read the file. Please try again with a different image.",
            ),
        }
    }
}

/// Detect the MIME type of raw file contents
pub fn sniff_mime_type(bytes: &[u8], path: Option<&Path>) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .or_else(|| path.and_then(|p| ImageFormat::from_path(p).ok()))
        .map(|format| format.to_mime_type())
        .filter(|mime| is_image_mime(mime))
}

/// Wrap in-memory file contents as an image
pub fn ingest_bytes(bytes: Vec<u8>, path: Option<&Path>) -> Result<ImageData, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::NoFile);
    }
    let name = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<memory>".to_string());
    let mime_type = sniff_mime_type(&bytes, path).ok_or(IngestError::NotAnImage(name))?;
    Ok(ImageData::new(mime_type, bytes))
}

/// Read a file from disk into a data URI
pub async fn read_as_data_uri(path: &Path) -> Result<String, IngestError> {
    let bytes = tokio::fs::read(path).await?;
    let image = ingest_bytes(bytes, Some(path))?;
    debug!(
        "Ingested {} as {} ({} bytes)",
        path.display(),
        image.mime_type,
        image.len()
    );
    Ok(image.to_data_uri())
}
