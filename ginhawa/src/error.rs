//! Error taxonomy for generation runs
//!
//! Every failure a run can end in is reduced to an [`ErrorInfo`]: a kind the
//! client can branch on plus the message shown to the user.

use serde::Serialize;
use thiserror::Error;

/// Classified failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No file, non-image MIME type, malformed data URI, nothing uploaded
    InvalidInput,
    /// Credential absent or left at the placeholder value
    MissingCredential,
    /// The remote service rejected the credential
    AuthFailure,
    /// The vision model call failed
    AnalysisFailure,
    /// The image model call failed
    SynthesisFailure,
    /// The image model answered without usable image bytes
    EmptyResult,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Stable identifier used in logs and API payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::MissingCredential => "missing_credential",
            ErrorKind::AuthFailure => "auth_failure",
            ErrorKind::AnalysisFailure => "analysis_failure",
            ErrorKind::SynthesisFailure => "synthesis_failure",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// A classified error with a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    /// Build an error, substituting a generic message for an empty one
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "An unknown error occurred.".to_string()
        } else {
            message
        };
        Self { kind, message }
    }

    pub fn no_upload() -> Self {
        Self::new(ErrorKind::InvalidInput, "Please upload an image first.")
    }

    pub fn not_an_image() -> Self {
        Self::new(
            ErrorKind::InvalidInput,
            "The selected file is not an image. Please upload a valid image file (JPEG, PNG, etc.).",
        )
    }

    pub fn malformed_image() -> Self {
        Self::new(
            ErrorKind::InvalidInput,
            "Invalid image format. Please upload a valid image file.",
        )
    }

    pub fn missing_credential() -> Self {
        Self::new(
            ErrorKind::MissingCredential,
            "API key is missing or invalid. Please set a valid API key in your environment.",
        )
    }

    pub fn auth_failure() -> Self {
        Self::new(
            ErrorKind::AuthFailure,
            "API key is invalid or unauthorized. Please check your API key and try again.",
        )
    }

    pub fn analysis_failure() -> Self {
        Self::new(
            ErrorKind::AnalysisFailure,
            "Failed to analyze the image. Please try again later.",
        )
    }

    pub fn synthesis_failure() -> Self {
        Self::new(
            ErrorKind::SynthesisFailure,
            "Failed to generate the image. Please try again later.",
        )
    }

    pub fn empty_result() -> Self {
        Self::new(
            ErrorKind::EmptyResult,
            "No image was generated. Please try again with a different photo.",
        )
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

/// Errors raised by a remote model call
#[derive(Debug, Error)]
pub enum StageError {
    /// The service answered with a non-success status
    #[error("API error {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body could not be understood
    #[error("failed to parse response: {0}")]
    Malformed(String),

    /// Adapter-internal failure outside the request itself
    #[error("{0}")]
    Unexpected(String),
}

impl StageError {
    /// Whether this failure means the credential was refused
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            StageError::Rejected { status, message } => {
                *status == 401 || *status == 403 || mentions_api_key(message)
            }
            StageError::Transport(message)
            | StageError::Malformed(message)
            | StageError::Unexpected(message) => mentions_api_key(message),
        }
    }
}

impl From<reqwest::Error> for StageError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StageError::Malformed(e.to_string())
        } else if e.is_builder() {
            StageError::Unexpected(e.to_string())
        } else {
            StageError::Transport(e.to_string())
        }
    }
}

fn mentions_api_key(message: &str) -> bool {
    message.to_lowercase().contains("api key")
}

/// Errors from misusing the session outside a run's own failure modes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a generation run is already in progress")]
    RunInProgress,

    #[error("no {0} image to preview")]
    PreviewUnavailable(&'static str),
}
