//! The single user session
//!
//! Holds the uploaded photo, the run status (with its generated image or
//! error), and the preview target. All mutation happens under one lock and
//! every change is published as a fresh [`SessionSnapshot`] on a watch
//! channel, so readers never see a half-applied update.
//!
//! Runs write through a [`RunTicket`]. A new upload supersedes the active
//! run without cancelling it; when the superseded run finishes its ticket no
//! longer matches and its result is dropped.

mod preview;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ErrorInfo, SessionError};
use crate::images::ImageData;
use crate::ingest::IngestError;

/// Observable stage of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Analyzing,
    Generating,
    Succeeded,
    Failed,
}

impl Phase {
    /// Progress text shown while a run is underway
    pub fn loading_message(&self) -> Option<&'static str> {
        match self {
            Phase::Analyzing => Some("Analyzing image..."),
            Phase::Generating => Some("Generating transformation..."),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Analyzing | Phase::Generating)
    }
}

/// Which image the enlarged view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewTarget {
    Uploaded,
    Generated,
}

impl PreviewTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewTarget::Uploaded => "uploaded",
            PreviewTarget::Generated => "generated",
        }
    }
}

/// The current uploaded photo
#[derive(Debug, Clone)]
pub struct Upload {
    pub id: Uuid,
    pub image: Arc<ImageData>,
    pub uploaded_at: DateTime<Utc>,
}

/// Run status; terminal variants own their outcome
#[derive(Debug, Clone)]
pub enum Status {
    Idle,
    Analyzing,
    Generating,
    Succeeded {
        run_id: Uuid,
        image: Arc<ImageData>,
    },
    Failed(ErrorInfo),
}

impl Status {
    pub fn phase(&self) -> Phase {
        match self {
            Status::Idle => Phase::Idle,
            Status::Analyzing => Phase::Analyzing,
            Status::Generating => Phase::Generating,
            Status::Succeeded { .. } => Phase::Succeeded,
            Status::Failed(_) => Phase::Failed,
        }
    }
}

/// Identity a run writes under
#[derive(Debug, Clone)]
pub struct RunTicket {
    pub run_id: Uuid,
    /// Upload the run was started for, if any
    pub upload_id: Option<Uuid>,
    /// Image handed to the pipeline
    pub image: Option<Arc<ImageData>>,
}

/// Consistent view of the whole session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Incremented on every published change
    pub revision: u64,
    pub upload: Option<Upload>,
    pub status: Status,
    pub preview: Option<PreviewTarget>,
    pub active_run: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn new() -> Self {
        Self {
            revision: 0,
            upload: None,
            status: Status::Idle,
            preview: None,
            active_run: None,
            updated_at: Utc::now(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.status.phase()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match &self.status {
            Status::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn uploaded_image(&self) -> Option<&Arc<ImageData>> {
        self.upload.as_ref().map(|u| &u.image)
    }

    pub fn generated_image(&self) -> Option<&Arc<ImageData>> {
        match &self.status {
            Status::Succeeded { image, .. } => Some(image),
            _ => None,
        }
    }

    /// Run that produced the generated image
    pub fn generated_by(&self) -> Option<Uuid> {
        match &self.status {
            Status::Succeeded { run_id, .. } => Some(*run_id),
            _ => None,
        }
    }

    /// Image behind a preview target
    pub fn image_for(&self, target: PreviewTarget) -> Option<&Arc<ImageData>> {
        match target {
            PreviewTarget::Uploaded => self.uploaded_image(),
            PreviewTarget::Generated => self.generated_image(),
        }
    }

    /// Whether `ticket` still owns the session
    fn owns(&self, ticket: &RunTicket) -> bool {
        self.active_run == Some(ticket.run_id)
            && self.upload.as_ref().map(|u| u.id) == ticket.upload_id
    }

    /// Drop a preview whose image is gone
    fn settle_preview(&mut self) {
        if let Some(target) = self.preview {
            if self.image_for(target).is_none() {
                debug!("Closing {} preview, image no longer present", target.as_str());
                self.preview = None;
            }
        }
    }
}

/// Shared session state
pub struct Session {
    state: Mutex<SessionSnapshot>,
    tx: watch::Sender<SessionSnapshot>,
}

impl Session {
    pub fn new() -> Self {
        let initial = SessionSnapshot::new();
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(initial),
            tx,
        }
    }

    /// Create a shared instance
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Current state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().clone()
    }

    /// Receive every published state
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Apply `f` atomically; publish if it reports a change
    fn update<R>(&self, f: impl FnOnce(&mut SessionSnapshot) -> (R, bool)) -> R {
        let mut state = self.state.lock();
        let (result, changed) = f(&mut *state);
        if changed {
            state.settle_preview();
            state.revision += 1;
            state.updated_at = Utc::now();
            self.tx.send_replace(state.clone());
        }
        result
    }

    /// Store a new upload from a data URI
    ///
    /// A valid image replaces the previous upload, clears any generated
    /// image or error, closes the preview, resets to idle and supersedes
    /// an active run. A URI that does not parse, or does not carry an
    /// image, is recorded as a failure and evicts the previous upload.
    pub fn upload(&self, data_uri: &str) -> Result<Uuid, ErrorInfo> {
        let parsed = ImageData::from_data_uri(data_uri).and_then(|image| {
            if image.is_image() {
                Ok(image)
            } else {
                Err(ErrorInfo::not_an_image())
            }
        });

        match parsed {
            Ok(image) => Ok(self.store_upload(image)),
            Err(err) => {
                self.record_rejection(err.clone(), true);
                Err(err)
            }
        }
    }

    /// Store an already decoded image
    pub fn store_upload(&self, image: ImageData) -> Uuid {
        let id = Uuid::new_v4();
        self.update(|state| {
            if let Some(run_id) = state.active_run.take() {
                info!("Upload {} supersedes in-flight run {}", id, run_id);
            }
            info!(
                "Stored upload {} ({}, {} bytes)",
                id,
                image.mime_type,
                image.len()
            );
            // The enlarged image belonged to the replaced upload
            if let Some(target) = state.preview.take() {
                debug!("Closing {} preview for new upload", target.as_str());
            }
            state.upload = Some(Upload {
                id,
                image: Arc::new(image),
                uploaded_at: Utc::now(),
            });
            state.status = Status::Idle;
            (id, true)
        })
    }

    /// Record a failed ingestion
    pub fn reject_upload(&self, err: &IngestError) -> ErrorInfo {
        let info = err.to_error_info();
        self.record_rejection(info.clone(), err.clears_upload());
        info
    }

    fn record_rejection(&self, err: ErrorInfo, clear_upload: bool) {
        self.update(|state| {
            if !clear_upload && state.active_run.is_some() {
                debug!("Ignoring empty selection during active run");
                return ((), false);
            }
            warn!("Upload rejected: {}", err);
            if clear_upload {
                state.upload = None;
                state.active_run = None;
            }
            state.status = Status::Failed(err);
            ((), true)
        })
    }

    /// Claim the session for a new run
    ///
    /// The previous generated image and error are cleared in the same
    /// update that claims the session.
    pub fn begin_run(&self) -> Result<RunTicket, SessionError> {
        self.update(|state| {
            if state.active_run.is_some() {
                return (Err(SessionError::RunInProgress), false);
            }
            let ticket = RunTicket {
                run_id: Uuid::new_v4(),
                upload_id: state.upload.as_ref().map(|u| u.id),
                image: state.upload.as_ref().map(|u| u.image.clone()),
            };
            // A new run starts clean; the previous outcome is dropped
            state.status = Status::Idle;
            state.active_run = Some(ticket.run_id);
            (Ok(ticket), true)
        })
    }

    /// Move an owned run to `Analyzing` or `Generating`
    ///
    /// Returns false when the ticket is stale or the transition is out of
    /// order; nothing changes in either case.
    pub fn advance(&self, ticket: &RunTicket, phase: Phase) -> bool {
        self.update(|state| {
            if !state.owns(ticket) {
                debug!("Run {} is stale, ignoring {:?}", ticket.run_id, phase);
                return (false, false);
            }
            let next = match (phase, state.phase()) {
                (Phase::Analyzing, current) if !current.is_loading() => Status::Analyzing,
                (Phase::Generating, Phase::Analyzing) => Status::Generating,
                (requested, current) => {
                    warn!(
                        "Run {} cannot move from {:?} to {:?}",
                        ticket.run_id, current, requested
                    );
                    return (false, false);
                }
            };
            state.status = next;
            (true, true)
        })
    }

    /// Record the outcome of an owned run and release the session
    ///
    /// Returns false when the run was superseded; its result is discarded.
    pub fn complete(&self, ticket: &RunTicket, result: Result<Arc<ImageData>, ErrorInfo>) -> bool {
        self.update(|state| {
            if !state.owns(ticket) {
                info!("Discarding result of superseded run {}", ticket.run_id);
                return (false, false);
            }
            state.status = match result {
                Ok(image) => Status::Succeeded {
                    run_id: ticket.run_id,
                    image,
                },
                Err(err) => Status::Failed(err),
            };
            state.active_run = None;
            (true, true)
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
