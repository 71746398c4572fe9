//! Street redesign pipeline
//!
//! Two-step process:
//! 1. The vision model describes the uploaded street photo
//! 2. The image model renders the redesign from that description
//!
//! [`Pipeline`] runs the two calls and classifies failures. [`Generator`]
//! binds a pipeline to the shared [`Session`], so phase changes and the final
//! outcome land in the session under the run's ticket.

mod stages;

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use stages::{
    GeneratedImagePayload, ImageSynthesizer, SceneAnalyzer, SynthesisRequest, SynthesisResponse,
    ASPECT_RATIO, NUMBER_OF_IMAGES, OUTPUT_MIME_TYPE,
};

use crate::credentials::{self, CredentialProvider};
use crate::error::{ErrorInfo, SessionError, StageError};
use crate::images::ImageData;
use crate::prompts::{compose_synthesis_prompt, ANALYSIS_INSTRUCTION};
use crate::session::{Phase, RunTicket, Session};

/// The remote call a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Analysis,
    Synthesis,
}

/// Map a remote failure onto the error taxonomy
fn classify(stage: Stage, err: StageError) -> ErrorInfo {
    warn!("{:?} stage failed: {}", stage, err);

    if err.is_auth_rejection() {
        return ErrorInfo::auth_failure();
    }
    match (stage, err) {
        (_, StageError::Unexpected(message)) => ErrorInfo::unknown(message),
        (Stage::Analysis, _) => ErrorInfo::analysis_failure(),
        (Stage::Synthesis, _) => ErrorInfo::synthesis_failure(),
    }
}

/// Analyze-then-generate orchestration
pub struct Pipeline {
    analyzer: Arc<dyn SceneAnalyzer>,
    synthesizer: Arc<dyn ImageSynthesizer>,
    credentials: Arc<dyn CredentialProvider>,
}

impl Pipeline {
    pub fn new(
        analyzer: Arc<dyn SceneAnalyzer>,
        synthesizer: Arc<dyn ImageSynthesizer>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            analyzer,
            synthesizer,
            credentials,
        }
    }

    /// Redesign `image`
    ///
    /// `progress` is called with `Analyzing` before the vision call and with
    /// `Generating` before the image call. Input and credential checks happen
    /// first; when they fail no remote call is made and `progress` is never
    /// called.
    pub async fn run<F>(&self, image: Option<&ImageData>, mut progress: F) -> Result<ImageData, ErrorInfo>
    where
        F: FnMut(Phase) + Send,
    {
        let image = image.ok_or_else(ErrorInfo::no_upload)?;
        if !image.is_image() {
            return Err(ErrorInfo::not_an_image());
        }
        let key = credentials::resolve(self.credentials.as_ref())?;

        // Step 1: describe the street
        progress(Phase::Analyzing);
        info!(
            "Analyzing {} upload ({} bytes)",
            image.mime_type,
            image.len()
        );
        let description = self
            .analyzer
            .describe(&key, image, ANALYSIS_INSTRUCTION)
            .await
            .map_err(|e| classify(Stage::Analysis, e))?;

        debug!("Scene description: {}", description);

        // Step 2: render the redesign
        progress(Phase::Generating);
        let prompt = compose_synthesis_prompt(&description);
        debug!("Synthesis prompt: {}", prompt);

        let response = self
            .synthesizer
            .synthesize(&key, &SynthesisRequest::new(prompt))
            .await
            .map_err(|e| classify(Stage::Synthesis, e))?;

        let payload = response.first_payload().ok_or_else(|| {
            warn!("Image model returned no image bytes");
            ErrorInfo::empty_result()
        })?;

        let generated = match ImageData::from_base64(OUTPUT_MIME_TYPE, payload) {
            Ok(generated) if !generated.is_empty() => generated,
            Ok(_) => return Err(ErrorInfo::empty_result()),
            Err(e) => {
                warn!("Image model returned undecodable bytes: {}", e);
                return Err(ErrorInfo::empty_result());
            }
        };

        info!("Generated redesign ({} bytes)", generated.len());
        Ok(generated)
    }
}

/// Outcome of one run as seen by the caller
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub result: Result<Arc<ImageData>, ErrorInfo>,
    /// False when a newer upload superseded the run and the session kept
    /// its newer state
    pub applied: bool,
}

/// Runs the pipeline against the shared session
#[derive(Clone)]
pub struct Generator {
    pipeline: Arc<Pipeline>,
    session: Arc<Session>,
}

impl Generator {
    pub fn new(pipeline: Arc<Pipeline>, session: Arc<Session>) -> Self {
        Self { pipeline, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run to completion for the current upload
    pub async fn generate(&self) -> Result<RunReport, SessionError> {
        let ticket = self.session.begin_run()?;
        Ok(self.execute(&ticket).await)
    }

    /// Start a run on a background task and return its id
    ///
    /// A panic inside the run completes it as `Unknown` rather than leaving
    /// the session stuck in a loading phase.
    pub fn spawn(&self) -> Result<Uuid, SessionError> {
        let ticket = self.session.begin_run()?;
        let run_id = ticket.run_id;

        let worker = self.clone();
        let worker_ticket = ticket.clone();
        let handle = tokio::spawn(async move { worker.execute(&worker_ticket).await });

        let session = self.session.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                let message = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    "generation task was cancelled".to_string()
                };
                error!("Run {} aborted: {}", ticket.run_id, message);
                session.complete(&ticket, Err(ErrorInfo::unknown(message)));
            }
        });

        Ok(run_id)
    }

    async fn execute(&self, ticket: &RunTicket) -> RunReport {
        info!("Starting run {}", ticket.run_id);

        let session = &self.session;
        let result = self
            .pipeline
            .run(ticket.image.as_deref(), |phase| {
                session.advance(ticket, phase);
            })
            .await
            .map(Arc::new);

        let applied = session.complete(ticket, result.clone());
        match &result {
            Ok(_) => info!("Run {} succeeded", ticket.run_id),
            Err(err) => info!("Run {} failed ({}): {}", ticket.run_id, err.kind.as_str(), err),
        }

        RunReport {
            run_id: ticket.run_id,
            result,
            applied,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "generation task panicked".to_string()
    }
}
