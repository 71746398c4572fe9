//! ginhawa - street redesign daemon
//!
//! Upload a photo of a street and get back a pedestrian-first redesign,
//! produced by describing the photo with a vision model and rendering the
//! description with an image model.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gemini;
pub mod images;
pub mod ingest;
pub mod pipeline;
pub mod prompts;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use config::Config;
use credentials::{CredentialProvider, EnvCredential};
use gemini::GeminiClient;
use pipeline::{Generator, ImageSynthesizer, Pipeline, SceneAnalyzer};
use session::Session;

/// Build a generator wired to the Gemini client and the configured key
pub fn gemini_generator(config: &Config, session: Arc<Session>) -> Result<Generator> {
    let client = Arc::new(GeminiClient::from_config(config)?);
    let credentials = Arc::new(EnvCredential::new(&config.api_key_env));
    let pipeline = Pipeline::new(client.clone(), client, credentials);
    Ok(Generator::new(Arc::new(pipeline), session))
}

/// The ginhawa server instance
pub struct Server {
    config: Config,
    generator: Generator,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a server talking to the Gemini API
    pub fn new(config: Config) -> Result<Self> {
        let generator = gemini_generator(&config, Session::shared())?;
        Ok(Self::with_generator(config, generator))
    }

    /// Create a server with explicit model backends
    pub fn with_backends(
        config: Config,
        analyzer: Arc<dyn SceneAnalyzer>,
        synthesizer: Arc<dyn ImageSynthesizer>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let pipeline = Pipeline::new(analyzer, synthesizer, credentials);
        let generator = Generator::new(Arc::new(pipeline), Session::shared());
        Self::with_generator(config, generator)
    }

    fn with_generator(config: Config, generator: Generator) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            generator,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Get the session handle
    pub fn session(&self) -> Arc<Session> {
        self.generator.session().clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(api::AppState::new(
            self.generator.clone(),
            self.config.max_upload_bytes,
        ))
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("ginhawa listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("ginhawa shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
