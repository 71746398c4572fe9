//! Common test utilities - GinhawaTest harness for end-to-end testing
//!
//! Spawns a real server on a random port with scripted model backends.
//! Backends can be gated so a test can hold a run inside a phase.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use ginhawa::credentials::{ApiKey, CredentialProvider, StaticCredential};
use ginhawa::error::StageError;
use ginhawa::images::ImageData;
use ginhawa::pipeline::{ImageSynthesizer, SceneAnalyzer, SynthesisRequest, SynthesisResponse};
use ginhawa::session::Session;
use ginhawa::{Config, Server};
use parking_lot::Mutex;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// A JPEG-looking street photo as a data URI
pub const STREET_JPEG: &str = "data:image/jpeg;base64,/9j/4AAQ";

/// A text file read as a data URI
pub const NOTES_TXT: &str = "data:text/plain;base64,aGVsbG8=";

/// Holds a fake call until the test releases it
#[derive(Clone, Default)]
pub struct Gate(Option<Arc<Semaphore>>);

impl Gate {
    pub fn open() -> Self {
        Self(None)
    }

    pub fn closed() -> Self {
        Self(Some(Arc::new(Semaphore::new(0))))
    }

    /// Let one waiting call through
    pub fn release(&self) {
        if let Some(semaphore) = &self.0 {
            semaphore.add_permits(1);
        }
    }

    async fn pass(&self) {
        if let Some(semaphore) = &self.0 {
            if let Ok(permit) = semaphore.acquire().await {
                permit.forget();
            }
        }
    }
}

/// Scripted vision model
pub struct FakeAnalyzer {
    reply: Result<String, (u16, String)>,
    gate: Gate,
    calls: AtomicUsize,
}

impl FakeAnalyzer {
    pub fn replying(text: &str) -> Arc<Self> {
        Self::build(Ok(text.to_string()), Gate::open())
    }

    pub fn failing(status: u16, message: &str) -> Arc<Self> {
        Self::build(Err((status, message.to_string())), Gate::open())
    }

    pub fn gated(text: &str, gate: Gate) -> Arc<Self> {
        Self::build(Ok(text.to_string()), gate)
    }

    fn build(reply: Result<String, (u16, String)>, gate: Gate) -> Arc<Self> {
        Arc::new(Self {
            reply,
            gate,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SceneAnalyzer for FakeAnalyzer {
    async fn describe(
        &self,
        _key: &ApiKey,
        _image: &ImageData,
        _instruction: &str,
    ) -> Result<String, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        self.reply
            .clone()
            .map_err(|(status, message)| StageError::Rejected { status, message })
    }
}

/// Scripted image model that records requests
pub struct FakeSynthesizer {
    reply: Result<SynthesisResponse, (u16, String)>,
    gate: Gate,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl FakeSynthesizer {
    pub fn replying(response: SynthesisResponse) -> Arc<Self> {
        Self::build(Ok(response), Gate::open())
    }

    pub fn failing(status: u16, message: &str) -> Arc<Self> {
        Self::build(Err((status, message.to_string())), Gate::open())
    }

    pub fn gated(response: SynthesisResponse, gate: Gate) -> Arc<Self> {
        Self::build(Ok(response), gate)
    }

    fn build(reply: Result<SynthesisResponse, (u16, String)>, gate: Gate) -> Arc<Self> {
        Arc::new(Self {
            reply,
            gate,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ImageSynthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        _key: &ApiKey,
        request: &SynthesisRequest,
    ) -> Result<SynthesisResponse, StageError> {
        self.requests.lock().push(request.clone());
        self.gate.pass().await;
        self.reply
            .clone()
            .map_err(|(status, message)| StageError::Rejected { status, message })
    }
}

/// Test harness that runs a ginhawa server on a random port
pub struct GinhawaTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl GinhawaTest {
    /// Start a server with a valid key
    pub async fn start(
        analyzer: Arc<FakeAnalyzer>,
        synthesizer: Arc<FakeSynthesizer>,
    ) -> Result<Self> {
        let credentials = Arc::new(StaticCredential::new("test-key"));
        Self::start_with_credentials(analyzer, synthesizer, credentials).await
    }

    /// Start a server with explicit credentials
    pub async fn start_with_credentials(
        analyzer: Arc<FakeAnalyzer>,
        synthesizer: Arc<FakeSynthesizer>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let config = Config {
            bind_addr: addr,
            ..Config::default()
        };

        let server = Arc::new(Server::with_backends(
            config,
            analyzer,
            synthesizer,
            credentials,
        ));
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Direct access to the session for assertions
    pub fn session(&self) -> Arc<Session> {
        self.server.session()
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Upload a data URI
    pub async fn upload(&self, data_uri: &str) -> Result<reqwest::Response> {
        self.post("/upload", &serde_json::json!({ "data_uri": data_uri }))
            .await
    }

    /// Trigger a run
    pub async fn generate(&self) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}/generate", self.base_url()))
            .send()
            .await?)
    }

    /// Current session view
    pub async fn session_json(&self) -> Result<serde_json::Value> {
        Ok(self.get("/session").await?.json().await?)
    }

    /// Poll the session until it reaches `phase` (max 5 seconds)
    pub async fn wait_for_phase(&self, phase: &str) -> Result<serde_json::Value> {
        for _ in 0..100 {
            let session = self.session_json().await?;
            if session["phase"] == phase {
                return Ok(session);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("session never reached phase {}", phase)
    }

    /// Get the WebSocket URL for the server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Connect to the WebSocket endpoint and return a test client
    pub async fn connect_ws(&self) -> Result<WsClient> {
        let (ws_stream, _) = connect_async(&self.ws_url()).await?;
        let (write, read) = ws_stream.split();
        Ok(WsClient { write, read })
    }
}

/// WebSocket client for testing
pub struct WsClient {
    write: futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        Message,
    >,
    read: futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    >,
}

impl WsClient {
    /// Send a typed message
    pub async fn send_type(&mut self, kind: &str) -> Result<()> {
        let msg = serde_json::json!({ "type": kind });
        self.write
            .send(Message::Text(msg.to_string().into()))
            .await?;
        Ok(())
    }

    /// Receive the next message as JSON
    pub async fn recv_json(&mut self) -> Result<serde_json::Value> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Close(_))) | None => {
                    anyhow::bail!("WebSocket closed");
                }
                _ => continue, // Skip binary/ping/pong frames
            }
        }
    }

    /// Receive with timeout
    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Result<serde_json::Value> {
        match tokio::time::timeout(timeout, self.recv_json()).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("Timeout waiting for WebSocket message"),
        }
    }

    /// Read session messages until one is in `phase`
    pub async fn wait_for_phase(&mut self, phase: &str) -> Result<serde_json::Value> {
        loop {
            let msg = self.recv_json_timeout(Duration::from_secs(5)).await?;
            if msg["type"] == "session" && msg["phase"] == phase {
                return Ok(msg);
            }
        }
    }

    /// Close the connection
    pub async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

impl Drop for GinhawaTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
