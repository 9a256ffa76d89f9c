//! Test helpers for integration tests
//!
//! Provides utilities for spawning test servers and upstreams, and for
//! driving WebSocket clients against them.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request as ClientRequest;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WireCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use wsgate::server::{create_router, serve, GatewayState};
use wsgate_common::AppConfig;

/// WebSocket client connected to a test server
pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for any single event
pub const STEP_TIMEOUT: Duration = Duration::from_secs(3);

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: GatewayState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server with default settings
    pub async fn start() -> Result<Self> {
        Self::start_with(&[]).await
    }

    /// Start a server with extra configuration variables
    pub async fn start_with(vars: &[(&str, &str)]) -> Result<Self> {
        Self::start_with_routes(vars, |router| router).await
    }

    /// Start a server whose router is extended by `routes`
    pub async fn start_with_routes<F>(vars: &[(&str, &str)], routes: F) -> Result<Self>
    where
        F: FnOnce(Router<GatewayState>) -> Router<GatewayState>,
    {
        let config = test_config(vars)?;
        let state = GatewayState::new(config);
        let app = routes(create_router(state.config())).with_state(state.clone());

        // Bind to an ephemeral port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = {
            let state = state.clone();
            tokio::spawn(async move {
                let shutdown = async move {
                    let _ = shutdown_rx.await;
                };
                serve(listener, app, &state, shutdown).await.ok();
            })
        };

        let client = Client::builder().timeout(STEP_TIMEOUT).build()?;

        Ok(Self {
            addr,
            client,
            state,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the WebSocket URL of `path`
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Open a WebSocket to `path`
    pub async fn connect(&self, path: &str) -> Result<WsClient> {
        let request = self.ws_url(path).into_client_request()?;
        self.connect_request(request).await
    }

    /// Open a WebSocket with a prepared handshake request
    pub async fn connect_request(&self, request: ClientRequest) -> Result<WsClient> {
        let (ws, _) = tokio::time::timeout(STEP_TIMEOUT, tokio_tungstenite::connect_async(request))
            .await
            .context("connect timed out")??;
        Ok(ws)
    }

    /// Wait until the server holds exactly `count` sessions
    pub async fn wait_for_sessions(&self, count: usize) -> Result<()> {
        let deadline = tokio::time::Instant::now() + STEP_TIMEOUT;
        while self.state.registry().len() != count {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!(
                    "expected {count} sessions, server holds {}",
                    self.state.registry().len()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    /// Trigger graceful shutdown and wait for the server to stop
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(STEP_TIMEOUT, &mut self.handle)
            .await
            .context("server did not stop")??;
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Create a test configuration
///
/// The port is irrelevant: tests bind their own ephemeral listener.
pub fn test_config(vars: &[(&str, &str)]) -> Result<AppConfig> {
    let mut map: HashMap<String, String> = HashMap::from([
        ("GATEWAY_PORT".to_string(), "0".to_string()),
        ("WS_UPGRADE_TIMEOUT_MS".to_string(), "2000".to_string()),
    ]);
    for (key, value) in vars {
        map.insert((*key).to_string(), (*value).to_string());
    }

    AppConfig::from_source(|key| map.get(key).cloned())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))
}

/// Receive the next data or close message, skipping keepalive traffic
pub async fn recv(ws: &mut WsClient) -> Result<Message> {
    loop {
        let message = tokio::time::timeout(STEP_TIMEOUT, ws.next())
            .await
            .context("no message before timeout")?
            .context("stream ended")??;

        match message {
            Message::Ping(_) | Message::Pong(_) => {}
            other => return Ok(other),
        }
    }
}

/// Receive the next message and expect it to be text
pub async fn recv_text(ws: &mut WsClient) -> Result<String> {
    match recv(ws).await? {
        Message::Text(text) => Ok(text.as_str().to_string()),
        other => anyhow::bail!("expected text, got {other:?}"),
    }
}

/// Receive the next message and expect a close frame; returns its code
pub async fn recv_close(ws: &mut WsClient) -> Result<u16> {
    Ok(recv_close_frame(ws).await?.0)
}

/// Receive the next message and expect a close frame; returns code and reason
pub async fn recv_close_frame(ws: &mut WsClient) -> Result<(u16, String)> {
    match recv(ws).await? {
        Message::Close(Some(frame)) => Ok((u16::from(frame.code), frame.reason.to_string())),
        Message::Close(None) => Ok((1005, String::new())),
        other => anyhow::bail!("expected close, got {other:?}"),
    }
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(
    response: Response,
    expected_status: StatusCode,
) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            body
        );
    }
    Ok(response.json().await?)
}

/// Text that makes the upstream close with [`UPSTREAM_CLOSE_CODE`]
pub const UPSTREAM_CLOSE_TRIGGER: &str = "please close";

/// Close code the upstream sends on [`UPSTREAM_CLOSE_TRIGGER`]
pub const UPSTREAM_CLOSE_CODE: u16 = 4001;

/// Upstream WebSocket server echoing every data message
pub struct TestUpstream {
    pub addr: SocketAddr,
    /// `Authorization` header of every accepted handshake
    pub authorizations: Arc<Mutex<Vec<Option<String>>>>,
    /// Text of every data message received
    pub received: Arc<Mutex<Vec<String>>>,
    /// Code and reason of every close frame received
    pub closes: Arc<Mutex<Vec<(u16, String)>>>,
    handle: JoinHandle<()>,
}

impl TestUpstream {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let authorizations = Arc::new(Mutex::new(Vec::new()));
        let received = Arc::new(Mutex::new(Vec::new()));
        let closes = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let authorizations = authorizations.clone();
            let received = received.clone();
            let closes = closes.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let authorizations = authorizations.clone();
                    let received = received.clone();
                    let closes = closes.clone();
                    tokio::spawn(async move {
                        let callback = |request: &Request, response: HandshakeResponse| {
                            let auth = request
                                .headers()
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                .map(String::from);
                            authorizations.lock().push(auth);
                            Ok::<_, ErrorResponse>(response)
                        };
                        let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await
                        else {
                            return;
                        };

                        while let Some(Ok(message)) = ws.next().await {
                            match message {
                                Message::Text(ref text) if text.as_str() == UPSTREAM_CLOSE_TRIGGER => {
                                    let _ = ws
                                        .close(Some(CloseFrame {
                                            code: WireCloseCode::from(UPSTREAM_CLOSE_CODE),
                                            reason: "denied".into(),
                                        }))
                                        .await;
                                }
                                Message::Text(_) | Message::Binary(_) => {
                                    if let Ok(text) = message.to_text() {
                                        received.lock().push(text.to_string());
                                    }
                                    if ws.send(message).await.is_err() {
                                        break;
                                    }
                                }
                                Message::Close(frame) => {
                                    if let Some(frame) = frame {
                                        closes
                                            .lock()
                                            .push((u16::from(frame.code), frame.reason.to_string()));
                                    }
                                    break;
                                }
                                _ => {}
                            }
                        }
                    });
                }
            })
        };

        Ok(Self {
            addr,
            authorizations,
            received,
            closes,
            handle,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }
}

impl Drop for TestUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Address nothing listens on
pub async fn dead_address() -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}
