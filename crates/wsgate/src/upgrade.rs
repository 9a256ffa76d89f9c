//! Handshake upgrader
//!
//! Validates an HTTP upgrade request, answers `101 Switching Protocols` and
//! completes the switch to WebSocket under a bounded timeout.

use axum::body::Body;
use axum::http::header::{
    CONNECTION, ORIGIN, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE,
};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::Response;
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;
use wsgate_common::AppError;

/// Stream produced by a completed server upgrade
pub type UpgradedStream = WebSocketStream<TokioIo<Upgraded>>;

/// Predicate deciding whether a request's origin may upgrade
pub type OriginCheck = Arc<dyn Fn(&HeaderMap) -> bool + Send + Sync>;

/// Accept every origin
#[must_use]
pub fn allow_all() -> OriginCheck {
    Arc::new(|_: &HeaderMap| true)
}

/// Accept only the listed origins
///
/// An empty list accepts everything. Requests without an `Origin` header
/// are not browser requests and are accepted.
#[must_use]
pub fn allow_origins(origins: Vec<String>) -> OriginCheck {
    if origins.is_empty() {
        return allow_all();
    }

    Arc::new(move |headers: &HeaderMap| match headers.get(ORIGIN) {
        Some(origin) => origin
            .to_str()
            .is_ok_and(|origin| origins.iter().any(|allowed| allowed.eq_ignore_ascii_case(origin))),
        None => true,
    })
}

/// Upgrade failure
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("Upgrade timed out after {0:?}")]
    Timeout(Duration),

    #[error("Bad handshake: {0}")]
    Handshake(&'static str),

    #[error("Origin not allowed: {0}")]
    Origin(String),

    #[error("Upgrade failed: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("Upgrade task aborted")]
    Aborted,
}

impl From<UpgradeError> for AppError {
    fn from(err: UpgradeError) -> Self {
        match err {
            UpgradeError::Origin(origin) => AppError::OriginRejected(origin),
            other => AppError::upgrade_failed(other),
        }
    }
}

/// A validated upgrade request
#[derive(Debug)]
pub struct Handshake {
    accept: HeaderValue,
    on_upgrade: OnUpgrade,
}

/// Validate an upgrade request and take its upgrade handle
pub fn prepare<B>(request: &mut Request<B>, origin: &OriginCheck) -> Result<Handshake, UpgradeError> {
    if request.method() != Method::GET {
        return Err(UpgradeError::Handshake("request method must be GET"));
    }

    let headers = request.headers();

    let connection_upgrade = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    if !connection_upgrade {
        return Err(UpgradeError::Handshake("Connection header must contain upgrade"));
    }

    let upgrade_websocket = headers
        .get(UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("websocket"));
    if !upgrade_websocket {
        return Err(UpgradeError::Handshake("Upgrade header must be websocket"));
    }

    let version_13 = headers
        .get(SEC_WEBSOCKET_VERSION)
        .is_some_and(|value| value == "13");
    if !version_13 {
        return Err(UpgradeError::Handshake("Sec-WebSocket-Version must be 13"));
    }

    let key = headers
        .get(SEC_WEBSOCKET_KEY)
        .ok_or(UpgradeError::Handshake("missing Sec-WebSocket-Key"))?;
    let accept = HeaderValue::from_str(&derive_accept_key(key.as_bytes()))
        .map_err(|_| UpgradeError::Handshake("invalid Sec-WebSocket-Key"))?;

    if !origin(headers) {
        let origin = headers
            .get(ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        return Err(UpgradeError::Origin(origin));
    }

    let on_upgrade = request
        .extensions_mut()
        .remove::<OnUpgrade>()
        .ok_or(UpgradeError::Handshake("connection is not upgradable"))?;

    Ok(Handshake { accept, on_upgrade })
}

impl Handshake {
    /// Build the `101` response and the pending protocol switch
    ///
    /// The switch only completes once the response has been sent.
    pub fn accept(self) -> (Response, PendingUpgrade) {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;

        let headers = response.headers_mut();
        headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(SEC_WEBSOCKET_ACCEPT, self.accept);

        (
            response,
            PendingUpgrade {
                on_upgrade: self.on_upgrade,
            },
        )
    }
}

/// Protocol switch waiting for the `101` response to go out
#[derive(Debug)]
pub struct PendingUpgrade {
    on_upgrade: OnUpgrade,
}

impl PendingUpgrade {
    /// Finish the switch within `limit`
    pub async fn complete(self, limit: Duration) -> Result<UpgradedStream, UpgradeError> {
        let on_upgrade = self.on_upgrade;

        upgrade_with_timeout(
            async move {
                let upgraded = on_upgrade.await?;
                Ok(WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None).await)
            },
            limit,
        )
        .await
    }
}

/// Race an upgrade against `limit`
///
/// The upgrade runs on its own task. If it finishes after the caller gave
/// up, the late socket is closed right away.
pub async fn upgrade_with_timeout<F, S>(
    upgrade: F,
    limit: Duration,
) -> Result<WebSocketStream<S>, UpgradeError>
where
    F: Future<Output = Result<WebSocketStream<S>, UpgradeError>> + Send + 'static,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let result = upgrade.await;
        if let Err(Ok(mut stream)) = tx.send(result) {
            tracing::debug!("Upgrade finished after timeout, closing socket");
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "Failed to close late socket");
            }
        }
    });

    match tokio::time::timeout(limit, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(UpgradeError::Aborted),
        Err(_) => Err(UpgradeError::Timeout(limit)),
    }
}
