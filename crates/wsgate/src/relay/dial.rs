//! Upstream dialing

use super::RelayError;
use crate::socket::{open_stream, Socket, SocketReader, SocketRole};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, HeaderName};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

/// Client headers copied onto the upstream handshake
const FORWARDED_HEADERS: [HeaderName; 2] = [AUTHORIZATION, COOKIE];

/// Open a WebSocket to `url` within `limit`
///
/// The client's credentials headers are forwarded so the upstream sees the
/// same identity.
pub async fn dial(
    url: &str,
    headers: &HeaderMap,
    limit: Duration,
) -> Result<(Arc<Socket>, SocketReader), RelayError> {
    let mut request = url.into_client_request()?;
    for name in FORWARDED_HEADERS {
        if let Some(value) = headers.get(&name) {
            request.headers_mut().insert(name, value.clone());
        }
    }

    let (stream, response) = tokio::time::timeout(limit, connect_async(request))
        .await
        .map_err(|_| RelayError::DialTimeout(limit))??;

    tracing::debug!(url = %url, status = %response.status(), "Upstream connected");

    Ok(open_stream(stream, SocketRole::Upstream))
}
