//! WebSocket handlers
//!
//! Admission, upgrade and session start for every WebSocket route.

use crate::handlers::MessageHandler;
use crate::pump::MessageDecoder;
use crate::relay;
use crate::server::GatewayState;
use crate::session::{self, BizTag, Session};
use crate::socket::{open_stream, SocketReader, SocketRole};
use crate::upgrade;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use wsgate_common::{AppError, ResultEnvelope};

/// Decoder and handler shared by every session of one route
struct Endpoint<D, H> {
    decoder: D,
    handler: H,
}

/// Route serving sessions with `decoder` and `handler`
pub fn session_route<D, H>(decoder: D, handler: H) -> MethodRouter<GatewayState>
where
    D: MessageDecoder,
    H: MessageHandler<D::Message> + 'static,
{
    let endpoint = Arc::new(Endpoint { decoder, handler });

    get(move |State(state): State<GatewayState>, request: Request| {
        let endpoint = Arc::clone(&endpoint);
        async move {
            accept_session(state, request, move |session, reader, state, _headers| async move {
                session::serve(
                    session,
                    reader,
                    &endpoint.decoder,
                    &endpoint.handler,
                    state.registry(),
                )
                .await;
            })
        }
    })
}

/// Route relaying every session to `upstream_url`
pub fn relay_route(upstream_url: impl Into<String>) -> MethodRouter<GatewayState> {
    let upstream_url: Arc<str> = Arc::from(upstream_url.into());

    get(move |State(state): State<GatewayState>, request: Request| {
        let upstream_url = Arc::clone(&upstream_url);
        async move {
            accept_session(state, request, move |session, reader, state, headers| async move {
                let dial_timeout = state.options().upgrade_timeout;
                if let Err(e) = relay::bridge(
                    session,
                    reader,
                    &upstream_url,
                    &headers,
                    dial_timeout,
                    state.registry(),
                )
                .await
                {
                    tracing::debug!(error = %e, "Relay not started");
                }
            })
        }
    })
}

/// Admit, validate and upgrade one request, then run `start` on its own task
///
/// Rejections are answered before any upgrade. The admission permit moves
/// into the session, or is dropped if the upgrade never completes.
fn accept_session<F, Fut>(state: GatewayState, mut request: Request, start: F) -> Response
where
    F: FnOnce(Arc<Session>, SocketReader, GatewayState, HeaderMap) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let Some(permit) = state.gate().try_enter() else {
        tracing::warn!(limit = state.gate().limit(), "Admission refused, system busy");
        return reject(&AppError::SystemBusy);
    };

    let biz = biz_tag(state.config().ws.biz_key.as_deref(), request.uri());

    let handshake = match upgrade::prepare(&mut request, state.origin()) {
        Ok(handshake) => handshake,
        Err(e) => {
            tracing::warn!(error = %e, "Upgrade request rejected");
            return reject(&AppError::from(e));
        }
    };

    let headers = request.headers().clone();
    let (response, pending) = handshake.accept();
    let upgrade_timeout = state.options().upgrade_timeout;

    tokio::spawn(async move {
        let stream = match pending.complete(upgrade_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "Websocket upgrade failed");
                return;
            }
        };

        let (socket, reader) = open_stream(stream, SocketRole::Client);
        let session = Arc::new(Session::new(socket, permit, state.options()).with_biz(biz));

        start(session, reader, state, headers).await;
    });

    response
}

/// Read the business identifier from the query string
fn biz_tag(key: Option<&str>, uri: &Uri) -> Option<BizTag> {
    let key = key?;
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
    params
        .get(key)
        .filter(|value| !value.is_empty())
        .map(|value| BizTag::new(key, value.clone()))
}

/// Answer a pre-upgrade rejection with its status and envelope
pub fn reject(err: &AppError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ResultEnvelope::from(err))).into_response()
}

/// Health report
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub sessions: usize,
    pub max_connections: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_permits: Option<usize>,
}

/// Health check endpoint
pub async fn health(State(state): State<GatewayState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        sessions: state.registry().len(),
        max_connections: state.gate().limit(),
        available_permits: state.gate().available(),
    })
}
