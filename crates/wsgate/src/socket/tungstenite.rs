//! `tokio-tungstenite` adapter
//!
//! Bridges a `WebSocketStream` to the frame source and sink traits.

use super::{open, FrameSink, FrameSource, Socket, SocketReader, SocketRole, TransportError};
use crate::protocol::{Frame, FrameKind};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WireCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Read half of a `WebSocketStream`
pub struct WsSource<S> {
    inner: SplitStream<WebSocketStream<S>>,
}

/// Write half of a `WebSocketStream`
pub struct WsSink<S> {
    inner: SplitSink<WebSocketStream<S>, Message>,
}

/// Split a `WebSocketStream` and open it as a socket
pub fn open_stream<S>(stream: WebSocketStream<S>, role: SocketRole) -> (Arc<Socket>, SocketReader)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, source) = stream.split();
    open(WsSource { inner: source }, WsSink { inner: sink }, role)
}

#[async_trait]
impl<S> FrameSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        match self.inner.next().await {
            Some(Ok(message)) => Ok(frame_from_message(message)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(Frame::sentinel()),
        }
    }

    fn answers_pings(&self) -> bool {
        true
    }
}

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = message_from_frame(frame)?;
        self.inner.send(message).await.map_err(Into::into)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await.map_err(Into::into)
    }
}

fn frame_from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::new(FrameKind::Text, text.as_bytes().to_vec()),
        Message::Binary(data) => Frame::binary(data.to_vec()),
        Message::Ping(data) => Frame::ping(data.to_vec()),
        Message::Pong(data) => Frame::pong(data.to_vec()),
        Message::Close(Some(close)) => Frame::close(u16::from(close.code), &close.reason),
        Message::Close(None) => Frame::new(FrameKind::Close, Vec::new()),
        Message::Frame(_) => Frame::sentinel(),
    }
}

fn message_from_frame(frame: Frame) -> Result<Message, TransportError> {
    let message = match frame.kind {
        FrameKind::Text => {
            let text = String::from_utf8(frame.payload)
                .map_err(|e| TransportError::Protocol(format!("text frame is not UTF-8: {e}")))?;
            Message::Text(text.into())
        }
        FrameKind::Binary => Message::Binary(frame.payload.into()),
        FrameKind::Ping => Message::Ping(frame.payload.into()),
        FrameKind::Pong => Message::Pong(frame.payload.into()),
        FrameKind::Close => {
            let close = match (frame.close_code(), frame.close_reason()) {
                (Some(code), reason) => Some(CloseFrame {
                    code: WireCloseCode::from(code),
                    reason: reason.unwrap_or_default().to_string().into(),
                }),
                (None, _) => None,
            };
            Message::Close(close)
        }
        FrameKind::Invalid => {
            return Err(TransportError::Protocol(
                "sentinel frame cannot be written".to_string(),
            ))
        }
    };
    Ok(message)
}
