//! Frame forwarder

use crate::handlers::{HandlerResult, MessageHandler};
use crate::protocol::{CloseCode, Frame, FrameKind};
use crate::session::Session;
use crate::socket::Socket;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Writes every data frame unchanged to the opposite socket
///
/// A failed write is a transport error, which ends the pump and closes the
/// session. The frame that ends one side closes the opposite socket with the
/// same code and reason.
pub struct Forwarder {
    target: Arc<Socket>,
    write_wait: Option<Duration>,
}

impl Forwarder {
    pub fn new(target: Arc<Socket>, write_wait: Option<Duration>) -> Self {
        Self { target, write_wait }
    }
}

#[async_trait]
impl MessageHandler<Frame> for Forwarder {
    async fn handle(&self, _session: &Session, frame: Frame) -> HandlerResult<()> {
        tracing::trace!(to = %self.target.role(), kind = %frame.kind, size = frame.len(), "Forwarding frame");
        self.target.send(frame, self.write_wait).await?;
        Ok(())
    }

    async fn on_end(&self, _session: &Session, frame: &Frame) -> HandlerResult<()> {
        let last = match frame.kind {
            FrameKind::Close => frame.clone(),
            _ => Frame::close(CloseCode::Normal, ""),
        };
        tracing::debug!(to = %self.target.role(), code = ?last.close_code(), "Forwarding close");
        self.target.close(Some(last), self.write_wait).await;
        Ok(())
    }
}
