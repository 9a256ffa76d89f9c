//! Echo handler

use super::{HandlerResult, MessageHandler};
use crate::protocol::Frame;
use crate::session::Session;
use async_trait::async_trait;

/// Writes every data frame back to the client unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl MessageHandler<Frame> for EchoHandler {
    async fn handle(&self, session: &Session, frame: Frame) -> HandlerResult<()> {
        tracing::trace!(kind = %frame.kind, size = frame.len(), "Echoing frame");
        session.send(frame).await?;
        Ok(())
    }
}
