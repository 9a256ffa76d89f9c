//! Message handlers
//!
//! The business side of a session: what happens when it starts, when a
//! decoded message arrives, and when it ends.

mod echo;
mod error;

pub use echo::EchoHandler;
pub use error::{HandlerError, HandlerResult};

use crate::protocol::Frame;
use crate::session::Session;
use async_trait::async_trait;

/// Callbacks driven by the message pump
///
/// `M` is the message type produced by the pump's decoder. Lifecycle
/// callbacks default to no-ops.
#[async_trait]
pub trait MessageHandler<M: Send + 'static>: Send + Sync {
    /// Called once before the first read
    ///
    /// An error aborts the session: the client receives one error envelope
    /// and the socket is closed.
    async fn on_start(&self, _session: &Session) -> HandlerResult<()> {
        Ok(())
    }

    /// Whether `frame` ends the session
    ///
    /// Close frames and the sentinel always end it; overrides can only add
    /// to that set.
    fn is_end_frame(&self, frame: &Frame) -> bool {
        frame.kind.is_terminal()
    }

    /// Called at most once per session, with the frame that ended it
    async fn on_end(&self, _session: &Session, _frame: &Frame) -> HandlerResult<()> {
        Ok(())
    }

    /// Handle one decoded data message
    async fn handle(&self, session: &Session, message: M) -> HandlerResult<()>;
}
