//! Message pump
//!
//! The read/dispatch loop of one socket. A pump reads frames strictly in
//! arrival order, answers control frames itself, detects the end of the
//! session and hands every decoded data message to a [`MessageHandler`].

mod decoder;

pub use decoder::{DecodeError, JsonDecoder, MessageDecoder, RawDecoder};

use crate::handlers::{HandlerError, MessageHandler};
use crate::protocol::{CloseCode, Frame, FrameKind};
use crate::session::Session;
use crate::socket::{Socket, SocketReader, TransportError};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{Instrument, Span};

/// The socket a pump reads from, with its write handle for control replies
pub struct PumpSide {
    socket: Arc<Socket>,
    reader: SocketReader,
    track_deadline: bool,
}

impl PumpSide {
    /// The client side; reads are bounded by the session's pong deadline
    pub fn client(session: &Session, reader: SocketReader) -> Self {
        Self {
            socket: Arc::clone(session.socket()),
            reader,
            track_deadline: true,
        }
    }

    /// The upstream side of a relay; reads are unbounded
    pub fn upstream(peer: Arc<Socket>, reader: SocketReader) -> Self {
        Self {
            socket: peer,
            reader,
            track_deadline: false,
        }
    }
}

/// Why a pump stopped
#[derive(Debug)]
pub enum PumpExit {
    /// An end frame arrived, or another pump ended the session first
    Ended,
    /// The socket was closed under the pump
    Closed,
    /// The start callback refused the session
    Rejected(HandlerError),
    /// Reading failed
    Read(TransportError),
    /// A data frame could not be decoded
    Decode(DecodeError),
    /// The handler hit a terminal error
    Handler(HandlerError),
}

impl PumpExit {
    /// Close code sent to the remaining sockets
    #[must_use]
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::Ended | Self::Closed => CloseCode::Normal,
            Self::Rejected(_) => CloseCode::Policy,
            Self::Read(_) | Self::Handler(_) => CloseCode::Error,
            Self::Decode(DecodeError::Validation(_)) => CloseCode::Invalid,
            Self::Decode(_) => CloseCode::Unsupported,
        }
    }

    /// Close reason sent with [`close_code`](Self::close_code)
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Ended | Self::Closed => "",
            Self::Rejected(_) => "session rejected",
            Self::Read(TransportError::DeadlineExceeded) => "read timeout",
            Self::Read(_) => "read failed",
            Self::Decode(_) => "invalid message",
            Self::Handler(_) => "handler failed",
        }
    }

    /// Whether the pump stopped without a failure
    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Ended | Self::Closed)
    }
}

impl fmt::Display for PumpExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ended => f.write_str("ended"),
            Self::Closed => f.write_str("closed"),
            Self::Rejected(e) => write!(f, "rejected: {e}"),
            Self::Read(e) => write!(f, "read error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::Handler(e) => write!(f, "handler error: {e}"),
        }
    }
}

/// Run the read/dispatch loop until a terminal condition
///
/// Marks the session ended before returning. Closing the sockets is left to
/// the caller.
pub async fn run<D, H>(session: &Session, side: PumpSide, decoder: &D, handler: &H) -> PumpExit
where
    D: MessageDecoder,
    H: MessageHandler<D::Message>,
{
    let PumpSide {
        socket,
        mut reader,
        track_deadline,
    } = side;
    let role = reader.role();
    let reply_pings = !reader.answers_pings();

    loop {
        if session.is_ended() {
            return PumpExit::Ended;
        }

        let deadline = if track_deadline {
            session.deadlines().read_deadline()
        } else {
            None
        };

        let frame = match reader.read(deadline).await {
            Ok(frame) => frame,
            Err(e) if e.is_closed() => {
                session.set_ended();
                tracing::debug!(role = %role, "Socket closed");
                return PumpExit::Closed;
            }
            Err(e) => {
                session.set_ended();
                tracing::warn!(role = %role, error = %e, "Read failed");
                return PumpExit::Read(e);
            }
        };

        let span = if session.trace_messages() {
            tracing::debug_span!("ws_message", role = %role, kind = %frame.kind, size = frame.len())
        } else {
            Span::none()
        };

        let control = Control {
            socket: &socket,
            track_deadline,
            reply_pings,
        };
        let step = dispatch(session, &control, frame, decoder, handler)
            .instrument(span)
            .await;

        if let ControlFlow::Break(exit) = step {
            return exit;
        }
    }
}

/// How a pump treats control frames on its socket
struct Control<'a> {
    socket: &'a Socket,
    track_deadline: bool,
    reply_pings: bool,
}

async fn dispatch<D, H>(
    session: &Session,
    control: &Control<'_>,
    frame: Frame,
    decoder: &D,
    handler: &H,
) -> ControlFlow<PumpExit>
where
    D: MessageDecoder,
    H: MessageHandler<D::Message>,
{
    if frame.kind.is_terminal() || handler.is_end_frame(&frame) {
        end::<D::Message, H>(session, control.socket, frame, handler).await;
        return ControlFlow::Break(PumpExit::Ended);
    }

    match frame.kind {
        FrameKind::Pong => {
            if control.track_deadline {
                session.deadlines().extend_read();
            }
            tracing::trace!("Pong received");
        }
        FrameKind::Ping if control.reply_pings => {
            let wait = session.deadlines().write_wait();
            if let Err(e) = control.socket.send(Frame::pong(frame.payload), wait).await {
                tracing::debug!(error = %e, "Failed to answer ping");
            }
        }
        FrameKind::Ping => tracing::trace!("Ping answered by transport"),
        _ => {
            let message = match decoder.decode(frame) {
                Ok(message) => message,
                Err(e) => {
                    session.set_ended();
                    tracing::warn!(error = %e, "Failed to decode message");
                    return ControlFlow::Break(PumpExit::Decode(e));
                }
            };

            match handler.handle(session, message).await {
                Ok(()) => {
                    session.record_message();
                }
                Err(e) if e.is_terminal() => {
                    session.set_ended();
                    tracing::warn!(error = %e, "Handler failed, ending session");
                    return ControlFlow::Break(PumpExit::Handler(e));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Handler error");
                }
            }
        }
    }

    ControlFlow::Continue(())
}

async fn end<M, H>(session: &Session, socket: &Socket, frame: Frame, handler: &H)
where
    M: Send + 'static,
    H: MessageHandler<M>,
{
    session.set_ended();
    tracing::debug!(kind = %frame.kind, code = ?frame.close_code(), "End of session");

    if session.claim_end_callback() {
        if let Err(e) = handler.on_end(session, &frame).await {
            tracing::warn!(error = %e, "End callback failed");
        }
    }

    // Echo the peer's close; a sentinel gets a plain normal close
    let reply = match frame.kind {
        FrameKind::Close => frame,
        _ => Frame::close(CloseCode::Normal, ""),
    };
    socket.close(Some(reply), session.deadlines().write_wait()).await;
}
