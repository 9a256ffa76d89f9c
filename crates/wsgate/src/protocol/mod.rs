//! Frame-level protocol definitions
//!
//! Frame kinds, frames, and close codes as seen by the session core.
//! Byte-level framing belongs to the WebSocket library.

mod close_codes;
mod frame;

pub use close_codes::CloseCode;
pub use frame::{Frame, FrameKind};
