//! WebSocket frames
//!
//! A frame is one complete message unit read from or written to a socket.

/// Frame kinds
///
/// Values follow the RFC 6455 opcodes. `Invalid` is the sentinel "no type"
/// frame produced when a stream ends without a usable frame; it terminates a
/// session exactly like a close frame does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
    Invalid = 0xFF,
}

impl FrameKind {
    /// Create a `FrameKind` from a raw opcode
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x1 => Self::Text,
            0x2 => Self::Binary,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            _ => Self::Invalid,
        }
    }

    /// Get the raw opcode
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Text or binary payload carrying application data
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Text | Self::Binary)
    }

    /// Ping, pong or close
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }

    /// Close frame or the sentinel
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Close | Self::Invalid)
    }

    /// Get the name of this frame kind
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Close => "close",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One WebSocket frame
///
/// Close payloads keep their wire layout: a big-endian status code followed
/// by a UTF-8 reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(kind: FrameKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(FrameKind::Text, text.into().into_bytes())
    }

    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(FrameKind::Binary, data)
    }

    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(FrameKind::Ping, data)
    }

    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(FrameKind::Pong, data)
    }

    /// Close frame with a status code and reason
    #[must_use]
    pub fn close(code: impl Into<u16>, reason: &str) -> Self {
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.into().to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        Self::new(FrameKind::Close, payload)
    }

    /// The sentinel "no type" frame
    #[must_use]
    pub fn sentinel() -> Self {
        Self::new(FrameKind::Invalid, Vec::new())
    }

    /// Status code of a close frame, if it carries one
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        if self.kind != FrameKind::Close || self.payload.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
    }

    /// Reason text of a close frame
    #[must_use]
    pub fn close_reason(&self) -> Option<&str> {
        if self.kind != FrameKind::Close || self.payload.len() < 2 {
            return None;
        }
        std::str::from_utf8(&self.payload[2..]).ok()
    }

    /// Payload as UTF-8 text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
