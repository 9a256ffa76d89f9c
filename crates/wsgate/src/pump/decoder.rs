//! Message decoders
//!
//! A decoder turns one data frame into the message type a handler consumes.

use crate::protocol::{Frame, FrameKind};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;
use validator::Validate;

/// Decode failure; terminal for the pump
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Cannot decode {0} frame")]
    UnsupportedKind(FrameKind),
}

/// Decode strategy used by a pump
pub trait MessageDecoder: Send + Sync + 'static {
    type Message: Send + 'static;

    fn decode(&self, frame: Frame) -> Result<Self::Message, DecodeError>;
}

/// Passes frames through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl MessageDecoder for RawDecoder {
    type Message = Frame;

    fn decode(&self, frame: Frame) -> Result<Frame, DecodeError> {
        Ok(frame)
    }
}

/// Parses the payload as JSON into `T`, then validates it
pub struct JsonDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDecoder")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> MessageDecoder for JsonDecoder<T>
where
    T: DeserializeOwned + Validate + Send + 'static,
{
    type Message = T;

    fn decode(&self, frame: Frame) -> Result<T, DecodeError> {
        if !frame.kind.is_data() {
            return Err(DecodeError::UnsupportedKind(frame.kind));
        }

        let message: T = serde_json::from_slice(&frame.payload)?;
        message.validate()?;
        Ok(message)
    }
}
