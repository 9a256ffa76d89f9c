//! Error types shared across crates

mod app_error;
mod envelope;

pub use app_error::AppError;
pub use envelope::ResultEnvelope;
