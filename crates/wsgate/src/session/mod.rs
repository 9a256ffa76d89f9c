//! Session management
//!
//! Per-connection state, the registry of live sessions, and the driver that
//! runs one session from start callback to teardown.

mod deadlines;
mod lifecycle;
mod options;
mod registry;
mod session;

pub use deadlines::Deadlines;
pub use lifecycle::{serve, SessionGuard};
pub(crate) use lifecycle::TeardownGuard;
pub use options::SessionOptions;
pub use registry::SessionRegistry;
pub use session::{BizTag, Session, SessionState};
