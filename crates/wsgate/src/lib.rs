//! # wsgate
//!
//! WebSocket session relay and lifecycle manager: admission control, bounded
//! upgrades, keepalive, ordered message pumps and duplex forwarding.

pub mod admission;
pub mod handlers;
pub mod keepalive;
pub mod protocol;
pub mod pump;
pub mod relay;
pub mod server;
pub mod session;
pub mod socket;
pub mod upgrade;

pub use server::run;
