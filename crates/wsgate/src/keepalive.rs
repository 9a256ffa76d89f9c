//! Keepalive scheduler
//!
//! Pings the client on a fixed period. The matching pongs are consumed by
//! the client pump, which pushes the read deadline forward.

use crate::protocol::Frame;
use crate::session::Session;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::Instrument;

/// Start pinging `session` every `period`
///
/// The task stops on its own once the session has ended; the caller aborts
/// it at teardown.
pub fn spawn(session: Arc<Session>, period: Duration) -> JoinHandle<()> {
    let span = session.span().clone();

    tokio::spawn(
        async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if session.is_ended() {
                    break;
                }

                match session.send(Frame::ping(Vec::new())).await {
                    Ok(()) => tracing::trace!("Ping sent"),
                    Err(e) => tracing::debug!(error = %e, "Failed to send ping"),
                }
            }

            tracing::trace!("Keepalive stopped");
        }
        .instrument(span),
    )
}
