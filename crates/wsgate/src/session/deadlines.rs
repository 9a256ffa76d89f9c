//! Read and write deadlines

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline state of one session
///
/// The read deadline starts at `now + pong_wait` and is pushed forward each
/// time a pong arrives. Without a pong wait reads never time out.
#[derive(Debug)]
pub struct Deadlines {
    pong_wait: Option<Duration>,
    write_wait: Option<Duration>,
    read_deadline: Mutex<Option<Instant>>,
}

impl Deadlines {
    #[must_use]
    pub fn new(pong_wait: Option<Duration>, write_wait: Option<Duration>) -> Self {
        Self {
            pong_wait,
            write_wait,
            read_deadline: Mutex::new(pong_wait.map(|wait| Instant::now() + wait)),
        }
    }

    #[must_use]
    pub fn pong_wait(&self) -> Option<Duration> {
        self.pong_wait
    }

    #[must_use]
    pub fn write_wait(&self) -> Option<Duration> {
        self.write_wait
    }

    /// Deadline for the next blocking read
    #[must_use]
    pub fn read_deadline(&self) -> Option<Instant> {
        *self.read_deadline.lock()
    }

    /// Push the read deadline to `now + pong_wait`
    pub fn extend_read(&self) {
        if let Some(wait) = self.pong_wait {
            *self.read_deadline.lock() = Some(Instant::now() + wait);
        }
    }
}
