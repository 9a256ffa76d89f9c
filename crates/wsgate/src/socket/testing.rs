//! In-memory sockets for unit tests

use super::{open, FrameSink, FrameSource, Socket, SocketReader, SocketRole, TransportError};
use crate::protocol::Frame;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Source fed from a channel; blocks while the channel is empty
pub(crate) struct ScriptedSource {
    rx: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        match self.rx.recv().await {
            Some(result) => result,
            None => Ok(Frame::sentinel()),
        }
    }
}

/// Sink recording every written frame and close call
pub(crate) struct RecordingSink {
    written: Arc<Mutex<Vec<Frame>>>,
    closes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Protocol("write refused".to_string()));
        }
        self.written.lock().push(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A socket whose inbound frames are pushed by the test
pub(crate) struct ScriptedSocket {
    pub socket: Arc<Socket>,
    pub reader: SocketReader,
    feed: Option<mpsc::UnboundedSender<Result<Frame, TransportError>>>,
    written: Arc<Mutex<Vec<Frame>>>,
    closes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

pub(crate) fn scripted(role: SocketRole) -> ScriptedSocket {
    let (tx, rx) = mpsc::unbounded_channel();
    let written = Arc::new(Mutex::new(Vec::new()));
    let closes = Arc::new(AtomicUsize::new(0));
    let fail_writes = Arc::new(AtomicBool::new(false));

    let (socket, reader) = open(
        ScriptedSource { rx },
        RecordingSink {
            written: written.clone(),
            closes: closes.clone(),
            fail_writes: fail_writes.clone(),
        },
        role,
    );

    ScriptedSocket {
        socket,
        reader,
        feed: Some(tx),
        written,
        closes,
        fail_writes,
    }
}

impl ScriptedSocket {
    /// Queue an inbound frame
    pub fn push(&self, frame: Frame) {
        self.feeder().push(frame);
    }

    /// Queue an inbound read error
    pub fn push_error(&self, err: TransportError) {
        self.feeder().push_error(err);
    }

    /// End the inbound stream; further reads yield the sentinel
    pub fn finish(&mut self) {
        self.feed = None;
    }

    /// Handle for pushing frames after the reader has been moved away
    pub fn feeder(&self) -> Feeder {
        Feeder {
            tx: self.feed.clone().expect("script already finished"),
        }
    }

    pub fn recorder(&self) -> Recorder {
        Recorder {
            written: self.written.clone(),
            closes: self.closes.clone(),
            fail_writes: self.fail_writes.clone(),
        }
    }

    pub fn written(&self) -> Vec<Frame> {
        self.written.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Split into the parts a test hands out separately
    pub fn into_parts(self) -> (Arc<Socket>, SocketReader, Feeder, Recorder) {
        let feeder = self.feeder();
        let recorder = self.recorder();
        (self.socket, self.reader, feeder, recorder)
    }
}

/// Pushes inbound frames into a scripted socket
#[derive(Clone)]
pub(crate) struct Feeder {
    tx: mpsc::UnboundedSender<Result<Frame, TransportError>>,
}

impl Feeder {
    pub fn push(&self, frame: Frame) {
        let _ = self.tx.send(Ok(frame));
    }

    pub fn push_error(&self, err: TransportError) {
        let _ = self.tx.send(Err(err));
    }
}

/// Observes what a scripted socket wrote
#[derive(Clone)]
pub(crate) struct Recorder {
    written: Arc<Mutex<Vec<Frame>>>,
    closes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl Recorder {
    pub fn written(&self) -> Vec<Frame> {
        self.written.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}
