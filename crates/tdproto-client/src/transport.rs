//! The outbound half of a connection.

use crate::error::TransportError;
use tokio::sync::mpsc;

/// Writes encoded requests toward the peer.
///
/// Implementations enqueue and return; they must not block on I/O.
pub trait Transport: Send + Sync + 'static {
    fn write_raw(&self, text: String) -> Result<(), TransportError>;
}

/// A transport backed by an in-memory queue.
///
/// The receiving half is handed to whatever owns the real connection (a
/// writer task, a test).
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn write_raw(&self, text: String) -> Result<(), TransportError> {
        self.tx.send(text).map_err(|_| TransportError::Closed)
    }
}
