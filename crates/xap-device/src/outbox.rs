//! Outbound message capability handed to attached devices

use tokio::sync::mpsc;
use xap_core::Message;

/// Sending half of a transport's outbound queue
///
/// Sends never block. Once the transport is gone, sends are dropped.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Message>,
}

impl Outbox {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }

    /// An outbox and the receiver its messages arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queue a message. Returns false if the transport has shut down.
    pub fn send(&self, message: impl Into<Message>) -> bool {
        self.tx.send(message.into()).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
