//! Delivery of server notifications to players.
//!
//! The match driver never talks to a socket. It pushes [`Notification`]s
//! through a [`PlayerObserver`], and a failed delivery marks the player
//! disconnected instead of aborting whatever transition was in flight.

use shared::Notification;
use tokio::sync::mpsc;

#[derive(Debug)]
pub struct DeliveryError;

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification channel closed")
    }
}

impl std::error::Error for DeliveryError {}

pub trait PlayerObserver: Send {
    fn deliver(&self, note: Notification) -> Result<(), DeliveryError>;

    /// Liveness probe used by the disconnection monitor.
    fn is_connected(&self) -> bool;
}

/// Observer backed by an unbounded channel; the transport (or a test)
/// drains the receiving end.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PlayerObserver for ChannelObserver {
    fn deliver(&self, note: Notification) -> Result<(), DeliveryError> {
        self.tx.send(note).map_err(|_| DeliveryError)
    }

    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}
