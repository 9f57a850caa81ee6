//! Ways of carrying signaling messages between the two endpoints.

pub mod manual;
pub mod message;
pub mod relay;
pub mod relay_server;

use crate::error::TransportError;
use crate::peer::types::ConnectionBundle;
pub use message::{Rendezvous, SignalMessage};

/// How local output reaches the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Every description and candidate goes out as soon as it exists
    Trickle,
    /// One bundle per round, once gathering is complete
    Batch,
}

/// Outbound half of a signaling channel. Sending never blocks the session;
/// inbound traffic is pushed into the session through its handle.
pub trait SignalTransport: Send {
    fn delivery(&self) -> Delivery;

    /// True when the initiator must wait for `{operation:"calling"}` before offering
    fn awaits_peer(&self) -> bool {
        false
    }

    fn send(&mut self, message: SignalMessage) -> Result<(), TransportError>;

    /// Default unrolls the bundle into discrete messages.
    fn send_bundle(&mut self, bundle: ConnectionBundle) -> Result<(), TransportError> {
        self.send(SignalMessage::from_description(bundle.description()))?;
        for candidate in bundle.ice_candidates {
            self.send(SignalMessage::IceCandidate(candidate))?;
        }
        Ok(())
    }
}
