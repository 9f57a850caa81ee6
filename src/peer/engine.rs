use crate::error::EngineError;
use crate::peer::types::{IceCandidate, PeerState, SessionDescription};
use async_trait::async_trait;

/// Notifications coming out of the peer connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    LocalCandidate(IceCandidate),
    /// End of candidates for the current local description
    GatheringComplete,
    ConnectionState(PeerState),
    TrackAttached { track_id: String, stream_id: String },
}

/// The peer-connection primitive a session drives. Implementations push their
/// notifications into the session through a [`SessionHandle`](crate::peer::session::SessionHandle).
#[async_trait]
pub trait ConnectionEngine: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError>;
    async fn create_answer(&self) -> Result<SessionDescription, EngineError>;
    async fn set_local_description(&self, description: &SessionDescription) -> Result<(), EngineError>;
    async fn set_remote_description(&self, description: &SessionDescription) -> Result<(), EngineError>;
    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), EngineError>;
    async fn close(&self) -> Result<(), EngineError>;
}
