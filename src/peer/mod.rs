pub mod connection;
pub mod data_channel;
pub mod engine;
pub mod events;
pub mod ice;
pub mod media;
pub mod role;
pub mod session;
pub mod state;
pub mod trickle;
pub mod types;

pub use engine::{ConnectionEngine, EngineEvent};
pub use events::{Emitter, SessionEvent};
pub use role::{resolve_role, CallId, Role};
pub use session::{NegotiationSession, SessionHandle, SessionInput, SessionSummary};
pub use state::{CloseReason, NegotiationState, RoundOrigin};
pub use types::{ConnectionBundle, IceCandidate, PeerState, SdpKind, SessionDescription};
