use crate::peer::ice::CandidateBuffer;
use crate::peer::types::SessionDescription;
use std::fmt;

/// Negotiation progress of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    /// Initiator: local offer set, waiting for the answer
    AwaitingLocalDescription,
    /// Responder: remote offer applied, answer not yet created
    AwaitingRemoteDescription,
    Stable,
    Renegotiating,
    Closed,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::AwaitingLocalDescription => "awaiting-local-description",
            NegotiationState::AwaitingRemoteDescription => "awaiting-remote-description",
            NegotiationState::Stable => "stable",
            NegotiationState::Renegotiating => "renegotiating",
            NegotiationState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a session reached `Closed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Explicit close by the owner of the session
    Local,
    /// Connected, then lost the path
    Disconnected,
    Failed,
    /// The engine reported itself closed
    EngineClosed,
    /// Inbox dropped: nobody can drive the session anymore
    Abandoned,
    Error(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Local => f.write_str("closed locally"),
            CloseReason::Disconnected => f.write_str("peer disconnected"),
            CloseReason::Failed => f.write_str("connection failed"),
            CloseReason::EngineClosed => f.write_str("peer connection closed"),
            CloseReason::Abandoned => f.write_str("session abandoned"),
            CloseReason::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Who started a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOrigin {
    /// Offer/answer exchanged with the peer
    Negotiated,
    /// Local re-offer by the trickle loop; its description never leaves this endpoint
    Trickle,
}

/// One offer/answer exchange with its candidates
#[derive(Debug, Clone)]
pub struct NegotiationRound {
    pub id: u64,
    pub origin: RoundOrigin,
    pub local: Option<SessionDescription>,
    pub remote: Option<SessionDescription>,
    pub buffer: CandidateBuffer,
}

impl NegotiationRound {
    pub fn new(forward_local: bool) -> Self {
        Self {
            id: 0,
            origin: RoundOrigin::Negotiated,
            local: None,
            remote: None,
            buffer: CandidateBuffer::new(forward_local),
        }
    }

    /// Round started by an incoming renegotiation offer. Nothing from the old
    /// round carries over.
    pub fn supersede(&self) -> Self {
        Self {
            id: self.id + 1,
            origin: RoundOrigin::Negotiated,
            local: None,
            remote: None,
            buffer: self.buffer.reset(),
        }
    }

    /// Round started by the trickle loop. The remote description stays in place
    /// because it is never exchanged again.
    pub fn next_trickle(&self) -> Self {
        Self {
            id: self.id + 1,
            origin: RoundOrigin::Trickle,
            local: None,
            remote: self.remote.clone(),
            buffer: self.buffer.carry_over(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::types::IceCandidate;

    #[test]
    fn supersede_requires_a_new_remote_description() {
        let mut round = NegotiationRound::new(true);
        round.remote = Some(SessionDescription::offer("v=0"));
        round.buffer.flush_remote();

        let next = round.supersede();
        assert_eq!(next.id, 1);
        assert!(next.remote.is_none());
        assert!(!next.buffer.remote_applied());
        assert_eq!(next.origin, RoundOrigin::Negotiated);
    }

    #[test]
    fn trickle_round_keeps_remote_description() {
        let mut round = NegotiationRound::new(true);
        round.remote = Some(SessionDescription::answer("v=0"));
        round.buffer.flush_remote();
        round.buffer.record_remote(IceCandidate::new("late"));

        let next = round.next_trickle();
        assert_eq!(next.remote, round.remote);
        assert!(next.buffer.remote_applied());
        assert!(next.local.is_none());
        assert_eq!(next.origin, RoundOrigin::Trickle);
        // a renegotiation offer after a trickle round is exchanged again
        assert_eq!(next.supersede().origin, RoundOrigin::Negotiated);
    }
}
