use crate::peer::types::IceCandidate;
use std::mem;

/// Local gathering progress for one negotiation round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gathering {
    Idle,
    Active,
    Complete,
}

/// What the caller must do with a freshly discovered local candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalDisposition {
    /// Send it to the peer now
    Forward(IceCandidate),
    /// Kept for an explicit flush (batch transports, or gathering not active)
    Held,
    Discarded,
}

/// What the caller must do with a candidate received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteDisposition {
    /// Remote description is in place, hand it to the engine
    Apply(IceCandidate),
    /// Queued until the remote description is applied
    Queued,
    Discarded,
}

/// Holds local candidates until they can be sent and remote candidates until
/// the engine can consume them.
///
/// The buffer never touches the engine or the transport itself: every operation
/// returns what the owning session has to do, so the ordering rules live in one
/// place and can be checked without a peer connection.
#[derive(Debug, Clone)]
pub struct CandidateBuffer {
    forward_local: bool,
    gathering: Gathering,
    local: Vec<IceCandidate>,
    pending_remote: Vec<IceCandidate>,
    remote_applied: bool,
    torn_down: bool,
}

impl CandidateBuffer {
    /// `forward_local` is true when a trickle transport is attached.
    pub fn new(forward_local: bool) -> Self {
        Self {
            forward_local,
            gathering: Gathering::Idle,
            local: Vec::new(),
            pending_remote: Vec::new(),
            remote_applied: false,
            torn_down: false,
        }
    }

    /// Empty buffer for a round that starts from scratch, same transport mode.
    pub fn reset(&self) -> Self {
        Self {
            torn_down: self.torn_down,
            ..Self::new(self.forward_local)
        }
    }

    /// Fresh buffer for a trickle round: local side starts over, the remote
    /// description already held by the engine stays applied.
    pub fn carry_over(&self) -> Self {
        Self {
            remote_applied: self.remote_applied,
            torn_down: self.torn_down,
            ..Self::new(self.forward_local)
        }
    }

    pub fn begin_gathering(&mut self) {
        if !self.torn_down {
            self.gathering = Gathering::Active;
        }
    }

    pub fn record_local(&mut self, candidate: IceCandidate) -> LocalDisposition {
        if self.torn_down {
            return LocalDisposition::Discarded;
        }
        self.local.push(candidate.clone());
        if self.forward_local && self.gathering == Gathering::Active {
            LocalDisposition::Forward(candidate)
        } else {
            LocalDisposition::Held
        }
    }

    pub fn record_remote(&mut self, candidate: IceCandidate) -> RemoteDisposition {
        if self.torn_down {
            return RemoteDisposition::Discarded;
        }
        if self.remote_applied {
            RemoteDisposition::Apply(candidate)
        } else {
            self.pending_remote.push(candidate);
            RemoteDisposition::Queued
        }
    }

    /// Marks the remote description applied and hands back every queued
    /// candidate in arrival order. A second call in the same round returns
    /// nothing.
    pub fn flush_remote(&mut self) -> Vec<IceCandidate> {
        if self.torn_down || self.remote_applied {
            return Vec::new();
        }
        self.remote_applied = true;
        mem::take(&mut self.pending_remote)
    }

    /// Returns true only on the call that actually completed gathering.
    pub fn mark_gathering_complete(&mut self) -> bool {
        if self.torn_down || self.gathering == Gathering::Complete {
            return false;
        }
        self.gathering = Gathering::Complete;
        true
    }

    /// After teardown every further candidate is dropped silently.
    pub fn tear_down(&mut self) {
        self.torn_down = true;
        self.pending_remote.clear();
    }

    pub fn local_candidates(&self) -> &[IceCandidate] {
        &self.local
    }

    pub fn pending_remote(&self) -> &[IceCandidate] {
        &self.pending_remote
    }

    pub fn remote_applied(&self) -> bool {
        self.remote_applied
    }

    pub fn gathering(&self) -> Gathering {
        self.gathering
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(n: usize) -> IceCandidate {
        IceCandidate::new(format!("candidate:{n} 1 udp 2122260223 10.0.0.{n} 5000{n} typ host"))
    }

    /// Runs the buffer with the description landing after `position` candidates
    /// and returns everything handed to the engine, in order.
    fn applied_with_description_at(position: usize, total: usize) -> Vec<IceCandidate> {
        let mut buffer = CandidateBuffer::new(true);
        let mut applied = Vec::new();
        for n in 0..total {
            if n == position {
                applied.extend(buffer.flush_remote());
            }
            if let RemoteDisposition::Apply(c) = buffer.record_remote(cand(n)) {
                applied.push(c);
            }
        }
        if position >= total {
            applied.extend(buffer.flush_remote());
        }
        applied
    }

    #[test]
    fn buffering_is_lossless_and_order_preserving() {
        let total = 5;
        let expected: Vec<_> = (0..total).map(cand).collect();
        for position in 0..=total {
            assert_eq!(
                applied_with_description_at(position, total),
                expected,
                "description arriving after {position} candidates"
            );
        }
    }

    #[test]
    fn second_flush_in_a_round_is_empty() {
        let mut buffer = CandidateBuffer::new(true);
        assert_eq!(buffer.record_remote(cand(1)), RemoteDisposition::Queued);
        assert_eq!(buffer.flush_remote(), vec![cand(1)]);
        assert!(buffer.flush_remote().is_empty());
        assert_eq!(buffer.record_remote(cand(2)), RemoteDisposition::Apply(cand(2)));
    }

    #[test]
    fn gathering_complete_is_idempotent() {
        let mut buffer = CandidateBuffer::new(false);
        buffer.begin_gathering();
        buffer.record_local(cand(1));
        assert!(buffer.mark_gathering_complete());
        assert!(!buffer.mark_gathering_complete());
        assert!(!buffer.mark_gathering_complete());
        assert_eq!(buffer.gathering(), Gathering::Complete);
        assert_eq!(buffer.local_candidates(), &[cand(1)]);
    }

    #[test]
    fn batch_transport_holds_local_candidates() {
        let mut buffer = CandidateBuffer::new(false);
        buffer.begin_gathering();
        assert_eq!(buffer.record_local(cand(1)), LocalDisposition::Held);
        assert_eq!(buffer.record_local(cand(2)), LocalDisposition::Held);
        assert_eq!(buffer.local_candidates().len(), 2);
    }

    #[test]
    fn duplicates_are_forwarded_twice() {
        let mut buffer = CandidateBuffer::new(true);
        buffer.begin_gathering();
        assert_eq!(buffer.record_local(cand(7)), LocalDisposition::Forward(cand(7)));
        assert_eq!(buffer.record_local(cand(7)), LocalDisposition::Forward(cand(7)));
        assert_eq!(buffer.local_candidates().len(), 2);
    }

    #[test]
    fn nothing_forwarded_before_gathering_starts() {
        let mut buffer = CandidateBuffer::new(true);
        assert_eq!(buffer.record_local(cand(1)), LocalDisposition::Held);
    }

    #[test]
    fn teardown_discards_everything() {
        let mut buffer = CandidateBuffer::new(true);
        buffer.record_remote(cand(1));
        buffer.tear_down();
        assert!(buffer.pending_remote().is_empty());
        assert!(buffer.flush_remote().is_empty());
        assert_eq!(buffer.record_remote(cand(2)), RemoteDisposition::Discarded);
        assert_eq!(buffer.record_local(cand(3)), LocalDisposition::Discarded);
        assert!(!buffer.mark_gathering_complete());
    }

    #[test]
    fn carry_over_keeps_remote_state_only() {
        let mut buffer = CandidateBuffer::new(true);
        buffer.begin_gathering();
        buffer.record_local(cand(1));
        buffer.flush_remote();
        buffer.mark_gathering_complete();

        let next = buffer.carry_over();
        assert!(next.remote_applied());
        assert_eq!(next.gathering(), Gathering::Idle);
        assert!(next.local_candidates().is_empty());
    }
}
