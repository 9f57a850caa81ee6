use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Scheduled(Instant),
    AwaitingGathering {
        round: u64,
        deadline: Option<Instant>,
    },
}

/// What the session should do when the loop's timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrickleAction {
    Nothing,
    /// Create and set a new local offer (never transmitted)
    Offer,
    /// The iteration for `round` never reported gathering completion
    Expired { round: u64 },
}

/// Re-offers locally after the connection is up so newly available network
/// paths surface as candidates and go out through normal forwarding.
///
/// The loop owns no task. It is a timer plus a single `enabled` flag read by the
/// session's event loop; cancelling clears both, so nothing can still be waiting
/// on gathering afterwards.
#[derive(Debug, Clone)]
pub struct TrickleLoop {
    enabled: bool,
    interval: Duration,
    gathering_timeout: Option<Duration>,
    phase: Phase,
    iterations: u64,
}

impl TrickleLoop {
    pub fn new(interval: Duration, gathering_timeout: Option<Duration>) -> Self {
        Self {
            enabled: false,
            interval,
            gathering_timeout,
            phase: Phase::Idle,
            iterations: 0,
        }
    }

    /// First iteration runs right away
    pub fn enable(&mut self, now: Instant) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.phase = Phase::Scheduled(now);
    }

    /// Returns whether the loop was running
    pub fn cancel(&mut self) -> bool {
        let was = self.enabled;
        self.enabled = false;
        self.phase = Phase::Idle;
        was
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Round whose gathering the loop is waiting for
    pub fn awaiting(&self) -> Option<u64> {
        match self.phase {
            Phase::AwaitingGathering { round, .. } if self.enabled => Some(round),
            _ => None,
        }
    }

    pub fn wake_at(&self) -> Option<Instant> {
        if !self.enabled {
            return None;
        }
        match self.phase {
            Phase::Idle => None,
            Phase::Scheduled(at) => Some(at),
            Phase::AwaitingGathering { deadline, .. } => deadline,
        }
    }

    pub fn poll(&mut self, now: Instant) -> TrickleAction {
        if !self.enabled {
            return TrickleAction::Nothing;
        }
        match self.phase {
            Phase::Scheduled(at) if at <= now => {
                self.phase = Phase::Idle;
                TrickleAction::Offer
            }
            Phase::AwaitingGathering {
                round,
                deadline: Some(deadline),
            } if deadline <= now => {
                self.iterations += 1;
                self.phase = Phase::Scheduled(now + self.interval);
                TrickleAction::Expired { round }
            }
            _ => TrickleAction::Nothing,
        }
    }

    /// Offer for `round` is set locally, gathering has begun
    pub fn iteration_started(&mut self, round: u64, now: Instant) {
        if !self.enabled {
            return;
        }
        self.phase = Phase::AwaitingGathering {
            round,
            deadline: self.gathering_timeout.map(|t| now + t),
        };
    }

    /// Gathering for `round` completed. Returns false when the loop was not
    /// waiting on that round.
    pub fn gathering_settled(&mut self, round: u64, now: Instant) -> bool {
        if self.awaiting() != Some(round) {
            return false;
        }
        self.iterations += 1;
        self.phase = Phase::Scheduled(now + self.interval);
        true
    }

    /// Try again one interval later
    pub fn postpone(&mut self, now: Instant) {
        if self.enabled {
            self.phase = Phase::Scheduled(now + self.interval);
        }
    }
}
