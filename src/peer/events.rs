use crate::peer::state::CloseReason;
use crate::peer::types::SdpKind;
use tokio::sync::broadcast;
use tracing::debug;

/// Observable progress of a session, for whatever UI sits on top
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LocalDescriptionReady { kind: SdpKind },
    GatheringComplete { round: u64, candidates: usize },
    RemoteTrack { track_id: String, stream_id: String },
    Connected,
    Warning(String),
    Closed(CloseReason),
}

/// Fan-out of [`SessionEvent`]s. Observers never call back into the session.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    fn emit(&self, evt: SessionEvent) {
        debug!(event = ?evt, "emit");
        // no subscribers is fine
        let _ = self.tx.send(evt);
    }

    pub fn emit_local_description(&self, kind: SdpKind) {
        self.emit(SessionEvent::LocalDescriptionReady { kind });
    }

    pub fn emit_gathering_complete(&self, round: u64, candidates: usize) {
        self.emit(SessionEvent::GatheringComplete { round, candidates });
    }

    pub fn emit_remote_track(&self, track_id: String, stream_id: String) {
        self.emit(SessionEvent::RemoteTrack {
            track_id,
            stream_id,
        });
    }

    pub fn emit_connected(&self) {
        self.emit(SessionEvent::Connected);
    }

    pub fn emit_warning(&self, msg: impl Into<String>) {
        self.emit(SessionEvent::Warning(msg.into()));
    }

    pub fn emit_closed(&self, reason: CloseReason) {
        self.emit(SessionEvent::Closed(reason));
    }
}
