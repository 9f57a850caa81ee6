#![allow(dead_code)]

use async_trait::async_trait;
use peerlink_lib::config::SessionConfig;
use peerlink_lib::error::{EngineError, SignalingError, TransportError};
use peerlink_lib::peer::{
    CallId, ConnectionEngine, Emitter, IceCandidate, NegotiationSession, Role, SessionDescription,
    SessionEvent, SessionHandle, SessionSummary,
};
use peerlink_lib::signaling::{Delivery, SignalMessage, SignalTransport};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(String),
    Close,
}

/// Scripted engine: numbered descriptions, every call recorded.
#[derive(Default)]
pub struct MockEngine {
    calls: Mutex<Vec<Call>>,
    offers: AtomicUsize,
    answers: AtomicUsize,
    /// add_ice_candidate reports the connection as gone
    pub closed: AtomicBool,
    /// add_ice_candidate refuses the candidate
    pub rejecting: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn added(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ConnectionEngine for MockEngine {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        self.record(Call::CreateOffer);
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription::offer(format!("offer-{n}")))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        self.record(Call::CreateAnswer);
        let n = self.answers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription::answer(format!("answer-{n}")))
    }

    async fn set_local_description(&self, description: &SessionDescription) -> Result<(), EngineError> {
        self.record(Call::SetLocal(description.clone()));
        Ok(())
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<(), EngineError> {
        self.record(Call::SetRemote(description.clone()));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(EngineError::Rejected(format!(
                "unknown ufrag in {}",
                candidate.candidate
            )));
        }
        self.record(Call::AddCandidate(candidate.candidate.clone()));
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.record(Call::Close);
        Ok(())
    }
}

/// In-memory trickle channel. Sent messages are recorded and, when linked,
/// delivered to the other session.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    pub sent: Arc<Mutex<Vec<SignalMessage>>>,
    peer: Arc<Mutex<Option<SessionHandle>>>,
    awaits_peer: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn awaiting_peer() -> Self {
        Self {
            awaits_peer: true,
            ..Self::default()
        }
    }

    pub fn link(&self, peer: SessionHandle) {
        *self.peer.lock().unwrap() = Some(peer);
    }

    pub fn sent(&self) -> Vec<SignalMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl SignalTransport for MemoryTransport {
    fn delivery(&self) -> Delivery {
        Delivery::Trickle
    }

    fn awaits_peer(&self) -> bool {
        self.awaits_peer
    }

    fn send(&mut self, message: SignalMessage) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(message.clone());
        if let Some(peer) = self.peer.lock().unwrap().as_ref() {
            if !peer.signal(message) {
                return Err(TransportError::Closed);
            }
        }
        Ok(())
    }
}

pub fn candidate(n: u32) -> IceCandidate {
    let mut c = IceCandidate::new(format!(
        "candidate:{n} 1 udp 2122260223 192.168.1.{n} 5000{n} typ host"
    ));
    c.sdp_mid = Some("0".into());
    c.sdp_mline_index = Some(0);
    c
}

/// A session running on its own task, plus the means to drive and observe it
pub struct Running {
    pub handle: SessionHandle,
    pub events: broadcast::Receiver<SessionEvent>,
    pub task: JoinHandle<Result<SessionSummary, SignalingError>>,
    syncs: u32,
}

impl Running {
    pub fn spawn(
        role: Role,
        call_id: &str,
        config: SessionConfig,
        engine: Arc<MockEngine>,
        transport: Box<dyn SignalTransport>,
    ) -> Self {
        let (handle, inbox) = SessionHandle::channel();
        let emitter = Emitter::new();
        let events = emitter.subscribe();
        let session = NegotiationSession::create(
            role,
            CallId::new(call_id).unwrap(),
            config,
            engine,
            transport,
            inbox,
            emitter,
        );
        let task = tokio::spawn(session.run());
        Self {
            handle,
            events,
            task,
            syncs: 0,
        }
    }

    /// Waits for the first event matching `pred`
    pub async fn wait_for(&mut self, pred: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match self.events.recv().await {
                    Ok(evt) if pred(&evt) => return evt,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(e) => panic!("event stream ended: {e}"),
                }
            }
        })
        .await
        .expect("event did not arrive")
    }

    /// Returns once every input pushed so far has been handled
    pub async fn settle(&mut self) {
        self.syncs += 1;
        let marker = format!("sync-{}", self.syncs);
        assert!(self.handle.malformed(marker.clone()));
        self.wait_for(|evt| matches!(evt, SessionEvent::Warning(w) if w.ends_with(&marker)))
            .await;
    }

    pub async fn finish(self) -> Result<SessionSummary, SignalingError> {
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("session did not finish")
            .expect("session task panicked")
    }
}
