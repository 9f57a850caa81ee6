use crate::config::SessionConfig;
use crate::error::{EngineError, SignalingError, TransportError, WaitKind};
use crate::logger::{analyze_candidates, dump_candidate};
use crate::peer::engine::{ConnectionEngine, EngineEvent};
use crate::peer::events::Emitter;
use crate::peer::ice::{LocalDisposition, RemoteDisposition};
use crate::peer::role::{CallId, Role};
use crate::peer::state::{CloseReason, NegotiationRound, NegotiationState, RoundOrigin};
use crate::peer::trickle::{TrickleAction, TrickleLoop};
use crate::peer::types::{ConnectionBundle, IceCandidate, PeerState, SdpKind, SessionDescription};
use crate::signaling::{Delivery, SignalMessage, SignalTransport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

/// Everything that can drive a session, delivered one at a time
#[derive(Debug)]
pub enum SessionInput {
    Signal(SignalMessage),
    Bundle(ConnectionBundle),
    /// Inbound frame that could not be parsed
    Malformed(String),
    Engine(EngineEvent),
    TransportClosed,
    Close,
}

/// Cloneable entry point into a session's event queue. Pushing never blocks;
/// it returns false once the session is gone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl SessionHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, input: SessionInput) -> bool {
        self.tx.send(input).is_ok()
    }

    pub fn signal(&self, message: SignalMessage) -> bool {
        self.push(SessionInput::Signal(message))
    }

    pub fn bundle(&self, bundle: ConnectionBundle) -> bool {
        self.push(SessionInput::Bundle(bundle))
    }

    pub fn malformed(&self, reason: impl Into<String>) -> bool {
        self.push(SessionInput::Malformed(reason.into()))
    }

    pub fn engine(&self, evt: EngineEvent) -> bool {
        self.push(SessionInput::Engine(evt))
    }

    pub fn transport_closed(&self) -> bool {
        self.push(SessionInput::TransportClosed)
    }

    pub fn close(&self) -> bool {
        self.push(SessionInput::Close)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub role: Role,
    pub call_id: CallId,
    pub reason: CloseReason,
    pub rounds: u64,
    pub trickle_iterations: u64,
}

enum Step {
    Input(Option<SessionInput>),
    Timer,
}

/// One signaling session between two endpoints.
///
/// All state lives here and is only touched from [`run`](Self::run), which
/// handles one input at a time; each handler awaits at most the engine call it
/// needs before the next input is taken. No locks are involved, and any number
/// of sessions can run side by side.
pub struct NegotiationSession {
    role: Role,
    call_id: CallId,
    config: SessionConfig,
    state: NegotiationState,
    round: NegotiationRound,
    trickle: TrickleLoop,
    engine: Arc<dyn ConnectionEngine>,
    transport: Box<dyn SignalTransport>,
    inbox: mpsc::UnboundedReceiver<SessionInput>,
    events: Emitter,
    was_connected: bool,
    transport_open: bool,
    answer_deadline: Option<Instant>,
    gathering_deadline: Option<Instant>,
    close_reason: Option<CloseReason>,
}

impl NegotiationSession {
    pub fn create(
        role: Role,
        call_id: CallId,
        mut config: SessionConfig,
        engine: Arc<dyn ConnectionEngine>,
        transport: Box<dyn SignalTransport>,
        inbox: mpsc::UnboundedReceiver<SessionInput>,
        events: Emitter,
    ) -> Self {
        let forward_local = transport.delivery() == Delivery::Trickle;
        if !forward_local && config.trickle {
            debug!("batch transport cannot carry trickle rounds, disabling the loop");
            config.trickle = false;
        }
        let trickle = TrickleLoop::new(config.trickle_interval(), config.gathering_timeout());
        Self {
            role,
            call_id,
            config,
            state: NegotiationState::Idle,
            round: NegotiationRound::new(forward_local),
            trickle,
            engine,
            transport,
            inbox,
            events,
            was_connected: false,
            transport_open: true,
            answer_deadline: None,
            gathering_deadline: None,
            close_reason: None,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    pub fn round(&self) -> &NegotiationRound {
        &self.round
    }

    /// Drives the session until it closes. A fatal error closes it first and is
    /// then returned.
    pub async fn run(mut self) -> Result<SessionSummary, SignalingError> {
        info!(role = %self.role, call_id = %self.call_id, "negotiation session started");
        match self.drive().await {
            Ok(()) => Ok(self.summary()),
            Err(e) => {
                error!(error = %e, state = %self.state, "negotiation failed");
                self.close(CloseReason::Error(e.to_string())).await;
                Err(e)
            }
        }
    }

    /// Tear down a session that will not be run (or stop one from outside `run`).
    pub async fn dispose(mut self) -> SessionSummary {
        self.close(CloseReason::Local).await;
        self.summary()
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            role: self.role,
            call_id: self.call_id.clone(),
            reason: self.close_reason.clone().unwrap_or(CloseReason::Local),
            rounds: self.round.id + 1,
            trickle_iterations: self.trickle.iterations(),
        }
    }

    async fn drive(&mut self) -> Result<(), SignalingError> {
        self.start().await?;
        while self.state != NegotiationState::Closed {
            let wake = self.next_wake();
            let step = tokio::select! {
                input = self.inbox.recv() => Step::Input(input),
                _ = sleep_until_opt(wake) => Step::Timer,
            };
            match step {
                Step::Input(Some(input)) => self.handle(input).await?,
                Step::Input(None) => self.close(CloseReason::Abandoned).await,
                Step::Timer => self.on_timer().await?,
            }
        }
        Ok(())
    }

    async fn start(&mut self) -> Result<(), SignalingError> {
        match self.role {
            Role::Initiator if !self.transport.awaits_peer() => self.begin_offer().await,
            Role::Initiator => {
                info!("waiting for the callee to join");
                Ok(())
            }
            Role::Responder => {
                info!("waiting for an offer");
                Ok(())
            }
        }
    }

    fn transition(&mut self, next: NegotiationState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, round = self.round.id, "state transition");
            self.state = next;
        }
    }

    async fn handle(&mut self, input: SessionInput) -> Result<(), SignalingError> {
        match input {
            SessionInput::Signal(message) => self.on_signal(message).await,
            SessionInput::Bundle(bundle) => self.on_bundle(bundle).await,
            SessionInput::Malformed(reason) => {
                warn!(%reason, "dropping malformed signaling message");
                self.events.emit_warning(format!("malformed message: {reason}"));
                Ok(())
            }
            SessionInput::Engine(evt) => self.on_engine_event(evt).await,
            SessionInput::TransportClosed => self.on_transport_closed(),
            SessionInput::Close => {
                self.close(CloseReason::Local).await;
                Ok(())
            }
        }
    }

    async fn on_signal(&mut self, message: SignalMessage) -> Result<(), SignalingError> {
        trace!(operation = message.operation(), "signal received");
        match message {
            SignalMessage::Calling => self.on_peer_ready().await,
            SignalMessage::Offer { sdp } => self.on_remote_offer(SessionDescription::offer(sdp)).await,
            SignalMessage::Answer { sdp } => {
                self.on_remote_answer(SessionDescription::answer(sdp)).await
            }
            SignalMessage::IceCandidate(candidate) => {
                self.on_remote_candidate(candidate).await;
                Ok(())
            }
        }
    }

    async fn on_bundle(&mut self, bundle: ConnectionBundle) -> Result<(), SignalingError> {
        if bundle.sdp_payload.id != self.call_id.as_str() {
            warn!(
                expected = %self.call_id,
                got = %bundle.sdp_payload.id,
                "bundle belongs to another call, dropping"
            );
            self.events
                .emit_warning(format!("bundle for call {} ignored", bundle.sdp_payload.id));
            return Ok(());
        }
        let ConnectionBundle {
            sdp_payload,
            ice_candidates,
        } = bundle;
        info!(
            kind = %sdp_payload.sdp.kind,
            candidates = ice_candidates.len(),
            "applying remote bundle"
        );
        match sdp_payload.sdp.kind {
            SdpKind::Offer => self.on_remote_offer(sdp_payload.sdp).await?,
            SdpKind::Answer => self.on_remote_answer(sdp_payload.sdp).await?,
        }
        for candidate in ice_candidates {
            self.on_remote_candidate(candidate).await;
        }
        Ok(())
    }

    async fn on_peer_ready(&mut self) -> Result<(), SignalingError> {
        if self.role == Role::Initiator && self.state == NegotiationState::Idle {
            info!("callee joined, offering");
            self.begin_offer().await
        } else {
            debug!(state = %self.state, role = %self.role, "ignoring calling signal");
            Ok(())
        }
    }

    /// Idle → AwaitingLocalDescription
    async fn begin_offer(&mut self) -> Result<(), SignalingError> {
        let offer = self.engine.create_offer().await?;
        self.engine.set_local_description(&offer).await?;
        self.round.local = Some(offer.clone());
        self.round.buffer.begin_gathering();
        self.transition(NegotiationState::AwaitingLocalDescription);
        self.events.emit_local_description(SdpKind::Offer);
        match self.transport.delivery() {
            Delivery::Trickle => {
                self.transport.send(SignalMessage::from_description(&offer))?;
                self.arm_answer_deadline();
            }
            Delivery::Batch => self.arm_gathering_deadline(),
        }
        Ok(())
    }

    async fn on_remote_offer(&mut self, offer: SessionDescription) -> Result<(), SignalingError> {
        if self.role == Role::Initiator {
            // this side owns every offer; the peer offering back is glare
            warn!(state = %self.state, "offer received by the initiator, ignoring");
            self.events
                .emit_warning("ignored offer: this endpoint initiates the call");
            return Ok(());
        }
        match self.state {
            NegotiationState::Idle => {}
            NegotiationState::Stable => {
                info!("renegotiation offer received");
                self.transition(NegotiationState::Renegotiating);
                self.round = self.round.supersede();
            }
            NegotiationState::Closed => return Ok(()),
            other => {
                return Err(SignalingError::ProtocolViolation(format!(
                    "offer received while {other}"
                )))
            }
        }

        self.engine.set_remote_description(&offer).await?;
        self.round.remote = Some(offer);
        if self.state == NegotiationState::Idle {
            self.transition(NegotiationState::AwaitingRemoteDescription);
        }
        self.apply_pending_candidates().await;
        self.answer_offer().await
    }

    /// AwaitingRemoteDescription / Renegotiating → Stable
    async fn answer_offer(&mut self) -> Result<(), SignalingError> {
        let answer = self.engine.create_answer().await?;
        self.engine.set_local_description(&answer).await?;
        self.round.local = Some(answer.clone());
        self.round.buffer.begin_gathering();
        self.transition(NegotiationState::Stable);
        self.events.emit_local_description(SdpKind::Answer);
        match self.transport.delivery() {
            Delivery::Trickle => self.transport.send(SignalMessage::from_description(&answer))?,
            Delivery::Batch => self.arm_gathering_deadline(),
        }
        Ok(())
    }

    /// AwaitingLocalDescription → Stable
    async fn on_remote_answer(&mut self, answer: SessionDescription) -> Result<(), SignalingError> {
        if self.state == NegotiationState::Closed {
            return Ok(());
        }
        if self.role != Role::Initiator || self.state != NegotiationState::AwaitingLocalDescription {
            return Err(SignalingError::ProtocolViolation(format!(
                "answer received by the {} while {}",
                self.role, self.state
            )));
        }
        self.engine.set_remote_description(&answer).await?;
        self.round.remote = Some(answer);
        self.answer_deadline = None;
        self.apply_pending_candidates().await;
        self.transition(NegotiationState::Stable);
        if self.was_connected {
            self.maybe_start_trickle();
        }
        Ok(())
    }

    async fn apply_pending_candidates(&mut self) {
        let pending = self.round.buffer.flush_remote();
        if !pending.is_empty() {
            debug!(count = pending.len(), "applying queued remote candidates");
        }
        for candidate in pending {
            if self.round.buffer.is_torn_down() {
                break;
            }
            self.apply_remote_candidate(candidate).await;
        }
    }

    /// Best effort: a candidate the engine rejects never fails the session.
    async fn apply_remote_candidate(&mut self, candidate: IceCandidate) {
        dump_candidate("REMOTE", &candidate);
        match self.engine.add_ice_candidate(&candidate).await {
            Ok(()) => {}
            Err(EngineError::Closed) => {
                warn!("peer connection is gone, discarding further remote candidates");
                self.events
                    .emit_warning("remote candidate arrived after teardown");
                self.round.buffer.tear_down();
            }
            Err(e) => {
                warn!(error = %e, candidate = %candidate.candidate, "failed to add remote candidate");
                self.events
                    .emit_warning(format!("remote candidate rejected: {e}"));
            }
        }
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        match self.round.buffer.record_remote(candidate) {
            RemoteDisposition::Apply(candidate) => self.apply_remote_candidate(candidate).await,
            RemoteDisposition::Queued => debug!(
                pending = self.round.buffer.pending_remote().len(),
                "remote description not set yet, queuing candidate"
            ),
            RemoteDisposition::Discarded => trace!("session torn down, dropping remote candidate"),
        }
    }

    async fn on_engine_event(&mut self, evt: EngineEvent) -> Result<(), SignalingError> {
        match evt {
            EngineEvent::LocalCandidate(candidate) => {
                self.on_local_candidate(candidate);
                Ok(())
            }
            EngineEvent::GatheringComplete => self.on_gathering_complete(),
            EngineEvent::ConnectionState(state) => {
                self.on_connection_state(state).await;
                Ok(())
            }
            EngineEvent::TrackAttached {
                track_id,
                stream_id,
            } => {
                info!(%track_id, %stream_id, "remote track attached");
                self.events.emit_remote_track(track_id, stream_id);
                Ok(())
            }
        }
    }

    fn on_local_candidate(&mut self, candidate: IceCandidate) {
        dump_candidate("LOCAL", &candidate);
        match self.round.buffer.record_local(candidate) {
            LocalDisposition::Forward(candidate) => {
                if !self.transport_open {
                    debug!("signaling channel closed, local candidate not sent");
                    return;
                }
                if let Err(e) = self.transport.send(SignalMessage::IceCandidate(candidate)) {
                    warn!(error = %e, "failed to send local candidate");
                }
            }
            LocalDisposition::Held => trace!(
                held = self.round.buffer.local_candidates().len(),
                "holding local candidate"
            ),
            LocalDisposition::Discarded => trace!("session torn down, dropping local candidate"),
        }
    }

    fn on_gathering_complete(&mut self) -> Result<(), SignalingError> {
        if self.round.local.is_none() || !self.round.buffer.mark_gathering_complete() {
            trace!(round = self.round.id, "gathering completion ignored");
            return Ok(());
        }
        let candidates = self.round.buffer.local_candidates().to_vec();
        info!(round = self.round.id, count = candidates.len(), "ICE candidate gathering completed");
        analyze_candidates(&candidates);
        self.events
            .emit_gathering_complete(self.round.id, candidates.len());
        self.gathering_deadline = None;

        if self.trickle.gathering_settled(self.round.id, Instant::now()) {
            self.transition(NegotiationState::Stable);
            return Ok(());
        }
        if self.round.origin == RoundOrigin::Trickle {
            // late completion of an expired or cancelled iteration
            debug!(round = self.round.id, "trickle round stays local");
            return Ok(());
        }
        if self.transport.delivery() == Delivery::Batch {
            let Some(local) = self.round.local.clone() else {
                return Ok(());
            };
            let bundle = ConnectionBundle::new(local, self.call_id.as_str(), candidates);
            self.transport.send_bundle(bundle)?;
            if self.role == Role::Initiator && self.state == NegotiationState::AwaitingLocalDescription {
                self.arm_answer_deadline();
            }
        }
        Ok(())
    }

    async fn on_connection_state(&mut self, state: PeerState) {
        info!(?state, "peer connection state changed");
        match state {
            PeerState::Connected => {
                self.was_connected = true;
                self.events.emit_connected();
                self.maybe_start_trickle();
            }
            PeerState::Disconnected if self.was_connected => {
                self.close(CloseReason::Disconnected).await
            }
            PeerState::Failed => self.close(CloseReason::Failed).await,
            PeerState::Closed => self.close(CloseReason::EngineClosed).await,
            _ => {}
        }
    }

    fn on_transport_closed(&mut self) -> Result<(), SignalingError> {
        self.transport_open = false;
        match self.state {
            NegotiationState::Stable | NegotiationState::Renegotiating => {
                warn!("signaling channel closed, keeping the peer connection");
                self.events.emit_warning("signaling channel closed");
                Ok(())
            }
            NegotiationState::Closed => Ok(()),
            _ => Err(TransportError::Closed.into()),
        }
    }

    /// Stable → Renegotiating is only ever started here, by the initiator.
    fn maybe_start_trickle(&mut self) {
        if self.role == Role::Initiator
            && self.config.trickle
            && self.state == NegotiationState::Stable
            && !self.trickle.is_enabled()
        {
            info!("trickle renegotiation enabled");
            self.trickle.enable(Instant::now());
        }
    }

    async fn trickle_offer(&mut self, now: Instant) -> Result<(), SignalingError> {
        if self.state != NegotiationState::Stable {
            self.trickle.postpone(now);
            return Ok(());
        }
        self.transition(NegotiationState::Renegotiating);
        let offer = self.engine.create_offer().await?;
        self.engine.set_local_description(&offer).await?;
        self.round = self.round.next_trickle();
        self.round.local = Some(offer);
        self.round.buffer.begin_gathering();
        self.trickle.iteration_started(self.round.id, Instant::now());
        self.events.emit_local_description(SdpKind::Offer);
        debug!(round = self.round.id, "trickle offer set locally");
        Ok(())
    }

    fn arm_answer_deadline(&mut self) {
        self.answer_deadline = self.config.answer_timeout().map(|t| Instant::now() + t);
    }

    fn arm_gathering_deadline(&mut self) {
        self.gathering_deadline = self.config.gathering_timeout().map(|t| Instant::now() + t);
    }

    fn next_wake(&self) -> Option<Instant> {
        [self.answer_deadline, self.gathering_deadline, self.trickle.wake_at()]
            .into_iter()
            .flatten()
            .min()
    }

    async fn on_timer(&mut self) -> Result<(), SignalingError> {
        let now = Instant::now();
        if self.answer_deadline.is_some_and(|at| at <= now) {
            return Err(SignalingError::Timeout(WaitKind::RemoteAnswer));
        }
        if self.gathering_deadline.is_some_and(|at| at <= now) {
            return Err(SignalingError::Timeout(WaitKind::Gathering));
        }
        match self.trickle.poll(now) {
            TrickleAction::Offer => self.trickle_offer(now).await?,
            TrickleAction::Expired { round } => {
                warn!(round, "trickle gathering did not complete in time, moving on");
                if self.state == NegotiationState::Renegotiating {
                    self.transition(NegotiationState::Stable);
                }
            }
            TrickleAction::Nothing => {}
        }
        Ok(())
    }

    /// Any state → Closed. Trickle is cancelled before anything else happens.
    async fn close(&mut self, reason: CloseReason) {
        if self.state == NegotiationState::Closed {
            return;
        }
        if self.trickle.cancel() {
            debug!("trickle renegotiation cancelled");
        }
        self.round.buffer.tear_down();
        self.answer_deadline = None;
        self.gathering_deadline = None;
        self.transition(NegotiationState::Closed);
        if let Err(e) = self.engine.close().await {
            warn!(error = %e, "closing peer connection failed");
        }
        info!(%reason, "negotiation session closed");
        self.events.emit_closed(reason.clone());
        self.close_reason = Some(reason);
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
