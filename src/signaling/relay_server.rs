use crate::error::TransportError;
use crate::peer::role::{CallId, Role};
use crate::signaling::Rendezvous;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

type Outbox = mpsc::UnboundedSender<String>;

/// Frames held for a peer that has not joined yet; anything past this is dropped
pub const MAX_BACKLOG: usize = 256;

/// Both ends of one call. Frames for a side that has not joined yet wait in
/// its backlog.
#[derive(Default)]
struct CallSlot {
    caller: Option<Outbox>,
    callee: Option<Outbox>,
    to_caller: Vec<String>,
    to_callee: Vec<String>,
}

impl CallSlot {
    fn outbox(&mut self, role: Role) -> &mut Option<Outbox> {
        match role {
            Role::Initiator => &mut self.caller,
            Role::Responder => &mut self.callee,
        }
    }

    fn backlog(&mut self, role: Role) -> &mut Vec<String> {
        match role {
            Role::Initiator => &mut self.to_caller,
            Role::Responder => &mut self.to_callee,
        }
    }

    fn is_empty(&self) -> bool {
        self.caller.is_none() && self.callee.is_none()
    }
}

type Calls = Arc<Mutex<HashMap<CallId, CallSlot>>>;

fn peer_of(role: Role) -> Role {
    match role {
        Role::Initiator => Role::Responder,
        Role::Responder => Role::Initiator,
    }
}

/// Minimal rendezvous relay: pairs one caller and one callee per call id and
/// forwards their text frames verbatim.
pub struct RelayServer {
    listener: TcpListener,
    calls: Calls,
}

impl RelayServer {
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            calls: Arc::default(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> io::Result<()> {
        info!(addr = %self.listener.local_addr()?, "relay listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let calls = self.calls.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_peer(stream, calls).await {
                    warn!(%peer, error = %e, "relay peer dropped");
                }
            });
        }
    }
}

async fn serve_peer(stream: TcpStream, calls: Calls) -> Result<(), TransportError> {
    let ws = accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();

    let hello: Rendezvous = loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                break serde_json::from_str(&text)
                    .map_err(|e| TransportError::Handshake(format!("bad rendezvous: {e}")))?
            }
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    };
    let role = hello.role;
    let call_id = match hello.call_id {
        Some(id) => id,
        None if role == Role::Initiator => {
            let id = CallId::mint();
            let reply = Rendezvous {
                role,
                call_id: Some(id.clone()),
            };
            sink.send(Message::Text(serde_json::to_string(&reply)?.into()))
                .await?;
            id
        }
        None => {
            return Err(TransportError::Handshake(
                "callee must name the call it joins".into(),
            ))
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    {
        let mut calls = calls.lock().await;
        let slot = calls.entry(call_id.clone()).or_default();
        if slot.outbox(role).is_some() {
            return Err(TransportError::Handshake(format!(
                "call {call_id} already has a {}",
                role.as_wire()
            )));
        }
        for text in slot.backlog(role).drain(..) {
            let _ = tx.send(text);
        }
        *slot.outbox(role) = Some(tx);
    }
    info!(%call_id, role = role.as_wire(), "peer joined");

    let result = loop {
        tokio::select! {
            out = rx.recv() => match out {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        break Err(e.into());
                    }
                }
                None => break Ok(()),
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    forward(&calls, &call_id, peer_of(role), text.to_string()).await;
                }
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
            },
        }
    };

    {
        let mut calls = calls.lock().await;
        if let Some(slot) = calls.get_mut(&call_id) {
            *slot.outbox(role) = None;
            slot.backlog(role).clear();
            if slot.is_empty() {
                calls.remove(&call_id);
            }
        }
    }
    info!(%call_id, role = role.as_wire(), "peer left");
    result
}

async fn forward(calls: &Calls, call_id: &CallId, to: Role, text: String) {
    let mut calls = calls.lock().await;
    let Some(slot) = calls.get_mut(call_id) else {
        return;
    };
    let undelivered = match slot.outbox(to) {
        Some(outbox) => outbox.send(text).err().map(|e| e.0),
        None => Some(text),
    };
    if let Some(text) = undelivered {
        let backlog = slot.backlog(to);
        if backlog.len() >= MAX_BACKLOG {
            warn!(%call_id, to = to.as_wire(), "backlog full, dropping frame");
            return;
        }
        debug!(%call_id, to = to.as_wire(), "peer not here yet, holding frame");
        backlog.push(text);
    }
}
