use crate::error::TransportError;
use crate::peer::role::{CallId, Role};
use crate::peer::session::SessionHandle;
use crate::signaling::{Delivery, Rendezvous, SignalMessage, SignalTransport};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Relay signaling over a websocket, addressed by call id.
///
/// A writer task drains an unbounded queue into the socket so `send` never
/// waits on the network; a reader task parses inbound frames into the session.
pub struct RelayTransport {
    role: Role,
    outbound: mpsc::UnboundedSender<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayTransport {
    pub async fn connect(
        url: &str,
        role: Role,
        call_id: &CallId,
        handle: SessionHandle,
    ) -> Result<Self, TransportError> {
        let url = Url::parse(url)
            .map_err(|e| TransportError::Handshake(format!("invalid relay url {url}: {e}")))?;
        let (ws, _) = connect_async(url.as_str()).await?;
        let (mut sink, mut stream) = ws.split();

        let hello = Rendezvous {
            role,
            call_id: Some(call_id.clone()),
        };
        sink.send(Message::Text(serde_json::to_string(&hello)?.into()))
            .await?;
        if role == Role::Responder {
            sink.send(Message::Text(
                serde_json::to_string(&SignalMessage::Calling)?.into(),
            ))
            .await?;
        }
        info!(relay = %url, %call_id, role = role.as_wire(), "joined relay");

        let (outbound, mut queue) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(text) = queue.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %e, "relay write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => dispatch_text(&text, &handle),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "relay read failed");
                        break;
                    }
                }
            }
            debug!("relay connection ended");
            handle.transport_closed();
        });

        Ok(Self {
            role,
            outbound,
            tasks: vec![writer, reader],
        })
    }
}

fn dispatch_text(text: &str, handle: &SessionHandle) {
    match serde_json::from_str::<SignalMessage>(text) {
        Ok(message) => {
            handle.signal(message);
        }
        Err(e) => {
            if let Ok(hello) = serde_json::from_str::<Rendezvous>(text) {
                debug!(role = hello.role.as_wire(), call_id = ?hello.call_id, "relay echoed rendezvous");
                return;
            }
            let preview: String = text.chars().take(80).collect();
            handle.malformed(format!("{e}: {preview}"));
        }
    }
}

impl SignalTransport for RelayTransport {
    fn delivery(&self) -> Delivery {
        Delivery::Trickle
    }

    fn awaits_peer(&self) -> bool {
        self.role == Role::Initiator
    }

    fn send(&mut self, message: SignalMessage) -> Result<(), TransportError> {
        let text = serde_json::to_string(&message)?;
        self.outbound.send(text).map_err(|_| TransportError::Closed)
    }
}

impl Drop for RelayTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::session::SessionInput;

    #[test]
    fn inbound_frames_are_classified() {
        let (handle, mut inbox) = SessionHandle::channel();
        dispatch_text(r#"{"operation":"answer","sdp":"S2"}"#, &handle);
        dispatch_text(r#"{"role":"caller","callId":"abc"}"#, &handle);
        dispatch_text(r#"{"operation":"answer"}"#, &handle);

        assert!(matches!(
            inbox.try_recv().unwrap(),
            SessionInput::Signal(SignalMessage::Answer { sdp }) if sdp == "S2"
        ));
        assert!(matches!(inbox.try_recv().unwrap(), SessionInput::Malformed(_)));
        assert!(inbox.try_recv().is_err());
    }
}
