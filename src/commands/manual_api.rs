use super::{close_on_ctrl_c, drive, paste_bundle, start_engine, watch_events};
use crate::config::SessionConfig;
use crate::peer::events::Emitter;
use crate::peer::media::NoCapture;
use crate::peer::role::{resolve_role, CallId};
use crate::peer::session::{NegotiationSession, SessionHandle};
use crate::signaling::manual::{dec_bundle, ManualTransport};
use anyhow::Context;
use tracing::info;

/// Manual exchange has nowhere to send trickle offers, so the loop stays off
fn manual_config(mut config: SessionConfig) -> SessionConfig {
    config.trickle = false;
    config
}

/// Creates a call, prints the offer token, then waits for the pasted answer
pub async fn offer(config: SessionConfig) -> anyhow::Result<()> {
    let config = manual_config(config);
    let resolution = resolve_role(None);
    info!(call_id = %resolution.call_id, "starting call");

    let (handle, inbox) = SessionHandle::channel();
    let events = Emitter::new();
    let engine = start_engine(&config, resolution.role, &NoCapture, &handle).await?;
    let (transport, mut tokens) = ManualTransport::new();
    let session = NegotiationSession::create(
        resolution.role,
        resolution.call_id,
        config,
        engine,
        Box::new(transport),
        inbox,
        events.clone(),
    );

    let exchange = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Some(token) = tokens.recv().await {
                println!("{token}");
                eprintln!("Send the token above to the callee, then paste their answer:");
                paste_bundle(handle).await;
            }
        })
    };

    let helpers = vec![watch_events(&events), close_on_ctrl_c(handle), exchange];
    drive(session, helpers).await
}

/// Answers a pasted offer token and prints the answer token
pub async fn answer(config: SessionConfig, token: &str) -> anyhow::Result<()> {
    let config = manual_config(config);
    let bundle = dec_bundle(token).context("offer token is not a valid bundle")?;
    let call_id = CallId::new(&bundle.sdp_payload.id).context("offer token has no call id")?;
    let resolution = resolve_role(Some(call_id));
    info!(call_id = %resolution.call_id, "answering call");

    let (handle, inbox) = SessionHandle::channel();
    let events = Emitter::new();
    let engine = start_engine(&config, resolution.role, &NoCapture, &handle).await?;
    let (transport, mut tokens) = ManualTransport::new();
    let session = NegotiationSession::create(
        resolution.role,
        resolution.call_id,
        config,
        engine,
        Box::new(transport),
        inbox,
        events.clone(),
    );
    handle.bundle(bundle);

    let printer = tokio::spawn(async move {
        if let Some(token) = tokens.recv().await {
            println!("{token}");
            eprintln!("Send the token above back to the caller.");
        }
    });

    let helpers = vec![watch_events(&events), close_on_ctrl_c(handle), printer];
    drive(session, helpers).await
}
