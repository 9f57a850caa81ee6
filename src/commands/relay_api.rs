use super::{close_on_ctrl_c, drive, start_engine, watch_events};
use crate::config::SessionConfig;
use crate::peer::events::Emitter;
use crate::peer::media::NoCapture;
use crate::peer::role::{resolve_role, CallId};
use crate::peer::session::{NegotiationSession, SessionHandle};
use crate::signaling::relay::RelayTransport;
use crate::signaling::relay_server::RelayServer;
use anyhow::Context;
use tracing::info;

/// Joins `call_id` on the relay, or opens a fresh call when none is given
pub async fn call(config: SessionConfig, relay: &str, call_id: Option<String>) -> anyhow::Result<()> {
    let resolution = resolve_role(call_id.and_then(CallId::new));
    if resolution.minted {
        println!("{}", resolution.call_id);
        eprintln!("Share the call id above with the callee.");
    }
    info!(role = %resolution.role, call_id = %resolution.call_id, %relay, "joining call");

    let (handle, inbox) = SessionHandle::channel();
    let events = Emitter::new();
    let engine = start_engine(&config, resolution.role, &NoCapture, &handle).await?;
    let transport = RelayTransport::connect(relay, resolution.role, &resolution.call_id, handle.clone())
        .await
        .with_context(|| format!("cannot reach relay {relay}"))?;
    let session = NegotiationSession::create(
        resolution.role,
        resolution.call_id,
        config,
        engine,
        Box::new(transport),
        inbox,
        events.clone(),
    );

    let helpers = vec![watch_events(&events), close_on_ctrl_c(handle)];
    drive(session, helpers).await
}

pub async fn relay_server(listen: &str) -> anyhow::Result<()> {
    let server = RelayServer::bind(listen)
        .await
        .with_context(|| format!("cannot listen on {listen}"))?;
    tokio::select! {
        res = server.run() => res?,
        _ = tokio::signal::ctrl_c() => info!("relay shutting down"),
    }
    Ok(())
}
