pub mod manual_api;
pub mod relay_api;
pub mod util_api;

use crate::config::SessionConfig;
use crate::error::SignalingError;
use crate::peer::connection::RtcEngine;
use crate::peer::engine::ConnectionEngine;
use crate::peer::events::{Emitter, SessionEvent};
use crate::peer::media::MediaSource;
use crate::peer::role::Role;
use crate::peer::session::{NegotiationSession, SessionHandle};
use crate::signaling::manual::dec_bundle;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Peer connection for a CLI session. Tracks are acquired before the engine
/// exists, so a capture refusal never leaves a half-built connection behind.
pub(crate) async fn start_engine(
    config: &SessionConfig,
    role: Role,
    source: &dyn MediaSource,
    handle: &SessionHandle,
) -> Result<Arc<dyn ConnectionEngine>, SignalingError> {
    let tracks = source.tracks().await?;
    let engine = RtcEngine::new_peer(config, role, tracks, handle.clone()).await?;
    Ok(Arc::new(engine))
}

/// Mirrors session events into the log until the session closes
pub(crate) fn watch_events(events: &Emitter) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::Connected) => info!("peer connected"),
                Ok(SessionEvent::Warning(msg)) => warn!("{msg}"),
                Ok(SessionEvent::RemoteTrack {
                    track_id,
                    stream_id,
                }) => info!(%track_id, %stream_id, "remote track attached"),
                Ok(SessionEvent::Closed(reason)) => {
                    info!(%reason, "session closed");
                    break;
                }
                Ok(other) => info!(event = ?other, "session progress"),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "event watcher fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub(crate) fn close_on_ctrl_c(handle: SessionHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, closing session");
            handle.close();
        }
    })
}

/// Reads pasted tokens from stdin until one decodes, then hands the bundle to
/// the session. EOF closes the session.
pub(crate) async fn paste_bundle(handle: SessionHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match dec_bundle(&line) {
                Ok(bundle) => {
                    handle.bundle(bundle);
                    return;
                }
                Err(e) => eprintln!("could not decode token ({e}), paste it again:"),
            },
            Ok(None) => {
                handle.close();
                return;
            }
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                handle.close();
                return;
            }
        }
    }
}

/// Runs the session to completion, tearing down the helper tasks afterwards
pub(crate) async fn drive(
    session: NegotiationSession,
    helpers: Vec<JoinHandle<()>>,
) -> anyhow::Result<()> {
    let result = session.run().await;
    for task in helpers {
        task.abort();
    }
    let summary = result?;
    info!(
        role = %summary.role,
        call_id = %summary.call_id,
        reason = %summary.reason,
        rounds = summary.rounds,
        trickle_iterations = summary.trickle_iterations,
        "session finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::media::LocalTrack;
    use async_trait::async_trait;

    struct DeniedCamera;

    #[async_trait]
    impl MediaSource for DeniedCamera {
        async fn tracks(&self) -> Result<Vec<LocalTrack>, SignalingError> {
            Err(SignalingError::Capture("permission denied".into()))
        }
    }

    #[tokio::test]
    async fn capture_refusal_stops_engine_start() {
        let (handle, _inbox) = SessionHandle::channel();
        let result = start_engine(
            &SessionConfig::default(),
            Role::Initiator,
            &DeniedCamera,
            &handle,
        )
        .await;
        match result {
            Err(SignalingError::Capture(msg)) => assert_eq!(msg, "permission denied"),
            Err(other) => panic!("expected a capture error, got {other}"),
            Ok(_) => panic!("engine started without tracks"),
        }
    }
}
