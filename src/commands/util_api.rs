use crate::config::{ServerConfig, SessionConfig};
use crate::error::EngineError;
use crate::peer::connection::ice_servers;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::RTCPeerConnection;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Candidate type a working server of this kind produces
fn expected_candidate(server_type: &str) -> &'static str {
    if server_type.starts_with("turn") {
        "typ relay"
    } else {
        "typ srflx"
    }
}

/// Gathers against a single server and reports whether it yielded the
/// candidate type it is supposed to.
pub async fn check_ice_server(config: &ServerConfig) -> Result<bool, EngineError> {
    let rtc_config = RTCConfiguration {
        ice_servers: ice_servers(std::slice::from_ref(config)),
        ..Default::default()
    };
    debug!(server = %config.id, urls = ?rtc_config.ice_servers[0].urls, "checking ICE server");

    let api = APIBuilder::new().build();
    let pc = Arc::new(api.new_peer_connection(rtc_config).await?);
    let available = check_via_ice_gathering(&pc, expected_candidate(&config.r#type)).await;
    let _ = pc.close().await;
    available
}

async fn check_via_ice_gathering(
    pc: &Arc<RTCPeerConnection>,
    wanted: &'static str,
) -> Result<bool, EngineError> {
    // Some(true) on a match, None when gathering ends without one
    let (tx, mut rx) = mpsc::channel::<Option<bool>>(16);
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        let tx = tx.clone();
        Box::pin(async move {
            let verdict = match cand {
                Some(c) => match c.to_json() {
                    Ok(init) if init.candidate.contains(wanted) => Some(true),
                    Ok(init) => {
                        debug!(candidate = %init.candidate, "not the candidate we want");
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "cannot serialize candidate");
                        return;
                    }
                },
                None => None,
            };
            let _ = tx.send(verdict).await;
        })
    }));

    // a data channel gives the offer something to gather for
    pc.create_data_channel("ice-check", None).await?;
    let offer = pc.create_offer(None).await?;
    pc.set_local_description(offer).await?;

    match timeout(CHECK_TIMEOUT, rx.recv()).await {
        Ok(Some(Some(found))) => Ok(found),
        Ok(Some(None)) | Ok(None) => Ok(false),
        Err(_) => {
            warn!(timeout = ?CHECK_TIMEOUT, "ICE server check timed out");
            Ok(false)
        }
    }
}

/// Probes every configured server and prints a line per server. Fails when
/// none of them works.
pub async fn check_ice(config: &SessionConfig) -> anyhow::Result<()> {
    let mut working = 0usize;
    for server in &config.ice_servers {
        let ok = match check_ice_server(server).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(server = %server.id, error = %e, "check aborted");
                false
            }
        };
        println!(
            "{:<16} {:<5} {:<40} {}",
            server.id,
            server.r#type,
            server.url,
            if ok { "ok" } else { "unreachable" }
        );
        if ok {
            working += 1;
        }
    }
    info!(working, total = config.ice_servers.len(), "ICE server check finished");
    if working == 0 {
        anyhow::bail!("no ICE server is reachable");
    }
    Ok(())
}
