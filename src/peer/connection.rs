use crate::config::{ServerConfig, SessionConfig};
use crate::error::{EngineError, SignalingError};
use crate::peer::data_channel::attach_dc;
use crate::peer::engine::{ConnectionEngine, EngineEvent};
use crate::peer::media::LocalTrack;
use crate::peer::role::Role;
use crate::peer::session::SessionHandle;
use crate::peer::types::{IceCandidate, PeerState, SdpKind, SessionDescription};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;
use webrtc::{
    api::APIBuilder,
    data_channel::{data_channel_init::RTCDataChannelInit, RTCDataChannel},
    ice_transport::ice_server::RTCIceServer,
    peer_connection::{
        configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
        sdp::session_description::RTCSessionDescription, RTCPeerConnection,
    },
};

impl From<webrtc::Error> for EngineError {
    fn from(e: webrtc::Error) -> Self {
        match e {
            webrtc::Error::ErrConnectionClosed => EngineError::Closed,
            other => EngineError::Rejected(other.to_string()),
        }
    }
}

/// [`ConnectionEngine`] backed by a `webrtc` peer connection
pub struct RtcEngine {
    pc: Arc<RTCPeerConnection>,
    _data_channel: Option<Arc<RTCDataChannel>>,
}

impl RtcEngine {
    /// Builds the peer connection and wires its callbacks into `handle`. The
    /// initiator creates the data channel; the responder picks it up.
    pub async fn new_peer(
        config: &SessionConfig,
        role: Role,
        tracks: Vec<LocalTrack>,
        handle: SessionHandle,
    ) -> Result<Self, SignalingError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(EngineError::from)?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(EngineError::from)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(rtc_config(&config.ice_servers))
                .await
                .map_err(EngineError::from)?,
        );

        let candidates = handle.clone();
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            let handle = candidates.clone();
            Box::pin(async move {
                match cand {
                    Some(c) => match c.to_json() {
                        Ok(init) => {
                            handle.engine(EngineEvent::LocalCandidate(IceCandidate {
                                candidate: init.candidate,
                                sdp_mid: init.sdp_mid,
                                sdp_mline_index: init.sdp_mline_index,
                                username_fragment: init.username_fragment,
                            }));
                        }
                        Err(e) => warn!(error = %e, "cannot serialize local candidate"),
                    },
                    // None marks the end of gathering
                    None => {
                        handle.engine(EngineEvent::GatheringComplete);
                    }
                }
            })
        }));

        pc.on_ice_gathering_state_change(Box::new(move |state| {
            debug!(?state, "ICE gathering state changed");
            Box::pin(async {})
        }));

        let states = handle.clone();
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            states.engine(EngineEvent::ConnectionState(peer_state(st)));
            Box::pin(async {})
        }));

        let remote_tracks = handle.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                remote_tracks.engine(EngineEvent::TrackAttached {
                    track_id: track.id(),
                    stream_id: track.stream_id(),
                });
                Box::pin(async {})
            },
        ));

        for track in tracks {
            pc.add_track(track).await.map_err(EngineError::from)?;
        }

        let data_channel = match (&config.data_channel_label, role) {
            (Some(label), Role::Initiator) => {
                let dc = pc
                    .create_data_channel(label, Some(RTCDataChannelInit::default()))
                    .await
                    .map_err(EngineError::from)?;
                attach_dc(&dc);
                Some(dc)
            }
            (Some(_), Role::Responder) => {
                pc.on_data_channel(Box::new(|dc: Arc<RTCDataChannel>| {
                    attach_dc(&dc);
                    Box::pin(async {})
                }));
                None
            }
            (None, _) => None,
        };

        Ok(Self {
            pc,
            _data_channel: data_channel,
        })
    }
}

fn peer_state(st: RTCPeerConnectionState) -> PeerState {
    match st {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => PeerState::New,
        RTCPeerConnectionState::Connecting => PeerState::Connecting,
        RTCPeerConnectionState::Connected => PeerState::Connected,
        RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
        RTCPeerConnectionState::Failed => PeerState::Failed,
        RTCPeerConnectionState::Closed => PeerState::Closed,
    }
}

fn to_rtc(description: &SessionDescription) -> Result<RTCSessionDescription, EngineError> {
    let rtc = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp.clone())?,
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp.clone())?,
    };
    Ok(rtc)
}

#[async_trait]
impl ConnectionEngine for RtcEngine {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        let offer = self.pc.create_offer(None).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        let answer = self.pc.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: &SessionDescription) -> Result<(), EngineError> {
        self.pc.set_local_description(to_rtc(description)?).await?;
        Ok(())
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<(), EngineError> {
        self.pc.set_remote_description(to_rtc(description)?).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), EngineError> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate.clone(),
                sdp_mid: candidate.sdp_mid.clone(),
                sdp_mline_index: candidate.sdp_mline_index,
                username_fragment: candidate.username_fragment.clone(),
            })
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.pc.close().await?;
        Ok(())
    }
}

/// Peer connection configuration for the configured ICE servers
pub fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice_servers(servers),
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

pub fn ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_ice_servers;

    #[test]
    fn ice_servers_get_schemes_and_credentials() {
        let servers = vec![ServerConfig {
            id: "relay".into(),
            r#type: "turn".into(),
            url: "turn.example.org:3478".into(),
            username: Some("user".into()),
            credential: Some("secret".into()),
        }];
        let rtc = ice_servers(&servers);
        assert_eq!(rtc[0].urls, vec!["turn:turn.example.org:3478".to_string()]);
        assert_eq!(rtc[0].username, "user");
        assert_eq!(rtc[0].credential, "secret");
    }

    #[test]
    fn default_config_uses_bundle_policies() {
        let config = rtc_config(&default_ice_servers());
        assert_eq!(config.ice_servers.len(), 2);
        assert_eq!(config.bundle_policy, RTCBundlePolicy::MaxBundle);
        assert_eq!(config.rtcp_mux_policy, RTCRtcpMuxPolicy::Require);
    }

    #[test]
    fn closed_connection_maps_to_closed() {
        assert!(matches!(
            EngineError::from(webrtc::Error::ErrConnectionClosed),
            EngineError::Closed
        ));
    }
}
