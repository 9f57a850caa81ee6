use crate::peer::role::{CallId, Role};
use crate::peer::types::{IceCandidate, SdpKind, SessionDescription};
use serde::{Deserialize, Serialize};

/// Signaling messages shared by every relay. One JSON object per frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum SignalMessage {
    /// Callee is connected to the relay and ready for an offer
    Calling,
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    #[serde(rename = "icecandidate")]
    IceCandidate(IceCandidate),
}

impl SignalMessage {
    pub fn from_description(description: &SessionDescription) -> Self {
        match description.kind {
            SdpKind::Offer => SignalMessage::Offer {
                sdp: description.sdp.clone(),
            },
            SdpKind::Answer => SignalMessage::Answer {
                sdp: description.sdp.clone(),
            },
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            SignalMessage::Calling => "calling",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate(_) => "icecandidate",
        }
    }
}

/// First frame on a relay connection
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Rendezvous {
    pub role: Role,
    #[serde(rename = "callId", default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
}
