use crate::error::BlankCallId;
use crate::utils::random_id;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the offer/answer exchange this endpoint plays. Fixed for the
/// whole session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "caller")]
    Initiator,
    #[serde(rename = "callee")]
    Responder,
}

impl Role {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Role::Initiator => "caller",
            Role::Responder => "callee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => f.write_str("initiator"),
            Role::Responder => f.write_str("responder"),
        }
    }
}

/// Opaque token scoping which two endpoints meet. Never blank, also when it
/// arrives off the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CallId(String);

impl CallId {
    /// `None` for blank input
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn mint() -> Self {
        Self(random_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CallId {
    type Error = BlankCallId;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(BlankCallId)
    }
}

impl From<CallId> for String {
    fn from(id: CallId) -> Self {
        id.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub role: Role,
    pub call_id: CallId,
    /// True when the id was created here and still has to be published
    pub minted: bool,
}

/// An inbound identifier means someone already published a call: answer it.
/// Otherwise start one under a fresh identifier.
pub fn resolve_role(incoming: Option<CallId>) -> Resolution {
    match incoming {
        Some(call_id) => Resolution {
            role: Role::Responder,
            call_id,
            minted: false,
        },
        None => Resolution {
            role: Role::Initiator,
            call_id: CallId::mint(),
            minted: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_identifier_makes_initiator() {
        let resolution = resolve_role(None);
        assert_eq!(resolution.role, Role::Initiator);
        assert!(resolution.minted);
        assert_eq!(resolution.call_id.as_str().len(), 16);
    }

    #[test]
    fn published_identifier_makes_responder() {
        let a = resolve_role(None);
        let b = resolve_role(Some(a.call_id.clone()));
        assert_eq!(a.role, Role::Initiator);
        assert_eq!(b.role, Role::Responder);
        assert_eq!(b.call_id, a.call_id);
        assert!(!b.minted);
    }

    #[test]
    fn blank_identifier_is_absent() {
        assert_eq!(CallId::new("   "), None);
        assert_eq!(CallId::new(" abc ").map(|c| c.to_string()), Some("abc".into()));
    }

    #[test]
    fn wire_call_id_is_trimmed_and_never_blank() {
        let id: CallId = serde_json::from_str("\" room-7 \"").unwrap();
        assert_eq!(id.as_str(), "room-7");
        assert!(serde_json::from_str::<CallId>("\"\"").is_err());
        assert!(serde_json::from_str::<CallId>("\"  \"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"room-7\"");
    }

    #[test]
    fn wire_names() {
        assert_eq!(serde_json::to_string(&Role::Initiator).unwrap(), "\"caller\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"callee\"").unwrap(),
            Role::Responder
        );
    }
}
