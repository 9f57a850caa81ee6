use crate::error::{CodecError, TransportError};
use crate::peer::types::ConnectionBundle;
use crate::signaling::{Delivery, SignalMessage, SignalTransport};
use base64::{engine::general_purpose, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{Read, Write};
use tokio::sync::mpsc;
use tracing::info;

/// JSON → gzip → url-safe base64, so the token survives being a link fragment.
pub fn enc_bundle(bundle: &ConnectionBundle) -> Result<String, CodecError> {
    let json = serde_json::to_vec(bundle)?;
    let mut gz = GzEncoder::new(Vec::new(), Compression::fast());
    gz.write_all(&json)?;
    let compressed = gz.finish()?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(compressed))
}

/// Accepts a bare token, `#token`, or a whole link whose fragment is the token.
pub fn dec_bundle(s: &str) -> Result<ConnectionBundle, CodecError> {
    let token = s.rsplit('#').next().unwrap_or(s);
    let token: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    if token.is_empty() {
        return Err(CodecError::Empty);
    }
    let compressed = general_purpose::URL_SAFE_NO_PAD.decode(token.trim_end_matches('='))?;
    let mut gz = GzDecoder::new(&compressed[..]);
    let mut json = Vec::new();
    gz.read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Copy/paste exchange: each round produces one encoded token for a human to
/// carry to the other side.
pub struct ManualTransport {
    tokens: mpsc::UnboundedSender<String>,
}

impl ManualTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tokens, rx) = mpsc::unbounded_channel();
        (Self { tokens }, rx)
    }
}

impl SignalTransport for ManualTransport {
    fn delivery(&self) -> Delivery {
        Delivery::Batch
    }

    fn send(&mut self, _message: SignalMessage) -> Result<(), TransportError> {
        Err(TransportError::Unsupported(
            "manual exchange carries whole bundles only",
        ))
    }

    fn send_bundle(&mut self, bundle: ConnectionBundle) -> Result<(), TransportError> {
        let token = enc_bundle(&bundle)?;
        info!(
            kind = %bundle.description().kind,
            candidates = bundle.ice_candidates.len(),
            encoded_len = token.len(),
            "bundle ready"
        );
        self.tokens.send(token).map_err(|_| TransportError::Closed)
    }
}
