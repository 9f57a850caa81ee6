use crate::error::SignalingError;
use async_trait::async_trait;
use std::sync::Arc;
use webrtc::track::track_local::TrackLocal;

pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

/// Supplies outbound tracks when a session starts. Acquisition and permission
/// failures are the source's business; they surface as [`SignalingError::Capture`].
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn tracks(&self) -> Result<Vec<LocalTrack>, SignalingError>;
}

/// No capture devices: sessions carry only the data channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

#[async_trait]
impl MediaSource for NoCapture {
    async fn tracks(&self) -> Result<Vec<LocalTrack>, SignalingError> {
        Ok(Vec::new())
    }
}
