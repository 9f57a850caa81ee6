use std::sync::Arc;
use tracing::{debug, info};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;

/// Logs the lifecycle of the session's data channel. The channel exists so that
/// a session without capture tracks still has something to gather for.
pub fn attach_dc(dc: &Arc<RTCDataChannel>) {
    let label = dc.label().to_owned();
    info!(%label, "data channel attached");

    let open_label = label.clone();
    dc.on_open(Box::new(move || {
        info!(label = %open_label, "data channel open");
        Box::pin(async {})
    }));

    let close_label = label.clone();
    dc.on_close(Box::new(move || {
        info!(label = %close_label, "data channel closed");
        Box::pin(async {})
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        debug!(
            %label,
            bytes = msg.data.len(),
            text = msg.is_string,
            "data channel message"
        );
        Box::pin(async {})
    }));
}
