//! Best-effort monitoring side channel.
//!
//! Images forwarded during topology discovery are republished here. Sending
//! never blocks; a full or closed channel just drops the frame.

use async_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, trace};

use contracts::{ImageMessage, Timestamp, Topic};

/// Republished image
#[derive(Debug, Clone)]
pub struct MonitoredImage {
    pub topic: Topic,
    pub stamp: Timestamp,
    pub image: ImageMessage,
}

/// Sending half of the monitoring channel
#[derive(Debug, Clone)]
pub struct MonitorChannel {
    tx: Sender<MonitoredImage>,
}

impl MonitorChannel {
    /// Create a channel holding at most `capacity` undelivered frames.
    pub fn bounded(capacity: usize) -> (Self, Receiver<MonitoredImage>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Publish without waiting. Returns whether the frame was queued.
    pub fn publish(&self, topic: &Topic, stamp: Timestamp, image: &ImageMessage) -> bool {
        let frame = MonitoredImage {
            topic: topic.clone(),
            stamp,
            image: image.clone(),
        };
        match self.tx.try_send(frame) {
            Ok(()) => {
                trace!(topic = %topic, %stamp, "image republished");
                true
            }
            Err(TrySendError::Full(_)) => {
                observability::record_monitor_dropped();
                trace!(topic = %topic, "monitor channel full, image dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(topic = %topic, "monitor channel closed");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
