//! Outward notifications to the debugger front end.

use tokio::sync::mpsc;
use tracing::warn;

use crate::dap::{StopReason, StoppedEventBody};

/// Receives session notifications.
pub trait EventSink {
    /// Called exactly once per `Running -> Paused` transition.
    fn notify_stopped(&mut self, reason: StopReason, thread_id: i64);
}

/// Sink that forwards `stopped` bodies over a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StoppedEventBody>,
}

impl ChannelSink {
    /// Create a sink and the receiver a front end reads from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StoppedEventBody>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn notify_stopped(&mut self, reason: StopReason, thread_id: i64) {
        if self
            .tx
            .send(StoppedEventBody::new(reason, thread_id))
            .is_err()
        {
            warn!("stopped event dropped: front end receiver closed");
        }
    }
}
