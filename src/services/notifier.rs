//! Outbound channel to the presentation layer.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::types::event::ShellEvent;

pub trait ShellNotifier: Send + Sync {
    fn notify(&self, event: ShellEvent);
}

/// Forwards events into an unbounded tokio channel.
pub struct ChannelNotifier {
    tx: UnboundedSender<ShellEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, UnboundedReceiver<ShellEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ShellNotifier for ChannelNotifier {
    fn notify(&self, event: ShellEvent) {
        if self.tx.send(event).is_err() {
            debug!("presentation channel closed; dropping event");
        }
    }
}
