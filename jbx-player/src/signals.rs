//! Cross-thread signal channel
//!
//! Rendering threads report end-of-stream and auto-delete conditions here;
//! the control thread drains them and reacts at its own pace. The sender is
//! cheap to clone and safe to call from the audio path (an unbounded tokio
//! channel send never blocks).
//!
//! During shutdown the channel is flipped to a drop-everything mode so that
//! late signals from streams still winding down cannot reach player state
//! that is already being torn down.

use crate::stream::StreamId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Signals crossing from rendering threads to the control thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSignal {
    /// The main-output stream reached its natural end
    PrimaryEndOfStream(StreamId),
    /// The preview stream reached its natural end
    PreviewEndOfStream(StreamId),
    /// A fading-out stream hit silence and wants to be destroyed
    AutoDelete(StreamId),
}

/// Sending half, cloned into stream callbacks.
#[derive(Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<StreamSignal>,
    shutting_down: Arc<AtomicBool>,
}

impl SignalSender {
    /// Post a signal; silently dropped after shutdown began or if the
    /// receiver is gone.
    pub fn post(&self, signal: StreamSignal) {
        if self.shutting_down.load(Ordering::Acquire) {
            trace!(?signal, "dropping signal during shutdown");
            return;
        }
        let _ = self.tx.send(signal);
    }

    /// Flip the channel into drop mode. Irreversible.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

/// Create a connected sender/receiver pair.
pub fn signal_channel() -> (SignalSender, mpsc::UnboundedReceiver<StreamSignal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = SignalSender {
        tx,
        shutting_down: Arc::new(AtomicBool::new(false)),
    };
    (sender, rx)
}
