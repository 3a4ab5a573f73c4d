//! Application-wide signals emitted by the transport layer.
//!
//! The transport has no handle on UI components, so it announces cross-cutting
//! conditions on a broadcast bus instead. Delivery is fire-and-forget: no
//! acknowledgement, and emitting with no subscriber is not an error.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

const SIGNAL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A request got no response at all; the UI should show a persistent offline banner
    NetworkUnreachable { url: Option<String> },
    /// The session was rejected and cleared
    SessionExpired { url: Option<String> },
    /// The user is authenticated but not allowed to access the resource
    AccessDenied { url: Option<String> },
}

impl Signal {
    pub fn url(&self) -> Option<&str> {
        match self {
            Signal::NetworkUnreachable { url }
            | Signal::SessionExpired { url }
            | Signal::AccessDenied { url } => url.as_deref(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Signal::NetworkUnreachable { .. } => "network-unreachable",
            Signal::SessionExpired { .. } => "session-expired",
            Signal::AccessDenied { .. } => "access-denied",
        }
    }
}

#[derive(Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<Signal>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, signal: Signal) {
        tracing::debug!(signal = signal.name(), url = ?signal.url(), "Emitting signal");
        // Err only means nobody is listening
        let _ = self.sender.send(signal);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }

    /// Signals as a stream; signals missed by a lagging subscriber are skipped
    pub fn stream(&self) -> impl Stream<Item = Signal> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|signal| signal.ok())
    }
}
