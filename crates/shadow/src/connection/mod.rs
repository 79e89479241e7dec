//! The shadow connection state machine.
//!
//! One [`QueuedShadowConnection`] exists per shadowed request. It owns the
//! FIFO queue of chunks that arrive before the backend connection resolves and
//! drives the transition from buffering to direct forwarding without ever
//! reordering chunks or surfacing a failure to the primary path.

mod queued;
pub use queued::QueuedShadowConnection;

/// Lifecycle of one shadow connection.
///
/// Transitions are monotonic: `Pending -> Draining -> Connected -> Ended` on
/// the success path, `Pending -> Failed` on connect failure, and any
/// non-terminal state may move to `Failed` on a transport error or teardown.
/// No transition ever leaves `Ended` or `Failed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connector still resolving; chunks buffer in the pending queue.
    Pending,
    /// Connector resolved; buffered chunks are being flushed in FIFO order.
    Draining,
    /// Queue empty; chunks forward straight to the transport.
    Connected,
    /// End was forwarded to the transport. Terminal.
    Ended,
    /// Connect failed, the transport errored, or the request was torn down.
    /// Terminal; all further writes are discarded.
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Ended | ConnectionState::Failed)
    }
}
