use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{debug, warn};

use super::ConnectionState;
use crate::sink;
use crate::transport::{BoxTransport, DrainCallback};

/// The order-preserving relay between the primary stream and the shadow
/// transport.
///
/// `QueuedShadowConnection` is a cheap cloneable handle; all clones drive the
/// same state machine. Chunks written before the connector resolves buffer in
/// a bounded FIFO queue; once [`on_connected`](Self::on_connected) delivers a
/// transport, the queue is drained to empty before any chunk is forwarded
/// directly, so the shadow backend observes chunks in exact arrival order.
///
/// Every method absorbs shadow-side failures locally: nothing raised here may
/// reach or alter the primary path.
///
/// State is guarded by a per-request mutex that is never held across an await
/// and never shared between requests. Drain waiters live under their own lock
/// so a transport's drain notification, which may fire inline from
/// registration, never re-enters the state lock. Waiters are always invoked
/// with no lock held.
#[derive(Clone)]
pub struct QueuedShadowConnection {
    core: Arc<Core>,
}

struct Core {
    state: Mutex<Inner>,
    drain: Mutex<DrainState>,
}

struct Inner {
    state: ConnectionState,
    pending: VecDeque<Bytes>,
    max_pending: usize,
    end_requested: bool,
    transport: Option<BoxTransport>,
    dropped_chunks: u64,
}

#[derive(Default)]
struct DrainState {
    waiters: Vec<DrainCallback>,
    hook_armed: bool,
}

impl QueuedShadowConnection {
    /// Creates a connection waiting for its transport, buffering at most
    /// `max_pending` chunks in the meantime.
    pub fn new(max_pending: usize) -> Self {
        Self {
            core: Arc::new(Core {
                state: Mutex::new(Inner {
                    state: ConnectionState::Pending,
                    pending: VecDeque::new(),
                    max_pending,
                    end_requested: false,
                    transport: None,
                    dropped_chunks: 0,
                }),
                drain: Mutex::new(DrainState::default()),
            }),
        }
    }

    // A poisoned lock only means another thread panicked mid-update of
    // best-effort state; recover the guard rather than poison the primary path.
    fn lock_state(&self) -> MutexGuard<'_, Inner> {
        self.core.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_drain(&self) -> MutexGuard<'_, DrainState> {
        self.core.drain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_state().state
    }

    /// Accepts one chunk. Buffers while the connector is resolving, forwards
    /// directly once connected, and silently discards after the connection has
    /// ended or failed. Never blocks and never returns an error.
    pub fn write(&self, chunk: Bytes) {
        let release = self.lock_state().write(chunk);
        if release {
            self.notify_drained();
        }
    }

    /// Signals that no more chunks will be written. Deferred until the pending
    /// queue has fully drained; forwarded to the transport exactly once.
    pub fn end(&self) {
        let release = self.lock_state().end();
        if release {
            self.notify_drained();
        }
    }

    /// Delivers the connector's result. Invoked exactly once per connection;
    /// a late delivery after teardown finds a terminal state and drops the
    /// transport, so no orphaned connection survives the request.
    pub fn on_connected(&self, transport: Option<BoxTransport>) {
        let release = self.lock_state().on_connected(transport);
        if release {
            self.notify_drained();
        }
    }

    /// True when the transport's outbound queue is full. Always false before
    /// the connection is established: the pending queue absorbs backpressure
    /// locally while the connector resolves.
    pub fn is_saturated(&self) -> bool {
        let inner = self.lock_state();
        match inner.state {
            ConnectionState::Connected => inner.transport.as_ref().is_some_and(|transport| transport.is_saturated()),
            _ => false,
        }
    }

    /// Registers a one-shot callback fired when the saturated transport
    /// drains. Fires immediately when the connection is not saturated, so a
    /// paused producer can never be stranded.
    pub fn on_drained(&self, callback: DrainCallback) {
        if !self.is_saturated() {
            callback();
            return;
        }

        let arm_hook = {
            let mut drain = self.lock_drain();
            drain.waiters.push(callback);
            if drain.hook_armed {
                false
            } else {
                drain.hook_armed = true;
                true
            }
        };
        if !arm_hook {
            return;
        }

        let handle = self.clone();
        let hooked = {
            let mut inner = self.lock_state();
            match inner.transport.as_mut() {
                Some(transport) => {
                    transport.on_drained(Box::new(move || handle.notify_drained()));
                    true
                }
                None => false,
            }
        };
        if !hooked {
            // the transport went away between the checks; release immediately
            self.notify_drained();
        }
    }

    /// Tears the connection down with the primary request. Non-terminal states
    /// move to `Failed` and the queue is discarded; terminal states are left
    /// untouched.
    pub fn abort(&self) {
        let release = {
            let mut inner = self.lock_state();
            if inner.state.is_terminal() {
                false
            } else {
                debug!("shadow connection aborted with the primary request");
                inner.fail();
                true
            }
        };
        if release {
            self.notify_drained();
        }
    }

    /// Fires and clears all registered drain waiters. Also invoked on every
    /// transition to a terminal state so a paused primary stream is never
    /// stranded by a shadow connection that will drain no further.
    fn notify_drained(&self) {
        let waiters = {
            let mut drain = self.lock_drain();
            drain.hook_armed = false;
            mem::take(&mut drain.waiters)
        };
        for waiter in waiters {
            waiter();
        }
    }
}

impl fmt::Debug for QueuedShadowConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock_state();
        f.debug_struct("QueuedShadowConnection")
            .field("state", &inner.state)
            .field("pending", &inner.pending.len())
            .field("end_requested", &inner.end_requested)
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// Returns true when the call transitioned the connection into a terminal
    /// state, telling the handle to release any drain waiters.
    fn write(&mut self, chunk: Bytes) -> bool {
        match self.state {
            ConnectionState::Pending | ConnectionState::Draining => {
                if self.pending.len() >= self.max_pending {
                    if self.dropped_chunks == 0 {
                        warn!(max_pending = self.max_pending, "shadow pending queue full, dropping newest chunk");
                    }
                    self.dropped_chunks += 1;
                } else {
                    self.pending.push_back(chunk);
                }
                false
            }
            ConnectionState::Connected => !self.forward(chunk),
            // shadowing has concluded or been abandoned, best-effort contract
            ConnectionState::Ended | ConnectionState::Failed => false,
        }
    }

    fn end(&mut self) -> bool {
        match self.state {
            ConnectionState::Pending | ConnectionState::Draining => {
                self.end_requested = true;
                false
            }
            ConnectionState::Connected => {
                self.finish();
                true
            }
            ConnectionState::Ended | ConnectionState::Failed => false,
        }
    }

    fn on_connected(&mut self, transport: Option<BoxTransport>) -> bool {
        if self.state != ConnectionState::Pending {
            // resolved after teardown: dropping the transport releases it
            return false;
        }

        let Some(mut transport) = transport else {
            warn!("shadow connect failed, abandoning shadowing for this request");
            self.fail();
            return true;
        };

        transport.on_response(Box::new(sink::discard));
        self.transport = Some(transport);
        self.state = ConnectionState::Draining;

        // Always pop the head until the queue is empty; a chunk written while
        // draining buffers behind it and can never overtake one queued earlier.
        while let Some(chunk) = self.pending.pop_front() {
            if !self.forward(chunk) {
                return true;
            }
        }

        self.state = ConnectionState::Connected;
        if self.dropped_chunks > 0 {
            debug!(dropped = self.dropped_chunks, "chunks were dropped while waiting for the shadow connection");
        }

        if self.end_requested {
            self.finish();
            true
        } else {
            false
        }
    }

    /// Forwards one chunk to the transport; returns false when the write
    /// failed and shadowing was abandoned.
    fn forward(&mut self, chunk: Bytes) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            self.fail();
            return false;
        };
        match transport.write(chunk) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "shadow transport write failed, abandoning shadowing");
                self.fail();
                false
            }
        }
    }

    /// Forwards end to the transport and releases it. Only reachable with an
    /// empty pending queue.
    fn finish(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            self.fail();
            return;
        };
        match transport.end() {
            Ok(()) => self.state = ConnectionState::Ended,
            Err(e) => {
                warn!(error = %e, "shadow transport end failed");
                self.fail();
            }
        }
    }

    /// Terminal failure: discard buffered chunks and drop the transport.
    fn fail(&mut self) {
        self.state = ConnectionState::Failed;
        self.pending.clear();
        self.transport = None;
    }
}
