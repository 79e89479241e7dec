use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use super::ReadWriteStream;
use crate::connection::QueuedShadowConnection;

/// Wraps the primary stream and duplicates every chunk to the shadow
/// connection.
///
/// The primary path is never altered: every `write` forwards to the wrapped
/// stream first, unconditionally, whatever the shadow connection's state. Only
/// pacing is affected: when the shadow transport saturates, the upstream
/// source is paused once and resumed by the connection's drain notification.
///
/// Dropping the wrapper aborts a still-running shadow connection, bounding its
/// lifetime to the primary request.
pub struct ShadowingStream<S> {
    inner: Arc<Mutex<S>>,
    connection: QueuedShadowConnection,
    paused: Arc<AtomicBool>,
}

impl<S> ShadowingStream<S>
where
    S: ReadWriteStream + 'static,
{
    pub(crate) fn new(inner: S, connection: QueuedShadowConnection) -> Self {
        Self { inner: Arc::new(Mutex::new(inner)), connection, paused: Arc::new(AtomicBool::new(false)) }
    }

    pub fn connection(&self) -> &QueuedShadowConnection {
        &self.connection
    }

    fn lock_inner(&self) -> MutexGuard<'_, S> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> ReadWriteStream for ShadowingStream<S>
where
    S: ReadWriteStream + 'static,
{
    fn write(&mut self, chunk: Bytes) -> &mut Self {
        // primary first, unconditionally
        self.lock_inner().write(chunk.clone());
        // Bytes is immutable, so the cloned handle cannot alias writes back
        // into the primary buffer
        self.connection.write(chunk);

        if self.connection.is_saturated() && !self.paused.swap(true, Ordering::AcqRel) {
            self.lock_inner().pause();

            let inner = Arc::clone(&self.inner);
            let paused = Arc::clone(&self.paused);
            self.connection.on_drained(Box::new(move || {
                // one-shot and idempotent: only the pause owner resumes
                if paused.swap(false, Ordering::AcqRel) {
                    inner.lock().unwrap_or_else(PoisonError::into_inner).resume();
                }
            }));
        }

        self
    }

    fn end(&mut self) {
        self.lock_inner().end();
        self.connection.end();
    }

    fn pause(&mut self) {
        self.lock_inner().pause();
    }

    fn resume(&mut self) {
        self.lock_inner().resume();
    }
}

impl<S> Drop for ShadowingStream<S> {
    fn drop(&mut self) {
        self.connection.abort();
    }
}

impl<S> std::fmt::Debug for ShadowingStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowingStream")
            .field("connection", &self.connection)
            .field("paused", &self.paused.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
