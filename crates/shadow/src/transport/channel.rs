use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use super::{DrainCallback, ResponseCallback, ShadowResponse, ShadowTransport};
use crate::error::TransportError;

/// Creates a channel-backed transport pair.
///
/// The [`ChannelTransport`] half goes into the queued shadow connection; the
/// [`TransportReceiver`] half is consumed by whatever task actually writes to
/// the shadow backend. The data channel itself is unbounded so `write` never
/// blocks; `watermark` is the number of in-flight chunks at which the
/// transport reports saturation. Drained callbacks fire when the consumer
/// takes the queue back below the watermark.
pub fn channel_transport(watermark: usize) -> (ChannelTransport, TransportReceiver) {
    let (sender, receiver) = mpsc::unbounded();
    let shared = Arc::new(Shared {
        queued: AtomicUsize::new(0),
        watermark: watermark.max(1),
        drain_callbacks: Mutex::new(Vec::new()),
        response_callback: Mutex::new(None),
    });

    (ChannelTransport { sender, shared: Arc::clone(&shared) }, TransportReceiver { receiver, shared })
}

/// One event observed by the consumer side of a [`ChannelTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Chunk(Bytes),
    End,
}

struct Shared {
    queued: AtomicUsize,
    watermark: usize,
    drain_callbacks: Mutex<Vec<DrainCallback>>,
    response_callback: Mutex<Option<ResponseCallback>>,
}

impl Shared {
    fn is_saturated(&self) -> bool {
        self.queued.load(Ordering::Acquire) >= self.watermark
    }

    fn fire_drained(&self) {
        let callbacks = {
            let mut guard = self.drain_callbacks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for callback in callbacks {
            callback();
        }
    }
}

/// A [`ShadowTransport`] over a futures mpsc channel.
pub struct ChannelTransport {
    sender: UnboundedSender<TransportEvent>,
    shared: Arc<Shared>,
}

impl ShadowTransport for ChannelTransport {
    fn write(&mut self, chunk: Bytes) -> Result<(), TransportError> {
        self.shared.queued.fetch_add(1, Ordering::AcqRel);
        if self.sender.unbounded_send(TransportEvent::Chunk(chunk)).is_err() {
            // the chunk never entered the channel, so it must not count
            self.shared.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(TransportError::closed("transport receiver dropped"));
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), TransportError> {
        if self.sender.unbounded_send(TransportEvent::End).is_err() {
            return Err(TransportError::closed("transport receiver dropped"));
        }
        Ok(())
    }

    fn is_saturated(&self) -> bool {
        self.shared.is_saturated()
    }

    fn on_drained(&mut self, callback: DrainCallback) {
        {
            let mut guard = self.shared.drain_callbacks.lock().unwrap_or_else(PoisonError::into_inner);
            if self.shared.is_saturated() {
                guard.push(callback);
                return;
            }
        }
        callback();
    }

    fn on_response(&mut self, callback: ResponseCallback) {
        *self.shared.response_callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }
}

impl fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("queued", &self.shared.queued.load(Ordering::Acquire))
            .field("watermark", &self.shared.watermark)
            .finish_non_exhaustive()
    }
}

/// Consumer side of a [`ChannelTransport`].
///
/// Yields chunks and the terminating [`TransportEvent::End`] in write order.
/// Taking a chunk decrements the in-flight count and, when the count drops
/// back below the watermark, fires the pending drained callbacks.
pub struct TransportReceiver {
    receiver: UnboundedReceiver<TransportEvent>,
    shared: Arc<Shared>,
}

impl TransportReceiver {
    /// Delivers the shadow backend's response to the callback registered on
    /// the transport side. Without a registered callback the response is
    /// dropped on the spot.
    pub fn respond(&self, response: ShadowResponse) {
        let callback = self.shared.response_callback.lock().unwrap_or_else(PoisonError::into_inner).take();
        match callback {
            Some(callback) => callback(response),
            None => debug!(status = %response.status(), "no response callback registered, dropping shadow response"),
        }
    }
}

impl Stream for TransportReceiver {
    type Item = TransportEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match Pin::new(&mut this.receiver).poll_next(cx) {
            Poll::Ready(Some(event)) => {
                if matches!(event, TransportEvent::Chunk(_)) {
                    let previous = this.shared.queued.fetch_sub(1, Ordering::AcqRel);
                    if previous == this.shared.watermark {
                        this.shared.fire_drained();
                    }
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for TransportReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportReceiver")
            .field("queued", &self.shared.queued.load(Ordering::Acquire))
            .field("watermark", &self.shared.watermark)
            .finish_non_exhaustive()
    }
}
