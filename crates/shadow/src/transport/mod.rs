//! The transport seam between the shadow core and the backend connection.
//!
//! The host (or [`channel_transport`]) provides the concrete transport. The
//! core only
//! relies on the non-blocking contract captured by [`ShadowTransport`]:
//! `write` and `end` enqueue without blocking, saturation is reported through
//! [`ShadowTransport::is_saturated`] rather than by blocking the caller, and
//! drain/response notifications arrive through one-shot callbacks.

mod channel;
pub use channel::ChannelTransport;
pub use channel::TransportEvent;
pub use channel::TransportReceiver;
pub use channel::channel_transport;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures::stream::BoxStream;
use http::StatusCode;

use crate::error::TransportError;
use crate::request::ShadowRequest;

/// One-shot callback fired when a saturated transport has drained its
/// outbound queue below its watermark.
pub type DrainCallback = Box<dyn FnOnce() + Send + 'static>;

/// One-shot callback receiving the shadow backend's response.
pub type ResponseCallback = Box<dyn FnOnce(ShadowResponse) + Send + 'static>;

pub type BoxTransport = Box<dyn ShadowTransport>;

/// Establishes a connection to the shadow backend.
///
/// Resolution is asynchronous: chunks may already be buffering in the queued
/// connection while `connect` is in flight. `None` signals failure; the shadow
/// path never retries.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, request: ShadowRequest) -> Option<BoxTransport>;
}

/// An established connection to the shadow backend.
///
/// All methods are non-blocking. Callbacks registered here may fire inline
/// from the registering call (when the condition already holds) or later from
/// the transport's own task; they must not call back into the registering
/// connection.
pub trait ShadowTransport: Send {
    fn write(&mut self, chunk: Bytes) -> Result<(), TransportError>;

    fn end(&mut self) -> Result<(), TransportError>;

    /// True when the transport's outbound queue is full and the producer
    /// should pause until [`ShadowTransport::on_drained`] fires.
    fn is_saturated(&self) -> bool;

    fn on_drained(&mut self, callback: DrainCallback);

    fn on_response(&mut self, callback: ResponseCallback);
}

/// The shadow backend's response: a status and a body stream.
///
/// The response is only ever consumed by the discarding sink; nothing in it is
/// exposed to the primary path. Dropping the body stream releases the
/// underlying connection.
pub struct ShadowResponse {
    status: StatusCode,
    body: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl ShadowResponse {
    pub fn new<B>(status: StatusCode, body: B) -> Self
    where
        B: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
    {
        Self { status, body: Box::pin(body) }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_body(self) -> BoxStream<'static, Result<Bytes, TransportError>> {
        self.body
    }
}

impl fmt::Debug for ShadowResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowResponse").field("status", &self.status).finish_non_exhaustive()
    }
}
