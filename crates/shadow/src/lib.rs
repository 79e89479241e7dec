//! Asynchronous traffic shadowing for streaming request bodies.
//!
//! This crate mirrors live inbound traffic to a secondary ("shadow") backend
//! while the primary request/response path proceeds unaffected. The shadow
//! backend's response is discarded; its only effect is whatever side effects
//! it triggers there (cache warming, canary analysis, ...). Shadowing is
//! strictly fire-and-forget: delivery is not guaranteed, failed connections
//! are not retried, and nothing observed on the shadow path is ever exposed
//! to the primary one.
//!
//! # Architecture
//!
//! The crate is organized around four components:
//!
//! - [`connection::QueuedShadowConnection`]: the core. A state machine owning
//!   a bounded FIFO buffer for chunks that arrive while the shadow connection
//!   is still being established, and the order-preserving drain from that
//!   buffer to the transport once it is.
//! - [`ShadowingStream`]: wraps the primary stream; duplicates each written
//!   chunk to the queued connection and translates shadow backpressure into
//!   pause/resume on the primary stream's upstream source.
//! - [`ShadowRequest`]: the mirrored request, built once per request from the
//!   primary's method, URI and headers with the configured header templates
//!   overlaid.
//! - a response sink that consumes and discards the shadow backend's response
//!   on a background task.
//!
//! The host supplies the seams: a [`TemplateEngine`], an [`EndpointResolver`],
//! and a [`Connector`] producing a [`ShadowTransport`]. A channel-backed
//! transport adapter is provided in [`transport::channel_transport`] for hosts
//! whose backend writer is an async task.
//!
//! # Guarantees
//!
//! - Chunks reach the shadow backend in exactly their primary arrival order,
//!   including across the buffering-to-connected transition.
//! - A primary `write` always reaches the primary destination, whatever the
//!   shadow connection's state; only pacing (pause/resume) reacts to shadow
//!   backpressure.
//! - No failure on the shadow path surfaces on the primary path; failures are
//!   absorbed and logged.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use http::{HeaderMap, Method, Uri};
//! use tracing::Level;
//! use tracing_subscriber::FmtSubscriber;
//! use traffic_shadow::{
//!     Endpoint, EndpointResolver, EvaluationError, ExecutionContext, ReadWriteStream,
//!     ShadowConfig, TemplateEngine, TrafficShadowing,
//! };
//!
//! struct LiteralEngine;
//!
//! impl TemplateEngine for LiteralEngine {
//!     fn evaluate(&self, expression: &str) -> Result<String, EvaluationError> {
//!         Ok(expression.to_owned())
//!     }
//! }
//!
//! // a resolver that knows no shadow endpoint: shadowing stays disabled
//! struct NoShadowing;
//!
//! impl EndpointResolver for NoShadowing {
//!     fn resolve(&self, _target: &str) -> Option<Endpoint> {
//!         None
//!     }
//! }
//!
//! struct NullStream;
//!
//! impl ReadWriteStream for NullStream {
//!     fn write(&mut self, _chunk: Bytes) -> &mut Self {
//!         self
//!     }
//!     fn end(&mut self) {}
//!     fn pause(&mut self) {}
//!     fn resume(&mut self) {}
//! }
//!
//! // Initialize logging; the shadow path reports its failures here only.
//! let subscriber = FmtSubscriber::builder()
//!     .with_max_level(Level::DEBUG)
//!     .finish();
//! tracing::subscriber::set_global_default(subscriber)
//!     .expect("setting default subscriber failed");
//!
//! let policy = TrafficShadowing::new(
//!     ShadowConfig::new("{#endpoints['shadow']}").with_header("X-Shadowed", "true"),
//! );
//! let context = ExecutionContext::new(
//!     Method::POST,
//!     Uri::from_static("/orders"),
//!     HeaderMap::new(),
//!     Arc::new(LiteralEngine),
//!     Arc::new(NoShadowing),
//! );
//!
//! let mut stream = policy.on_request_content(&context, NullStream);
//! assert!(!stream.is_shadowed());
//! stream.write(Bytes::from_static(b"chunk")).end();
//! ```
//!
//! With a resolver that does return an [`Endpoint`], `on_request_content`
//! spawns the endpoint's [`Connector`] on the current tokio runtime and
//! returns the wrapped stream instead.

pub mod connection;
pub mod stream;
pub mod transport;

mod config;
mod context;
mod error;
mod policy;
mod request;
mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use config::DEFAULT_MAX_PENDING_CHUNKS;
pub use config::HeaderTemplate;
pub use config::ShadowConfig;
pub use context::Endpoint;
pub use context::EndpointResolver;
pub use context::ExecutionContext;
pub use context::TemplateEngine;
pub use error::EvaluationError;
pub use error::TransportError;
pub use policy::MaybeShadowed;
pub use policy::TrafficShadowing;
pub use request::ShadowRequest;
pub use stream::ReadWriteStream;
pub use stream::ShadowingStream;
pub use transport::Connector;
pub use transport::ShadowResponse;
pub use transport::ShadowTransport;
