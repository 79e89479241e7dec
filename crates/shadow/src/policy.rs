//! The traffic-shadowing entry point.

use std::fmt;

use bytes::Bytes;
use tracing::debug;

use crate::config::ShadowConfig;
use crate::connection::QueuedShadowConnection;
use crate::context::ExecutionContext;
use crate::request::{ShadowRequest, build_shadowing_headers};
use crate::stream::{ReadWriteStream, ShadowingStream};

/// Mirrors request traffic to a shadow backend without touching the primary
/// path.
///
/// One instance per configured policy; [`on_request_content`](Self::on_request_content)
/// is invoked once per request with the primary body stream and either wraps
/// it for shadowing or hands it back untouched.
#[derive(Debug, Clone)]
pub struct TrafficShadowing {
    config: ShadowConfig,
}

impl TrafficShadowing {
    pub fn new(config: ShadowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Starts shadowing for one request.
    ///
    /// The configured target expression is evaluated and resolved; when no
    /// endpoint comes back, shadowing is disabled for this request and the
    /// stream is returned untouched. Otherwise the mirrored request is built,
    /// the connector is kicked off on a background task, and the stream is
    /// wrapped so each chunk is duplicated to the queued shadow connection
    /// while the connect is still in flight.
    ///
    /// Must be called within a tokio runtime. No failure on the shadow path
    /// ever surfaces through the returned stream.
    pub fn on_request_content<S>(&self, context: &ExecutionContext, stream: S) -> MaybeShadowed<S>
    where
        S: ReadWriteStream + 'static,
    {
        let target = match context.template_engine().evaluate(self.config.target()) {
            Ok(target) => target,
            Err(e) => {
                debug!(error = %e, "shadow target evaluation failed, passing request through");
                return MaybeShadowed::PassThrough(stream);
            }
        };

        let Some(endpoint) = context.endpoint_resolver().resolve(&target) else {
            debug!(shadow_target = %target, "no shadow endpoint resolved, passing request through");
            return MaybeShadowed::PassThrough(stream);
        };

        let headers = build_shadowing_headers(context.headers(), self.config.headers(), context.template_engine());
        let request = ShadowRequest::new(context.method().clone(), context.uri().clone(), headers);

        debug!(endpoint = endpoint.name(), shadow_target = %target, "shadowing request to secondary backend");

        let connection = QueuedShadowConnection::new(self.config.max_pending_chunks());
        let handle = connection.clone();
        let connector = endpoint.connector();
        tokio::spawn(async move {
            let transport = connector.connect(request).await;
            handle.on_connected(transport);
        });

        MaybeShadowed::Shadowed(ShadowingStream::new(stream, connection))
    }
}

/// Outcome of [`TrafficShadowing::on_request_content`]: either the wrapped
/// stream, or the original stream when shadowing is disabled for the request.
///
/// Implements [`ReadWriteStream`] itself so hosts can drive either outcome
/// uniformly.
pub enum MaybeShadowed<S> {
    Shadowed(ShadowingStream<S>),
    PassThrough(S),
}

impl<S> MaybeShadowed<S> {
    pub fn is_shadowed(&self) -> bool {
        matches!(self, MaybeShadowed::Shadowed(_))
    }
}

impl<S> ReadWriteStream for MaybeShadowed<S>
where
    S: ReadWriteStream + 'static,
{
    fn write(&mut self, chunk: Bytes) -> &mut Self {
        match self {
            MaybeShadowed::Shadowed(stream) => {
                stream.write(chunk);
            }
            MaybeShadowed::PassThrough(stream) => {
                stream.write(chunk);
            }
        }
        self
    }

    fn end(&mut self) {
        match self {
            MaybeShadowed::Shadowed(stream) => stream.end(),
            MaybeShadowed::PassThrough(stream) => stream.end(),
        }
    }

    fn pause(&mut self) {
        match self {
            MaybeShadowed::Shadowed(stream) => stream.pause(),
            MaybeShadowed::PassThrough(stream) => stream.pause(),
        }
    }

    fn resume(&mut self) {
        match self {
            MaybeShadowed::Shadowed(stream) => stream.resume(),
            MaybeShadowed::PassThrough(stream) => stream.resume(),
        }
    }
}

impl<S> fmt::Debug for MaybeShadowed<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaybeShadowed::Shadowed(_) => f.write_str("MaybeShadowed::Shadowed"),
            MaybeShadowed::PassThrough(_) => f.write_str("MaybeShadowed::PassThrough"),
        }
    }
}
