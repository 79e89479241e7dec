//! Per-request execution context and the collaborator seams it carries.
//!
//! The host gateway owns endpoint resolution and template evaluation; this
//! crate only consumes them through the [`EndpointResolver`] and
//! [`TemplateEngine`] traits. An [`ExecutionContext`] bundles the primary
//! request's routing-relevant parts with those collaborators for the lifetime
//! of one request.

use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, Method, Uri};

use crate::error::EvaluationError;
use crate::transport::Connector;

/// Evaluates templated expressions from the shadowing configuration against
/// the current request.
pub trait TemplateEngine: Send + Sync {
    fn evaluate(&self, expression: &str) -> Result<String, EvaluationError>;
}

/// Resolves an evaluated target expression to a shadow [`Endpoint`].
///
/// Returning `None` disables shadowing for the request; the primary stream is
/// handed back untouched.
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, target: &str) -> Option<Endpoint>;
}

/// A resolved shadow endpoint: a name for logging, the resolved target string,
/// and the connector able to reach it.
#[derive(Clone)]
pub struct Endpoint {
    name: String,
    target: String,
    connector: Arc<dyn Connector>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, target: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self { name: name.into(), target: target.into(), connector }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint").field("name", &self.name).field("target", &self.target).finish_non_exhaustive()
    }
}

/// The primary request's method, URI and headers, together with the host
/// collaborators needed to build and route the mirrored request.
#[derive(Clone)]
pub struct ExecutionContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    template_engine: Arc<dyn TemplateEngine>,
    endpoint_resolver: Arc<dyn EndpointResolver>,
}

impl ExecutionContext {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        template_engine: Arc<dyn TemplateEngine>,
        endpoint_resolver: Arc<dyn EndpointResolver>,
    ) -> Self {
        Self { method, uri, headers, template_engine, endpoint_resolver }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn template_engine(&self) -> &dyn TemplateEngine {
        self.template_engine.as_ref()
    }

    pub fn endpoint_resolver(&self) -> &dyn EndpointResolver {
        self.endpoint_resolver.as_ref()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
