//! Static shadowing configuration.
//!
//! One [`ShadowConfig`] describes where mirrored traffic goes (a templated
//! target expression resolved per request) and which headers are overlaid on
//! the mirrored request. The configuration is deserializable so hosts can load
//! it straight from their policy definition.

use serde::Deserialize;

/// Default bound on the number of chunks buffered while the shadow connection
/// is still being established. Beyond it, newly arriving chunks are dropped.
pub const DEFAULT_MAX_PENDING_CHUNKS: usize = 64;

/// Configuration of one traffic-shadowing policy instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowConfig {
    target: String,
    #[serde(default)]
    headers: Vec<HeaderTemplate>,
    #[serde(default = "default_max_pending_chunks")]
    max_pending_chunks: usize,
}

impl ShadowConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into(), headers: Vec::new(), max_pending_chunks: DEFAULT_MAX_PENDING_CHUNKS }
    }

    /// Appends a header template. Overlay order is configuration order, so a
    /// later template with the same name overwrites an earlier one.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderTemplate::new(name, value));
        self
    }

    pub fn with_max_pending_chunks(mut self, max_pending_chunks: usize) -> Self {
        self.max_pending_chunks = max_pending_chunks;
        self
    }

    /// The templated expression resolved to the shadow endpoint per request.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn headers(&self) -> &[HeaderTemplate] {
        &self.headers
    }

    pub fn max_pending_chunks(&self) -> usize {
        self.max_pending_chunks
    }
}

/// A named header whose value is a templated expression, evaluated per request.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderTemplate {
    name: String,
    value: String,
}

impl HeaderTemplate {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

fn default_max_pending_chunks() -> usize {
    DEFAULT_MAX_PENDING_CHUNKS
}
