//! Test doubles shared by the unit tests.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::oneshot;

use crate::context::{Endpoint, EndpointResolver, TemplateEngine};
use crate::error::{EvaluationError, TransportError};
use crate::request::ShadowRequest;
use crate::stream::ReadWriteStream;
use crate::transport::{BoxTransport, Connector, DrainCallback, ResponseCallback, ShadowResponse, ShadowTransport};

/// Spins on the tokio scheduler until `condition` holds, panicking after a
/// generous number of turns so a broken test fails instead of hanging.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Template engine that evaluates every expression to itself.
pub(crate) struct EchoTemplateEngine;

impl TemplateEngine for EchoTemplateEngine {
    fn evaluate(&self, expression: &str) -> Result<String, EvaluationError> {
        Ok(expression.to_owned())
    }
}

/// Template engine that rejects every expression.
pub(crate) struct FailingTemplateEngine;

impl TemplateEngine for FailingTemplateEngine {
    fn evaluate(&self, expression: &str) -> Result<String, EvaluationError> {
        Err(EvaluationError::new(expression, "unsupported expression"))
    }
}

/// Resolver backed by a single optional `(target, endpoint)` pair.
pub(crate) struct StaticResolver {
    endpoint: Option<(String, Endpoint)>,
}

impl StaticResolver {
    pub(crate) fn empty() -> Self {
        Self { endpoint: None }
    }

    pub(crate) fn with_endpoint(target: impl Into<String>, endpoint: Endpoint) -> Self {
        Self { endpoint: Some((target.into(), endpoint)) }
    }
}

impl EndpointResolver for StaticResolver {
    fn resolve(&self, target: &str) -> Option<Endpoint> {
        match &self.endpoint {
            Some((expected, endpoint)) if expected == target => Some(endpoint.clone()),
            _ => None,
        }
    }
}

/// Connector whose resolution is driven manually through a oneshot sender,
/// recording every request it is asked to connect.
pub(crate) struct ManualConnector {
    receiver: Mutex<Option<oneshot::Receiver<Option<BoxTransport>>>>,
    requests: Arc<Mutex<Vec<ShadowRequest>>>,
}

impl ManualConnector {
    pub(crate) fn new() -> (Arc<Self>, oneshot::Sender<Option<BoxTransport>>) {
        let (sender, receiver) = oneshot::channel();
        let connector = Arc::new(Self { receiver: Mutex::new(Some(receiver)), requests: Arc::new(Mutex::new(Vec::new())) });
        (connector, sender)
    }

    pub(crate) fn requests(&self) -> Arc<Mutex<Vec<ShadowRequest>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl Connector for ManualConnector {
    async fn connect(&self, request: ShadowRequest) -> Option<BoxTransport> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request);
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner).take()?;
        receiver.await.ok().flatten()
    }
}

/// What a [`RecordingTransport`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Recorded {
    Chunk(Bytes),
    End,
}

#[derive(Default)]
struct RecordingShared {
    events: Vec<Recorded>,
    saturated: bool,
    fail_writes: bool,
    fail_end: bool,
    drain_callbacks: Vec<DrainCallback>,
    response_callback: Option<ResponseCallback>,
}

/// Transport double: records writes and end, with switchable saturation and
/// failure behavior. Handles are clones sharing one log, so a test can keep
/// one while the connection owns the boxed other.
#[derive(Clone, Default)]
pub(crate) struct RecordingTransport {
    shared: Arc<Mutex<RecordingShared>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn boxed(&self) -> BoxTransport {
        Box::new(self.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn events(&self) -> Vec<Recorded> {
        self.lock().events.clone()
    }

    pub(crate) fn set_saturated(&self, saturated: bool) {
        self.lock().saturated = saturated;
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub(crate) fn set_fail_end(&self, fail: bool) {
        self.lock().fail_end = fail;
    }

    pub(crate) fn has_response_callback(&self) -> bool {
        self.lock().response_callback.is_some()
    }

    /// Fires all drain callbacks registered so far, as the real transport
    /// would when its queue empties.
    pub(crate) fn fire_drained(&self) {
        let callbacks = std::mem::take(&mut self.lock().drain_callbacks);
        for callback in callbacks {
            callback();
        }
    }

    /// Delivers a response to the registered response callback.
    pub(crate) fn respond(&self, response: ShadowResponse) {
        if let Some(callback) = self.lock().response_callback.take() {
            callback(response);
        }
    }
}

impl ShadowTransport for RecordingTransport {
    fn write(&mut self, chunk: Bytes) -> Result<(), TransportError> {
        let mut shared = self.lock();
        if shared.fail_writes {
            return Err(TransportError::closed("injected write failure"));
        }
        shared.events.push(Recorded::Chunk(chunk));
        Ok(())
    }

    fn end(&mut self) -> Result<(), TransportError> {
        let mut shared = self.lock();
        if shared.fail_end {
            return Err(TransportError::closed("injected end failure"));
        }
        shared.events.push(Recorded::End);
        Ok(())
    }

    fn is_saturated(&self) -> bool {
        self.lock().saturated
    }

    fn on_drained(&mut self, callback: DrainCallback) {
        self.lock().drain_callbacks.push(callback);
    }

    fn on_response(&mut self, callback: ResponseCallback) {
        self.lock().response_callback = Some(callback);
    }
}

#[derive(Default)]
struct StreamLog {
    written: Vec<Bytes>,
    ended: bool,
    pauses: usize,
    resumes: usize,
}

/// Primary-stream double: records everything forwarded to the primary
/// destination plus pause/resume calls. Clones share one log.
#[derive(Clone, Default)]
pub(crate) struct RecordingStream {
    log: Arc<Mutex<StreamLog>>,
}

impl RecordingStream {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StreamLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn written(&self) -> Vec<Bytes> {
        self.lock().written.clone()
    }

    pub(crate) fn ended(&self) -> bool {
        self.lock().ended
    }

    pub(crate) fn pause_count(&self) -> usize {
        self.lock().pauses
    }

    pub(crate) fn resume_count(&self) -> usize {
        self.lock().resumes
    }
}

impl ReadWriteStream for RecordingStream {
    fn write(&mut self, chunk: Bytes) -> &mut Self {
        self.lock().written.push(chunk);
        self
    }

    fn end(&mut self) {
        self.lock().ended = true;
    }

    fn pause(&mut self) {
        self.lock().pauses += 1;
    }

    fn resume(&mut self) {
        self.lock().resumes += 1;
    }
}
