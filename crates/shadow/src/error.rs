use std::io;
use thiserror::Error;

/// Error raised by a [`TemplateEngine`](crate::TemplateEngine) while evaluating
/// a templated expression.
///
/// Evaluation failures never abort shadowing: a failed target template disables
/// shadowing for the request, and a failed header template leaves the original
/// header untouched.
#[derive(Debug, Error)]
#[error("template evaluation failed for {expression:?}: {reason}")]
pub struct EvaluationError {
    expression: String,
    reason: String,
}

impl EvaluationError {
    pub fn new<E: ToString, R: ToString>(expression: E, reason: R) -> Self {
        Self { expression: expression.to_string(), reason: reason.to_string() }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Error raised by a [`ShadowTransport`](crate::ShadowTransport) on write or end.
///
/// A transport error marks the shadow connection as failed; it is logged and
/// never surfaces on the primary path.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("shadow transport closed: {reason}")]
    Closed { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl TransportError {
    pub fn closed<S: ToString>(str: S) -> Self {
        Self::Closed { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
