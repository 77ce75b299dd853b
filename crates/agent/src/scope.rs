//! RAII tracing scopes around agent invocations.
//!
//! Each scope owns a span plus a start instant and emits a closing event on
//! `Drop`, so the duration lands in the log stream even when the invocation
//! bails out early.

use std::time::Instant;

use tracing::{field, Span};

use crate::types::ChatResponse;

/// Covers one full `invoke_agent` call, tool-server lifecycle included.
pub struct InvokeScope {
    span: Span,
    started: Instant,
}

impl InvokeScope {
    pub fn open(conversation_id: &str, correlation_id: &str, prompt: &str) -> Self {
        let span = tracing::info_span!(
            "agent_invoke",
            conversation_id,
            correlation_id,
            prompt_chars = prompt.chars().count(),
            reply_chars = field::Empty,
            outcome = field::Empty,
        );
        span.in_scope(|| tracing::info!(prompt, "agent invocation started"));
        Self {
            span,
            started: Instant::now(),
        }
    }

    pub fn record_reply(&self, reply: &str) {
        self.span.record("reply_chars", reply.chars().count());
        self.span.record("outcome", "ok");
        self.span.in_scope(|| tracing::info!(reply, "agent reply ready"));
    }

    pub fn record_failure(&self, error: &str) {
        self.span.record("outcome", "error");
        self.span.in_scope(|| tracing::warn!(error, "agent invocation failed"));
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for InvokeScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.span
            .in_scope(|| tracing::info!(elapsed_ms, "agent invocation finished"));
    }
}

/// Covers the model call itself and captures the usage the provider
/// actually reported.
pub struct InferenceScope {
    span: Span,
    started: Instant,
}

impl InferenceScope {
    pub fn open(model: &str) -> Self {
        let span = tracing::info_span!(
            "model_inference",
            model,
            input_tokens = field::Empty,
            output_tokens = field::Empty,
            finish_reason = field::Empty,
        );
        Self {
            span,
            started: Instant::now(),
        }
    }

    pub fn record_usage(&self, response: &ChatResponse) {
        self.span.record("input_tokens", response.usage.input_tokens);
        self.span.record("output_tokens", response.usage.output_tokens);
        if let Some(reason) = response.finish_reason.as_deref() {
            self.span.record("finish_reason", reason);
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for InferenceScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.span
            .in_scope(|| tracing::info!(elapsed_ms, "model inference finished"));
    }
}
