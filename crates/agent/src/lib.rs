//! Agent Client Adapter - provider-backed inference behind a never-throws facade
//!
//! This crate is the bridge between hosted conversation handlers and the
//! model providers:
//! - Builds the provider client named in configuration (Anthropic Messages,
//!   or the OpenAI-compatible completions shape that also covers Perplexity)
//! - Connects configured MCP tool servers around each invocation and closes
//!   them when the call ends, success or not
//! - Wraps invocations in tracing scopes that record the prompt, the reply
//!   and the token usage the provider actually reported
//!
//! # Invocation Contract
//!
//! `AgentAdapter::invoke_agent` never fails. Provider errors come back as
//! `Error: <message>` reply text and an empty completion becomes the
//! fallback line, so handlers can forward the return value verbatim.
//!
//! # Key Types
//!
//! - `AgentAdapter` - the facade handlers hold (see `adapter` module)
//! - `ChatClient` - pluggable provider trait for tests and new backends
//! - `ToolServerGuard` - RAII session over streamable-HTTP MCP servers

pub mod adapter;
pub mod anthropic;
pub mod openai;
pub mod retry;
pub mod scope;
pub mod tools;
pub mod types;

pub use adapter::{AgentAdapter, NO_RESPONSE_FALLBACK};
pub use tools::ToolServerGuard;
pub use types::{
    AgentError, ChatClient, ChatMessage, ChatRequest, ChatResponse, ChatUsage, MessageRole,
};
