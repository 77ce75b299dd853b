//! Provider-neutral chat types shared by the Anthropic and OpenAI-compatible
//! clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a single chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One turn of conversation input for a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single completion request. System instructions travel as a
/// [`MessageRole::System`] message; each client maps them to its provider's
/// wire shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// Token accounting as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ChatUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Completed model output.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: ChatUsage,
}

/// Errors surfaced by provider clients.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("missing API key for the {0} provider")]
    MissingApiKey(&'static str),
    #[error("invalid client configuration: {0}")]
    Configuration(String),
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("failed to decode provider payload: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Seam between the adapter and concrete provider clients.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_roles() {
        assert_eq!(ChatMessage::system("be brief").role, MessageRole::System);
        assert_eq!(ChatMessage::user("hi").role, MessageRole::User);
        assert_eq!(ChatMessage::assistant("hello").role, MessageRole::Assistant);
    }

    #[test]
    fn usage_totals_both_directions() {
        let usage = ChatUsage {
            input_tokens: 120,
            output_tokens: 34,
        };
        assert_eq!(usage.total_tokens(), 154);
    }

    #[test]
    fn roles_serialize_snake_case() {
        let encoded = serde_json::to_string(&MessageRole::Assistant).expect("serialize role");
        assert_eq!(encoded, "\"assistant\"");
    }
}
