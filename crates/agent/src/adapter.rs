//! The agent adapter hosted handlers call into.
//!
//! The adapter never fails: provider errors are rendered as `Error: <message>`
//! text and an empty completion becomes the fallback line, so callers can
//! forward whatever comes back as the conversation reply.

use std::sync::Arc;

use tracing::Instrument;

use attache_core::config::{AgentConfig, AgentProvider};

use crate::anthropic::AnthropicClient;
use crate::openai::OpenAiCompatClient;
use crate::scope::{InferenceScope, InvokeScope};
use crate::tools::ToolServerGuard;
use crate::types::{AgentError, ChatClient, ChatMessage, ChatRequest, ChatResponse};

/// Reply used when the provider completes with empty text.
pub const NO_RESPONSE_FALLBACK: &str = "Sorry, I couldn't get a response from the agent.";

pub struct AgentAdapter {
    client: Arc<dyn ChatClient>,
    http: reqwest::Client,
    config: AgentConfig,
}

impl AgentAdapter {
    /// Builds the provider client the configuration names.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let client: Arc<dyn ChatClient> = match config.provider {
            AgentProvider::Anthropic => Arc::new(AnthropicClient::from_config(config)?),
            AgentProvider::OpenAi | AgentProvider::Perplexity => {
                Arc::new(OpenAiCompatClient::from_config(config)?)
            }
        };
        Ok(Self::with_client(client, config.clone()))
    }

    /// Seam for tests and alternative backends.
    pub fn with_client(client: Arc<dyn ChatClient>, config: AgentConfig) -> Self {
        Self {
            client,
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.config.agent_id
    }

    fn build_request(&self, prompt: &str) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.config.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(prompt));
        ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
        }
    }

    /// One prompt through the model, with tool servers held open for the
    /// duration of the call.
    async fn complete_prompt(&self, prompt: &str) -> Result<ChatResponse, AgentError> {
        let _tools = ToolServerGuard::connect(&self.http, &self.config.tool_servers).await;
        let inference = InferenceScope::open(&self.config.model);
        let outcome = self
            .client
            .complete(self.build_request(prompt))
            .instrument(inference.span().clone())
            .await;
        if let Ok(response) = &outcome {
            inference.record_usage(response);
        }
        outcome
    }

    /// Runs the prompt and always comes back with reply text.
    pub async fn invoke_agent(&self, prompt: &str) -> String {
        render_reply(self.complete_prompt(prompt).await)
    }

    /// Same contract as [`AgentAdapter::invoke_agent`], wrapped in a tracing
    /// scope keyed by conversation and correlation ids.
    pub async fn invoke_agent_scoped(
        &self,
        prompt: &str,
        conversation_id: &str,
        correlation_id: &str,
    ) -> String {
        let invoke = InvokeScope::open(conversation_id, correlation_id, prompt);
        let outcome = self
            .complete_prompt(prompt)
            .instrument(invoke.span().clone())
            .await;
        let failed = outcome.is_err();
        if let Err(error) = &outcome {
            invoke.record_failure(&error.to_string());
        }
        let reply = render_reply(outcome);
        if !failed {
            invoke.record_reply(&reply);
        }
        reply
    }
}

fn render_reply(outcome: Result<ChatResponse, AgentError>) -> String {
    match outcome {
        Ok(response) if response.text.is_empty() => NO_RESPONSE_FALLBACK.to_string(),
        Ok(response) => response.text,
        Err(error) => format!("Error: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatUsage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn test_config() -> AgentConfig {
        AgentConfig {
            provider: AgentProvider::Anthropic,
            agent_id: "attache-agent".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: None,
            base_url: None,
            system_prompt: Some("You are a contributor assistant.".to_string()),
            max_tokens: 256,
            timeout_secs: 5,
            max_retries: 0,
            tool_servers: Vec::new(),
        }
    }

    #[derive(Default)]
    struct CapturingClient {
        last_request: Mutex<Option<ChatRequest>>,
        reply: String,
    }

    impl CapturingClient {
        fn replying(reply: &str) -> Self {
            Self {
                last_request: Mutex::new(None),
                reply: reply.to_string(),
            }
        }
    }

    #[async_trait]
    impl ChatClient for CapturingClient {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AgentError> {
            *self.last_request.lock().expect("lock") = Some(request);
            Ok(ChatResponse {
                text: self.reply.clone(),
                finish_reason: Some("end_turn".to_string()),
                usage: ChatUsage {
                    input_tokens: 10,
                    output_tokens: 4,
                },
            })
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ChatClient for FailingClient {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, AgentError> {
            Err(AgentError::HttpStatus {
                status: 500,
                body: "upstream exploded".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn invoke_returns_the_model_text() {
        let client = Arc::new(CapturingClient::replying("All green on PR #42."));
        let adapter = AgentAdapter::with_client(client.clone(), test_config());

        let reply = adapter.invoke_agent("What's the status of PR #42?").await;
        assert_eq!(reply, "All green on PR #42.");

        let request = client
            .last_request
            .lock()
            .expect("lock")
            .clone()
            .expect("request captured");
        assert_eq!(request.model, "claude-sonnet-4-20250514");
        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].content, "You are a contributor assistant.");
        assert_eq!(request.messages[1].content, "What's the status of PR #42?");
    }

    #[tokio::test]
    async fn empty_completion_becomes_the_fallback_line() {
        let client = Arc::new(CapturingClient::replying(""));
        let adapter = AgentAdapter::with_client(client, test_config());

        let reply = adapter.invoke_agent("hello?").await;
        assert_eq!(reply, NO_RESPONSE_FALLBACK);
    }

    #[tokio::test]
    async fn provider_errors_never_bubble() {
        let adapter = AgentAdapter::with_client(Arc::new(FailingClient), test_config());

        let reply = adapter.invoke_agent("hello?").await;
        assert!(reply.starts_with("Error: "), "unexpected reply: {reply}");
        assert!(reply.contains("500"), "status missing from: {reply}");
    }

    #[tokio::test]
    async fn scoped_invocation_keeps_the_same_contract() {
        let client = Arc::new(CapturingClient::replying("scoped reply"));
        let adapter = AgentAdapter::with_client(client, test_config());

        let reply = adapter
            .invoke_agent_scoped("ping", "conv-7", "corr-12")
            .await;
        assert_eq!(reply, "scoped reply");

        let adapter = AgentAdapter::with_client(Arc::new(FailingClient), test_config());
        let reply = adapter
            .invoke_agent_scoped("ping", "conv-7", "corr-13")
            .await;
        assert!(reply.starts_with("Error: "));
    }

    #[tokio::test]
    async fn config_without_system_prompt_sends_one_message() {
        let mut config = test_config();
        config.system_prompt = None;
        let client = Arc::new(CapturingClient::replying("ok"));
        let adapter = AgentAdapter::with_client(client.clone(), config);

        adapter.invoke_agent("just this").await;

        let request = client
            .last_request
            .lock()
            .expect("lock")
            .clone()
            .expect("request captured");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "just this");
    }
}
