//! Anthropic Messages API client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};

use attache_core::config::AgentConfig;

use crate::retry::{
    is_retryable_http_error, provider_retry_delay_ms, retry_after_from_headers,
    should_retry_status,
};
use crate::types::{AgentError, ChatClient, ChatRequest, ChatResponse, ChatUsage, MessageRole};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ERROR_BODY_LIMIT: usize = 2_048;

pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl AnthropicClient {
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or(AgentError::MissingApiKey("anthropic"))?;

        let mut key_header = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|_| AgentError::Configuration("API key is not valid header material".to_string()))?;
        key_header.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key_header);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string());

        Ok(Self {
            http,
            base_url,
            max_retries: config.max_retries,
        })
    }
}

fn messages_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1/messages") {
        base.to_string()
    } else {
        format!("{base}/v1/messages")
    }
}

/// System messages move to the top-level `system` field; only user and
/// assistant turns are legal inside `messages`.
fn build_request_body(request: &ChatRequest) -> Value {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut messages = Vec::new();
    for message in &request.messages {
        match message.role {
            MessageRole::System => system_parts.push(&message.content),
            MessageRole::User => {
                messages.push(json!({"role": "user", "content": message.content}));
            }
            MessageRole::Assistant => {
                messages.push(json!({"role": "assistant", "content": message.content}));
            }
        }
    }
    let mut body = json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "messages": messages,
    });
    if !system_parts.is_empty() {
        body["system"] = Value::String(system_parts.join("\n\n"));
    }
    body
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

fn parse_response(raw: &str) -> Result<ChatResponse, AgentError> {
    let payload: MessagesResponse = serde_json::from_str(raw)?;
    let mut parts: Vec<String> = Vec::new();
    for block in payload.content {
        if block.kind == "text" {
            if let Some(text) = block.text {
                parts.push(text);
            }
        }
    }
    let usage = payload
        .usage
        .map(|usage| ChatUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        })
        .unwrap_or_default();
    Ok(ChatResponse {
        text: parts.join("\n"),
        finish_reason: payload.stop_reason,
        usage,
    })
}

fn clip_body(body: String) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        body
    } else {
        body.chars().take(ERROR_BODY_LIMIT).collect()
    }
}

#[async_trait]
impl ChatClient for AnthropicClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AgentError> {
        let url = messages_url(&self.base_url);
        let body = build_request_body(&request);
        let mut attempt: u32 = 0;
        loop {
            match self.http.post(&url).json(&body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let raw = response.text().await?;
                        return parse_response(&raw);
                    }
                    let code = status.as_u16();
                    let retry_after = retry_after_from_headers(response.headers(), Utc::now());
                    let error_body = response.text().await.unwrap_or_default();
                    if should_retry_status(code) && attempt < self.max_retries {
                        let delay = provider_retry_delay_ms(attempt, retry_after);
                        tracing::warn!(
                            status = code,
                            attempt,
                            delay_ms = delay,
                            "anthropic request rejected, retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(AgentError::HttpStatus {
                        status: code,
                        body: clip_body(error_body),
                    });
                }
                Err(error) => {
                    if is_retryable_http_error(&error) && attempt < self.max_retries {
                        let delay = provider_retry_delay_ms(attempt, None);
                        tracing::warn!(
                            attempt,
                            delay_ms = delay,
                            error = %error,
                            "anthropic transport error, retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(AgentError::Http(error));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use attache_core::config::AgentProvider;
    use secrecy::SecretString;

    fn config_with_key() -> AgentConfig {
        AgentConfig {
            provider: AgentProvider::Anthropic,
            agent_id: "attache-agent".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: Some(SecretString::from("test-key".to_string())),
            base_url: None,
            system_prompt: None,
            max_tokens: 1024,
            timeout_secs: 30,
            max_retries: 2,
            tool_servers: Vec::new(),
        }
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let mut config = config_with_key();
        config.api_key = None;
        let error = AnthropicClient::from_config(&config).err().expect("must fail");
        assert!(matches!(error, AgentError::MissingApiKey("anthropic")));
    }

    #[test]
    fn client_resolves_default_base_url() {
        let client = AnthropicClient::from_config(&config_with_key()).expect("client builds");
        assert_eq!(client.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn messages_url_joins_without_doubling() {
        assert_eq!(
            messages_url("https://api.anthropic.com"),
            "https://api.anthropic.com/v1/messages"
        );
        assert_eq!(
            messages_url("https://api.anthropic.com/"),
            "https://api.anthropic.com/v1/messages"
        );
        assert_eq!(
            messages_url("https://proxy.internal/v1/messages"),
            "https://proxy.internal/v1/messages"
        );
    }

    #[test]
    fn system_messages_move_to_the_system_field() {
        let request = ChatRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            messages: vec![
                ChatMessage::system("You are a helpful assistant."),
                ChatMessage::user("What's the status of PR #42?"),
            ],
            max_tokens: 512,
        };
        let body = build_request_body(&request);
        assert_eq!(body["system"], "You are a helpful assistant.");
        assert_eq!(body["max_tokens"], 512);
        let messages = body["messages"].as_array().expect("messages array");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "What's the status of PR #42?");
    }

    #[test]
    fn body_without_system_message_omits_the_field() {
        let request = ChatRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            messages: vec![ChatMessage::user("hello")],
            max_tokens: 64,
        };
        let body = build_request_body(&request);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn response_text_blocks_are_joined() {
        let raw = r#"{
            "content": [
                {"type": "text", "text": "First paragraph."},
                {"type": "tool_use", "id": "t1", "name": "lookup", "input": {}},
                {"type": "text", "text": "Second paragraph."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 98, "output_tokens": 31}
        }"#;
        let response = parse_response(raw).expect("parses");
        assert_eq!(response.text, "First paragraph.\nSecond paragraph.");
        assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(response.usage.input_tokens, 98);
        assert_eq!(response.usage.output_tokens, 31);
        assert_eq!(response.usage.total_tokens(), 129);
    }

    #[test]
    fn empty_payload_decodes_to_empty_text() {
        let response = parse_response("{}").expect("parses");
        assert_eq!(response.text, "");
        assert_eq!(response.finish_reason, None);
        assert_eq!(response.usage, ChatUsage::default());
    }
}
