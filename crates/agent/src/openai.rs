//! OpenAI-compatible chat completions client. Perplexity exposes the same
//! wire shape, so one client serves both providers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};

use attache_core::config::AgentConfig;

use crate::retry::{
    is_retryable_http_error, provider_retry_delay_ms, retry_after_from_headers,
    should_retry_status,
};
use crate::types::{AgentError, ChatClient, ChatRequest, ChatResponse, ChatUsage, MessageRole};

const ERROR_BODY_LIMIT: usize = 2_048;

pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl OpenAiCompatClient {
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let provider_name = config.provider.as_str();
        let api_key = config
            .api_key
            .as_ref()
            .ok_or(AgentError::MissingApiKey(provider_name))?;

        let mut auth_header =
            HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret())).map_err(
                |_| AgentError::Configuration("API key is not valid header material".to_string()),
            )?;
        auth_header.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_header);
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

fn completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

/// System messages travel inline; the chat completions schema accepts the
/// `system` role directly.
fn build_request_body(request: &ChatRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|message| {
            let role = match message.role {
                MessageRole::System => "system",
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            };
            json!({"role": role, "content": message.content})
        })
        .collect();
    json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_tokens,
    })
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

fn parse_response(raw: &str) -> Result<ChatResponse, AgentError> {
    let payload: CompletionsResponse = serde_json::from_str(raw)?;
    let usage = payload
        .usage
        .map(|usage| ChatUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
        .unwrap_or_default();
    let choice = payload
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::InvalidResponse("response carried no choices".to_string()))?;
    let text = choice
        .message
        .and_then(|message| message.content)
        .unwrap_or_default();
    Ok(ChatResponse {
        text,
        finish_reason: choice.finish_reason,
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
impl ChatClient for OpenAiCompatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AgentError> {
        let url = completions_url(&self.base_url);
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
                            "completions request rejected, retrying"
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
                            "completions transport error, retrying"
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

    fn config_for(provider: AgentProvider) -> AgentConfig {
        AgentConfig {
            provider,
            agent_id: "attache-agent".to_string(),
            model: "gpt-4o-mini".to_string(),
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
    fn missing_api_key_names_the_provider() {
        let mut config = config_for(AgentProvider::Perplexity);
        config.api_key = None;
        let error = OpenAiCompatClient::from_config(&config)
            .err()
            .expect("must fail");
        assert!(matches!(error, AgentError::MissingApiKey("perplexity")));
    }

    #[test]
    fn default_base_urls_follow_the_provider() {
        let openai = OpenAiCompatClient::from_config(&config_for(AgentProvider::OpenAi))
            .expect("client builds");
        assert_eq!(openai.base_url, "https://api.openai.com/v1");

        let perplexity = OpenAiCompatClient::from_config(&config_for(AgentProvider::Perplexity))
            .expect("client builds");
        assert_eq!(perplexity.base_url, "https://api.perplexity.ai");
    }

    #[test]
    fn completions_url_joins_without_doubling() {
        assert_eq!(
            completions_url("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            completions_url("https://api.perplexity.ai/"),
            "https://api.perplexity.ai/chat/completions"
        );
        assert_eq!(
            completions_url("https://proxy.internal/v1/chat/completions"),
            "https://proxy.internal/v1/chat/completions"
        );
    }

    #[test]
    fn system_messages_stay_inline() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                ChatMessage::system("You are terse."),
                ChatMessage::user("ping"),
            ],
            max_tokens: 128,
        };
        let body = build_request_body(&request);
        let messages = body["messages"].as_array().expect("messages array");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(body["max_tokens"], 128);
    }

    #[test]
    fn first_choice_supplies_text_and_finish_reason() {
        let raw = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "pong"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let response = parse_response(raw).expect("parses");
        assert_eq!(response.text, "pong");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[test]
    fn missing_choices_is_an_invalid_response() {
        let error = parse_response(r#"{"choices": []}"#).err().expect("must fail");
        assert!(matches!(error, AgentError::InvalidResponse(_)));
    }
}
