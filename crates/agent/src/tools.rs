//! Tool-server sessions scoped to one agent invocation.
//!
//! Servers speak the streamable-HTTP MCP transport: a JSON-RPC `initialize`
//! opens the session (the server may hand back an `Mcp-Session-Id` header)
//! and a DELETE against the same endpoint closes it. A failed connection is
//! logged and skipped so the invocation still runs with whatever servers
//! came up.

use reqwest::header::{HeaderMap, ACCEPT};
use serde_json::json;

use crate::types::AgentError;

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// Open sessions for one invocation. Dropping the guard closes every
/// session on a detached task, so teardown survives early returns.
pub struct ToolServerGuard {
    http: reqwest::Client,
    sessions: Vec<ToolServerSession>,
}

#[derive(Debug, Clone)]
struct ToolServerSession {
    endpoint: String,
    session_id: Option<String>,
}

impl ToolServerGuard {
    pub async fn connect(http: &reqwest::Client, endpoints: &[String]) -> Self {
        let mut sessions = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            match initialize_session(http, endpoint).await {
                Ok(session_id) => {
                    tracing::info!(endpoint, "tool server connected");
                    sessions.push(ToolServerSession {
                        endpoint: endpoint.clone(),
                        session_id,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        endpoint,
                        error = %error,
                        "tool server connection failed, continuing without it"
                    );
                }
            }
        }
        Self {
            http: http.clone(),
            sessions,
        }
    }

    pub fn connected(&self) -> usize {
        self.sessions.len()
    }
}

async fn initialize_session(
    http: &reqwest::Client,
    endpoint: &str,
) -> Result<Option<String>, AgentError> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "attache",
                "version": env!("CARGO_PKG_VERSION"),
            },
        },
    });
    let response = http
        .post(endpoint)
        .header(ACCEPT, ACCEPT_BOTH)
        .json(&body)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AgentError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }
    let session_id = extract_session_id(response.headers());

    // The initialized notification completes the handshake. Servers that
    // reject it still hold a usable session, so failures only warn.
    let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let mut request = http
        .post(endpoint)
        .header(ACCEPT, ACCEPT_BOTH)
        .json(&notification);
    if let Some(id) = &session_id {
        request = request.header(SESSION_HEADER, id);
    }
    if let Err(error) = request.send().await {
        tracing::warn!(endpoint, error = %error, "initialized notification failed");
    }
    Ok(session_id)
}

fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

impl Drop for ToolServerGuard {
    fn drop(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("tool server guard dropped outside a runtime, sessions left open");
            return;
        };
        for session in self.sessions.drain(..) {
            let http = self.http.clone();
            handle.spawn(async move {
                let mut request = http.delete(&session.endpoint);
                if let Some(id) = &session.session_id {
                    request = request.header(SESSION_HEADER, id);
                }
                match request.send().await {
                    Ok(_) => {
                        tracing::info!(endpoint = %session.endpoint, "tool server session closed");
                    }
                    Err(error) => {
                        tracing::warn!(
                            endpoint = %session.endpoint,
                            error = %error,
                            "tool server close failed"
                        );
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn session_id_is_read_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("abc-123"));
        assert_eq!(extract_session_id(&headers), Some("abc-123".to_string()));

        assert_eq!(extract_session_id(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn guard_with_no_endpoints_holds_no_sessions() {
        let http = reqwest::Client::new();
        let guard = ToolServerGuard::connect(&http, &[]).await;
        assert_eq!(guard.connected(), 0);
    }

    #[tokio::test]
    async fn unreachable_server_is_skipped_not_fatal() {
        let http = reqwest::Client::new();
        let endpoints = vec!["http://127.0.0.1:1/mcp".to_string()];
        let guard = ToolServerGuard::connect(&http, &endpoints).await;
        assert_eq!(guard.connected(), 0);
    }
}
