// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messages API transport.
//!
//! One request, one response. Overload and rate-limit statuses get a single
//! delayed second attempt; every other failure is reported against the tier
//! the request was made for.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use tollgate_core::{Tier, TollgateError};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Upper bound on a single request, connection included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Attempts made after the first one for retryable statuses.
const RETRIES: u32 = 1;

/// Outcome of one HTTP exchange.
enum Attempt {
    Done(Result<MessageResponse, TollgateError>),
    Retryable(TollgateError),
}

/// Authenticated Messages API client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    endpoint: String,
    retry_delay: Duration,
}

impl AnthropicClient {
    /// Builds a client that sends `api_key` and `api_version` on every call.
    pub fn new(api_key: &str, api_version: &str) -> Result<Self, TollgateError> {
        let mut key = header_value(api_key, "API key")?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", header_value(api_version, "API version")?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TollgateError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: MESSAGES_URL.to_string(),
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Points the client at another endpoint, e.g. a proxy or a test server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sends `request` and returns the parsed response.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
        tier: Tier,
    ) -> Result<MessageResponse, TollgateError> {
        let mut attempt = 0;
        loop {
            match self.send_once(request, tier).await {
                Attempt::Done(result) => return result,
                Attempt::Retryable(err) if attempt >= RETRIES => return Err(err),
                Attempt::Retryable(err) => {
                    attempt += 1;
                    warn!(tier = %tier, attempt, error = %err, "cloud request throttled, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn send_once(&self, request: &MessageRequest, tier: Tier) -> Attempt {
        let response = match self.http.post(&self.endpoint).json(request).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Done(Err(transport_error(e, tier))),
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Attempt::Done(Err(transport_error(e, tier))),
        };
        debug!(tier = %tier, status = %status, bytes = body.len(), "messages API responded");

        if status.is_success() {
            return Attempt::Done(serde_json::from_str(&body).map_err(|e| {
                TollgateError::BackendFailure {
                    tier,
                    message: format!("unreadable Messages API response: {e}"),
                    source: Some(Box::new(e)),
                }
            }));
        }

        let err = TollgateError::backend(tier, describe_failure(status, &body));
        if is_retryable(status) {
            Attempt::Retryable(err)
        } else {
            Attempt::Done(Err(err))
        }
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue, TollgateError> {
    HeaderValue::from_str(value)
        .map_err(|e| TollgateError::Config(format!("invalid {what} header value: {e}")))
}

/// Prefers the API's own error type and message over the raw body.
fn describe_failure(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api) => format!("{status} {}: {}", api.error.type_, api.error.message),
        Err(_) => format!("{status}: {body}"),
    }
}

fn transport_error(e: reqwest::Error, tier: Tier) -> TollgateError {
    if e.is_timeout() {
        return TollgateError::Timeout {
            duration: REQUEST_TIMEOUT,
        };
    }
    TollgateError::BackendFailure {
        tier,
        message: format!("request to the Messages API failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Rate limiting, server errors and overload.
fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApiMessage;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> AnthropicClient {
        AnthropicClient::new("sk-ant-test", "2023-06-01")
            .unwrap()
            .with_base_url(uri)
            .with_retry_delay(Duration::from_millis(5))
    }

    fn request() -> MessageRequest {
        MessageRequest {
            model: "claude-3-5-haiku-20241022".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: "ping".into(),
            }],
            max_tokens: 256,
        }
    }

    fn reply(id: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": id,
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "pong"}],
            "model": "claude-3-5-haiku-20241022",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 1}
        }))
    }

    fn api_error(status: u16, kind: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": kind, "message": "try later"}
        }))
    }

    #[tokio::test]
    async fn sends_auth_headers_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(header("content-type", "application/json"))
            .respond_with(reply("msg_ok"))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client(&server.uri())
            .complete_message(&request(), Tier::CloudFast)
            .await
            .unwrap();
        assert_eq!(resp.id, "msg_ok");
        assert_eq!(resp.text(), "pong");
        assert_eq!(resp.usage.input_tokens, 3);
    }

    #[tokio::test]
    async fn one_retry_for_each_retryable_status() {
        for status in [429, 500, 503, 529] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(api_error(status, "overloaded_error"))
                .up_to_n_times(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .respond_with(reply("msg_second"))
                .mount(&server)
                .await;

            let resp = client(&server.uri())
                .complete_message(&request(), Tier::CloudBalanced)
                .await
                .unwrap();
            assert_eq!(resp.id, "msg_second", "status {status}");
        }
    }

    #[tokio::test]
    async fn gives_up_after_the_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(api_error(529, "overloaded_error"))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .complete_message(&request(), Tier::CloudBest)
            .await
            .unwrap_err();
        assert!(matches!(err, TollgateError::BackendFailure { tier: Tier::CloudBest, .. }));
        assert!(err.to_string().contains("overloaded_error"), "{err}");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(api_error(400, "invalid_request_error"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .complete_message(&request(), Tier::CloudFast)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid_request_error"), "{err}");
    }

    #[tokio::test]
    async fn garbage_body_is_a_backend_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .complete_message(&request(), Tier::CloudFast)
            .await
            .unwrap_err();
        assert!(matches!(err, TollgateError::BackendFailure { tier: Tier::CloudFast, .. }));
    }

    #[test]
    fn describe_failure_falls_back_to_raw_body() {
        assert_eq!(
            describe_failure(StatusCode::BAD_GATEWAY, "upstream down"),
            "502 Bad Gateway: upstream down"
        );
    }
}
