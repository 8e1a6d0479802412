//! Telegram Bot API client.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::instrument;
use weatherbot_core::TelegramConfig;

use crate::error::TelegramError;
use crate::types::*;

/// Default timeout for non-polling calls
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Extra time on top of the long-poll timeout before giving up on getUpdates
const POLL_MARGIN_SECS: u64 = 10;
const ALLOWED_UPDATES: &[&str] = &["message"];

#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    /// `{api_url}/bot{token}`
    endpoint: String,
}

// The endpoint embeds the token.
impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("endpoint", &"<redacted>")
            .finish()
    }
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }

    /// The bot's own account; a cheap way to check the token.
    #[instrument(skip(self), level = "info")]
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Long-poll for updates with `update_id >= offset`.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ALLOWED_UPDATES,
        };

        self.call(
            "getUpdates",
            &request,
            Some(Duration::from_secs(timeout_secs + POLL_MARGIN_SECS)),
        )
        .await
    }

    #[instrument(skip(self, message), fields(chat_id = message.chat_id), level = "info")]
    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, TelegramError> {
        self.call("sendMessage", &SendMessageRequest::from(message), None)
            .await
    }

    async fn call<P, T>(
        &self,
        method: &str,
        params: &P,
        timeout: Option<Duration>,
    ) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, method);

        let mut request = self.client.post(&url).json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        self.handle_response(method, response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, TelegramError> {
        let status = response.status();
        let text = response.text().await?;

        // Errors also come back as a JSON envelope, so parse before looking at the status.
        let envelope: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(TelegramError::Parse(format!("{}: {}", method, e)));
            }
            Err(_) => {
                return Err(TelegramError::from_api(status.as_u16(), text, None));
            }
        };

        if envelope.ok {
            return envelope
                .result
                .ok_or_else(|| TelegramError::Parse(format!("{}: ok without result", method)));
        }

        let code = envelope.error_code.unwrap_or(status.as_u16());
        let description = envelope
            .description
            .unwrap_or_else(|| status.to_string());
        let retry_after = envelope.parameters.and_then(|p| p.retry_after);

        tracing::warn!("{} failed with {}: {}", method, code, description);
        Err(TelegramError::from_api(code, description, retry_after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TelegramClient {
        let config = TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_url: server.uri(),
            ..TelegramConfig::default()
        };
        TelegramClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_get_me() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"id": 99, "is_bot": true, "first_name": "Pogoda", "username": "PogodaBot"}
            })))
            .mount(&mock_server)
            .await;

        let me = client_for(&mock_server).get_me().await.unwrap();

        assert!(me.is_bot);
        assert_eq!(me.username.as_deref(), Some("PogodaBot"));
    }

    #[tokio::test]
    async fn test_get_updates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .and(body_partial_json(serde_json::json!({
                "offset": 10,
                "timeout": 0,
                "allowed_updates": ["message"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    {"update_id": 10, "message": {"message_id": 1, "chat": {"id": 5}, "text": "Омск"}},
                    {"update_id": 11, "my_chat_member": {}}
                ]
            })))
            .mount(&mock_server)
            .await;

        let updates = client_for(&mock_server).get_updates(10, 0).await.unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(
            updates[0].message.as_ref().and_then(|m| m.text.as_deref()),
            Some("Омск")
        );
        assert!(updates[1].message.is_none());
    }

    #[tokio::test]
    async fn test_send_message_replies() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": 5,
                "text": "Город Омск сохранен",
                "reply_parameters": {"message_id": 1}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"message_id": 2, "chat": {"id": 5}, "text": "Город Омск сохранен"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outgoing = OutgoingMessage::new(5, "Город Омск сохранен").replying_to(1);
        let sent = client_for(&mock_server).send_message(&outgoing).await.unwrap();

        assert_eq!(sent.message_id, 2);
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            })))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server).get_me().await;

        assert!(matches!(result, Err(TelegramError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_rate_limited_reads_retry_after() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 7",
                "parameters": {"retry_after": 7}
            })))
            .mount(&mock_server)
            .await;

        let outgoing = OutgoingMessage::new(5, "x");
        let result = client_for(&mock_server).send_message(&outgoing).await;

        assert!(matches!(result, Err(TelegramError::RateLimited(7))));
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server).get_updates(0, 0).await;

        assert!(matches!(result, Err(TelegramError::Api { code: 502, .. })));
    }

    #[test]
    fn test_debug_hides_token() {
        let config = TelegramConfig {
            bot_token: "123:secret".to_string(),
            ..TelegramConfig::default()
        };
        let client = TelegramClient::new(&config).unwrap();
        assert!(!format!("{:?}", client).contains("secret"));
    }
}
