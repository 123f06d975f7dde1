use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::SlackConfig;
use crate::error::DeliveryError;
use crate::models::slack::{
    ApiAck, Attachment, AuthTestResponse, ChannelInfo, ChannelInfoResponse, DeleteMessageRequest,
    PostMessageRequest, PostMessageResponse, SendReceipt, UpdateMessageRequest,
};
use crate::models::validation::{MAX_CONTENT_LENGTH, is_valid_channel};

/// Interface the worker consumes to reach the chat platform. Every failure
/// carries a classified `DeliveryError`, which is what the worker's failure
/// policy dispatches on.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send_message(
        &self,
        channel: &str,
        text: &str,
        attachment: Option<&Attachment>,
        trace_id: &str,
    ) -> Result<SendReceipt, DeliveryError>;

    async fn update_message(
        &self,
        channel: &str,
        message_id: &str,
        text: &str,
    ) -> Result<(), DeliveryError>;

    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<(), DeliveryError>;

    async fn get_channel_info(&self, channel: &str) -> Result<ChannelInfo, DeliveryError>;

    async fn health_check(&self) -> Result<(), DeliveryError>;
}

/// HTTP client for the platform's REST API. The only component aware of its
/// JSON envelope and status-code conventions.
pub struct SlackClient {
    http_client: Client,
    api_base_url: String,
    bot_token: String,
}

impl SlackClient {
    /// Validate configuration, then probe connectivity once. A failed probe
    /// fails construction, so a misconfigured token is caught at startup
    /// rather than on the first delivery.
    pub async fn connect(config: &SlackConfig) -> Result<Self, Error> {
        let client = Self::build(config)?;

        client
            .health_check()
            .await
            .map_err(|e| anyhow!("Chat platform connectivity probe failed: {}", e))?;

        info!(base_url = %client.api_base_url, "Chat platform client initialized");

        Ok(client)
    }

    /// One-shot connectivity probe without keeping a client, for the
    /// maintenance health checker.
    pub async fn probe(config: &SlackConfig) -> Result<(), DeliveryError> {
        let client =
            Self::build(config).map_err(|e| DeliveryError::Unknown(e.to_string()))?;
        client.health_check().await
    }

    fn build(config: &SlackConfig) -> Result<Self, Error> {
        if config.bot_token.trim().is_empty() {
            return Err(anyhow!("Chat platform credential token must not be empty"));
        }

        if !is_valid_channel(&config.default_channel) {
            return Err(anyhow!(
                "Default channel '{}' is not a well-formed channel name",
                config.default_channel
            ));
        }

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        Ok(Self {
            http_client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    async fn post_api<B, R>(&self, method: &str, body: &B) -> Result<R, DeliveryError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.api_base_url, method);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        Self::decode_response(response).await
    }

    async fn decode_response<R>(response: reqwest::Response) -> Result<R, DeliveryError>
    where
        R: DeserializeOwned,
    {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(DeliveryError::RateLimited {
                retry_after_seconds,
            });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DeliveryError::Auth(format!(
                "platform returned status {}",
                status
            )));
        }

        if status.is_server_error() {
            return Err(DeliveryError::Transient(format!(
                "platform returned status {}",
                status
            )));
        }

        if !status.is_success() {
            return Err(DeliveryError::Unknown(format!(
                "platform returned status {}",
                status
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| DeliveryError::Unknown(format!("malformed platform response: {}", e)))
    }
}

#[async_trait]
impl DeliveryClient for SlackClient {
    async fn send_message(
        &self,
        channel: &str,
        text: &str,
        attachment: Option<&Attachment>,
        trace_id: &str,
    ) -> Result<SendReceipt, DeliveryError> {
        // Pre-flight: nothing leaves the process without passing the same
        // grammar and ceiling the platform itself would enforce.
        if !is_valid_channel(channel) {
            return Err(DeliveryError::Channel(format!(
                "invalid channel syntax: {}",
                channel
            )));
        }
        if text.trim().is_empty() {
            return Err(DeliveryError::Content("empty message body".to_string()));
        }
        if text.chars().count() > MAX_CONTENT_LENGTH {
            return Err(DeliveryError::Content(format!(
                "content exceeds {} character ceiling",
                MAX_CONTENT_LENGTH
            )));
        }

        debug!(channel, trace_id, "Posting message to chat platform");

        let request = PostMessageRequest {
            channel: channel.to_string(),
            text: text.to_string(),
            attachments: attachment.map(|a| vec![a.clone()]),
        };

        let response: PostMessageResponse = self.post_api("chat.postMessage", &request).await?;

        if !response.ok {
            return Err(classify_api_error(response.error.as_deref()));
        }

        let message_id = response
            .ts
            .ok_or_else(|| DeliveryError::Unknown("acknowledgment missing message id".to_string()))?;

        Ok(SendReceipt {
            message_id,
            channel_id: response.channel.unwrap_or_else(|| channel.to_string()),
        })
    }

    async fn update_message(
        &self,
        channel: &str,
        message_id: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        if text.trim().is_empty() {
            return Err(DeliveryError::Content("empty message body".to_string()));
        }

        let request = UpdateMessageRequest {
            channel: channel.to_string(),
            ts: message_id.to_string(),
            text: text.to_string(),
        };

        let response: ApiAck = self.post_api("chat.update", &request).await?;

        if !response.ok {
            return Err(classify_api_error(response.error.as_deref()));
        }

        Ok(())
    }

    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<(), DeliveryError> {
        let request = DeleteMessageRequest {
            channel: channel.to_string(),
            ts: message_id.to_string(),
        };

        let response: ApiAck = self.post_api("chat.delete", &request).await?;

        if !response.ok {
            return Err(classify_api_error(response.error.as_deref()));
        }

        Ok(())
    }

    async fn get_channel_info(&self, channel: &str) -> Result<ChannelInfo, DeliveryError> {
        let url = format!("{}/conversations.info", self.api_base_url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.bot_token)
            .query(&[("channel", channel)])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let info: ChannelInfoResponse = Self::decode_response(response).await?;

        if !info.ok {
            return Err(classify_api_error(info.error.as_deref()));
        }

        info.channel
            .ok_or_else(|| DeliveryError::Unknown("channel metadata missing from response".to_string()))
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        let response: AuthTestResponse =
            self.post_api("auth.test", &serde_json::json!({})).await?;

        if !response.ok {
            return Err(classify_api_error(response.error.as_deref()));
        }

        debug!(
            team = response.team.as_deref().unwrap_or("unknown"),
            user = response.user.as_deref().unwrap_or("unknown"),
            "Chat platform connectivity probe passed"
        );

        Ok(())
    }
}

fn classify_transport_error(error: reqwest::Error) -> DeliveryError {
    if error.is_timeout() || error.is_connect() {
        DeliveryError::Transient(error.to_string())
    } else {
        DeliveryError::Unknown(error.to_string())
    }
}

/// Map the platform's machine-readable error codes onto the delivery
/// taxonomy. Codes not in the table land in `Unknown`, which the worker
/// treats as retryable up to the attempts cap.
fn classify_api_error(code: Option<&str>) -> DeliveryError {
    let code = code.unwrap_or("missing_error_code");

    match code {
        "ratelimited" | "rate_limited" => DeliveryError::RateLimited {
            retry_after_seconds: None,
        },
        "invalid_auth" | "not_authed" | "token_revoked" | "token_expired"
        | "account_inactive" => DeliveryError::Auth(code.to_string()),
        "channel_not_found" | "is_archived" | "channel_is_archived" | "not_in_channel"
        | "restricted_action" => DeliveryError::Channel(code.to_string()),
        "msg_too_long" | "no_text" | "invalid_blocks" | "invalid_attachments" => {
            DeliveryError::Content(code.to_string())
        }
        "internal_error" | "service_unavailable" | "fatal_error" => {
            DeliveryError::Transient(code.to_string())
        }
        other => DeliveryError::Unknown(other.to_string()),
    }
}
