use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::slack::Attachment;

/// Delivery priority, mapped to an attachment color when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Info => "info",
        }
    }
}

/// Input to the delivery pipeline, produced by the upstream notification
/// router. Immutable once enqueued; the worker enriches a private clone when
/// it needs to (fallback channel, failure context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub subscriber_id: String,
    pub event_type: String,
    pub priority: Priority,
    pub channels: Vec<String>,
    pub payload: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub trace_id: String,
}

impl NotificationRequest {
    pub fn new(
        subscriber_id: impl Into<String>,
        event_type: impl Into<String>,
        priority: Priority,
        channels: Vec<String>,
        payload: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            event_type: event_type.into(),
            priority,
            channels,
            payload,
            scheduled_at: None,
            created_at: Utc::now(),
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Private copy carrying the fallback destination plus the context of the
    /// original failure, so operators can reconstruct what happened from the
    /// fallback message alone.
    pub fn with_fallback(&self, fallback_channel: &str, failure_reason: &str) -> Self {
        let mut enriched = self.clone();
        enriched.payload.insert(
            "original_channels".to_string(),
            serde_json::json!(self.channels),
        );
        enriched.payload.insert(
            "failure_reason".to_string(),
            serde_json::Value::String(failure_reason.to_string()),
        );
        enriched.channels = vec![fallback_channel.to_string()];
        enriched
    }
}

/// Outbound artifact: rendered content bound to resolved channels. Validated
/// before any network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub subscriber_id: String,
    pub channels: Vec<String>,
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,

    pub trace_id: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        subscriber_id: impl Into<String>,
        channels: Vec<String>,
        content: String,
        attachment: Option<Attachment>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber_id: subscriber_id.into(),
            channels,
            content,
            attachment,
            trace_id: trace_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Reason a message was quarantined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    AuthFailure,
    ContentRejected,
    ChannelUnavailable,
    RetriesExhausted,
}

impl DeadLetterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadLetterReason::AuthFailure => "auth_failure",
            DeadLetterReason::ContentRejected => "content_rejected",
            DeadLetterReason::ChannelUnavailable => "channel_unavailable",
            DeadLetterReason::RetriesExhausted => "retries_exhausted",
        }
    }
}

/// Terminal record of a permanently failed message. Written exactly once per
/// message id; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterMessage {
    pub message_id: Uuid,
    pub original_request: NotificationRequest,
    pub error_text: String,
    pub reason: DeadLetterReason,
    pub worker_id: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterMessage {
    pub fn new(
        message_id: Uuid,
        original_request: NotificationRequest,
        error_text: impl Into<String>,
        reason: DeadLetterReason,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            message_id,
            original_request,
            error_text: error_text.into(),
            reason,
            worker_id: worker_id.into(),
            failed_at: Utc::now(),
        }
    }
}
