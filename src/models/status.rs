use std::fmt::{Display, Formatter, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-channel delivery state.
///
/// `pending`, `sent` and `rate_limited` are live states the retry loop may
/// still act on; `delivered`, `failed` and `blocked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelDeliveryState {
    Pending,
    Sent,
    Delivered,
    Failed,
    RateLimited,
    Blocked,
}

impl ChannelDeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChannelDeliveryState::Delivered
                | ChannelDeliveryState::Failed
                | ChannelDeliveryState::Blocked
        )
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "sent" => ChannelDeliveryState::Sent,
            "delivered" => ChannelDeliveryState::Delivered,
            "failed" => ChannelDeliveryState::Failed,
            "rate_limited" => ChannelDeliveryState::RateLimited,
            "blocked" => ChannelDeliveryState::Blocked,
            _ => ChannelDeliveryState::Pending,
        }
    }
}

impl Display for ChannelDeliveryState {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ChannelDeliveryState::Pending => write!(f, "pending"),
            ChannelDeliveryState::Sent => write!(f, "sent"),
            ChannelDeliveryState::Delivered => write!(f, "delivered"),
            ChannelDeliveryState::Failed => write!(f, "failed"),
            ChannelDeliveryState::RateLimited => write!(f, "rate_limited"),
            ChannelDeliveryState::Blocked => write!(f, "blocked"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub channel: String,
    pub state: ChannelDeliveryState,
}

/// Durable delivery record for one message, owned by the status store. The
/// worker reads and writes it through the store interface and never caches
/// it beyond the in-flight request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub message_id: Uuid,
    pub channels: Vec<ChannelStatus>,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl DeliveryStatus {
    /// Channels the retry loop still owes a delivery attempt.
    pub fn undelivered_channels(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|c| !c.state.is_terminal() && c.state != ChannelDeliveryState::Sent)
            .map(|c| c.channel.as_str())
            .collect()
    }
}
