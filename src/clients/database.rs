//! Postgres-backed status store and dead-letter sink.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE messages (
//!     id            UUID PRIMARY KEY,
//!     subscriber_id TEXT NOT NULL,
//!     channels      TEXT[] NOT NULL,
//!     content       TEXT NOT NULL,
//!     attachment    JSONB,
//!     trace_id      TEXT NOT NULL,
//!     request       JSONB NOT NULL,
//!     created_at    TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE delivery_status (
//!     message_id      UUID PRIMARY KEY REFERENCES messages (id),
//!     attempt_count   INT NOT NULL DEFAULT 0,
//!     last_attempt_at TIMESTAMPTZ,
//!     delivered_at    TIMESTAMPTZ,
//!     last_error      TEXT,
//!     next_retry_at   TIMESTAMPTZ
//! );
//!
//! CREATE TABLE channel_status (
//!     message_id UUID NOT NULL REFERENCES messages (id),
//!     channel    TEXT NOT NULL,
//!     state      TEXT NOT NULL,
//!     PRIMARY KEY (message_id, channel)
//! );
//!
//! CREATE TABLE dead_letters (
//!     message_id UUID PRIMARY KEY,
//!     request    JSONB NOT NULL,
//!     error_text TEXT NOT NULL,
//!     reason     TEXT NOT NULL,
//!     worker_id  TEXT NOT NULL,
//!     failed_at  TIMESTAMPTZ NOT NULL
//! );
//! ```

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clients::redis::IdempotencyClient;
use crate::models::message::{DeadLetterMessage, Message, NotificationRequest};
use crate::models::status::{ChannelDeliveryState, ChannelStatus, DeliveryStatus};

/// Durable record of per-message, per-channel delivery state. Single source
/// of truth for the retry loop; the worker never caches it beyond the
/// in-flight request.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn record_dispatch(
        &self,
        message: &Message,
        request: &NotificationRequest,
    ) -> Result<(), Error>;

    async fn update_channel_state(
        &self,
        message_id: Uuid,
        channel: &str,
        state: ChannelDeliveryState,
        last_error: Option<&str>,
    ) -> Result<(), Error>;

    /// Increment and return the aggregate attempt count.
    async fn record_attempt(&self, message_id: Uuid) -> Result<u32, Error>;

    async fn schedule_retry(
        &self,
        message_id: Uuid,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), Error>;

    async fn clear_retry(&self, message_id: Uuid) -> Result<(), Error>;

    async fn mark_delivered(&self, message_id: Uuid) -> Result<(), Error>;

    /// Messages with a due retry and at least one channel still owing
    /// delivery, oldest retry first.
    async fn get_failed_messages(&self, limit: i64) -> Result<Vec<Message>, Error>;

    async fn get_delivery_status(&self, message_id: Uuid)
    -> Result<Option<DeliveryStatus>, Error>;

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, Error>;

    async fn get_request(&self, message_id: Uuid)
    -> Result<Option<NotificationRequest>, Error>;
}

/// Write-once quarantine for permanently failed messages, keyed by message
/// id so duplicate writes collapse.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn write(&self, dead_letter: &DeadLetterMessage) -> Result<(), Error>;
}

pub struct PostgresStatusStore {
    client: Client,
}

impl PostgresStatusStore {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let client = spawn_connection(database_url).await?;

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}

async fn spawn_connection(database_url: &str) -> Result<Client, Error> {
    let (client, connection) = tokio_postgres::connect(database_url, NoTls)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "Database connection terminated");
        }
    });

    Ok(client)
}

fn row_to_message(row: &tokio_postgres::Row) -> Message {
    let attachment = row
        .get::<_, Option<serde_json::Value>>("attachment")
        .and_then(|v| serde_json::from_value(v).ok());

    Message {
        id: row.get("id"),
        subscriber_id: row.get("subscriber_id"),
        channels: row.get("channels"),
        content: row.get("content"),
        attachment,
        trace_id: row.get("trace_id"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl StatusStore for PostgresStatusStore {
    async fn record_dispatch(
        &self,
        message: &Message,
        request: &NotificationRequest,
    ) -> Result<(), Error> {
        let attachment = message
            .attachment
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let request_json = serde_json::to_value(request)?;

        self.client
            .execute(
                "INSERT INTO messages (id, subscriber_id, channels, content, attachment, trace_id, request, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (id) DO NOTHING",
                &[
                    &message.id,
                    &message.subscriber_id,
                    &message.channels,
                    &message.content,
                    &attachment,
                    &message.trace_id,
                    &request_json,
                    &message.created_at,
                ],
            )
            .await
            .map_err(|e| anyhow!("Failed to record message: {}", e))?;

        self.client
            .execute(
                "INSERT INTO delivery_status (message_id, attempt_count)
                 VALUES ($1, 0)
                 ON CONFLICT (message_id) DO NOTHING",
                &[&message.id],
            )
            .await
            .map_err(|e| anyhow!("Failed to record delivery status: {}", e))?;

        for channel in &message.channels {
            self.client
                .execute(
                    "INSERT INTO channel_status (message_id, channel, state)
                     VALUES ($1, $2, $3)
                     ON CONFLICT (message_id, channel) DO NOTHING",
                    &[
                        &message.id,
                        channel,
                        &ChannelDeliveryState::Pending.to_string(),
                    ],
                )
                .await
                .map_err(|e| anyhow!("Failed to record channel status: {}", e))?;
        }

        debug!(
            message_id = %message.id,
            trace_id = %message.trace_id,
            channels = message.channels.len(),
            "Dispatch recorded as pending"
        );

        Ok(())
    }

    async fn update_channel_state(
        &self,
        message_id: Uuid,
        channel: &str,
        state: ChannelDeliveryState,
        last_error: Option<&str>,
    ) -> Result<(), Error> {
        self.client
            .execute(
                "INSERT INTO channel_status (message_id, channel, state)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (message_id, channel) DO UPDATE SET state = EXCLUDED.state",
                &[&message_id, &channel, &state.to_string()],
            )
            .await
            .map_err(|e| anyhow!("Failed to update channel state: {}", e))?;

        if let Some(last_error) = last_error {
            self.client
                .execute(
                    "UPDATE delivery_status SET last_error = $2 WHERE message_id = $1",
                    &[&message_id, &last_error],
                )
                .await
                .map_err(|e| anyhow!("Failed to record last error: {}", e))?;
        }

        Ok(())
    }

    async fn record_attempt(&self, message_id: Uuid) -> Result<u32, Error> {
        let row = self
            .client
            .query_one(
                "UPDATE delivery_status
                 SET attempt_count = attempt_count + 1, last_attempt_at = NOW()
                 WHERE message_id = $1
                 RETURNING attempt_count",
                &[&message_id],
            )
            .await
            .map_err(|e| anyhow!("Failed to record attempt: {}", e))?;

        Ok(row.get::<_, i32>(0) as u32)
    }

    async fn schedule_retry(
        &self,
        message_id: Uuid,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.client
            .execute(
                "UPDATE delivery_status SET next_retry_at = $2 WHERE message_id = $1",
                &[&message_id, &next_retry_at],
            )
            .await
            .map_err(|e| anyhow!("Failed to schedule retry: {}", e))?;

        Ok(())
    }

    async fn clear_retry(&self, message_id: Uuid) -> Result<(), Error> {
        self.client
            .execute(
                "UPDATE delivery_status SET next_retry_at = NULL WHERE message_id = $1",
                &[&message_id],
            )
            .await
            .map_err(|e| anyhow!("Failed to clear retry schedule: {}", e))?;

        Ok(())
    }

    async fn mark_delivered(&self, message_id: Uuid) -> Result<(), Error> {
        self.client
            .execute(
                "UPDATE delivery_status
                 SET delivered_at = NOW(), next_retry_at = NULL
                 WHERE message_id = $1",
                &[&message_id],
            )
            .await
            .map_err(|e| anyhow!("Failed to mark delivered: {}", e))?;

        self.client
            .execute(
                "UPDATE channel_status SET state = $2 WHERE message_id = $1",
                &[&message_id, &ChannelDeliveryState::Delivered.to_string()],
            )
            .await
            .map_err(|e| anyhow!("Failed to mark channels delivered: {}", e))?;

        Ok(())
    }

    async fn get_failed_messages(&self, limit: i64) -> Result<Vec<Message>, Error> {
        let rows = self
            .client
            .query(
                "SELECT m.id, m.subscriber_id, m.channels, m.content, m.attachment, m.trace_id, m.created_at
                 FROM messages m
                 JOIN delivery_status d ON d.message_id = m.id
                 WHERE d.next_retry_at IS NOT NULL
                   AND d.next_retry_at <= NOW()
                   AND EXISTS (
                       SELECT 1 FROM channel_status c
                       WHERE c.message_id = m.id AND c.state IN ('pending', 'rate_limited')
                   )
                 ORDER BY d.next_retry_at ASC
                 LIMIT $1",
                &[&limit],
            )
            .await
            .map_err(|e| anyhow!("Failed to query retryable messages: {}", e))?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn get_delivery_status(
        &self,
        message_id: Uuid,
    ) -> Result<Option<DeliveryStatus>, Error> {
        let Some(row) = self
            .client
            .query_opt(
                "SELECT attempt_count, last_attempt_at, delivered_at, last_error, next_retry_at
                 FROM delivery_status
                 WHERE message_id = $1",
                &[&message_id],
            )
            .await
            .map_err(|e| anyhow!("Failed to query delivery status: {}", e))?
        else {
            return Ok(None);
        };

        let channel_rows = self
            .client
            .query(
                "SELECT channel, state FROM channel_status WHERE message_id = $1 ORDER BY channel",
                &[&message_id],
            )
            .await
            .map_err(|e| anyhow!("Failed to query channel statuses: {}", e))?;

        let channels = channel_rows
            .iter()
            .map(|r| ChannelStatus {
                channel: r.get("channel"),
                state: ChannelDeliveryState::from_str(r.get("state")),
            })
            .collect();

        Ok(Some(DeliveryStatus {
            message_id,
            channels,
            attempt_count: row.get::<_, i32>("attempt_count") as u32,
            last_attempt_at: row.get("last_attempt_at"),
            delivered_at: row.get("delivered_at"),
            last_error: row.get("last_error"),
            next_retry_at: row.get("next_retry_at"),
        }))
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, Error> {
        let row = self
            .client
            .query_opt(
                "SELECT id, subscriber_id, channels, content, attachment, trace_id, created_at
                 FROM messages
                 WHERE id = $1",
                &[&message_id],
            )
            .await
            .map_err(|e| anyhow!("Failed to query message: {}", e))?;

        Ok(row.as_ref().map(row_to_message))
    }

    async fn get_request(
        &self,
        message_id: Uuid,
    ) -> Result<Option<NotificationRequest>, Error> {
        let row = self
            .client
            .query_opt(
                "SELECT request FROM messages WHERE id = $1",
                &[&message_id],
            )
            .await
            .map_err(|e| anyhow!("Failed to query original request: {}", e))?;

        match row {
            None => Ok(None),
            Some(row) => {
                let request = serde_json::from_value(row.get::<_, serde_json::Value>("request"))
                    .map_err(|e| anyhow!("Stored request is not decodable: {}", e))?;
                Ok(Some(request))
            }
        }
    }
}

/// Dead-letter sink over Postgres with a Redis TTL mark as the fast-path
/// duplicate guard. The `ON CONFLICT DO NOTHING` key on `message_id` is the
/// ground truth; the mark only saves a round trip on repeats.
pub struct PostgresDeadLetterStore {
    client: Client,
    idempotency: IdempotencyClient,
}

impl PostgresDeadLetterStore {
    pub async fn connect(
        database_url: &str,
        idempotency: IdempotencyClient,
    ) -> Result<Self, Error> {
        let client = spawn_connection(database_url).await?;

        info!("Dead letter store connected");

        Ok(Self {
            client,
            idempotency,
        })
    }
}

#[async_trait]
impl DeadLetterSink for PostgresDeadLetterStore {
    async fn write(&self, dead_letter: &DeadLetterMessage) -> Result<(), Error> {
        match self.idempotency.is_dead_lettered(dead_letter.message_id).await {
            Ok(true) => {
                debug!(
                    message_id = %dead_letter.message_id,
                    "Message already quarantined, skipping duplicate dead letter"
                );
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "Idempotency check failed, falling through to database");
            }
        }

        let request_json = serde_json::to_value(&dead_letter.original_request)?;

        self.client
            .execute(
                "INSERT INTO dead_letters (message_id, request, error_text, reason, worker_id, failed_at)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (message_id) DO NOTHING",
                &[
                    &dead_letter.message_id,
                    &request_json,
                    &dead_letter.error_text,
                    &dead_letter.reason.as_str(),
                    &dead_letter.worker_id,
                    &dead_letter.failed_at,
                ],
            )
            .await
            .map_err(|e| anyhow!("Failed to write dead letter: {}", e))?;

        if let Err(e) = self
            .idempotency
            .mark_dead_lettered(dead_letter.message_id)
            .await
        {
            warn!(error = %e, "Failed to mark dead letter in cache");
        }

        Ok(())
    }
}
