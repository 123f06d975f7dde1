use anyhow::{Error, Result, anyhow};
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use uuid::Uuid;

use crate::config::{Config, RetryConfig};
use crate::utils::retry_with_backoff;

/// TTL-bounded marks recording which message ids have already been
/// quarantined, so repeated dead-letter writes short-circuit without a
/// database round trip.
#[derive(Clone)]
pub struct IdempotencyClient {
    connection: MultiplexedConnection,
    ttl_seconds: u64,
    retry_config: RetryConfig,
}

impl IdempotencyClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let client = Client::open(config.redis_url.as_str())
            .map_err(|_| anyhow!("Failed to create redis client"))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|_| anyhow!("Failed to connect to redis client"))?;

        Ok(Self {
            connection,
            ttl_seconds: config.idempotency_ttl_seconds,
            retry_config: config.retry_config(),
        })
    }

    pub async fn is_dead_lettered(&self, message_id: Uuid) -> Result<bool, Error> {
        let key = Self::key(message_id);
        let mut connection = self.connection.clone();

        let exists: bool = connection
            .exists(&key)
            .await
            .map_err(|e| anyhow!("Failed to read idempotency mark: {}", e))?;

        Ok(exists)
    }

    pub async fn mark_dead_lettered(&self, message_id: Uuid) -> Result<(), Error> {
        let key = Self::key(message_id);

        retry_with_backoff(&self.retry_config, || {
            let key = key.clone();
            let mut connection = self.connection.clone();
            let ttl = self.ttl_seconds;

            async move {
                connection
                    .set_ex::<_, _, ()>(&key, "quarantined", ttl)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await
        .map_err(|e| anyhow!("Failed to write idempotency mark: {}", e))?;

        Ok(())
    }

    fn key(message_id: Uuid) -> String {
        format!("dead_letter:{}", message_id)
    }
}
