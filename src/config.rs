use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub slack_bot_token: String,
    pub default_channel: String,

    #[serde(default = "default_api_base_url")]
    pub slack_api_base_url: String,

    pub database_url: String,

    pub redis_url: String,
    pub idempotency_ttl_seconds: u64,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_min_send_interval_ms")]
    pub min_send_interval_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,

    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,

    #[serde(default)]
    pub processing_delay_ms: u64,

    pub max_retry_attempts: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub retry_backoff_multiplier: u64,

    #[serde(default = "default_retry_scan_interval_seconds")]
    pub retry_scan_interval_seconds: u64,

    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: i64,

    #[serde(default = "default_channel_audit_interval_seconds")]
    pub channel_audit_interval_seconds: u64,

    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,

    pub worker_concurrency: usize,

    pub server_port: u16,
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_min_send_interval_ms() -> u64 {
    1_000
}

fn default_queue_capacity() -> usize {
    100
}

fn default_enqueue_timeout_ms() -> u64 {
    500
}

fn default_idle_timeout_seconds() -> u64 {
    30
}

fn default_retry_scan_interval_seconds() -> u64 {
    60
}

fn default_retry_batch_size() -> i64 {
    50
}

fn default_channel_audit_interval_seconds() -> u64 {
    300
}

fn default_shutdown_grace_seconds() -> u64 {
    10
}

/// Backoff schedule shared by the in-call retry helper and the worker's
/// retry scheduling.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: u64,
}

/// Connection settings for the chat-platform client.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub api_base_url: String,
    pub default_channel: String,
    pub request_timeout: Duration,
}

/// Knobs owned by one worker instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue_capacity: usize,
    pub enqueue_timeout: Duration,
    pub idle_timeout: Duration,
    pub processing_delay: Option<Duration>,
    pub retry_scan_interval: Duration,
    pub retry_batch_size: i64,
    pub channel_audit_interval: Duration,
    pub shutdown_grace: Duration,
    pub default_channel: String,
    pub retry: RetryConfig,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|_| anyhow!("Invalid or missing environmental variable"))?;
        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }

    pub fn slack_config(&self) -> SlackConfig {
        SlackConfig {
            bot_token: self.slack_bot_token.clone(),
            api_base_url: self.slack_api_base_url.clone(),
            default_channel: self.default_channel.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            queue_capacity: self.queue_capacity,
            enqueue_timeout: Duration::from_millis(self.enqueue_timeout_ms),
            idle_timeout: Duration::from_secs(self.idle_timeout_seconds),
            processing_delay: match self.processing_delay_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            retry_scan_interval: Duration::from_secs(self.retry_scan_interval_seconds),
            retry_batch_size: self.retry_batch_size,
            channel_audit_interval: Duration::from_secs(self.channel_audit_interval_seconds),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_seconds),
            default_channel: self.default_channel.clone(),
            retry: self.retry_config(),
        }
    }

    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }
}
