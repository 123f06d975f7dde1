use thiserror::Error;

/// Request-level validation failures, rejected before a request ever enters
/// the worker queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("subscriber id must not be empty")]
    EmptySubscriber,

    #[error("event type must not be empty")]
    EmptyEventType,

    #[error("no syntactically valid destination channel in {0:?}")]
    NoValidChannel(Vec<String>),

    #[error("invalid channel name: {0}")]
    InvalidChannel(String),

    #[error("message content must not be empty")]
    EmptyContent,

    #[error("content length {length} exceeds platform ceiling {limit}")]
    ContentTooLong { length: usize, limit: usize },
}

/// Classified delivery failures returned by the chat-platform client.
///
/// The classification drives the worker's failure policy, so every error
/// leaving the client carries exactly one of these kinds.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("rate limited by platform (retry after {retry_after_seconds:?}s)")]
    RateLimited { retry_after_seconds: Option<u64> },

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("channel unavailable: {0}")]
    Channel(String),

    #[error("content rejected by platform: {0}")]
    Content(String),

    #[error("transient platform failure: {0}")]
    Transient(String),

    #[error("unclassified platform error: {0}")]
    Unknown(String),
}

impl DeliveryError {
    /// Whether the periodic retry loop may re-attempt this failure.
    ///
    /// Unknown errors count as retryable: a bounded number of extra retries
    /// beats silent data loss, and the max-attempts cap limits the damage.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::RateLimited { .. }
            | DeliveryError::Transient(_)
            | DeliveryError::Unknown(_) => true,
            DeliveryError::Auth(_) | DeliveryError::Channel(_) | DeliveryError::Content(_) => {
                false
            }
        }
    }

    /// Stable tag used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::RateLimited { .. } => "rate_limit",
            DeliveryError::Auth(_) => "auth",
            DeliveryError::Channel(_) => "channel",
            DeliveryError::Content(_) => "content",
            DeliveryError::Transient(_) => "transient",
            DeliveryError::Unknown(_) => "unknown",
        }
    }
}

/// Failures surfaced by the worker to its callers.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("queue full ({capacity} pending), request rejected after {waited_ms}ms")]
    Backpressure { capacity: usize, waited_ms: u64 },

    #[error("worker is not running")]
    NotRunning,

    #[error("worker already started")]
    AlreadyRunning,

    #[error("shutdown in progress")]
    ShuttingDown,
}
