use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use alert_service::clients::database::{DeadLetterSink, StatusStore};
use alert_service::clients::rate_limiter::RateLimiter;
use alert_service::clients::slack::DeliveryClient;
use alert_service::config::{RetryConfig, WorkerConfig};
use alert_service::error::{DeliveryError, WorkerError};
use alert_service::models::message::{
    DeadLetterMessage, DeadLetterReason, Message, NotificationRequest, Priority,
};
use alert_service::models::slack::{Attachment, ChannelInfo, SendReceipt};
use alert_service::models::status::{ChannelDeliveryState, ChannelStatus, DeliveryStatus};
use alert_service::worker::Worker;

#[derive(Default)]
struct MockDeliveryClient {
    sent_channels: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<DeliveryError>>,
}

impl MockDeliveryClient {
    fn succeeding() -> Self {
        Self::default()
    }

    fn failing_with(failures: Vec<DeliveryError>) -> Self {
        Self {
            sent_channels: Mutex::new(Vec::new()),
            failures: Mutex::new(failures.into()),
        }
    }

    fn sent(&self) -> Vec<String> {
        self.sent_channels.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryClient for MockDeliveryClient {
    async fn send_message(
        &self,
        channel: &str,
        _text: &str,
        _attachment: Option<&Attachment>,
        _trace_id: &str,
    ) -> Result<SendReceipt, DeliveryError> {
        self.sent_channels.lock().unwrap().push(channel.to_string());

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        Ok(SendReceipt {
            message_id: "1700000000.000100".to_string(),
            channel_id: "C024BE91L".to_string(),
        })
    }

    async fn update_message(
        &self,
        _channel: &str,
        _message_id: &str,
        _text: &str,
    ) -> Result<(), DeliveryError> {
        Ok(())
    }

    async fn delete_message(&self, _channel: &str, _message_id: &str) -> Result<(), DeliveryError> {
        Ok(())
    }

    async fn get_channel_info(&self, channel: &str) -> Result<ChannelInfo, DeliveryError> {
        Ok(ChannelInfo {
            id: "C024BE91L".to_string(),
            name: channel.trim_start_matches('#').to_string(),
            is_member: true,
        })
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        Ok(())
    }
}

#[derive(Default)]
struct MockStatusStore {
    attempt_count: AtomicU32,
    scheduled_retries: AtomicU32,
    cleared_retries: AtomicU32,
    channel_states: Mutex<Vec<(String, ChannelDeliveryState)>>,
    retry_batch: Mutex<Vec<Message>>,
    statuses: Mutex<HashMap<Uuid, DeliveryStatus>>,
    requests: Mutex<HashMap<Uuid, NotificationRequest>>,
}

impl MockStatusStore {
    fn states_for(&self, channel: &str) -> Vec<ChannelDeliveryState> {
        self.channel_states
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, s)| *s)
            .collect()
    }
}

#[async_trait]
impl StatusStore for MockStatusStore {
    async fn record_dispatch(
        &self,
        _message: &Message,
        _request: &NotificationRequest,
    ) -> Result<(), Error> {
        Ok(())
    }

    async fn update_channel_state(
        &self,
        _message_id: Uuid,
        channel: &str,
        state: ChannelDeliveryState,
        _last_error: Option<&str>,
    ) -> Result<(), Error> {
        self.channel_states
            .lock()
            .unwrap()
            .push((channel.to_string(), state));
        Ok(())
    }

    async fn record_attempt(&self, _message_id: Uuid) -> Result<u32, Error> {
        Ok(self.attempt_count.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn schedule_retry(
        &self,
        _message_id: Uuid,
        _next_retry_at: chrono::DateTime<Utc>,
    ) -> Result<(), Error> {
        self.scheduled_retries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_retry(&self, _message_id: Uuid) -> Result<(), Error> {
        self.cleared_retries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mark_delivered(&self, _message_id: Uuid) -> Result<(), Error> {
        Ok(())
    }

    async fn get_failed_messages(&self, _limit: i64) -> Result<Vec<Message>, Error> {
        Ok(std::mem::take(&mut *self.retry_batch.lock().unwrap()))
    }

    async fn get_delivery_status(
        &self,
        message_id: Uuid,
    ) -> Result<Option<DeliveryStatus>, Error> {
        Ok(self.statuses.lock().unwrap().get(&message_id).cloned())
    }

    async fn get_message(&self, _message_id: Uuid) -> Result<Option<Message>, Error> {
        Ok(None)
    }

    async fn get_request(
        &self,
        message_id: Uuid,
    ) -> Result<Option<NotificationRequest>, Error> {
        Ok(self.requests.lock().unwrap().get(&message_id).cloned())
    }
}

#[derive(Default)]
struct MockDeadLetterSink {
    letters: Mutex<Vec<DeadLetterMessage>>,
}

impl MockDeadLetterSink {
    fn count(&self) -> usize {
        self.letters.lock().unwrap().len()
    }
}

#[async_trait]
impl DeadLetterSink for MockDeadLetterSink {
    async fn write(&self, dead_letter: &DeadLetterMessage) -> Result<(), Error> {
        self.letters.lock().unwrap().push(dead_letter.clone());
        Ok(())
    }
}

fn test_worker_config() -> WorkerConfig {
    WorkerConfig {
        queue_capacity: 4,
        enqueue_timeout: Duration::from_millis(100),
        idle_timeout: Duration::from_secs(60),
        processing_delay: None,
        retry_scan_interval: Duration::from_secs(3600),
        retry_batch_size: 10,
        channel_audit_interval: Duration::from_secs(3600),
        shutdown_grace: Duration::from_secs(3),
        default_channel: "#general".to_string(),
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 10,
            max_delay_ms: 100,
            backoff_multiplier: 2,
        },
    }
}

fn build_worker(
    config: WorkerConfig,
    client: Arc<MockDeliveryClient>,
    store: Arc<MockStatusStore>,
    sink: Arc<MockDeadLetterSink>,
) -> Worker {
    Worker::new(
        config,
        client,
        store,
        sink,
        Arc::new(RateLimiter::new(Duration::ZERO)),
    )
}

fn request(event_type: &str, channels: &[&str]) -> NotificationRequest {
    let mut payload = HashMap::new();
    payload.insert("entity_id".to_string(), serde_json::json!("biz-1"));

    NotificationRequest::new(
        "s1",
        event_type,
        Priority::High,
        channels.iter().map(|c| c.to_string()).collect(),
        payload,
    )
}

async fn wait_until(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Test: an auth error produces exactly one dead letter and no retry writes
#[tokio::test]
async fn test_auth_error_dead_letters_once() -> Result<()> {
    let client = Arc::new(MockDeliveryClient::failing_with(vec![DeliveryError::Auth(
        "invalid_auth".to_string(),
    )]));
    let store = Arc::new(MockStatusStore::default());
    let sink = Arc::new(MockDeadLetterSink::default());

    let worker = build_worker(
        test_worker_config(),
        Arc::clone(&client),
        Arc::clone(&store),
        Arc::clone(&sink),
    );
    worker.start()?;

    worker.enqueue(request("custom-event", &["#ops"])).await?;

    assert!(
        wait_until(|| sink.count() == 1, Duration::from_secs(2)).await,
        "expected a dead letter"
    );

    assert_eq!(sink.count(), 1);
    assert_eq!(
        sink.letters.lock().unwrap()[0].reason,
        DeadLetterReason::AuthFailure
    );
    assert_eq!(store.scheduled_retries.load(Ordering::SeqCst), 0);

    worker.stop().await?;
    Ok(())
}

/// Test: a rate-limit error leaves the message retry-eligible with no dead
/// letter
#[tokio::test]
async fn test_rate_limit_error_stays_retry_eligible() -> Result<()> {
    let client = Arc::new(MockDeliveryClient::failing_with(vec![
        DeliveryError::RateLimited {
            retry_after_seconds: None,
        },
    ]));
    let store = Arc::new(MockStatusStore::default());
    let sink = Arc::new(MockDeadLetterSink::default());

    let worker = build_worker(
        test_worker_config(),
        Arc::clone(&client),
        Arc::clone(&store),
        Arc::clone(&sink),
    );
    worker.start()?;

    worker.enqueue(request("custom-event", &["#ops"])).await?;

    assert!(
        wait_until(
            || store.scheduled_retries.load(Ordering::SeqCst) == 1,
            Duration::from_secs(2)
        )
        .await,
        "expected a retry to be scheduled"
    );

    assert_eq!(sink.count(), 0);
    assert!(
        store
            .states_for("#ops")
            .contains(&ChannelDeliveryState::RateLimited)
    );

    worker.stop().await?;
    Ok(())
}

/// Test: a channel error triggers exactly one fallback to the default
/// channel
#[tokio::test]
async fn test_channel_error_falls_back_to_default() -> Result<()> {
    let client = Arc::new(MockDeliveryClient::failing_with(vec![
        DeliveryError::Channel("channel_not_found".to_string()),
    ]));
    let store = Arc::new(MockStatusStore::default());
    let sink = Arc::new(MockDeadLetterSink::default());

    let worker = build_worker(
        test_worker_config(),
        Arc::clone(&client),
        Arc::clone(&store),
        Arc::clone(&sink),
    );
    worker.start()?;

    worker.enqueue(request("custom-event", &["#ops"])).await?;

    assert!(
        wait_until(|| client.sent().len() == 2, Duration::from_secs(2)).await,
        "expected original send plus fallback"
    );

    assert_eq!(client.sent(), vec!["#ops", "#general"]);
    assert_eq!(sink.count(), 0);
    assert!(store.states_for("#ops").contains(&ChannelDeliveryState::Failed));
    assert!(
        store
            .states_for("#general")
            .contains(&ChannelDeliveryState::Sent)
    );

    worker.stop().await?;
    Ok(())
}

/// Test: a failed fallback quarantines the message
#[tokio::test]
async fn test_failed_fallback_dead_letters() -> Result<()> {
    let client = Arc::new(MockDeliveryClient::failing_with(vec![
        DeliveryError::Channel("channel_not_found".to_string()),
        DeliveryError::Channel("is_archived".to_string()),
    ]));
    let store = Arc::new(MockStatusStore::default());
    let sink = Arc::new(MockDeadLetterSink::default());

    let worker = build_worker(
        test_worker_config(),
        Arc::clone(&client),
        Arc::clone(&store),
        Arc::clone(&sink),
    );
    worker.start()?;

    worker.enqueue(request("custom-event", &["#ops"])).await?;

    assert!(
        wait_until(|| sink.count() == 1, Duration::from_secs(2)).await,
        "expected a dead letter after the failed fallback"
    );

    let letters = sink.letters.lock().unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].reason, DeadLetterReason::ChannelUnavailable);
    assert!(letters[0].error_text.contains("channel_not_found"));
    drop(letters);

    worker.stop().await?;
    Ok(())
}

/// Test: routing-table channels win over the caller-supplied list for known
/// event types
#[tokio::test]
async fn test_routing_table_overrides_caller_channels() -> Result<()> {
    let client = Arc::new(MockDeliveryClient::succeeding());
    let store = Arc::new(MockStatusStore::default());
    let sink = Arc::new(MockDeadLetterSink::default());

    let worker = build_worker(
        test_worker_config(),
        Arc::clone(&client),
        Arc::clone(&store),
        Arc::clone(&sink),
    );
    worker.start()?;

    worker
        .enqueue(request("inquiry-business", &["#somewhere-else"]))
        .await?;

    assert!(
        wait_until(|| client.sent().len() == 2, Duration::from_secs(2)).await,
        "expected sends to both routed channels"
    );

    assert_eq!(client.sent(), vec!["#inquiries", "#business"]);

    worker.stop().await?;
    Ok(())
}

/// Test: a full queue with no consumer yields a backpressure error
#[tokio::test]
async fn test_backpressure_when_queue_full() -> Result<()> {
    let worker = build_worker(
        test_worker_config(),
        Arc::new(MockDeliveryClient::succeeding()),
        Arc::new(MockStatusStore::default()),
        Arc::new(MockDeadLetterSink::default()),
    );

    for _ in 0..4 {
        worker.enqueue(request("custom-event", &["#ops"])).await?;
    }

    let result = worker.enqueue(request("custom-event", &["#ops"])).await;

    assert!(
        matches!(result, Err(WorkerError::Backpressure { capacity: 4, .. })),
        "expected backpressure, got {:?}",
        result
    );

    let metrics = worker.metrics();
    assert!(!metrics.active);
    assert_eq!(metrics.queue_length, 4);
    assert_eq!(metrics.queue_capacity, 4);

    Ok(())
}

/// Test: malformed requests are rejected before entering the queue
#[tokio::test]
async fn test_validation_rejected_before_enqueue() -> Result<()> {
    let store = Arc::new(MockStatusStore::default());
    let sink = Arc::new(MockDeadLetterSink::default());
    let worker = build_worker(
        test_worker_config(),
        Arc::new(MockDeliveryClient::succeeding()),
        Arc::clone(&store),
        Arc::clone(&sink),
    );

    let result = worker.enqueue(request("", &["#ops"])).await;
    assert!(matches!(result, Err(WorkerError::Validation(_))));

    let result = worker.enqueue(request("custom-event", &["bogus"])).await;
    assert!(matches!(result, Err(WorkerError::Validation(_))));

    assert_eq!(worker.metrics().queue_length, 0);
    assert_eq!(sink.count(), 0);

    Ok(())
}

/// Test: stop returns within the grace period while the dispatch loop is
/// blocked on the rate limiter, leaving the worker inactive
#[tokio::test]
async fn test_graceful_shutdown_while_rate_limited() -> Result<()> {
    let client = Arc::new(MockDeliveryClient::succeeding());
    let worker = Worker::new(
        test_worker_config(),
        Arc::clone(&client) as Arc<dyn DeliveryClient>,
        Arc::new(MockStatusStore::default()),
        Arc::new(MockDeadLetterSink::default()),
        Arc::new(RateLimiter::new(Duration::from_secs(30))),
    );
    worker.start()?;

    // Two routed channels: the first send goes straight through, the second
    // parks the dispatch loop on the limiter for 30s.
    worker
        .enqueue(request("inquiry-business", &["#ignored"]))
        .await?;

    assert!(
        wait_until(|| client.sent().len() == 1, Duration::from_secs(2)).await,
        "expected the first channel send before the limiter stall"
    );

    let start = Instant::now();
    worker.stop().await?;

    assert!(
        start.elapsed() < Duration::from_secs(3),
        "stop took {:?}",
        start.elapsed()
    );
    assert!(!worker.metrics().active);
    assert_eq!(client.sent().len(), 1, "no new sends after shutdown");

    Ok(())
}

/// Test: the retry loop resends channels still owing delivery and clears
/// the schedule on success
#[tokio::test]
async fn test_retry_scan_resends_pending_channels() -> Result<()> {
    let mut config = test_worker_config();
    config.retry_scan_interval = Duration::from_millis(50);

    let client = Arc::new(MockDeliveryClient::succeeding());
    let store = Arc::new(MockStatusStore::default());
    let sink = Arc::new(MockDeadLetterSink::default());

    let message = Message::new(
        "s1",
        vec!["#ops".to_string()],
        "System error in ingest: connection pool exhausted".to_string(),
        None,
        "trace-retry-1",
    );
    let original = request("custom-event", &["#ops"]);

    store.retry_batch.lock().unwrap().push(message.clone());
    store.statuses.lock().unwrap().insert(
        message.id,
        DeliveryStatus {
            message_id: message.id,
            channels: vec![ChannelStatus {
                channel: "#ops".to_string(),
                state: ChannelDeliveryState::Pending,
            }],
            attempt_count: 1,
            last_attempt_at: Some(Utc::now()),
            delivered_at: None,
            last_error: Some("transient platform failure".to_string()),
            next_retry_at: Some(Utc::now() - chrono::Duration::seconds(5)),
        },
    );
    store.requests.lock().unwrap().insert(message.id, original);

    let worker = build_worker(
        config,
        Arc::clone(&client),
        Arc::clone(&store),
        Arc::clone(&sink),
    );
    worker.start()?;

    assert!(
        wait_until(
            || client.sent().contains(&"#ops".to_string())
                && store.cleared_retries.load(Ordering::SeqCst) >= 1,
            Duration::from_secs(2)
        )
        .await,
        "expected the retry scan to resend and clear the schedule"
    );

    assert_eq!(sink.count(), 0);
    assert!(store.states_for("#ops").contains(&ChannelDeliveryState::Sent));

    worker.stop().await?;
    Ok(())
}

/// Test: the retry loop skips messages that already reached the attempts cap
#[tokio::test]
async fn test_retry_scan_skips_exhausted_messages() -> Result<()> {
    let mut config = test_worker_config();
    config.retry_scan_interval = Duration::from_millis(50);

    let client = Arc::new(MockDeliveryClient::succeeding());
    let store = Arc::new(MockStatusStore::default());
    let sink = Arc::new(MockDeadLetterSink::default());

    let message = Message::new(
        "s1",
        vec!["#ops".to_string()],
        "Warning from ingest: queue depth rising".to_string(),
        None,
        "trace-retry-2",
    );

    store.retry_batch.lock().unwrap().push(message.clone());
    store.statuses.lock().unwrap().insert(
        message.id,
        DeliveryStatus {
            message_id: message.id,
            channels: vec![ChannelStatus {
                channel: "#ops".to_string(),
                state: ChannelDeliveryState::Pending,
            }],
            attempt_count: 3,
            last_attempt_at: Some(Utc::now()),
            delivered_at: None,
            last_error: None,
            next_retry_at: Some(Utc::now() - chrono::Duration::seconds(5)),
        },
    );

    let worker = build_worker(
        config,
        Arc::clone(&client),
        Arc::clone(&store),
        Arc::clone(&sink),
    );
    worker.start()?;

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(client.sent().is_empty(), "exhausted message must not be resent");
    assert_eq!(sink.count(), 0);

    worker.stop().await?;
    Ok(())
}
