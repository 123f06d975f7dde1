//! The delivery worker: a bounded request queue drained by a dispatch loop,
//! plus periodic retry and channel-audit loops, all sharing one rate limiter
//! and one shutdown signal.

use std::sync::{Arc, Mutex as StdMutex};

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clients::database::{DeadLetterSink, StatusStore};
use crate::clients::rate_limiter::RateLimiter;
use crate::clients::slack::DeliveryClient;
use crate::config::WorkerConfig;
use crate::error::{DeliveryError, WorkerError};
use crate::models::content::{render_attachment, render_content, truncate};
use crate::models::message::{DeadLetterMessage, DeadLetterReason, Message, NotificationRequest};
use crate::models::routing::{audited_channels, is_routed_event, resolve_channels};
use crate::models::status::ChannelDeliveryState;
use crate::models::validation::{
    MAX_CONTENT_LENGTH, is_valid_channel, validate_message, validate_request,
};
use crate::utils::next_retry_at;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerMetrics {
    pub worker_id: String,
    pub active: bool,
    pub queue_length: usize,
    pub queue_capacity: usize,
}

/// One worker instance: owns its queue and loops. Instances in a pool are
/// independent except for the rate limiter they are handed, which is how the
/// pool stays under the platform's single per-app ceiling.
pub struct Worker {
    engine: Arc<Engine>,
    queue_rx: StdMutex<Option<mpsc::Receiver<NotificationRequest>>>,
    state: StdMutex<WorkerState>,
    tracker: TaskTracker,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        client: Arc<dyn DeliveryClient>,
        store: Arc<dyn StatusStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);

        Self {
            engine: Arc::new(Engine {
                worker_id: Uuid::new_v4().to_string(),
                config,
                client,
                store,
                dead_letters,
                limiter,
                shutdown: CancellationToken::new(),
                queue_tx,
            }),
            queue_rx: StdMutex::new(Some(queue_rx)),
            state: StdMutex::new(WorkerState::Stopped),
            tracker: TaskTracker::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.engine.worker_id
    }

    /// Launch the dispatch, retry and channel-audit loops. A worker instance
    /// runs at most once; a stopped instance stays stopped.
    pub fn start(&self) -> Result<(), WorkerError> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != WorkerState::Stopped {
                return Err(WorkerError::AlreadyRunning);
            }
            *state = WorkerState::Starting;
        }

        let Some(queue_rx) = self.queue_rx.lock().unwrap().take() else {
            *self.state.lock().unwrap() = WorkerState::Stopped;
            return Err(WorkerError::AlreadyRunning);
        };

        info!(worker_id = %self.engine.worker_id, "Starting worker");

        self.tracker.spawn(Arc::clone(&self.engine).dispatch_loop(queue_rx));
        self.tracker.spawn(Arc::clone(&self.engine).retry_loop());
        self.tracker.spawn(Arc::clone(&self.engine).channel_audit_loop());

        *self.state.lock().unwrap() = WorkerState::Running;

        Ok(())
    }

    /// Signal shutdown and wait up to the grace period for the loops to
    /// drain. If the grace period elapses, shutdown proceeds anyway and
    /// in-flight sends may be abandoned; that trade-off is logged.
    pub async fn stop(&self) -> Result<(), WorkerError> {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                WorkerState::Running | WorkerState::Starting => *state = WorkerState::Stopping,
                _ => return Err(WorkerError::NotRunning),
            }
        }

        info!(worker_id = %self.engine.worker_id, "Stopping worker");

        self.engine.shutdown.cancel();
        self.tracker.close();

        if timeout(self.engine.config.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                worker_id = %self.engine.worker_id,
                grace_seconds = self.engine.config.shutdown_grace.as_secs(),
                "Grace period elapsed before loops drained, abandoning in-flight work"
            );
        }

        *self.state.lock().unwrap() = WorkerState::Stopped;

        info!(worker_id = %self.engine.worker_id, "Worker stopped");

        Ok(())
    }

    /// Admit a request into the queue, waiting a bounded time when it is
    /// full. Validation failures and backpressure surface synchronously;
    /// everything after admission is asynchronous.
    pub async fn enqueue(&self, request: NotificationRequest) -> Result<(), WorkerError> {
        validate_request(&request)?;

        if *self.state.lock().unwrap() == WorkerState::Stopping
            || self.engine.shutdown.is_cancelled()
        {
            return Err(WorkerError::ShuttingDown);
        }

        let enqueue_timeout = self.engine.config.enqueue_timeout;

        match self
            .engine
            .queue_tx
            .send_timeout(request, enqueue_timeout)
            .await
        {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => Err(WorkerError::Backpressure {
                capacity: self.engine.config.queue_capacity,
                waited_ms: enqueue_timeout.as_millis() as u64,
            }),
            Err(mpsc::error::SendTimeoutError::Closed(_)) => Err(WorkerError::NotRunning),
        }
    }

    pub fn metrics(&self) -> WorkerMetrics {
        let capacity = self.engine.queue_tx.max_capacity();
        WorkerMetrics {
            worker_id: self.engine.worker_id.clone(),
            active: *self.state.lock().unwrap() == WorkerState::Running,
            queue_length: capacity - self.engine.queue_tx.capacity(),
            queue_capacity: capacity,
        }
    }
}

/// State shared by the worker's loops.
struct Engine {
    worker_id: String,
    config: WorkerConfig,
    client: Arc<dyn DeliveryClient>,
    store: Arc<dyn StatusStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    limiter: Arc<RateLimiter>,
    shutdown: CancellationToken,
    queue_tx: mpsc::Sender<NotificationRequest>,
}

impl Engine {
    async fn dispatch_loop(self: Arc<Self>, mut queue_rx: mpsc::Receiver<NotificationRequest>) {
        info!(worker_id = %self.worker_id, "Dispatch loop started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = queue_rx.recv() => match received {
                    Some(request) => {
                        if let Err(WorkerError::ShuttingDown) = self.process_request(request).await {
                            break;
                        }
                    }
                    None => break,
                },
                _ = sleep(self.config.idle_timeout) => self.run_maintenance().await,
            }
        }

        info!(worker_id = %self.worker_id, "Dispatch loop stopped");
    }

    async fn retry_loop(self: Arc<Self>) {
        info!(
            worker_id = %self.worker_id,
            interval_seconds = self.config.retry_scan_interval.as_secs(),
            "Retry loop started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(self.config.retry_scan_interval) => {}
            }

            if let Err(WorkerError::ShuttingDown) = self.scan_retries().await {
                break;
            }
        }

        info!(worker_id = %self.worker_id, "Retry loop stopped");
    }

    async fn channel_audit_loop(self: Arc<Self>) {
        info!(
            worker_id = %self.worker_id,
            interval_seconds = self.config.channel_audit_interval.as_secs(),
            "Channel audit loop started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(self.config.channel_audit_interval) => {}
            }

            if let Err(WorkerError::ShuttingDown) = self.audit_channels().await {
                break;
            }
        }

        info!(worker_id = %self.worker_id, "Channel audit loop stopped");
    }

    /// Idle-branch housekeeping: a liveness signal even with no traffic.
    async fn run_maintenance(&self) {
        let capacity = self.queue_tx.max_capacity();
        let depth = capacity - self.queue_tx.capacity();

        info!(
            worker_id = %self.worker_id,
            queue_depth = depth,
            queue_capacity = capacity,
            utilization_pct = (depth * 100) / capacity.max(1),
            "Worker idle, running maintenance"
        );

        if let Err(e) = self.client.health_check().await {
            warn!(
                worker_id = %self.worker_id,
                error_kind = e.kind(),
                error = %e,
                "Chat platform health check failed"
            );
        }
    }

    async fn process_request(&self, request: NotificationRequest) -> Result<(), WorkerError> {
        info!(
            worker_id = %self.worker_id,
            trace_id = %request.trace_id,
            event_type = %request.event_type,
            subscriber_id = %request.subscriber_id,
            "Processing notification request"
        );

        let channels = self.effective_channels(&request);

        if channels.is_empty() {
            return self.dispatch_to_fallback_only(&request).await;
        }

        self.limiter.wait(&self.shutdown).await?;

        if let Some(delay) = self.config.processing_delay {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(WorkerError::ShuttingDown),
                _ = sleep(delay) => {}
            }
        }

        let content = truncate(
            &render_content(&request.event_type, &request.payload),
            MAX_CONTENT_LENGTH,
        );
        let attachment = render_attachment(&request.event_type, &request.payload, request.priority);
        let message = Message::new(
            request.subscriber_id.clone(),
            channels,
            content,
            Some(attachment),
            request.trace_id.clone(),
        );

        if let Err(e) = validate_message(&message) {
            // Rendering produced something the platform would reject; this
            // is a content failure, not a caller failure.
            self.quarantine(
                &message,
                &request,
                e.to_string(),
                DeadLetterReason::ContentRejected,
            )
            .await;
            return Ok(());
        }

        if let Err(e) = self.store.record_dispatch(&message, &request).await {
            warn!(
                trace_id = %message.trace_id,
                error = %e,
                "Failed to record dispatch status"
            );
        }

        let attempt = self.record_attempt(&message).await;

        for (index, channel) in message.channels.iter().enumerate() {
            if index > 0 {
                self.limiter.wait(&self.shutdown).await?;
            }

            match self
                .client
                .send_message(
                    channel,
                    &message.content,
                    message.attachment.as_ref(),
                    &message.trace_id,
                )
                .await
            {
                Ok(receipt) => self.record_sent(&message, channel, &receipt.message_id).await,
                Err(e) => {
                    self.handle_delivery_failure(&message, &request, channel, attempt, e)
                        .await?;
                }
            }
        }

        Ok(())
    }

    /// Channel resolution: the routing table wins for known event types;
    /// otherwise the caller's list is used, minus anything syntactically
    /// invalid.
    fn effective_channels(&self, request: &NotificationRequest) -> Vec<String> {
        if is_routed_event(&request.event_type) {
            return resolve_channels(&request.event_type)
                .iter()
                .map(|c| c.to_string())
                .collect();
        }

        let mut valid = Vec::new();
        for channel in &request.channels {
            if is_valid_channel(channel) {
                valid.push(channel.clone());
            } else {
                warn!(
                    trace_id = %request.trace_id,
                    channel = %channel,
                    "Dropping syntactically invalid channel"
                );
            }
        }
        valid
    }

    /// Zero usable destinations: skip straight to the channel-failure policy
    /// (single fallback to the default channel) without any network call on
    /// the original list.
    async fn dispatch_to_fallback_only(
        &self,
        request: &NotificationRequest,
    ) -> Result<(), WorkerError> {
        let reason = "no syntactically valid destination channel";

        warn!(
            worker_id = %self.worker_id,
            trace_id = %request.trace_id,
            channels = ?request.channels,
            "No usable destination channel, falling back to default"
        );

        let fallback_request = request.with_fallback(&self.config.default_channel, reason);

        let content = truncate(
            &render_content(&fallback_request.event_type, &fallback_request.payload),
            MAX_CONTENT_LENGTH,
        );
        let attachment = render_attachment(
            &fallback_request.event_type,
            &fallback_request.payload,
            fallback_request.priority,
        );
        let message = Message::new(
            fallback_request.subscriber_id.clone(),
            vec![self.config.default_channel.clone()],
            content,
            Some(attachment),
            fallback_request.trace_id.clone(),
        );

        if let Err(e) = self.store.record_dispatch(&message, request).await {
            warn!(trace_id = %message.trace_id, error = %e, "Failed to record dispatch status");
        }

        self.record_attempt(&message).await;
        self.limiter.wait(&self.shutdown).await?;

        match self
            .client
            .send_message(
                &self.config.default_channel,
                &message.content,
                message.attachment.as_ref(),
                &message.trace_id,
            )
            .await
        {
            Ok(receipt) => {
                self.record_sent(&message, &self.config.default_channel, &receipt.message_id)
                    .await;
            }
            Err(e) => {
                self.record_channel_state(
                    &message,
                    &self.config.default_channel,
                    ChannelDeliveryState::Failed,
                    Some(&e.to_string()),
                )
                .await;
                self.quarantine(
                    &message,
                    request,
                    format!("{} (fallback to {} failed: {})", reason, self.config.default_channel, e),
                    DeadLetterReason::ChannelUnavailable,
                )
                .await;
            }
        }

        Ok(())
    }

    /// Apply the failure policy to one classified send failure.
    async fn handle_delivery_failure(
        &self,
        message: &Message,
        request: &NotificationRequest,
        channel: &str,
        attempt: u32,
        error: DeliveryError,
    ) -> Result<(), WorkerError> {
        warn!(
            worker_id = %self.worker_id,
            trace_id = %message.trace_id,
            channel = %channel,
            attempt,
            error_kind = error.kind(),
            error = %error,
            "Delivery attempt failed"
        );

        match &error {
            DeliveryError::RateLimited {
                retry_after_seconds,
            } => {
                self.record_channel_state(
                    message,
                    channel,
                    ChannelDeliveryState::RateLimited,
                    Some(&error.to_string()),
                )
                .await;
                self.schedule_or_exhaust(message, request, attempt, &error, *retry_after_seconds)
                    .await;
            }
            DeliveryError::Transient(_) | DeliveryError::Unknown(_) => {
                self.record_channel_state(
                    message,
                    channel,
                    ChannelDeliveryState::Pending,
                    Some(&error.to_string()),
                )
                .await;
                self.schedule_or_exhaust(message, request, attempt, &error, None)
                    .await;
            }
            DeliveryError::Auth(_) => {
                self.record_channel_state(
                    message,
                    channel,
                    ChannelDeliveryState::Blocked,
                    Some(&error.to_string()),
                )
                .await;
                self.clear_retry(message).await;
                self.quarantine(
                    message,
                    request,
                    error.to_string(),
                    DeadLetterReason::AuthFailure,
                )
                .await;
            }
            DeliveryError::Content(_) => {
                self.record_channel_state(
                    message,
                    channel,
                    ChannelDeliveryState::Blocked,
                    Some(&error.to_string()),
                )
                .await;
                self.clear_retry(message).await;
                self.quarantine(
                    message,
                    request,
                    error.to_string(),
                    DeadLetterReason::ContentRejected,
                )
                .await;
            }
            DeliveryError::Channel(_) => {
                self.record_channel_state(
                    message,
                    channel,
                    ChannelDeliveryState::Failed,
                    Some(&error.to_string()),
                )
                .await;

                if channel == self.config.default_channel {
                    // Already aimed at the fallback destination; nowhere
                    // left to retarget.
                    self.clear_retry(message).await;
                    self.quarantine(
                        message,
                        request,
                        error.to_string(),
                        DeadLetterReason::ChannelUnavailable,
                    )
                    .await;
                } else {
                    self.attempt_fallback(message, request, channel, &error).await?;
                }
            }
        }

        Ok(())
    }

    /// Retryable failure: schedule the next attempt, or quarantine when the
    /// attempts cap is reached.
    async fn schedule_or_exhaust(
        &self,
        message: &Message,
        request: &NotificationRequest,
        attempt: u32,
        error: &DeliveryError,
        retry_after_seconds: Option<u64>,
    ) {
        if attempt >= self.config.retry.max_attempts {
            self.clear_retry(message).await;
            self.quarantine(
                message,
                request,
                format!("retries exhausted after {} attempts: {}", attempt, error),
                DeadLetterReason::RetriesExhausted,
            )
            .await;
            return;
        }

        // The platform's own retry-after hint takes precedence over the
        // computed backoff when it is present.
        let next_retry = match retry_after_seconds {
            Some(seconds) => Utc::now() + ChronoDuration::seconds(seconds as i64),
            None => next_retry_at(&self.config.retry, attempt),
        };

        if let Err(e) = self.store.schedule_retry(message.id, next_retry).await {
            warn!(trace_id = %message.trace_id, error = %e, "Failed to schedule retry");
            return;
        }

        debug!(
            trace_id = %message.trace_id,
            attempt,
            next_retry_at = %next_retry,
            "Message left retry-eligible"
        );
    }

    /// Exactly one same-call retarget to the default channel, on a private
    /// enriched copy of the request. A second failure quarantines.
    async fn attempt_fallback(
        &self,
        message: &Message,
        request: &NotificationRequest,
        failed_channel: &str,
        original_error: &DeliveryError,
    ) -> Result<(), WorkerError> {
        let fallback_channel = self.config.default_channel.clone();

        info!(
            worker_id = %self.worker_id,
            trace_id = %message.trace_id,
            failed_channel = %failed_channel,
            fallback_channel = %fallback_channel,
            "Retargeting message to fallback channel"
        );

        let fallback_request =
            request.with_fallback(&fallback_channel, &original_error.to_string());
        let attachment = render_attachment(
            &fallback_request.event_type,
            &fallback_request.payload,
            fallback_request.priority,
        );

        self.record_channel_state(message, &fallback_channel, ChannelDeliveryState::Pending, None)
            .await;

        self.limiter.wait(&self.shutdown).await?;

        match self
            .client
            .send_message(
                &fallback_channel,
                &message.content,
                Some(&attachment),
                &message.trace_id,
            )
            .await
        {
            Ok(receipt) => {
                self.record_sent(message, &fallback_channel, &receipt.message_id).await;
                info!(
                    trace_id = %message.trace_id,
                    fallback_channel = %fallback_channel,
                    "Fallback delivery succeeded"
                );
            }
            Err(fallback_error) => {
                self.record_channel_state(
                    message,
                    &fallback_channel,
                    ChannelDeliveryState::Failed,
                    Some(&fallback_error.to_string()),
                )
                .await;
                self.clear_retry(message).await;
                self.quarantine(
                    message,
                    request,
                    format!(
                        "{} (fallback to {} failed: {})",
                        original_error, fallback_channel, fallback_error
                    ),
                    DeadLetterReason::ChannelUnavailable,
                )
                .await;
            }
        }

        Ok(())
    }

    /// One pass of the periodic retry scan.
    async fn scan_retries(&self) -> Result<(), WorkerError> {
        let batch = match self.store.get_failed_messages(self.config.retry_batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(worker_id = %self.worker_id, error = %e, "Retry scan query failed");
                return Ok(());
            }
        };

        if batch.is_empty() {
            return Ok(());
        }

        debug!(
            worker_id = %self.worker_id,
            batch = batch.len(),
            "Retry scan picked up messages"
        );

        for message in batch {
            if self.shutdown.is_cancelled() {
                return Err(WorkerError::ShuttingDown);
            }

            let status = match self.store.get_delivery_status(message.id).await {
                Ok(Some(status)) => status,
                Ok(None) => continue,
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "Failed to re-read delivery status");
                    continue;
                }
            };

            // Re-check under current state: the batch query is a snapshot
            // and another worker may have advanced this message since.
            match status.next_retry_at {
                None => continue,
                Some(due) if due > Utc::now() => continue,
                Some(_) => {}
            }

            if status.attempt_count >= self.config.retry.max_attempts {
                continue;
            }

            let request = match self.store.get_request(message.id).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    warn!(message_id = %message.id, "Original request missing, skipping retry");
                    continue;
                }
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "Failed to load original request");
                    continue;
                }
            };

            let attempt = self.record_attempt(&message).await;
            let mut all_sent = true;

            for channel in status.undelivered_channels() {
                let channel = channel.to_string();

                self.limiter.wait(&self.shutdown).await?;

                match self
                    .client
                    .send_message(
                        &channel,
                        &message.content,
                        message.attachment.as_ref(),
                        &message.trace_id,
                    )
                    .await
                {
                    Ok(receipt) => {
                        self.record_sent(&message, &channel, &receipt.message_id).await;
                    }
                    Err(e) => {
                        all_sent = false;
                        self.handle_delivery_failure(&message, &request, &channel, attempt, e)
                            .await?;
                    }
                }
            }

            if all_sent {
                if let Err(e) = self.store.clear_retry(message.id).await {
                    warn!(message_id = %message.id, error = %e, "Failed to clear retry schedule");
                }
                info!(
                    worker_id = %self.worker_id,
                    trace_id = %message.trace_id,
                    attempt,
                    "Retry delivered all outstanding channels"
                );
            }
        }

        Ok(())
    }

    /// Advisory probe of every configured destination. Never blocks
    /// dispatch; an unreachable channel is an operator signal, not an error.
    async fn audit_channels(&self) -> Result<(), WorkerError> {
        let mut channels: Vec<String> =
            audited_channels().iter().map(|c| c.to_string()).collect();
        if !channels.contains(&self.config.default_channel) {
            channels.push(self.config.default_channel.clone());
        }

        debug!(
            worker_id = %self.worker_id,
            channels = channels.len(),
            "Auditing destination channels"
        );

        for channel in channels {
            self.limiter.wait(&self.shutdown).await?;

            match self.client.get_channel_info(&channel).await {
                Ok(info) if !info.is_member => {
                    warn!(
                        worker_id = %self.worker_id,
                        channel = %channel,
                        channel_id = %info.id,
                        "Not a member of destination channel"
                    );
                }
                Ok(info) => {
                    debug!(channel = %channel, channel_id = %info.id, "Channel reachable");
                }
                Err(e) => {
                    warn!(
                        worker_id = %self.worker_id,
                        channel = %channel,
                        error_kind = e.kind(),
                        error = %e,
                        "Destination channel unreachable"
                    );
                }
            }
        }

        Ok(())
    }

    async fn record_sent(&self, message: &Message, channel: &str, platform_message_id: &str) {
        info!(
            worker_id = %self.worker_id,
            trace_id = %message.trace_id,
            channel = %channel,
            platform_message_id = %platform_message_id,
            "Message sent"
        );

        self.record_channel_state(message, channel, ChannelDeliveryState::Sent, None)
            .await;
    }

    async fn record_channel_state(
        &self,
        message: &Message,
        channel: &str,
        state: ChannelDeliveryState,
        last_error: Option<&str>,
    ) {
        if let Err(e) = self
            .store
            .update_channel_state(message.id, channel, state, last_error)
            .await
        {
            warn!(
                trace_id = %message.trace_id,
                channel = %channel,
                state = %state,
                error = %e,
                "Failed to update channel state"
            );
        }
    }

    async fn record_attempt(&self, message: &Message) -> u32 {
        match self.store.record_attempt(message.id).await {
            Ok(attempt) => attempt,
            Err(e) => {
                warn!(trace_id = %message.trace_id, error = %e, "Failed to record attempt");
                1
            }
        }
    }

    async fn clear_retry(&self, message: &Message) {
        if let Err(e) = self.store.clear_retry(message.id).await {
            warn!(trace_id = %message.trace_id, error = %e, "Failed to clear retry schedule");
        }
    }

    async fn quarantine(
        &self,
        message: &Message,
        request: &NotificationRequest,
        error_text: String,
        reason: DeadLetterReason,
    ) {
        let dead_letter = DeadLetterMessage::new(
            message.id,
            request.clone(),
            error_text,
            reason,
            self.worker_id.clone(),
        );

        match self.dead_letters.write(&dead_letter).await {
            Ok(()) => {
                warn!(
                    worker_id = %self.worker_id,
                    trace_id = %message.trace_id,
                    reason = reason.as_str(),
                    "Message quarantined to dead letter store"
                );
            }
            Err(e) => {
                error!(
                    worker_id = %self.worker_id,
                    trace_id = %message.trace_id,
                    reason = reason.as_str(),
                    error = %e,
                    "Failed to write dead letter"
                );
            }
        }
    }
}
