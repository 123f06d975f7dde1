use std::sync::Arc;

use anyhow::{Context, Error, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use alert_service::api::run_api_server;
use alert_service::clients::database::{
    DeadLetterSink, PostgresDeadLetterStore, PostgresStatusStore, StatusStore,
};
use alert_service::clients::rate_limiter::RateLimiter;
use alert_service::clients::redis::IdempotencyClient;
use alert_service::clients::slack::{DeliveryClient, SlackClient};
use alert_service::config::Config;
use alert_service::worker::Worker;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;

    let client: Arc<dyn DeliveryClient> = Arc::new(
        SlackClient::connect(&config.slack_config())
            .await
            .context("chat platform client initialization failed")?,
    );

    let store: Arc<dyn StatusStore> = Arc::new(
        PostgresStatusStore::connect(&config.database_url)
            .await
            .context("status store initialization failed")?,
    );

    let idempotency = IdempotencyClient::connect(&config)
        .await
        .context("idempotency cache initialization failed")?;

    let dead_letters: Arc<dyn DeadLetterSink> = Arc::new(
        PostgresDeadLetterStore::connect(&config.database_url, idempotency)
            .await
            .context("dead letter store initialization failed")?,
    );

    // One limiter across the pool keeps aggregate throughput under the
    // platform's per-app ceiling.
    let limiter = Arc::new(RateLimiter::new(config.min_send_interval()));

    let workers: Vec<Arc<Worker>> = (0..config.worker_concurrency.max(1))
        .map(|_| {
            Arc::new(Worker::new(
                config.worker_config(),
                Arc::clone(&client),
                Arc::clone(&store),
                Arc::clone(&dead_letters),
                Arc::clone(&limiter),
            ))
        })
        .collect();

    for worker in &workers {
        worker.start()?;
    }

    info!(workers = workers.len(), "Worker pool started");

    let api_config = config.clone();
    let api_workers = workers.clone();
    let api = tokio::spawn(async move { run_api_server(api_config, api_workers).await });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutdown signal received");

    for worker in &workers {
        if let Err(e) = worker.stop().await {
            warn!(worker_id = %worker.id(), error = %e, "Worker stop failed");
        }
    }

    api.abort();

    info!("Shutdown complete");

    Ok(())
}
