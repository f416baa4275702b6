//! Application wiring.
//!
//! Builds the pool, Kafka clients and cache once, passes them explicitly,
//! runs the HTTP server plus the two background loops, and tears
//! everything down on SIGINT/SIGTERM.

use pipeline_bus::{BusConsumer, EventProducer, OutboxPublisher};
use tokio::sync::watch;
use tracing::{error, info};

use crate::cache::BalanceCache;
use crate::config::Config;
use crate::consumer::{PaymentRequestedHandler, DEFAULT_ATTEMPT_BUDGET};
use crate::http::HttpServer;
use crate::repo::PgAccountRepo;
use crate::service::PaymentService;

pub async fn run(config: Config) -> anyhow::Result<()> {
    let repo =
        PgAccountRepo::connect(&config.database_url, config.topic_payment_result.clone()).await?;
    let producer = EventProducer::connect(&config.kafka_brokers)?;
    let publisher = OutboxPublisher::new(
        repo.pool().clone(),
        producer,
        config.outbox_poll_interval,
        config.outbox_batch_size,
    );
    let consumer = BusConsumer::subscribe(
        &config.kafka_brokers,
        &config.consumer_group_id,
        &config.topic_payment_requested,
    )?;
    let cache = BalanceCache::connect(&config.cache_addr, config.cache_ttl).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, starting graceful shutdown");
        let _ = shutdown_tx.send(true);
    });

    let handler = PaymentRequestedHandler::new(repo.clone(), DEFAULT_ATTEMPT_BUDGET);
    let publisher_task = tokio::spawn(publisher.run(shutdown_rx.clone()));
    let consumer_task = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { consumer.run(handler, shutdown).await })
    };

    let server = HttpServer::new(PaymentService::new(repo), cache);
    server.run(&config.http_addr, shutdown_rx).await?;

    // the server has drained; let the background loops finish their pass
    publisher_task.await?;
    if let Err(e) = consumer_task.await? {
        error!(error = %e, "consumer stopped with error");
    }

    info!("payments service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
