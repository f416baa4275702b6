//! Orders service binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orders_service::{app, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orders_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load();
    tracing::info!(
        http_addr = %config.http_addr,
        kafka_brokers = %config.kafka_brokers,
        "starting orders service"
    );

    app::run(config).await
}
