use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use mechanic_service::adapters::kafka::KafkaSource;
use mechanic_service::adapters::mongo::MongoMechanicStore;
use mechanic_service::application::applier::OutboxApplier;
use mechanic_service::application::consumer::RelayConsumer;
use mechanic_service::application::ops::MechanicOps;
use mechanic_service::config::Config;
use mechanic_service::core::ports::{InboxStore, MechanicStore, MessageSource};
use mechanic_service::shell::http;
use mechanic_service::shell::state::AppState;
use repair_events::{EventCodec, SchemaRegistry, RAW_SCHEMA};
use repair_platform::discovery::{Consul, HealthCheck, ServiceRegistration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    repair_platform::telemetry::init("mechanic-service")?;
    let config = Config::from_env()?;

    let client = repair_platform::mongo::connect(&config.mongo_uri).await?;
    let mongo = Arc::new(MongoMechanicStore::new(&client, &config.database));
    mongo.ensure_indexes().await?;

    let consul = Consul::new(&config.consul_address);
    consul
        .register(&ServiceRegistration {
            id: format!("mechanic-service-{}", config.http_port),
            name: "mechanic-service".into(),
            address: config.service_address.clone(),
            port: config.http_port,
            check: HealthCheck {
                http: format!(
                    "http://{}:{}/health",
                    config.service_address, config.http_port
                ),
                interval: "10s".into(),
                timeout: "5s".into(),
            },
        })
        .await?;
    let broker = consul
        .resolve(&config.broker_service_id)
        .await
        .context("broker endpoint missing from registry")?;

    // Registering the same subject returns the producer's schema id; the
    // registry being unreachable is fatal here too.
    let registry = SchemaRegistry::new(&config.schema_registry_url);
    let schema_id = registry
        .register(&config.subject(), RAW_SCHEMA)
        .await
        .context("schema registry unreachable")?;
    let codec = Arc::new(EventCodec::new(schema_id)?);

    let inbox: Arc<dyn InboxStore> = mongo.clone();
    let mechanic_store: Arc<dyn MechanicStore> = mongo.clone();
    let source: Arc<dyn MessageSource> = Arc::new(KafkaSource::new(
        &broker.host_port(),
        &config.group_id,
        &config.topic,
    )?);

    let token = CancellationToken::new();
    let consumer = RelayConsumer::new(source, inbox.clone());
    let consumer_task = tokio::spawn(consumer.run(token.clone()));
    let applier = OutboxApplier::new(inbox, codec, config.apply_interval);
    let applier_task = tokio::spawn(applier.run(token.clone()));

    let state = AppState {
        ops: Arc::new(MechanicOps::new(mechanic_store)),
    };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    tracing::info!(port = config.http_port, "mechanic service listening");
    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    token.cancel();
    let _ = consumer_task.await;
    let _ = applier_task.await;
    repair_platform::telemetry::shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
