use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use repair_events::{EventCodec, SchemaRegistry, RAW_SCHEMA};
use repair_platform::discovery::{Consul, HealthCheck, ServiceRegistration};
use repair_service::adapters::kafka::KafkaPublisher;
use repair_service::adapters::mongo::MongoRepairStore;
use repair_service::adapters::osrm::OsrmClient;
use repair_service::application::commands::RepairCommands;
use repair_service::application::dispatcher::OutboxDispatcher;
use repair_service::application::estimator::Estimator;
use repair_service::config::Config;
use repair_service::core::ports::{EventPublisher, RepairStore, RepairTail, RoutingTable};
use repair_service::shell::hub::StatusHub;
use repair_service::shell::state::AppState;
use repair_service::shell::{grpc, http};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    repair_platform::telemetry::init("repair-service")?;
    let config = Config::from_env()?;

    let client = repair_platform::mongo::connect(&config.mongo_uri).await?;

    let consul = Consul::new(&config.consul_address);
    consul
        .register(&ServiceRegistration {
            id: format!("repair-service-{}", config.http_port),
            name: "repair-service".into(),
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

    // Without a registered schema the producer cannot safely encode.
    let registry = SchemaRegistry::new(&config.schema_registry_url);
    let schema_id = registry
        .register(&config.subject(), RAW_SCHEMA)
        .await
        .context("schema registry unreachable")?;
    let codec = Arc::new(EventCodec::new(schema_id)?);

    let mongo = Arc::new(MongoRepairStore::new(&client, &config.database));
    let store: Arc<dyn RepairStore> = mongo.clone();
    let tail: Arc<dyn RepairTail> = mongo.clone();
    let publisher: Arc<dyn EventPublisher> = Arc::new(KafkaPublisher::new(
        &broker.host_port(),
        config.topic.clone(),
    )?);
    let routing: Arc<dyn RoutingTable> = Arc::new(OsrmClient::new(config.osrm_url.clone())?);

    let commands = Arc::new(RepairCommands::new(store.clone(), codec));
    let estimator = Arc::new(Estimator::new(store.clone(), routing));
    let hub = Arc::new(StatusHub::new());

    let token = CancellationToken::new();
    let dispatcher = OutboxDispatcher::new(store.clone(), publisher, config.dispatch_interval);
    let dispatcher_task = tokio::spawn(dispatcher.run(token.clone()));

    let grpc_addr: std::net::SocketAddr = format!("0.0.0.0:{}", config.grpc_port)
        .parse()
        .context("invalid grpc address")?;
    let grpc_shutdown = token.clone().cancelled_owned();
    let grpc_task = tokio::spawn(async move {
        if let Err(err) = tonic::transport::Server::builder()
            .add_service(grpc::server(tail))
            .serve_with_shutdown(grpc_addr, grpc_shutdown)
            .await
        {
            tracing::error!(error = %err, "grpc server exited");
        }
    });

    let state = AppState {
        commands,
        estimator,
        store,
        hub,
    };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    tracing::info!(port = config.http_port, grpc_port = config.grpc_port, "repair service listening");
    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    token.cancel();
    let _ = dispatcher_task.await;
    let _ = grpc_task.await;
    repair_platform::telemetry::shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
