// Tracing and OpenTelemetry wiring shared by every service binary.
//
// Responsibilities
// - Install a fmt subscriber filtered by RUST_LOG (default "info").
// - When OTLP_ENDPOINT is set, export spans through an OTLP pipeline tagged
//   with the service name so the collector can stitch cross-service traces.

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub fn init(service_name: &'static str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    match std::env::var("OTLP_ENDPOINT") {
        Ok(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(opentelemetry_sdk::trace::config().with_resource(
                    Resource::new(vec![KeyValue::new("service.name", service_name)]),
                ))
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
    }
    Ok(())
}

/// Flushes any batched spans. Call on shutdown after background workers
/// have drained.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}
