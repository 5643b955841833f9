// Routing-matrix client for the public OSRM table endpoint.

use std::time::Duration;

use async_trait::async_trait;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use serde::Deserialize;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::core::ports::{RoutingError, RoutingTable};
use crate::core::repair::Location;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TableResponse {
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

pub struct OsrmClient {
    base_url: String,
    http: reqwest::Client,
}

impl OsrmClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RoutingError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RoutingError::Http(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    fn table_url(&self, source: Location, destinations: &[Location]) -> String {
        let mut coordinates = vec![format!("{},{}", source.longitude, source.latitude)];
        coordinates.extend(
            destinations
                .iter()
                .map(|dest| format!("{},{}", dest.longitude, dest.latitude)),
        );
        format!(
            "{}/table/v1/driving/{}?sources=0",
            self.base_url,
            coordinates.join(";")
        )
    }
}

/// Carries the current trace over the wire so the collector can stitch the
/// outbound call into the request's trace.
fn trace_headers() -> Vec<(String, String)> {
    let context = tracing::Span::current().context();
    let mut carrier = std::collections::HashMap::new();
    TraceContextPropagator::new().inject_context(&context, &mut carrier);
    carrier.into_iter().collect()
}

#[async_trait]
impl RoutingTable for OsrmClient {
    async fn durations(
        &self,
        source: Location,
        destinations: &[Location],
    ) -> Result<Vec<Option<f64>>, RoutingError> {
        let url = self.table_url(source, destinations);
        let mut request = self.http.get(&url);
        for (name, value) in trace_headers() {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|err| RoutingError::Http(err.to_string()))?;
        if !response.status().is_success() {
            return Err(RoutingError::Status(response.status().as_u16()));
        }
        let table: TableResponse = response
            .json()
            .await
            .map_err(|err| RoutingError::Http(err.to_string()))?;
        source_row(table, destinations.len())
    }
}

/// Pulls the single source row out of the matrix and pads it to one entry
/// per destination.
fn source_row(table: TableResponse, destinations: usize) -> Result<Vec<Option<f64>>, RoutingError> {
    if table.code != "Ok" {
        return Err(RoutingError::NotOk(table.code));
    }
    let row = table
        .durations
        .and_then(|mut matrix| (!matrix.is_empty()).then(|| matrix.remove(0)))
        .ok_or(RoutingError::MissingDurations)?;
    Ok((0..destinations)
        .map(|index| row.get(index + 1).copied().flatten())
        .collect())
}
