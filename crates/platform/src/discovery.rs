// Consul agent client over its HTTP API.
//
// Purpose
// - Register a service with a health check at startup.
// - Resolve the broker endpoint by service id (`kafka-9094`) before the
//   producer or consumer is built; a missing entry is fatal for the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("consul request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("consul returned status {0}")]
    Status(u16),

    #[error("service {0} not registered")]
    NotFound(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAddress {
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Port")]
    pub port: u16,
}

impl ServiceAddress {
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    #[serde(rename = "HTTP")]
    pub http: String,
    pub interval: String,
    pub timeout: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub check: HealthCheck,
}

pub struct Consul {
    base_url: String,
    http: reqwest::Client,
}

impl Consul {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn register(&self, registration: &ServiceRegistration) -> Result<(), DiscoveryError> {
        let url = format!("{}/v1/agent/service/register", self.base_url);
        let response = self.http.put(url).json(registration).send().await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status().as_u16()));
        }
        tracing::info!(service = %registration.id, "registered with consul");
        Ok(())
    }

    pub async fn resolve(&self, service_id: &str) -> Result<ServiceAddress, DiscoveryError> {
        let url = format!("{}/v1/agent/service/{}", self.base_url, service_id);
        let response = self.http.get(url).send().await?;
        if response.status().as_u16() == 404 {
            return Err(DiscoveryError::NotFound(service_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status().as_u16()));
        }
        let address: ServiceAddress = response.json().await?;
        tracing::info!(service = service_id, endpoint = %address.host_port(), "resolved service");
        Ok(address)
    }
}

#[cfg(test)]
mod discovery_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn it_should_compose_host_and_port() {
        let address = ServiceAddress {
            address: "broker".into(),
            port: 9094,
        };
        assert_eq!(address.host_port(), "broker:9094");
    }

    #[rstest]
    #[tokio::test]
    #[ignore]
    async fn consul_should_resolve_the_broker() {
        let consul = Consul::new("http://localhost:8500");
        let address = consul.resolve("kafka-9094").await.unwrap();
        assert!(!address.address.is_empty());
    }
}
