// Minimal schema-registry client over its REST surface.
//
// Purpose
// - Register the subject once at service start and keep the returned id.
// - Let consumers fetch a schema by id when they do not already hold it.
//
// Boundaries
// - No caching beyond what callers do themselves; both services hold the
//   schema text at compile time and only need the id.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned status {0}")]
    Status(u16),
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    schema: &'a str,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: u32,
}

#[derive(Deserialize)]
struct SchemaResponse {
    schema: String,
}

pub struct SchemaRegistry {
    base_url: String,
    http: reqwest::Client,
}

impl SchemaRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Registers `schema` under `subject` and returns the registry-assigned
    /// id. Registering an identical schema again returns the existing id.
    pub async fn register(&self, subject: &str, schema: &str) -> Result<u32, RegistryError> {
        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        let response = self
            .http
            .post(url)
            .json(&RegisterBody { schema })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RegistryError::Status(response.status().as_u16()));
        }
        let body: RegisterResponse = response.json().await?;
        tracing::info!(subject, schema_id = body.id, "registered schema");
        Ok(body.id)
    }

    /// Fetches the schema text for a wire-format id.
    pub async fn fetch(&self, schema_id: u32) -> Result<String, RegistryError> {
        let url = format!("{}/schemas/ids/{}", self.base_url, schema_id);
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(RegistryError::Status(response.status().as_u16()));
        }
        let body: SchemaResponse = response.json().await?;
        Ok(body.schema)
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;
    use crate::record::RAW_SCHEMA;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    #[ignore]
    async fn registry_should_register_and_fetch_the_schema() {
        let registry = SchemaRegistry::new("http://localhost:8081");
        let id = registry
            .register("repair-events-value", RAW_SCHEMA)
            .await
            .unwrap();
        let fetched = registry.fetch(id).await.unwrap();
        assert!(fetched.contains("RepairEvent"));
    }
}
