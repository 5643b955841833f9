// Shared infrastructure for the roadside services: service discovery,
// telemetry wiring, document-store connection, and one-shot bootstrap.

pub mod bootstrap;
pub mod discovery;
pub mod mongo;
pub mod telemetry;
