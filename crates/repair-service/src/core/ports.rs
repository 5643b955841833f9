// Ports define what the repair core needs from the outside world, without
// implementing it.
//
// Responsibilities
// - Keep the command handlers and workers independent of any database or
//   broker by coding against traits.
//
// Boundaries
// - Each mutating store operation is atomic: the adapter owns the session
//   and either commits everything or nothing.
//
// Testing guidance
// - In-memory implementations live in adapters::in_memory.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::core::repair::{Location, Mechanic, OutboxEvent, Repair, RepairCost, RepairStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait RepairStore: Send + Sync {
    /// Inserts the cost, the repair and the staged event in one transaction.
    async fn create_repair(
        &self,
        cost: &RepairCost,
        repair: &Repair,
        event: &OutboxEvent,
    ) -> Result<(), StoreError>;

    /// Sets the status with a conditional match and stages the event in the
    /// same transaction. Matching nothing at commit time is a conflict.
    async fn update_repair(
        &self,
        repair_id: &str,
        status: RepairStatus,
        event: &OutboxEvent,
    ) -> Result<(), StoreError>;

    async fn repair(&self, repair_id: &str) -> Result<Option<Repair>, StoreError>;
    async fn cost(&self, cost_id: &str) -> Result<Option<RepairCost>, StoreError>;
    async fn repairs_for_user(&self, user_id: &str) -> Result<Vec<Repair>, StoreError>;
    async fn mechanics(&self) -> Result<Vec<Mechanic>, StoreError>;

    /// Staged events in insertion order.
    async fn unprocessed_events(&self) -> Result<Vec<OutboxEvent>, StoreError>;

    /// Flips `processed` after a broker ack. The dispatcher is the only
    /// caller.
    async fn mark_processed(&self, event_id: &str) -> Result<(), StoreError>;
}

/// Feed of repair inserts for the streaming RPC. `subscribe` must be called
/// before `snapshot` so an insert landing during the snapshot read is still
/// delivered (possibly twice, never zero times).
#[async_trait]
pub trait RepairTail: Send + Sync {
    async fn snapshot(&self) -> Result<Vec<Repair>, StoreError>;
    async fn subscribe(&self) -> Result<BoxStream<'static, Result<Repair, StoreError>>, StoreError>;
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broker publish failed: {0}")]
    Broker(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Blocks until the broker acknowledges delivery of this payload.
    async fn publish(&self, payload: &[u8]) -> Result<(), PublishError>;
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Http(String),

    #[error("routing service returned status {0}")]
    Status(u16),

    #[error("routing service returned code {0}")]
    NotOk(String),

    #[error("routing response missing durations")]
    MissingDurations,
}

#[async_trait]
pub trait RoutingTable: Send + Sync {
    /// One row of the duration matrix: seconds from `source` to each
    /// destination, None where the router found no route.
    async fn durations(
        &self,
        source: Location,
        destinations: &[Location],
    ) -> Result<Vec<Option<f64>>, RoutingError>;
}
