// Ports for the relay side: broker source, inbox store, reference data.
//
// Responsibilities
// - Keep the consumer loop and the applier independent of the broker and
//   database clients.
//
// Boundaries
// - `stake` and `apply` are atomic; the adapter owns the session.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::repair::{InboxEvent, Mechanic, Repair};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("backend error: {0}")]
    Backend(String),
}

/// Outcome of staking a broker message into the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staked {
    Fresh,
    /// The unique (topic, partition, offset) index absorbed a redelivery;
    /// treated as success.
    Duplicate,
}

#[async_trait]
pub trait InboxStore: Send + Sync {
    /// Lands a raw message in the inbox under transaction.
    async fn stake(&self, event: &InboxEvent) -> Result<Staked, StoreError>;

    /// Staked rows not yet materialised, in insertion order.
    async fn unprocessed(&self) -> Result<Vec<InboxEvent>, StoreError>;

    /// Materialises the repair and flips the row in one transaction. The
    /// event is authoritative: an existing repair gets the event's status,
    /// a missing one is inserted. Applying the same event twice leaves the
    /// domain state unchanged.
    async fn apply(&self, repair: &Repair, event_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MechanicStore: Send + Sync {
    async fn mechanic(&self, mechanic_id: &str) -> Result<Option<Mechanic>, StoreError>;
    async fn all_repairs(&self) -> Result<Vec<Repair>, StoreError>;
    async fn assign(&self, repair_id: &str, mechanic_id: &str) -> Result<Repair, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("broker receive failed: {0}")]
    Recv(String),

    #[error("offset commit failed: {0}")]
    Commit(String),
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn recv(&self) -> Result<InboundMessage, SourceError>;

    /// Commits the consumer offset for this message. Called only after the
    /// inbox transaction committed.
    fn commit(&self, message: &InboundMessage) -> Result<(), SourceError>;
}
