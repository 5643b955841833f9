// In-memory implementations of the repair ports.
//
// Purpose
// - Support handler, worker and shell tests without a database or broker.
//
// Responsibilities
// - Mirror the atomicity of the real store: an offline store fails before
//   any partial write is visible.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::BroadcastStream;

use crate::core::ports::{
    EventPublisher, PublishError, RepairStore, RepairTail, RoutingError, RoutingTable, StoreError,
};
use crate::core::repair::{
    Location, Mechanic, OutboxEvent, Repair, RepairCost, RepairStatus,
};

#[derive(Default)]
struct Inner {
    repairs: Vec<Repair>,
    costs: Vec<RepairCost>,
    mechanics: Vec<Mechanic>,
    outbox: Vec<OutboxEvent>,
    unmarkable: Vec<String>,
}

pub struct InMemoryRepairStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
    inserts: broadcast::Sender<Repair>,
}

impl InMemoryRepairStore {
    pub fn new() -> Self {
        let (inserts, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(Inner::default()),
            offline: AtomicBool::new(false),
            inserts,
        }
    }

    pub fn toggle_offline(&self) {
        let offline = self.offline.load(Ordering::SeqCst);
        self.offline.store(!offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store offline".into()));
        }
        Ok(())
    }

    pub async fn repairs(&self) -> Vec<Repair> {
        self.inner.lock().await.repairs.clone()
    }

    pub async fn costs(&self) -> Vec<RepairCost> {
        self.inner.lock().await.costs.clone()
    }

    pub async fn outbox_rows(&self) -> Vec<OutboxEvent> {
        self.inner.lock().await.outbox.clone()
    }

    pub async fn set_mechanics(&self, mechanics: Vec<Mechanic>) {
        self.inner.lock().await.mechanics = mechanics;
    }

    pub async fn put_cost(&self, cost: RepairCost) {
        self.inner.lock().await.costs.push(cost);
    }

    /// Stages a bare outbox row, bypassing the domain write. Worker tests
    /// use this to control exactly what the dispatcher sees.
    pub async fn stage_event(&self, event: OutboxEvent) {
        self.inner.lock().await.outbox.push(event);
    }

    /// Makes mark_processed fail for one row id.
    pub async fn fail_mark_for(&self, event_id: &str) {
        self.inner.lock().await.unmarkable.push(event_id.to_string());
    }
}

impl Default for InMemoryRepairStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepairStore for InMemoryRepairStore {
    async fn create_repair(
        &self,
        cost: &RepairCost,
        repair: &Repair,
        event: &OutboxEvent,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        inner.costs.push(cost.clone());
        inner.repairs.push(repair.clone());
        inner.outbox.push(event.clone());
        drop(inner);
        let _ = self.inserts.send(repair.clone());
        Ok(())
    }

    async fn update_repair(
        &self,
        repair_id: &str,
        status: RepairStatus,
        event: &OutboxEvent,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        let repair = inner
            .repairs
            .iter_mut()
            .find(|repair| repair.id == repair_id)
            .ok_or_else(|| StoreError::Conflict(format!("repair {repair_id} matched nothing")))?;
        repair.status = status;
        inner.outbox.push(event.clone());
        Ok(())
    }

    async fn repair(&self, repair_id: &str) -> Result<Option<Repair>, StoreError> {
        self.check_online()?;
        let inner = self.inner.lock().await;
        Ok(inner.repairs.iter().find(|r| r.id == repair_id).cloned())
    }

    async fn cost(&self, cost_id: &str) -> Result<Option<RepairCost>, StoreError> {
        self.check_online()?;
        let inner = self.inner.lock().await;
        Ok(inner.costs.iter().find(|c| c.id == cost_id).cloned())
    }

    async fn repairs_for_user(&self, user_id: &str) -> Result<Vec<Repair>, StoreError> {
        self.check_online()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .repairs
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mechanics(&self) -> Result<Vec<Mechanic>, StoreError> {
        self.check_online()?;
        Ok(self.inner.lock().await.mechanics.clone())
    }

    async fn unprocessed_events(&self) -> Result<Vec<OutboxEvent>, StoreError> {
        self.check_online()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .outbox
            .iter()
            .filter(|event| !event.processed)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), StoreError> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        if inner.unmarkable.iter().any(|id| id == event_id) {
            return Err(StoreError::Backend("mark failed".into()));
        }
        let event = inner
            .outbox
            .iter_mut()
            .find(|event| event.id == event_id)
            .ok_or_else(|| StoreError::Conflict(format!("event {event_id} matched nothing")))?;
        event.processed = true;
        event.processed_at = Some(bson::DateTime::now());
        Ok(())
    }
}

#[async_trait]
impl RepairTail for InMemoryRepairStore {
    async fn snapshot(&self) -> Result<Vec<Repair>, StoreError> {
        self.check_online()?;
        Ok(self.inner.lock().await.repairs.clone())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Result<Repair, StoreError>>, StoreError> {
        self.check_online()?;
        let receiver = self.inserts.subscribe();
        Ok(BroadcastStream::new(receiver)
            .filter_map(|next| async move { next.ok().map(Ok) })
            .boxed())
    }
}

pub struct RecordingPublisher {
    published: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn toggle_failing(&self) {
        let failing = self.failing.load(Ordering::SeqCst);
        self.failing.store(!failing, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<Vec<u8>> {
        self.published.lock().await.clone()
    }
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, payload: &[u8]) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Broker("broker offline".into()));
        }
        self.published.lock().await.push(payload.to_vec());
        Ok(())
    }
}

/// Routing table that answers with a canned duration row.
pub struct FixedRoutingTable {
    durations: Vec<Option<f64>>,
    failing: bool,
}

impl FixedRoutingTable {
    pub fn new(durations: Vec<Option<f64>>) -> Self {
        Self {
            durations,
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            durations: Vec::new(),
            failing: true,
        }
    }
}

#[async_trait]
impl RoutingTable for FixedRoutingTable {
    async fn durations(
        &self,
        _source: Location,
        destinations: &[Location],
    ) -> Result<Vec<Option<f64>>, RoutingError> {
        if self.failing {
            return Err(RoutingError::NotOk("NoTable".into()));
        }
        debug_assert_eq!(self.durations.len(), destinations.len());
        Ok(self.durations.clone())
    }
}
