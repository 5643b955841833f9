// In-memory implementations of the relay ports.
//
// Purpose
// - Support consumer, applier and shell tests without a broker or database.
//
// Responsibilities
// - Honour the same contracts as the Mongo adapter: the (topic, partition,
//   offset) triple de-duplicates staking, apply upserts by repair id and
//   flips the row in the same step.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::ports::{
    InboundMessage, InboxStore, MechanicStore, MessageSource, SourceError, Staked, StoreError,
};
use crate::core::repair::{InboxEvent, Mechanic, Repair};

#[derive(Default)]
struct Inner {
    events: Vec<InboxEvent>,
    seen: HashSet<(String, i32, i64)>,
    repairs: Vec<Repair>,
    mechanics: Vec<Mechanic>,
}

pub struct InMemoryMechanicStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
    fail_next_apply: AtomicBool,
}

impl InMemoryMechanicStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            offline: AtomicBool::new(false),
            fail_next_apply: AtomicBool::new(false),
        }
    }

    pub fn toggle_offline(&self) {
        let offline = self.offline.load(Ordering::SeqCst);
        self.offline.store(!offline, Ordering::SeqCst);
    }

    /// Makes the next apply call fail once, then recover.
    pub fn fail_apply_once(&self) {
        self.fail_next_apply.store(true, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store offline".into()));
        }
        Ok(())
    }

    pub async fn staked_events(&self) -> Vec<InboxEvent> {
        self.inner.lock().await.events.clone()
    }

    pub async fn repairs(&self) -> Vec<Repair> {
        self.inner.lock().await.repairs.clone()
    }

    pub async fn set_mechanics(&self, mechanics: Vec<Mechanic>) {
        self.inner.lock().await.mechanics = mechanics;
    }

    pub async fn put_repair(&self, repair: Repair) {
        self.inner.lock().await.repairs.push(repair);
    }

    /// Stages a row directly, bypassing the duplicate check. Applier tests
    /// use this to control exactly what a tick sees.
    pub async fn stake_raw(&self, event: InboxEvent) {
        self.inner.lock().await.events.push(event);
    }
}

impl Default for InMemoryMechanicStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InboxStore for InMemoryMechanicStore {
    async fn stake(&self, event: &InboxEvent) -> Result<Staked, StoreError> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        let key = (
            event.kafka_topic.clone(),
            event.kafka_partition,
            event.kafka_offset,
        );
        if !inner.seen.insert(key) {
            return Ok(Staked::Duplicate);
        }
        inner.events.push(event.clone());
        Ok(Staked::Fresh)
    }

    async fn unprocessed(&self) -> Result<Vec<InboxEvent>, StoreError> {
        self.check_online()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .events
            .iter()
            .filter(|event| !event.processed)
            .cloned()
            .collect())
    }

    async fn apply(&self, repair: &Repair, event_id: &str) -> Result<(), StoreError> {
        self.check_online()?;
        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("apply failed".into()));
        }
        let mut inner = self.inner.lock().await;
        match inner.repairs.iter_mut().find(|existing| existing.id == repair.id) {
            Some(existing) => existing.status = repair.status.clone(),
            None => inner.repairs.push(repair.clone()),
        }
        let event = inner
            .events
            .iter_mut()
            .find(|event| event.id == event_id)
            .ok_or(StoreError::NotFound)?;
        event.processed = true;
        event.processed_at = Some(bson::DateTime::now());
        Ok(())
    }
}

#[async_trait]
impl MechanicStore for InMemoryMechanicStore {
    async fn mechanic(&self, mechanic_id: &str) -> Result<Option<Mechanic>, StoreError> {
        self.check_online()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .mechanics
            .iter()
            .find(|mechanic| mechanic.id == mechanic_id)
            .cloned())
    }

    async fn all_repairs(&self) -> Result<Vec<Repair>, StoreError> {
        self.check_online()?;
        Ok(self.inner.lock().await.repairs.clone())
    }

    async fn assign(&self, repair_id: &str, mechanic_id: &str) -> Result<Repair, StoreError> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        let repair = inner
            .repairs
            .iter_mut()
            .find(|repair| repair.id == repair_id)
            .ok_or(StoreError::NotFound)?;
        repair.assigned_to = Some(mechanic_id.to_string());
        Ok(repair.clone())
    }
}

/// Message source fed by tests.
pub struct ScriptedSource {
    queue: Mutex<VecDeque<InboundMessage>>,
    committed: StdMutex<Vec<(String, i32, i64)>>,
    fail_commit: AtomicBool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            committed: StdMutex::new(Vec::new()),
            fail_commit: AtomicBool::new(false),
        }
    }

    pub async fn push(&self, message: InboundMessage) {
        self.queue.lock().await.push_back(message);
    }

    pub fn committed(&self) -> Vec<(String, i32, i64)> {
        self.committed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn toggle_fail_commit(&self) {
        let failing = self.fail_commit.load(Ordering::SeqCst);
        self.fail_commit.store(!failing, Ordering::SeqCst);
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn recv(&self) -> Result<InboundMessage, SourceError> {
        if let Some(message) = self.queue.lock().await.pop_front() {
            return Ok(message);
        }
        // Nothing scripted: park forever, like a quiet partition.
        futures::future::pending().await
    }

    fn commit(&self, message: &InboundMessage) -> Result<(), SourceError> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(SourceError::Commit("commit refused".into()));
        }
        self.committed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((message.topic.clone(), message.partition, message.offset));
        Ok(())
    }
}
