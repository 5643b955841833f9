// Document-store adapter for the repair side.
//
// Responsibilities
// - Own the transactional session for every mutating operation: the domain
//   write and the staged outbox row commit together or not at all.
// - Serve the change-stream feed for the streaming RPC; the stream is
//   opened before the snapshot read so inserts in between are not lost.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use mongodb::bson::doc;
use mongodb::options::{ChangeStreamOptions, FindOptions, FullDocumentType};
use mongodb::{Client, ClientSession, Collection};

use crate::core::ports::{RepairStore, RepairTail, StoreError};
use crate::core::repair::{Mechanic, OutboxEvent, Repair, RepairCost, RepairStatus};

const REPAIRS: &str = "repairs";
const COSTS: &str = "repair_costs";
const MECHANICS: &str = "mechanics";
const OUTBOX: &str = "outbox";

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub struct MongoRepairStore {
    client: Client,
    repairs: Collection<Repair>,
    costs: Collection<RepairCost>,
    mechanics: Collection<Mechanic>,
    outbox: Collection<OutboxEvent>,
}

impl MongoRepairStore {
    pub fn new(client: &Client, database: &str) -> Self {
        let db = client.database(database);
        Self {
            client: client.clone(),
            repairs: db.collection(REPAIRS),
            costs: db.collection(COSTS),
            mechanics: db.collection(MECHANICS),
            outbox: db.collection(OUTBOX),
        }
    }

    async fn start_transaction(&self) -> Result<ClientSession, StoreError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }

    async fn create_in_tx(
        &self,
        session: &mut ClientSession,
        cost: &RepairCost,
        repair: &Repair,
        event: &OutboxEvent,
    ) -> Result<(), StoreError> {
        self.costs
            .insert_one_with_session(cost, None, session)
            .await?;
        self.repairs
            .insert_one_with_session(repair, None, session)
            .await?;
        self.outbox
            .insert_one_with_session(event, None, session)
            .await?;
        Ok(())
    }

    async fn update_in_tx(
        &self,
        session: &mut ClientSession,
        repair_id: &str,
        status: RepairStatus,
        event: &OutboxEvent,
    ) -> Result<(), StoreError> {
        let updated = self
            .repairs
            .update_one_with_session(
                doc! { "_id": repair_id },
                doc! { "$set": { "status": status.to_string() } },
                None,
                session,
            )
            .await?;
        if updated.matched_count == 0 {
            return Err(StoreError::Conflict(format!(
                "repair {repair_id} matched nothing"
            )));
        }
        self.outbox
            .insert_one_with_session(event, None, session)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RepairStore for MongoRepairStore {
    async fn create_repair(
        &self,
        cost: &RepairCost,
        repair: &Repair,
        event: &OutboxEvent,
    ) -> Result<(), StoreError> {
        let mut session = self.start_transaction().await?;
        match self.create_in_tx(&mut session, cost, repair, event).await {
            Ok(()) => {
                session.commit_transaction().await?;
                Ok(())
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }

    async fn update_repair(
        &self,
        repair_id: &str,
        status: RepairStatus,
        event: &OutboxEvent,
    ) -> Result<(), StoreError> {
        let mut session = self.start_transaction().await?;
        match self
            .update_in_tx(&mut session, repair_id, status, event)
            .await
        {
            Ok(()) => {
                session.commit_transaction().await?;
                Ok(())
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }

    async fn repair(&self, repair_id: &str) -> Result<Option<Repair>, StoreError> {
        Ok(self.repairs.find_one(doc! { "_id": repair_id }, None).await?)
    }

    async fn cost(&self, cost_id: &str) -> Result<Option<RepairCost>, StoreError> {
        Ok(self.costs.find_one(doc! { "_id": cost_id }, None).await?)
    }

    async fn repairs_for_user(&self, user_id: &str) -> Result<Vec<Repair>, StoreError> {
        let cursor = self.repairs.find(doc! { "userID": user_id }, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn mechanics(&self) -> Result<Vec<Mechanic>, StoreError> {
        let cursor = self.mechanics.find(doc! {}, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn unprocessed_events(&self) -> Result<Vec<OutboxEvent>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
        let cursor = self
            .outbox
            .find(doc! { "processed": false }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), StoreError> {
        let updated = self
            .outbox
            .update_one(
                doc! { "_id": event_id },
                doc! { "$set": {
                    "processed": true,
                    "processed_at": bson::DateTime::now(),
                }},
                None,
            )
            .await?;
        if updated.matched_count == 0 {
            return Err(StoreError::Conflict(format!(
                "outbox event {event_id} matched nothing"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RepairTail for MongoRepairStore {
    async fn snapshot(&self) -> Result<Vec<Repair>, StoreError> {
        let cursor = self.repairs.find(doc! {}, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Result<Repair, StoreError>>, StoreError> {
        let pipeline = [doc! { "$match": { "operationType": "insert" } }];
        let options = ChangeStreamOptions::builder()
            .full_document(Some(FullDocumentType::UpdateLookup))
            .build();
        let stream = self.repairs.watch(pipeline, options).await?;
        Ok(stream
            .filter_map(|change| async move {
                match change {
                    Ok(change) => change.full_document.map(Ok),
                    Err(err) => Some(Err(StoreError::from(err))),
                }
            })
            .boxed())
    }
}
