// Document-store adapter for the relay side.
//
// Responsibilities
// - Stake raw broker messages under transaction; the unique index on
//   (kafka_topic, kafka_partition, kafka_offset) turns duplicate delivery
//   into a no-op.
// - Materialise repairs idempotently: the apply transaction upserts by
//   repair id and flips the inbox row together.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, ClientSession, Collection, IndexModel};

use crate::core::ports::{InboxStore, MechanicStore, Staked, StoreError};
use crate::core::repair::{InboxEvent, Mechanic, Repair};

const REPAIRS: &str = "repairs";
const MECHANICS: &str = "mechanics";
const INBOX: &str = "mechanic_outbox";

const DUPLICATE_KEY: i32 = 11000;

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        ErrorKind::BulkWrite(failure) => failure
            .write_errors
            .as_ref()
            .map(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY))
            .unwrap_or(false),
        _ => false,
    }
}

pub struct MongoMechanicStore {
    client: Client,
    repairs: Collection<Repair>,
    mechanics: Collection<Mechanic>,
    inbox: Collection<InboxEvent>,
}

impl MongoMechanicStore {
    pub fn new(client: &Client, database: &str) -> Self {
        let db = client.database(database);
        Self {
            client: client.clone(),
            repairs: db.collection(REPAIRS),
            mechanics: db.collection(MECHANICS),
            inbox: db.collection(INBOX),
        }
    }

    /// Creates the unique staking index. Must run before the consumer
    /// starts; duplicate absorption depends on it.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "kafka_topic": 1, "kafka_partition": 1, "kafka_offset": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.inbox.create_index(index, None).await?;
        Ok(())
    }

    async fn start_transaction(&self) -> Result<ClientSession, StoreError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }

    async fn apply_in_tx(
        &self,
        session: &mut ClientSession,
        repair: &Repair,
        event_id: &str,
    ) -> Result<(), StoreError> {
        let existing = self
            .repairs
            .find_one_with_session(doc! { "_id": &repair.id }, None, session)
            .await?;
        match existing {
            // The event is authoritative for status; everything else was
            // fixed at creation.
            Some(_) => {
                self.repairs
                    .update_one_with_session(
                        doc! { "_id": &repair.id },
                        doc! { "$set": { "status": &repair.status } },
                        None,
                        session,
                    )
                    .await?;
            }
            None => {
                self.repairs
                    .insert_one_with_session(repair, None, session)
                    .await?;
            }
        }

        let flipped = self
            .inbox
            .update_one_with_session(
                doc! { "_id": event_id },
                doc! { "$set": {
                    "processed": true,
                    "processed_at": bson::DateTime::now(),
                }},
                None,
                session,
            )
            .await?;
        if flipped.matched_count == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl InboxStore for MongoMechanicStore {
    async fn stake(&self, event: &InboxEvent) -> Result<Staked, StoreError> {
        let mut session = self.start_transaction().await?;
        match self
            .inbox
            .insert_one_with_session(event, None, &mut session)
            .await
        {
            Ok(_) => {
                session.commit_transaction().await?;
                Ok(Staked::Fresh)
            }
            Err(err) if is_duplicate_key(&err) => {
                let _ = session.abort_transaction().await;
                Ok(Staked::Duplicate)
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                Err(err.into())
            }
        }
    }

    async fn unprocessed(&self) -> Result<Vec<InboxEvent>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
        let cursor = self.inbox.find(doc! { "processed": false }, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn apply(&self, repair: &Repair, event_id: &str) -> Result<(), StoreError> {
        let mut session = self.start_transaction().await?;
        match self.apply_in_tx(&mut session, repair, event_id).await {
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
}

#[async_trait]
impl MechanicStore for MongoMechanicStore {
    async fn mechanic(&self, mechanic_id: &str) -> Result<Option<Mechanic>, StoreError> {
        Ok(self
            .mechanics
            .find_one(doc! { "_id": mechanic_id }, None)
            .await?)
    }

    async fn all_repairs(&self) -> Result<Vec<Repair>, StoreError> {
        let cursor = self.repairs.find(doc! {}, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn assign(&self, repair_id: &str, mechanic_id: &str) -> Result<Repair, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.repairs
            .find_one_and_update(
                doc! { "_id": repair_id },
                doc! { "$set": { "assignedTo": mechanic_id } },
                options,
            )
            .await?
            .ok_or(StoreError::NotFound)
    }
}
