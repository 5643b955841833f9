// Write path of the outbox producer.
//
// Responsibilities
// - Validate input before anything touches a session.
// - Encode the event payload up front, then hand the domain write and the
//   staged event to the store as one atomic operation.
// - Never publish on the request path; the dispatcher owns publication.

use std::sync::Arc;

use repair_events::EventCodec;

use crate::application::errors::RepairError;
use crate::core::events::repair_event;
use crate::core::ports::RepairStore;
use crate::core::repair::{
    new_id, EventType, Location, MechanicInfo, OutboxEvent, Repair, RepairCost, RepairStatus,
    RepairType,
};

/// Cost payload accepted at the boundary; the estimate endpoint hands the
/// client a cost it can post back, id included.
#[derive(Debug, Clone)]
pub struct CostInput {
    pub id: Option<String>,
    pub user_id: String,
    pub repair_type: String,
    pub total_price: f64,
    pub user_location: Option<Location>,
    pub mechanics: Vec<MechanicInfo>,
}

pub struct RepairCommands {
    store: Arc<dyn RepairStore>,
    codec: Arc<EventCodec>,
}

impl RepairCommands {
    pub fn new(store: Arc<dyn RepairStore>, codec: Arc<EventCodec>) -> Self {
        Self { store, codec }
    }

    pub async fn create_repair(&self, input: CostInput) -> Result<Repair, RepairError> {
        let cost = validate_cost(input)?;
        let repair = Repair::pending(cost);

        let payload = self.codec.encode(&repair_event(&repair))?;
        let event = OutboxEvent::staged(EventType::RepairCreated, payload);

        self.store
            .create_repair(&repair.repair_cost, &repair, &event)
            .await?;
        tracing::info!(repair_id = %repair.id, user_id = %repair.user_id, "created repair");
        Ok(repair)
    }

    pub async fn update_repair(
        &self,
        repair_id: &str,
        status: &str,
    ) -> Result<Repair, RepairError> {
        if repair_id.is_empty() {
            return Err(RepairError::InvalidInput("repair id is required".into()));
        }
        let status: RepairStatus = status
            .parse()
            .map_err(|_| RepairError::InvalidInput(format!("unknown status {status:?}")))?;

        // Loaded outside the transaction, only to build the event payload.
        let mut repair = self
            .store
            .repair(repair_id)
            .await?
            .ok_or(RepairError::NotFound)?;
        repair.status = status;

        let payload = self.codec.encode(&repair_event(&repair))?;
        let event = OutboxEvent::staged(EventType::RepairUpdated, payload);

        self.store.update_repair(repair_id, status, &event).await?;
        tracing::info!(repair_id, status = %status, "updated repair");
        Ok(repair)
    }
}

fn validate_cost(input: CostInput) -> Result<RepairCost, RepairError> {
    if input.user_id.is_empty() {
        return Err(RepairError::InvalidInput("user id is required".into()));
    }
    let repair_type: RepairType = input.repair_type.parse().map_err(|_| {
        RepairError::InvalidInput(format!("unknown repair type {:?}", input.repair_type))
    })?;
    if input.total_price <= 0.0 {
        return Err(RepairError::InvalidInput(
            "total price must be positive".into(),
        ));
    }
    Ok(RepairCost {
        id: input.id.filter(|id| !id.is_empty()).unwrap_or_else(new_id),
        user_id: input.user_id,
        repair_type,
        total_price: input.total_price,
        user_location: input.user_location,
        mechanics: input.mechanics,
    })
}
