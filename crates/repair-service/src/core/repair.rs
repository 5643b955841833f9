// Domain model for the repair side.
//
// Purpose
// - Strongly-typed repair state with the status and type sets enforced at
//   the boundary; anything outside the enumerations never reaches a
//   transaction.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RepairStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RepairType {
    FlatTire,
    BrakeRepair,
    ChainReplacement,
}

impl RepairType {
    pub fn base_price(self) -> f64 {
        match self {
            RepairType::FlatTire => 50.0,
            RepairType::BrakeRepair => 150.0,
            RepairType::ChainReplacement => 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicInfo {
    pub id: String,
    pub name: String,
    pub location: Location,
    pub distance: f64,
}

/// Static reference row seeded at bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mechanic {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairCost {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "repairType")]
    pub repair_type: RepairType,
    #[serde(rename = "totalPrice")]
    pub total_price: f64,
    #[serde(rename = "userLocation", skip_serializing_if = "Option::is_none")]
    pub user_location: Option<Location>,
    #[serde(default)]
    pub mechanics: Vec<MechanicInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repair {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub status: RepairStatus,
    #[serde(rename = "repairCost")]
    pub repair_cost: RepairCost,
}

impl Repair {
    /// A freshly created repair. The owner is taken from the cost so the
    /// two can never disagree.
    pub fn pending(cost: RepairCost) -> Self {
        Self {
            id: new_id(),
            user_id: cost.user_id.clone(),
            status: RepairStatus::Pending,
            repair_cost: cost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum EventType {
    RepairCreated,
    RepairUpdated,
}

/// Staged event row. Inserted in the same transaction as the domain write;
/// the dispatcher is the only writer of `processed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    #[serde(rename = "_id")]
    pub id: String,
    pub event_type: EventType,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    pub created_at: bson::DateTime,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<bson::DateTime>,
}

impl OutboxEvent {
    pub fn staged(event_type: EventType, payload: Vec<u8>) -> Self {
        Self {
            id: new_id(),
            event_type,
            payload,
            created_at: bson::DateTime::now(),
            processed: false,
            processed_at: None,
        }
    }
}

/// Opaque 24-hex identifier shared by every entity.
pub fn new_id() -> String {
    ObjectId::new().to_hex()
}
