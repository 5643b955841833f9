// Local view of the repair domain, re-embedded from the event payload.
//
// Boundaries
// - This service never follows a pointer back to the repair database; the
//   cost snapshot inside the event is authoritative.

use bson::oid::ObjectId;
use repair_events::RepairEventRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicInfo {
    pub id: String,
    pub name: String,
    pub location: Location,
    pub distance: f64,
}

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
    pub repair_type: String,
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
    pub status: String,
    #[serde(rename = "repairCost")]
    pub repair_cost: RepairCost,
    #[serde(rename = "assignedTo", skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

impl Repair {
    /// Translates a decoded event into the local shape. The embedded cost
    /// keeps the repair's id; the event does not carry a separate cost id.
    pub fn from_event(record: &RepairEventRecord) -> Self {
        Self {
            id: record.id.clone(),
            user_id: record.user_id.clone(),
            status: record.status.clone(),
            repair_cost: RepairCost {
                id: record.id.clone(),
                user_id: record.user_id.clone(),
                repair_type: record.repair_type.clone(),
                total_price: record.total_price,
                user_location: record.user_location.as_ref().map(|location| Location {
                    longitude: location.longitude,
                    latitude: location.latitude,
                }),
                mechanics: record
                    .mechanics
                    .iter()
                    .map(|mechanic| MechanicInfo {
                        id: mechanic.id.clone(),
                        name: mechanic.name.clone(),
                        location: Location {
                            longitude: mechanic.location.longitude,
                            latitude: mechanic.location.latitude,
                        },
                        distance: mechanic.distance,
                    })
                    .collect(),
            },
            assigned_to: None,
        }
    }
}

/// Raw broker message staked into the local outbox. The unique index on
/// (kafka_topic, kafka_partition, kafka_offset) absorbs duplicate delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxEvent {
    #[serde(rename = "_id")]
    pub id: String,
    pub event_type: String,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    pub kafka_topic: String,
    pub kafka_partition: i32,
    pub kafka_offset: i64,
    pub created_at: bson::DateTime,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<bson::DateTime>,
}

impl InboxEvent {
    pub fn staked(topic: &str, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            id: new_id(),
            event_type: "RepairEvent".to_string(),
            payload,
            kafka_topic: topic.to_string(),
            kafka_partition: partition,
            kafka_offset: offset,
            created_at: bson::DateTime::now(),
            processed: false,
            processed_at: None,
        }
    }
}

pub fn new_id() -> String {
    ObjectId::new().to_hex()
}

#[cfg(test)]
mod repair_translation_tests {
    use super::*;
    use repair_events::{LocationRecord, MechanicRecord};
    use rstest::rstest;

    #[rstest]
    fn it_should_re_embed_the_cost_from_the_event() {
        let record = RepairEventRecord {
            id: "65a0000000000000000000aa".into(),
            user_id: "u1".into(),
            status: "pending".into(),
            repair_type: "flat_tire".into(),
            total_price: 50.0,
            user_location: Some(LocationRecord {
                longitude: 13.4,
                latitude: 52.52,
            }),
            mechanics: vec![MechanicRecord {
                id: "m1".into(),
                name: "City Garage".into(),
                location: LocationRecord {
                    longitude: 13.45,
                    latitude: 52.50,
                },
                distance: 420.0,
            }],
        };
        let repair = Repair::from_event(&record);

        assert_eq!(repair.id, record.id);
        assert_eq!(repair.repair_cost.id, record.id);
        assert_eq!(repair.repair_cost.user_id, repair.user_id);
        assert_eq!(repair.status, "pending");
        assert_eq!(repair.repair_cost.mechanics[0].name, "City Garage");
        assert!(repair.assigned_to.is_none());
    }
}
