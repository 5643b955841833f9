// Avro record mirrored by both services.
//
// Versioning and evolution
// - Prefer additive changes. A breaking change needs a new subject version
//   and a coordinated rollout; there is a single registered subject today.

use serde::{Deserialize, Serialize};

/// Schema artefact registered under `<topic>-value` at startup.
pub const RAW_SCHEMA: &str = include_str!("../schemas/repair_event.avsc");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicRecord {
    pub id: String,
    pub name: String,
    pub location: LocationRecord,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairEventRecord {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub repair_type: String,
    pub total_price: f64,
    #[serde(default)]
    pub user_location: Option<LocationRecord>,
    #[serde(default)]
    pub mechanics: Vec<MechanicRecord>,
}
