// Mapping from the domain model to the shared Avro record.

use repair_events::{LocationRecord, MechanicRecord, RepairEventRecord};

use crate::core::repair::{Location, Repair};

fn location_record(location: Location) -> LocationRecord {
    LocationRecord {
        longitude: location.longitude,
        latitude: location.latitude,
    }
}

pub fn repair_event(repair: &Repair) -> RepairEventRecord {
    RepairEventRecord {
        id: repair.id.clone(),
        user_id: repair.user_id.clone(),
        status: repair.status.to_string(),
        repair_type: repair.repair_cost.repair_type.to_string(),
        total_price: repair.repair_cost.total_price,
        user_location: repair.repair_cost.user_location.map(location_record),
        mechanics: repair
            .repair_cost
            .mechanics
            .iter()
            .map(|mechanic| MechanicRecord {
                id: mechanic.id.clone(),
                name: mechanic.name.clone(),
                location: location_record(mechanic.location),
                distance: mechanic.distance,
            })
            .collect(),
    }
}

#[cfg(test)]
mod event_mapping_tests {
    use super::*;
    use crate::core::repair::{new_id, MechanicInfo, RepairCost, RepairType};
    use rstest::rstest;

    #[rstest]
    fn it_should_carry_every_field_onto_the_record() {
        let cost = RepairCost {
            id: new_id(),
            user_id: "u1".into(),
            repair_type: RepairType::BrakeRepair,
            total_price: 150.0,
            user_location: Some(Location {
                longitude: 13.4,
                latitude: 52.52,
            }),
            mechanics: vec![MechanicInfo {
                id: "m1".into(),
                name: "City Garage".into(),
                location: Location {
                    longitude: 13.45,
                    latitude: 52.50,
                },
                distance: 980.0,
            }],
        };
        let repair = Repair::pending(cost);
        let record = repair_event(&repair);

        assert_eq!(record.id, repair.id);
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.status, "pending");
        assert_eq!(record.repair_type, "brake_repair");
        assert_eq!(record.total_price, 150.0);
        assert_eq!(record.user_location.as_ref().unwrap().longitude, 13.4);
        assert_eq!(record.mechanics.len(), 1);
        assert_eq!(record.mechanics[0].name, "City Garage");
    }

    #[rstest]
    fn it_should_map_a_missing_location_to_null() {
        let cost = RepairCost {
            id: new_id(),
            user_id: "u1".into(),
            repair_type: RepairType::FlatTire,
            total_price: 50.0,
            user_location: None,
            mechanics: vec![],
        };
        let record = repair_event(&Repair::pending(cost));
        assert!(record.user_location.is_none());
        assert!(record.mechanics.is_empty());
    }
}
