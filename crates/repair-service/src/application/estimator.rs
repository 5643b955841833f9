// Estimation core: base price by repair type, routed durations turned into
// distances, mechanics ranked nearest-first.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::application::errors::RepairError;
use crate::core::geo::duration_to_distance_m;
use crate::core::ports::{RepairStore, RoutingTable};
use crate::core::repair::{new_id, Location, Mechanic, MechanicInfo, RepairCost, RepairType};

pub struct Estimator {
    store: Arc<dyn RepairStore>,
    routing: Arc<dyn RoutingTable>,
}

impl Estimator {
    pub fn new(store: Arc<dyn RepairStore>, routing: Arc<dyn RoutingTable>) -> Self {
        Self { store, routing }
    }

    /// Builds a cost estimate. Nothing is persisted here; the client posts
    /// the cost back through create_repair when it accepts the estimate.
    pub async fn estimate(
        &self,
        repair_type: &str,
        user_id: &str,
        user_location: Location,
    ) -> Result<RepairCost, RepairError> {
        let repair_type: RepairType = repair_type.parse().map_err(|_| {
            RepairError::InvalidInput(format!("unknown repair type {repair_type:?}"))
        })?;
        if user_id.is_empty() {
            return Err(RepairError::InvalidInput("user id is required".into()));
        }
        let total_price = repair_type.base_price();

        let mechanics = self.store.mechanics().await?;
        let destinations: Vec<Location> = mechanics.iter().map(|m| m.location).collect();
        let durations = self
            .routing
            .durations(user_location, &destinations)
            .await?;
        let ranked = rank_mechanics(&mechanics, &durations);
        tracing::info!(
            repair_type = %repair_type,
            mechanics = ranked.len(),
            total_price,
            "estimated repair cost"
        );

        Ok(RepairCost {
            id: new_id(),
            user_id: user_id.to_string(),
            repair_type,
            total_price,
            user_location: Some(user_location),
            mechanics: ranked,
        })
    }

    /// Loads a cost and checks it belongs to the requesting user.
    pub async fn cost_for_user(
        &self,
        cost_id: &str,
        user_id: &str,
    ) -> Result<RepairCost, RepairError> {
        if cost_id.is_empty() || user_id.is_empty() {
            return Err(RepairError::InvalidInput(
                "cost id and user id are required".into(),
            ));
        }
        let cost = self
            .store
            .cost(cost_id)
            .await?
            .ok_or(RepairError::NotFound)?;
        if cost.user_id != user_id {
            return Err(RepairError::InvalidInput(
                "repair cost does not belong to the user".into(),
            ));
        }
        Ok(cost)
    }
}

/// Drops mechanics the router produced no duration for, converts the rest
/// to distances, and sorts ascending with the mechanic id as a stable
/// secondary key.
fn rank_mechanics(mechanics: &[Mechanic], durations: &[Option<f64>]) -> Vec<MechanicInfo> {
    let mut ranked: Vec<MechanicInfo> = mechanics
        .iter()
        .enumerate()
        .filter_map(|(index, mechanic)| {
            let duration = durations.get(index).copied().flatten()?;
            Some(MechanicInfo {
                id: mechanic.id.clone(),
                name: mechanic.name.clone(),
                location: mechanic.location,
                distance: duration_to_distance_m(duration),
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked
}

#[cfg(test)]
mod estimator_tests {
    use super::*;
    use crate::adapters::in_memory::{FixedRoutingTable, InMemoryRepairStore};
    use rstest::{fixture, rstest};

    fn mechanic(id: &str, name: &str) -> Mechanic {
        Mechanic {
            id: id.into(),
            name: name.into(),
            location: Location {
                longitude: 13.4,
                latitude: 52.5,
            },
        }
    }

    #[fixture]
    fn berlin() -> Location {
        Location {
            longitude: 13.4,
            latitude: 52.52,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_rank_mechanics_by_routed_distance(berlin: Location) {
        let store = Arc::new(InMemoryRepairStore::new());
        store
            .set_mechanics(vec![
                mechanic("m1", "Berlin Auto Repair"),
                mechanic("m2", "City Garage"),
                mechanic("m3", "Fast Fix Mechanics"),
            ])
            .await;
        let routing = Arc::new(FixedRoutingTable::new(vec![
            Some(720.0),
            Some(90.0),
            Some(360.0),
        ]));

        let cost = Estimator::new(store, routing)
            .estimate("brake_repair", "u1", berlin)
            .await
            .unwrap();

        assert_eq!(cost.total_price, 150.0);
        let ids: Vec<&str> = cost.mechanics.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m2", "m3", "m1"]);
        assert_eq!(cost.mechanics[0].distance, duration_to_distance_m(90.0));
        assert_eq!(cost.user_location, Some(berlin));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_drop_mechanics_without_a_duration(berlin: Location) {
        let store = Arc::new(InMemoryRepairStore::new());
        store
            .set_mechanics(vec![mechanic("m1", "A"), mechanic("m2", "B")])
            .await;
        let routing = Arc::new(FixedRoutingTable::new(vec![None, Some(60.0)]));

        let cost = Estimator::new(store, routing)
            .estimate("flat_tire", "u1", berlin)
            .await
            .unwrap();

        assert_eq!(cost.mechanics.len(), 1);
        assert_eq!(cost.mechanics[0].id, "m2");
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_reject_an_unknown_repair_type_before_any_query(berlin: Location) {
        // The offline store would error if touched; InvalidInput proves the
        // guard ran first.
        let store = Arc::new(InMemoryRepairStore::new());
        store.toggle_offline();
        let routing = Arc::new(FixedRoutingTable::new(vec![]));

        let result = Estimator::new(store, routing)
            .estimate("engine_swap", "u1", berlin)
            .await;
        assert!(matches!(result, Err(RepairError::InvalidInput(_))));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_surface_upstream_failure(berlin: Location) {
        let store = Arc::new(InMemoryRepairStore::new());
        store.set_mechanics(vec![mechanic("m1", "A")]).await;
        let routing = Arc::new(FixedRoutingTable::failing());

        let result = Estimator::new(store, routing)
            .estimate("flat_tire", "u1", berlin)
            .await;
        assert!(matches!(result, Err(RepairError::Upstream(_))));
    }

    #[rstest]
    fn it_should_break_distance_ties_by_mechanic_id() {
        let mechanics = vec![mechanic("m2", "B"), mechanic("m1", "A")];
        let ranked = rank_mechanics(&mechanics, &[Some(120.0), Some(120.0)]);
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2"]);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_validate_cost_ownership(berlin: Location) {
        let store = Arc::new(InMemoryRepairStore::new());
        let routing = Arc::new(FixedRoutingTable::new(vec![]));
        let estimator = Estimator::new(store.clone(), routing);

        let cost = RepairCost {
            id: new_id(),
            user_id: "u1".into(),
            repair_type: RepairType::FlatTire,
            total_price: 50.0,
            user_location: Some(berlin),
            mechanics: vec![],
        };
        store.put_cost(cost.clone()).await;

        let found = estimator.cost_for_user(&cost.id, "u1").await.unwrap();
        assert_eq!(found, cost);

        let denied = estimator.cost_for_user(&cost.id, "u2").await;
        assert!(matches!(denied, Err(RepairError::InvalidInput(_))));

        let missing = estimator
            .cost_for_user("65a000000000000000000009", "u1")
            .await;
        assert!(matches!(missing, Err(RepairError::NotFound)));
    }
}
