// Mechanic-facing operations over the materialised repairs.

use std::sync::Arc;

use crate::application::errors::MechanicError;
use crate::core::geo::haversine_km;
use crate::core::ports::MechanicStore;
use crate::core::repair::Repair;

/// Repairs further than this from the mechanic are not worth the drive.
const NEARBY_RADIUS_KM: f64 = 10.0;

pub struct MechanicOps {
    store: Arc<dyn MechanicStore>,
}

impl MechanicOps {
    pub fn new(store: Arc<dyn MechanicStore>) -> Self {
        Self { store }
    }

    /// Repairs whose user location lies within 10 km of the mechanic.
    /// Repairs without a location are never nearby.
    pub async fn list_nearby_repairs(
        &self,
        mechanic_id: &str,
    ) -> Result<Vec<Repair>, MechanicError> {
        if mechanic_id.is_empty() {
            return Err(MechanicError::InvalidInput("mechanic id is required".into()));
        }
        let mechanic = self
            .store
            .mechanic(mechanic_id)
            .await?
            .ok_or(MechanicError::NotFound)?;

        let repairs = self.store.all_repairs().await?;
        let nearby: Vec<Repair> = repairs
            .into_iter()
            .filter(|repair| {
                repair
                    .repair_cost
                    .user_location
                    .map(|location| haversine_km(mechanic.location, location) <= NEARBY_RADIUS_KM)
                    .unwrap_or(false)
            })
            .collect();
        tracing::info!(mechanic_id, count = nearby.len(), "listed nearby repairs");
        Ok(nearby)
    }

    pub async fn assign_repair(
        &self,
        repair_id: &str,
        mechanic_id: &str,
    ) -> Result<Repair, MechanicError> {
        if repair_id.is_empty() || mechanic_id.is_empty() {
            return Err(MechanicError::InvalidInput(
                "repair id and mechanic id are required".into(),
            ));
        }
        self.store
            .mechanic(mechanic_id)
            .await?
            .ok_or(MechanicError::NotFound)?;

        let repair = self.store.assign(repair_id, mechanic_id).await?;
        tracing::info!(repair_id, mechanic_id, "assigned repair");
        Ok(repair)
    }
}

#[cfg(test)]
mod mechanic_ops_tests {
    use super::*;
    use crate::adapters::in_memory::InMemoryMechanicStore;
    use crate::core::repair::{Location, Mechanic, RepairCost};
    use rstest::rstest;

    fn repair(id: &str, location: Option<Location>) -> Repair {
        Repair {
            id: id.into(),
            user_id: "u1".into(),
            status: "pending".into(),
            repair_cost: RepairCost {
                id: id.into(),
                user_id: "u1".into(),
                repair_type: "flat_tire".into(),
                total_price: 50.0,
                user_location: location,
                mechanics: vec![],
            },
            assigned_to: None,
        }
    }

    fn berlin_mechanic() -> Mechanic {
        Mechanic {
            id: "m1".into(),
            name: "Berlin Auto Repair".into(),
            location: Location {
                longitude: 13.405,
                latitude: 52.52,
            },
        }
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_list_only_repairs_within_ten_kilometres() {
        let store = Arc::new(InMemoryMechanicStore::new());
        store.set_mechanics(vec![berlin_mechanic()]).await;
        store
            .put_repair(repair(
                "near",
                Some(Location {
                    longitude: 13.41,
                    latitude: 52.53,
                }),
            ))
            .await;
        store
            .put_repair(repair(
                "hamburg",
                Some(Location {
                    longitude: 9.993,
                    latitude: 53.551,
                }),
            ))
            .await;
        store.put_repair(repair("nowhere", None)).await;

        let nearby = MechanicOps::new(store)
            .list_nearby_repairs("m1")
            .await
            .unwrap();

        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].id, "near");
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_reject_an_unknown_mechanic() {
        let store = Arc::new(InMemoryMechanicStore::new());
        let result = MechanicOps::new(store).list_nearby_repairs("ghost").await;
        assert!(matches!(result, Err(MechanicError::NotFound)));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_assign_a_repair_to_a_known_mechanic() {
        let store = Arc::new(InMemoryMechanicStore::new());
        store.set_mechanics(vec![berlin_mechanic()]).await;
        store.put_repair(repair("r1", None)).await;

        let assigned = MechanicOps::new(store.clone())
            .assign_repair("r1", "m1")
            .await
            .unwrap();

        assert_eq!(assigned.assigned_to.as_deref(), Some("m1"));
        assert_eq!(store.repairs().await[0].assigned_to.as_deref(), Some("m1"));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_not_assign_to_an_unknown_mechanic() {
        let store = Arc::new(InMemoryMechanicStore::new());
        store.put_repair(repair("r1", None)).await;

        let result = MechanicOps::new(store.clone()).assign_repair("r1", "ghost").await;

        assert!(matches!(result, Err(MechanicError::NotFound)));
        assert!(store.repairs().await[0].assigned_to.is_none());
    }
}
