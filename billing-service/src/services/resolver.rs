//! Entity resolution: find-or-create customers and vehicles.
//!
//! Both entities follow the same first-write-wins merge policy: optional
//! fields already populated on the stored record are left untouched, only
//! currently-empty fields are filled from the incoming request. A concurrent
//! first-time create of the same name/plate surfaces as a store uniqueness
//! conflict, on which resolution falls back to lookup-and-merge.

use crate::models::{Customer, CustomerFields, PlateNumber, Vehicle, VehicleFields};
use crate::services::store::{BillingStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct EntityResolver {
    store: Arc<dyn BillingStore>,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, fields))]
    pub async fn resolve_customer(
        &self,
        name: &str,
        fields: &CustomerFields,
    ) -> Result<Customer, StoreError> {
        if let Some(mut existing) = self.store.find_customer_by_name(name).await? {
            if existing.merge_missing(fields) {
                self.store.update_customer(&existing).await?;
                debug!(customer_id = %existing.id, "customer fields merged");
            }
            return Ok(existing);
        }

        let customer = Customer::new(name.to_string(), fields.clone(), Utc::now());
        match self.store.insert_customer(&customer).await {
            Ok(()) => {
                debug!(customer_id = %customer.id, "customer created");
                Ok(customer)
            }
            Err(StoreError::DuplicateCustomerName) => {
                // lost a concurrent first-time create; the row exists now
                let mut existing = self
                    .store
                    .find_customer_by_name(name)
                    .await?
                    .ok_or(StoreError::NotFound("customer"))?;
                if existing.merge_missing(fields) {
                    self.store.update_customer(&existing).await?;
                }
                Ok(existing)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, plate, fields), fields(plate = %plate.as_str()))]
    pub async fn resolve_vehicle(
        &self,
        plate: &PlateNumber,
        fields: &VehicleFields,
    ) -> Result<Vehicle, StoreError> {
        if let Some(mut existing) = self.store.find_vehicle_by_plate(plate.as_str()).await? {
            if existing.merge_missing(fields) {
                self.store.update_vehicle(&existing).await?;
                debug!(vehicle_id = %existing.id, "vehicle fields merged");
            }
            return Ok(existing);
        }

        let vehicle = Vehicle::new(plate, fields.clone(), Utc::now());
        match self.store.insert_vehicle(&vehicle).await {
            Ok(()) => {
                debug!(vehicle_id = %vehicle.id, "vehicle created");
                Ok(vehicle)
            }
            Err(StoreError::DuplicateVehiclePlate) => {
                let mut existing = self
                    .store
                    .find_vehicle_by_plate(plate.as_str())
                    .await?
                    .ok_or(StoreError::NotFound("vehicle"))?;
                if existing.merge_missing(fields) {
                    self.store.update_vehicle(&existing).await?;
                }
                Ok(existing)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStore;

    fn resolver() -> (EntityResolver, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (EntityResolver::new(store.clone()), store)
    }

    #[tokio::test]
    async fn creates_then_reuses_customer() {
        let (resolver, store) = resolver();

        let first = resolver
            .resolve_customer("Murugan Traders", &CustomerFields::default())
            .await
            .expect("create");
        let second = resolver
            .resolve_customer("Murugan Traders", &CustomerFields::default())
            .await
            .expect("lookup");

        assert_eq!(first.id, second.id);
        assert_eq!(store.row_counts().await.0, 1);
    }

    #[tokio::test]
    async fn first_write_wins_for_optional_fields() {
        let (resolver, _store) = resolver();

        resolver
            .resolve_customer("Murugan Traders", &CustomerFields::default())
            .await
            .expect("create");

        // a previously-empty phone gets filled
        let with_phone = resolver
            .resolve_customer(
                "Murugan Traders",
                &CustomerFields {
                    phone: Some("9788388823".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("merge");
        assert_eq!(with_phone.phone.as_deref(), Some("9788388823"));

        // a different incoming phone leaves the first value unchanged
        let unchanged = resolver
            .resolve_customer(
                "Murugan Traders",
                &CustomerFields {
                    phone: Some("1112223334".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("second merge");
        assert_eq!(unchanged.phone.as_deref(), Some("9788388823"));
    }

    #[tokio::test]
    async fn creates_then_merges_vehicle() {
        let (resolver, _store) = resolver();
        let plate = PlateNumber::parse("TN32AX3344").expect("valid plate");

        let created = resolver
            .resolve_vehicle(&plate, &VehicleFields::default())
            .await
            .expect("create");
        assert!(created.vehicle_type.is_none());

        let merged = resolver
            .resolve_vehicle(
                &plate,
                &VehicleFields {
                    vehicle_type: Some("Lorry".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("merge");
        assert_eq!(merged.id, created.id);
        assert_eq!(merged.vehicle_type.as_deref(), Some("Lorry"));
    }
}
