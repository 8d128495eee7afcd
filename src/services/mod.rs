// Registries
pub mod apartments;
pub mod households;
pub mod residents;
pub mod vehicles;

// Billing
pub mod fee_items;
pub mod fee_obligations;
pub mod fee_periods;

// Read-side aggregation
pub mod dashboard;
pub mod reports;

// Portal content and accounts
pub mod notifications;
pub mod users;

/// Shared fixtures for service tests: a migrated in-memory SQLite store and a
/// drained event channel.
#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        db::DbPool,
        entities::{
            apartment::{self, ApartmentStatus},
            fee_item::{self, FeeItemStatus, FeeType, FeeUnit},
            household::{self, HouseholdStatus},
            vehicle::{self, VehicleStatus, VehicleType},
        },
        events::{self, EventSender},
    };
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, Set};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    pub async fn setup_db() -> Arc<DbPool> {
        Arc::new(crate::db::connect_in_memory().await.unwrap())
    }

    pub fn event_sender() -> Arc<EventSender> {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(events::process_events(rx));
        Arc::new(EventSender::new(tx))
    }

    pub async fn apartment(db: &DbPool, unit: &str, area: Option<Decimal>) -> apartment::Model {
        apartment::ActiveModel {
            id: Set(Uuid::new_v4()),
            block: Set("A".to_string()),
            floor: Set(12),
            unit: Set(unit.to_string()),
            area: Set(area),
            status: Set(ApartmentStatus::Empty),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn household(
        db: &DbPool,
        code: &str,
        apartment_id: Option<Uuid>,
        status: HouseholdStatus,
    ) -> household::Model {
        household::ActiveModel {
            id: Set(Uuid::new_v4()),
            household_code: Set(code.to_string()),
            owner_name: Set(format!("Owner {}", code)),
            phone: Set(None),
            address: Set(None),
            move_in_date: Set(None),
            status: Set(status),
            apartment_id: Set(apartment_id),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn vehicle(db: &DbPool, household_id: Uuid, plate: &str) -> vehicle::Model {
        vehicle::ActiveModel {
            id: Set(Uuid::new_v4()),
            household_id: Set(household_id),
            vehicle_type: Set(VehicleType::Motorbike),
            plate: Set(plate.to_string()),
            brand: Set(None),
            color: Set(None),
            status: Set(VehicleStatus::Active),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn fee_item(
        db: &DbPool,
        name: &str,
        unit: FeeUnit,
        cost: Decimal,
    ) -> fee_item::Model {
        let fee_type = match unit {
            FeeUnit::Slot => FeeType::Vehicle,
            _ => FeeType::Service,
        };
        fee_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            fee_type: Set(fee_type),
            unit: Set(unit),
            cost: Set(cost),
            status: Set(FeeItemStatus::Active),
            description: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }
}
