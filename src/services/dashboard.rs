use crate::{
    db::DbPool,
    entities::{
        apartment::{self, ApartmentStatus},
        household, resident, vehicle,
    },
    errors::ServiceError,
    services::reports::{collection_rate, sum_amounts},
};
use futures::TryFutureExt;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "total_households": 120,
    "total_residents": 356,
    "total_vehicles": 210,
    "total_apartments": 150,
    "occupied_apartments": 118,
    "empty_apartments": 30,
    "total_receivable": "84500000",
    "total_collected": "61200000",
    "collection_rate": 72.4
}))]
pub struct DashboardStats {
    pub total_households: u64,
    pub total_residents: u64,
    pub total_vehicles: u64,
    pub total_apartments: u64,
    pub occupied_apartments: u64,
    pub empty_apartments: u64,
    pub total_receivable: Decimal,
    pub total_collected: Decimal,
    pub collection_rate: f64,
}

/// Headline counters for the console landing page.
#[derive(Clone)]
pub struct DashboardService {
    db_pool: Arc<DbPool>,
}

impl DashboardService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<DashboardStats, ServiceError> {
        let db = &*self.db_pool;

        let (
            total_households,
            total_residents,
            total_vehicles,
            total_apartments,
            occupied_apartments,
            empty_apartments,
            (total_receivable, total_collected),
        ) = futures::try_join!(
            household::Entity::find().count(db).err_into::<ServiceError>(),
            resident::Entity::find().count(db).err_into::<ServiceError>(),
            vehicle::Entity::find().count(db).err_into::<ServiceError>(),
            apartment::Entity::find().count(db).err_into::<ServiceError>(),
            apartment::Entity::find()
                .filter(apartment::Column::Status.eq(ApartmentStatus::Occupied))
                .count(db)
                .err_into::<ServiceError>(),
            apartment::Entity::find()
                .filter(apartment::Column::Status.eq(ApartmentStatus::Empty))
                .count(db)
                .err_into::<ServiceError>(),
            sum_amounts(db, Condition::all()),
        )?;

        Ok(DashboardStats {
            total_households,
            total_residents,
            total_vehicles,
            total_apartments,
            occupied_apartments,
            empty_apartments,
            total_receivable,
            total_collected,
            collection_rate: collection_rate(total_receivable, total_collected),
        })
    }
}
