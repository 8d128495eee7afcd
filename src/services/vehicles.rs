use crate::{
    db::DbPool,
    entities::{
        household,
        vehicle::{self, VehicleStatus, VehicleType},
    },
    errors::ServiceError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Plates are stored upper-case without surrounding whitespace so that
/// uniqueness is not defeated by formatting.
fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "household_id": "3f2b8c1d-4e5f-4a6b-9c7d-8e9f0a1b2c3d",
    "vehicle_type": "MOTORBIKE",
    "plate": "29B1-456.78",
    "brand": "Honda"
}))]
pub struct CreateVehicleRequest {
    /// Taken from the path on `/households/{id}/...` routes
    #[serde(default)]
    pub household_id: Uuid,
    pub vehicle_type: VehicleType,
    #[validate(length(min = 1, max = 20))]
    pub plate: String,
    #[validate(length(max = 50))]
    pub brand: Option<String>,
    #[validate(length(max = 30))]
    pub color: Option<String>,
    pub status: Option<VehicleStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateVehicleRequest {
    pub vehicle_type: Option<VehicleType>,
    #[validate(length(min = 1, max = 20))]
    pub plate: Option<String>,
    #[validate(length(max = 50))]
    pub brand: Option<String>,
    #[validate(length(max = 30))]
    pub color: Option<String>,
    pub status: Option<VehicleStatus>,
}

#[derive(Clone)]
pub struct VehicleService {
    db_pool: Arc<DbPool>,
}

impl VehicleService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_vehicles(
        &self,
        household_id: Option<Uuid>,
        vehicle_type: Option<VehicleType>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<vehicle::Model>, u64), ServiceError> {
        let mut query = vehicle::Entity::find();
        if let Some(household_id) = household_id {
            query = query.filter(vehicle::Column::HouseholdId.eq(household_id));
        }
        if let Some(vehicle_type) = vehicle_type {
            query = query.filter(vehicle::Column::VehicleType.eq(vehicle_type));
        }
        let paginator = query
            .order_by_asc(vehicle::Column::Plate)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await?;
        let vehicles = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((vehicles, total))
    }

    #[instrument(skip(self))]
    pub async fn get_vehicle(&self, id: &Uuid) -> Result<Option<vehicle::Model>, ServiceError> {
        Ok(vehicle::Entity::find_by_id(*id).one(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn create_vehicle(
        &self,
        request: CreateVehicleRequest,
    ) -> Result<vehicle::Model, ServiceError> {
        request.validate()?;

        if household::Entity::find_by_id(request.household_id)
            .one(&*self.db_pool)
            .await?
            .is_none()
        {
            return Err(ServiceError::not_found("Household", request.household_id));
        }

        let created = vehicle::ActiveModel {
            id: Set(Uuid::new_v4()),
            household_id: Set(request.household_id),
            vehicle_type: Set(request.vehicle_type),
            plate: Set(normalize_plate(&request.plate)),
            brand: Set(request.brand),
            color: Set(request.color),
            status: Set(request.status.unwrap_or(VehicleStatus::Active)),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(plate = %created.plate, household_id = %created.household_id, "Vehicle registered");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_vehicle(
        &self,
        id: Uuid,
        request: UpdateVehicleRequest,
    ) -> Result<vehicle::Model, ServiceError> {
        request.validate()?;

        let existing = self
            .get_vehicle(&id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Vehicle", id))?;

        let mut active: vehicle::ActiveModel = existing.into();
        if let Some(vehicle_type) = request.vehicle_type {
            active.vehicle_type = Set(vehicle_type);
        }
        if let Some(plate) = request.plate {
            active.plate = Set(normalize_plate(&plate));
        }
        if request.brand.is_some() {
            active.brand = Set(request.brand);
        }
        if request.color.is_some() {
            active.color = Set(request.color);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }

        Ok(active.update(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_vehicle(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = vehicle::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Vehicle", id));
        }
        Ok(())
    }
}
