use crate::{
    db::DbPool,
    entities::apartment::{self, ApartmentStatus},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_area(area: &Decimal) -> Result<(), ValidationError> {
    if *area <= Decimal::ZERO {
        return Err(ValidationError::new("area must be greater than zero"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "block": "A",
    "floor": 12,
    "unit": "1203",
    "area": "75"
}))]
pub struct CreateApartmentRequest {
    #[validate(length(min = 1, max = 20))]
    pub block: String,
    pub floor: i32,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    #[validate(custom = "validate_area")]
    pub area: Option<Decimal>,
    pub status: Option<ApartmentStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateApartmentRequest {
    #[validate(length(min = 1, max = 20))]
    pub block: Option<String>,
    pub floor: Option<i32>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    #[validate(custom = "validate_area")]
    pub area: Option<Decimal>,
    pub status: Option<ApartmentStatus>,
}

#[derive(Clone)]
pub struct ApartmentService {
    db_pool: Arc<DbPool>,
}

impl ApartmentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_apartments(
        &self,
        status: Option<ApartmentStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<apartment::Model>, u64), ServiceError> {
        let mut query = apartment::Entity::find();
        if let Some(status) = status {
            query = query.filter(apartment::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_asc(apartment::Column::Block)
            .order_by_asc(apartment::Column::Floor)
            .order_by_asc(apartment::Column::Unit)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await?;
        let apartments = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((apartments, total))
    }

    #[instrument(skip(self))]
    pub async fn get_apartment(&self, id: &Uuid) -> Result<Option<apartment::Model>, ServiceError> {
        Ok(apartment::Entity::find_by_id(*id).one(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn create_apartment(
        &self,
        request: CreateApartmentRequest,
    ) -> Result<apartment::Model, ServiceError> {
        request.validate()?;

        let created = apartment::ActiveModel {
            id: Set(Uuid::new_v4()),
            block: Set(request.block.trim().to_string()),
            floor: Set(request.floor),
            unit: Set(request.unit.trim().to_string()),
            area: Set(request.area),
            status: Set(request.status.unwrap_or(ApartmentStatus::Empty)),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(apartment = %created.label(), "Apartment created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_apartment(
        &self,
        id: Uuid,
        request: UpdateApartmentRequest,
    ) -> Result<apartment::Model, ServiceError> {
        request.validate()?;

        let existing = self
            .get_apartment(&id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Apartment", id))?;

        let mut active: apartment::ActiveModel = existing.into();
        if let Some(block) = request.block {
            active.block = Set(block.trim().to_string());
        }
        if let Some(floor) = request.floor {
            active.floor = Set(floor);
        }
        if let Some(unit) = request.unit {
            active.unit = Set(unit.trim().to_string());
        }
        if request.area.is_some() {
            active.area = Set(request.area);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }

        Ok(active.update(&*self.db_pool).await?)
    }

    /// Occupied apartments must be vacated first.
    #[instrument(skip(self))]
    pub async fn delete_apartment(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self
            .get_apartment(&id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Apartment", id))?;

        if existing.status == ApartmentStatus::Occupied {
            return Err(ServiceError::Conflict(format!(
                "apartment {} is OCCUPIED",
                existing.label()
            )));
        }

        apartment::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        info!(apartment = %existing.label(), "Apartment deleted");
        Ok(())
    }
}
