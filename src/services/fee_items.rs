use crate::{
    db::DbPool,
    entities::{
        fee_item::{self, FeeItemStatus, FeeType, FeeUnit},
        fee_obligation,
    },
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

fn validate_cost(cost: &Decimal) -> Result<(), ValidationError> {
    if *cost < Decimal::ZERO {
        return Err(ValidationError::new("cost must not be negative"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Phí dịch vụ chung cư",
    "fee_type": "SERVICE",
    "unit": "M2",
    "cost": "7000"
}))]
pub struct CreateFeeItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub fee_type: FeeType,
    pub unit: FeeUnit,
    #[validate(custom = "validate_cost")]
    pub cost: Decimal,
    pub status: Option<FeeItemStatus>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateFeeItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub fee_type: Option<FeeType>,
    pub unit: Option<FeeUnit>,
    #[validate(custom = "validate_cost")]
    pub cost: Option<Decimal>,
    pub status: Option<FeeItemStatus>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// The fee catalog. Price changes apply to future generation runs only.
#[derive(Clone)]
pub struct FeeItemService {
    db_pool: Arc<DbPool>,
}

impl FeeItemService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_fee_items(
        &self,
        status: Option<FeeItemStatus>,
        fee_type: Option<FeeType>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<fee_item::Model>, u64), ServiceError> {
        let mut query = fee_item::Entity::find();
        if let Some(status) = status {
            query = query.filter(fee_item::Column::Status.eq(status));
        }
        if let Some(fee_type) = fee_type {
            query = query.filter(fee_item::Column::FeeType.eq(fee_type));
        }

        let paginator = query
            .order_by_asc(fee_item::Column::Name)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    #[instrument(skip(self))]
    pub async fn get_fee_item(&self, id: &Uuid) -> Result<Option<fee_item::Model>, ServiceError> {
        Ok(fee_item::Entity::find_by_id(*id).one(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn create_fee_item(
        &self,
        request: CreateFeeItemRequest,
    ) -> Result<fee_item::Model, ServiceError> {
        request.validate()?;

        let item = fee_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            fee_type: Set(request.fee_type),
            unit: Set(request.unit),
            cost: Set(request.cost),
            status: Set(request.status.unwrap_or(FeeItemStatus::Active)),
            description: Set(request.description),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(fee_item_id = %item.id, name = %item.name, cost = %item.cost, "Fee item created");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn update_fee_item(
        &self,
        id: Uuid,
        request: UpdateFeeItemRequest,
    ) -> Result<fee_item::Model, ServiceError> {
        request.validate()?;

        let existing = self
            .get_fee_item(&id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee item", id))?;

        let mut active: fee_item::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(fee_type) = request.fee_type {
            active.fee_type = Set(fee_type);
        }
        if let Some(unit) = request.unit {
            active.unit = Set(unit);
        }
        if let Some(cost) = request.cost {
            active.cost = Set(cost);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        if request.description.is_some() {
            active.description = Set(request.description);
        }

        let updated = active.update(&*self.db_pool).await?;
        info!(fee_item_id = %id, cost = %updated.cost, "Fee item updated");
        Ok(updated)
    }

    /// Items already billed somewhere cannot be removed; deactivate them instead.
    #[instrument(skip(self))]
    pub async fn delete_fee_item(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        if self.get_fee_item(&id).await?.is_none() {
            return Err(ServiceError::not_found("Fee item", id));
        }

        let billed = fee_obligation::Entity::find()
            .filter(fee_obligation::Column::FeeItemId.eq(id))
            .count(db)
            .await?;
        if billed > 0 {
            return Err(ServiceError::Conflict(format!(
                "fee item {} is referenced by {} obligations; set it INACTIVE instead",
                id, billed
            )));
        }

        fee_item::Entity::delete_by_id(id).exec(db).await?;
        info!(fee_item_id = %id, "Fee item deleted");
        Ok(())
    }
}
