use crate::{
    commands::transaction_error,
    db::DbPool,
    entities::{
        apartment::{self, ApartmentStatus},
        household::{self, HouseholdStatus},
        resident, vehicle,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "household_code": "HK001",
    "owner_name": "Nguyễn Văn An",
    "phone": "0912345678",
    "apartment_id": "3f2b8c1d-4e5f-4a6b-9c7d-8e9f0a1b2c3d",
    "move_in_date": "2023-05-01"
}))]
pub struct CreateHouseholdRequest {
    #[validate(length(min = 1, max = 50))]
    pub household_code: String,
    #[validate(length(min = 1, max = 255))]
    pub owner_name: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub move_in_date: Option<NaiveDate>,
    pub status: Option<HouseholdStatus>,
    pub apartment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateHouseholdRequest {
    #[validate(length(min = 1, max = 50))]
    pub household_code: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub owner_name: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub move_in_date: Option<NaiveDate>,
    pub status: Option<HouseholdStatus>,
    pub apartment_id: Option<Uuid>,
}

/// A household with everything that hangs off it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HouseholdDetails {
    pub household: household::Model,
    pub apartment: Option<apartment::Model>,
    pub residents: Vec<resident::Model>,
    pub vehicles: Vec<vehicle::Model>,
}

async fn set_apartment_status<C: ConnectionTrait>(
    db: &C,
    apartment_id: Uuid,
    status: ApartmentStatus,
) -> Result<(), ServiceError> {
    apartment::Entity::update_many()
        .col_expr(apartment::Column::Status, Expr::value(status))
        .col_expr(apartment::Column::UpdatedAt, Expr::value(Some(Utc::now())))
        .filter(apartment::Column::Id.eq(apartment_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Household registry. Keeps apartment occupancy in step with the
/// households living in them.
#[derive(Clone)]
pub struct HouseholdService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl HouseholdService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_households(
        &self,
        status: Option<HouseholdStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<household::Model>, u64), ServiceError> {
        let mut query = household::Entity::find();
        if let Some(status) = status {
            query = query.filter(household::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_asc(household::Column::HouseholdCode)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await?;
        let households = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((households, total))
    }

    #[instrument(skip(self))]
    pub async fn get_household(&self, id: &Uuid) -> Result<Option<household::Model>, ServiceError> {
        Ok(household::Entity::find_by_id(*id).one(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_household_by_code(
        &self,
        code: &str,
    ) -> Result<Option<household::Model>, ServiceError> {
        Ok(household::Entity::find()
            .filter(household::Column::HouseholdCode.eq(code))
            .one(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_household_details(&self, id: Uuid) -> Result<HouseholdDetails, ServiceError> {
        let db = &*self.db_pool;
        let household = self
            .get_household(&id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Household", id))?;

        let apartment = match household.apartment_id {
            Some(apartment_id) => apartment::Entity::find_by_id(apartment_id).one(db).await?,
            None => None,
        };
        let residents = resident::Entity::find()
            .filter(resident::Column::HouseholdId.eq(id))
            .order_by_desc(resident::Column::IsHead)
            .order_by_asc(resident::Column::FullName)
            .all(db)
            .await?;
        let vehicles = vehicle::Entity::find()
            .filter(vehicle::Column::HouseholdId.eq(id))
            .order_by_asc(vehicle::Column::Plate)
            .all(db)
            .await?;

        Ok(HouseholdDetails {
            household,
            apartment,
            residents,
            vehicles,
        })
    }

    /// Registers a household and marks its apartment OCCUPIED.
    #[instrument(skip(self))]
    pub async fn create_household(
        &self,
        request: CreateHouseholdRequest,
    ) -> Result<household::Model, ServiceError> {
        request.validate()?;

        let created = self
            .db_pool
            .transaction::<_, household::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    if let Some(apartment_id) = request.apartment_id {
                        if apartment::Entity::find_by_id(apartment_id)
                            .one(txn)
                            .await?
                            .is_none()
                        {
                            return Err(ServiceError::not_found("Apartment", apartment_id));
                        }
                    }

                    let status = request.status.unwrap_or(HouseholdStatus::Active);
                    let household = household::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        household_code: Set(request.household_code.trim().to_string()),
                        owner_name: Set(request.owner_name.trim().to_string()),
                        phone: Set(request.phone),
                        address: Set(request.address),
                        move_in_date: Set(request.move_in_date),
                        status: Set(status),
                        apartment_id: Set(request.apartment_id),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    if let (Some(apartment_id), false) =
                        (household.apartment_id, status == HouseholdStatus::MovedOut)
                    {
                        set_apartment_status(txn, apartment_id, ApartmentStatus::Occupied).await?;
                    }
                    Ok(household)
                })
            })
            .await
            .map_err(transaction_error)?;

        info!(household_code = %created.household_code, "Household registered");
        Ok(created)
    }

    /// Edits a household. Moving it to another apartment frees the old one;
    /// a MOVED_OUT household cannot change status again.
    #[instrument(skip(self))]
    pub async fn update_household(
        &self,
        id: Uuid,
        request: UpdateHouseholdRequest,
    ) -> Result<household::Model, ServiceError> {
        request.validate()?;

        let updated = self
            .db_pool
            .transaction::<_, household::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = household::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("Household", id))?;

                    if existing.status == HouseholdStatus::MovedOut {
                        if let Some(status) = request.status {
                            if status != HouseholdStatus::MovedOut {
                                return Err(ServiceError::InvalidTransition(format!(
                                    "household {} has moved out",
                                    existing.household_code
                                )));
                            }
                        }
                    }

                    let old_apartment = existing.apartment_id;
                    let moving_out = request.status == Some(HouseholdStatus::MovedOut)
                        && existing.status != HouseholdStatus::MovedOut;

                    let mut active: household::ActiveModel = existing.into();
                    if let Some(code) = request.household_code {
                        active.household_code = Set(code.trim().to_string());
                    }
                    if let Some(owner_name) = request.owner_name {
                        active.owner_name = Set(owner_name.trim().to_string());
                    }
                    if request.phone.is_some() {
                        active.phone = Set(request.phone);
                    }
                    if request.address.is_some() {
                        active.address = Set(request.address);
                    }
                    if request.move_in_date.is_some() {
                        active.move_in_date = Set(request.move_in_date);
                    }
                    if let Some(status) = request.status {
                        active.status = Set(status);
                    }

                    let relocating = match request.apartment_id {
                        Some(new_id) if Some(new_id) != old_apartment => {
                            if apartment::Entity::find_by_id(new_id).one(txn).await?.is_none() {
                                return Err(ServiceError::not_found("Apartment", new_id));
                            }
                            active.apartment_id = Set(Some(new_id));
                            Some(new_id)
                        }
                        _ => None,
                    };

                    let household = active.update(txn).await?;

                    if relocating.is_some() || moving_out {
                        if let Some(old_id) = old_apartment {
                            set_apartment_status(txn, old_id, ApartmentStatus::Empty).await?;
                        }
                    }
                    if let (Some(new_id), false) = (relocating, moving_out) {
                        set_apartment_status(txn, new_id, ApartmentStatus::Occupied).await?;
                    }

                    Ok(household)
                })
            })
            .await
            .map_err(transaction_error)?;

        if updated.status == HouseholdStatus::MovedOut {
            self.event_sender
                .send_or_log(Event::HouseholdMovedOut { household_id: id })
                .await;
        }
        Ok(updated)
    }

    /// Marks a household MOVED_OUT and frees its apartment. Irreversible.
    #[instrument(skip(self))]
    pub async fn move_out(&self, id: Uuid) -> Result<household::Model, ServiceError> {
        let moved = self
            .db_pool
            .transaction::<_, household::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let result = household::Entity::update_many()
                        .col_expr(
                            household::Column::Status,
                            Expr::value(HouseholdStatus::MovedOut),
                        )
                        .col_expr(household::Column::UpdatedAt, Expr::value(Some(Utc::now())))
                        .filter(household::Column::Id.eq(id))
                        .filter(household::Column::Status.ne(HouseholdStatus::MovedOut))
                        .exec(txn)
                        .await?;

                    let household = household::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("Household", id))?;

                    if result.rows_affected == 0 {
                        return Err(ServiceError::InvalidTransition(format!(
                            "household {} has already moved out",
                            household.household_code
                        )));
                    }

                    if let Some(apartment_id) = household.apartment_id {
                        set_apartment_status(txn, apartment_id, ApartmentStatus::Empty).await?;
                    }
                    Ok(household)
                })
            })
            .await
            .map_err(transaction_error)
            .map_err(|e| {
                if matches!(e, ServiceError::InvalidTransition(_)) {
                    metrics::record_state_guard_rejection("move_out");
                }
                e
            })?;

        info!(household_code = %moved.household_code, "Household moved out");
        self.event_sender
            .send_or_log(Event::HouseholdMovedOut { household_id: id })
            .await;
        Ok(moved)
    }

    /// Deletes a household with its residents and vehicles and frees the
    /// apartment. Obligations go with it through the foreign key.
    #[instrument(skip(self))]
    pub async fn delete_household(&self, id: Uuid) -> Result<(), ServiceError> {
        let code = self
            .db_pool
            .transaction::<_, String, ServiceError>(move |txn| {
                Box::pin(async move {
                    let household = household::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("Household", id))?;

                    resident::Entity::delete_many()
                        .filter(resident::Column::HouseholdId.eq(id))
                        .exec(txn)
                        .await?;
                    vehicle::Entity::delete_many()
                        .filter(vehicle::Column::HouseholdId.eq(id))
                        .exec(txn)
                        .await?;
                    household::Entity::delete_by_id(id).exec(txn).await?;

                    if let Some(apartment_id) = household.apartment_id {
                        set_apartment_status(txn, apartment_id, ApartmentStatus::Empty).await?;
                    }
                    Ok(household.household_code)
                })
            })
            .await
            .map_err(transaction_error)?;

        info!(household_code = %code, "Household deleted");
        Ok(())
    }
}
