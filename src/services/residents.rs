use crate::{
    commands::transaction_error,
    db::DbPool,
    entities::{
        household,
        resident::{self, ResidentStatus, HEAD_RELATIONSHIP, MEMBER_RELATIONSHIP},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "household_id": "3f2b8c1d-4e5f-4a6b-9c7d-8e9f0a1b2c3d",
    "full_name": "Lê Minh Châu",
    "date_of_birth": "1990-04-12",
    "gender": "Nữ",
    "identity_card": "001190012345",
    "relationship_to_head": "Vợ"
}))]
pub struct CreateResidentRequest {
    /// Taken from the path on `/households/{id}/...` routes
    #[serde(default)]
    pub household_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 10))]
    pub gender: Option<String>,
    #[validate(length(min = 9, max = 20))]
    pub identity_card: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 50))]
    pub relationship_to_head: Option<String>,
    pub status: Option<ResidentStatus>,
    pub is_head: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateResidentRequest {
    #[validate(length(min = 1, max = 255))]
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 10))]
    pub gender: Option<String>,
    #[validate(length(min = 9, max = 20))]
    pub identity_card: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 50))]
    pub relationship_to_head: Option<String>,
    pub status: Option<ResidentStatus>,
    pub is_head: Option<bool>,
}

async fn find_resident<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<resident::Model, ServiceError> {
    resident::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Resident", id))
}

/// Demotes whoever currently heads `household_id`, except `keep`.
async fn demote_current_head(
    txn: &DatabaseTransaction,
    household_id: Uuid,
    keep: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut demote = resident::Entity::update_many()
        .col_expr(resident::Column::IsHead, Expr::value(false))
        .col_expr(
            resident::Column::RelationshipToHead,
            Expr::value(Some(MEMBER_RELATIONSHIP.to_string())),
        )
        .col_expr(resident::Column::UpdatedAt, Expr::value(Some(Utc::now())))
        .filter(resident::Column::HouseholdId.eq(household_id))
        .filter(resident::Column::IsHead.eq(true));
    if let Some(keep) = keep {
        demote = demote.filter(resident::Column::Id.ne(keep));
    }
    demote.exec(txn).await?;
    Ok(())
}

/// Copies the head's name and phone onto the household record.
async fn sync_household_owner(
    txn: &DatabaseTransaction,
    head: &resident::Model,
) -> Result<(), ServiceError> {
    let mut update = household::Entity::update_many()
        .col_expr(household::Column::OwnerName, Expr::value(head.full_name.clone()))
        .col_expr(household::Column::UpdatedAt, Expr::value(Some(Utc::now())))
        .filter(household::Column::Id.eq(head.household_id));
    if head.phone.is_some() {
        update = update.col_expr(household::Column::Phone, Expr::value(head.phone.clone()));
    }
    update.exec(txn).await?;
    Ok(())
}

/// Resident registry. At most one resident per household is head; promoting
/// a new head demotes the old one in the same transaction.
#[derive(Clone)]
pub struct ResidentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ResidentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_residents(
        &self,
        household_id: Option<Uuid>,
        status: Option<ResidentStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<resident::Model>, u64), ServiceError> {
        let mut query = resident::Entity::find();
        if let Some(household_id) = household_id {
            query = query.filter(resident::Column::HouseholdId.eq(household_id));
        }
        if let Some(status) = status {
            query = query.filter(resident::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_asc(resident::Column::FullName)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await?;
        let residents = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((residents, total))
    }

    #[instrument(skip(self))]
    pub async fn get_resident(&self, id: &Uuid) -> Result<Option<resident::Model>, ServiceError> {
        Ok(resident::Entity::find_by_id(*id).one(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn is_head(&self, id: Uuid) -> Result<bool, ServiceError> {
        Ok(find_resident(&*self.db_pool, id).await?.is_head)
    }

    #[instrument(skip(self))]
    pub async fn create_resident(
        &self,
        request: CreateResidentRequest,
    ) -> Result<resident::Model, ServiceError> {
        request.validate()?;

        let created = self
            .db_pool
            .transaction::<_, resident::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    if household::Entity::find_by_id(request.household_id)
                        .one(txn)
                        .await?
                        .is_none()
                    {
                        return Err(ServiceError::not_found("Household", request.household_id));
                    }

                    let is_head = request.is_head.unwrap_or(false);
                    if is_head {
                        demote_current_head(txn, request.household_id, None).await?;
                    }
                    let relationship = if is_head {
                        Some(HEAD_RELATIONSHIP.to_string())
                    } else {
                        request.relationship_to_head
                    };

                    let resident = resident::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        household_id: Set(request.household_id),
                        full_name: Set(request.full_name.trim().to_string()),
                        date_of_birth: Set(request.date_of_birth),
                        gender: Set(request.gender),
                        identity_card: Set(request.identity_card),
                        phone: Set(request.phone),
                        relationship_to_head: Set(relationship),
                        status: Set(request.status.unwrap_or(ResidentStatus::Active)),
                        is_head: Set(is_head),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    if is_head {
                        sync_household_owner(txn, &resident).await?;
                    }
                    Ok(resident)
                })
            })
            .await
            .map_err(transaction_error)?;

        info!(
            resident_id = %created.id,
            household_id = %created.household_id,
            "Resident registered"
        );
        Ok(created)
    }

    /// Edits a resident. Setting `is_head` promotes them and demotes the
    /// previous head; a head cannot be demoted directly, use
    /// [`ResidentService::transfer_head`].
    #[instrument(skip(self))]
    pub async fn update_resident(
        &self,
        id: Uuid,
        request: UpdateResidentRequest,
    ) -> Result<resident::Model, ServiceError> {
        request.validate()?;

        self.db_pool
            .transaction::<_, resident::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = find_resident(txn, id).await?;
                    let promoting = request.is_head == Some(true) && !existing.is_head;
                    if request.is_head == Some(false) && existing.is_head {
                        return Err(ServiceError::Conflict(
                            "transfer the head role to another resident instead".to_string(),
                        ));
                    }
                    if promoting {
                        demote_current_head(txn, existing.household_id, Some(id)).await?;
                    }

                    let was_head = existing.is_head;
                    let mut active: resident::ActiveModel = existing.into();
                    if let Some(full_name) = request.full_name {
                        active.full_name = Set(full_name.trim().to_string());
                    }
                    if request.date_of_birth.is_some() {
                        active.date_of_birth = Set(request.date_of_birth);
                    }
                    if request.gender.is_some() {
                        active.gender = Set(request.gender);
                    }
                    if request.identity_card.is_some() {
                        active.identity_card = Set(request.identity_card);
                    }
                    if request.phone.is_some() {
                        active.phone = Set(request.phone);
                    }
                    if request.relationship_to_head.is_some() {
                        active.relationship_to_head = Set(request.relationship_to_head);
                    }
                    if let Some(status) = request.status {
                        active.status = Set(status);
                    }
                    if promoting {
                        active.is_head = Set(true);
                        active.relationship_to_head = Set(Some(HEAD_RELATIONSHIP.to_string()));
                    }

                    let resident = active.update(txn).await?;
                    if promoting || was_head {
                        sync_household_owner(txn, &resident).await?;
                    }
                    Ok(resident)
                })
            })
            .await
            .map_err(transaction_error)
    }

    /// Heads cannot be deleted directly.
    #[instrument(skip(self))]
    pub async fn delete_resident(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = find_resident(&*self.db_pool, id).await?;
        if existing.is_head {
            return Err(ServiceError::Conflict(format!(
                "resident {} is head of household; transfer the role first",
                existing.full_name
            )));
        }

        resident::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        info!(resident_id = %id, "Resident deleted");
        Ok(())
    }

    /// Promotes `new_head_id` to head, updates the household owner, then
    /// deletes the outgoing head. Both must belong to the same household.
    #[instrument(skip(self))]
    pub async fn transfer_head(
        &self,
        id: Uuid,
        new_head_id: Uuid,
    ) -> Result<resident::Model, ServiceError> {
        if id == new_head_id {
            return Err(ServiceError::ValidationError(
                "new head must be a different resident".to_string(),
            ));
        }

        let (old_head, new_head) = self
            .db_pool
            .transaction::<_, (resident::Model, resident::Model), ServiceError>(move |txn| {
                Box::pin(async move {
                    let old_head = find_resident(txn, id).await?;
                    if !old_head.is_head {
                        return Err(ServiceError::Conflict(format!(
                            "resident {} is not head of household",
                            old_head.full_name
                        )));
                    }
                    let new_head = find_resident(txn, new_head_id).await?;
                    if new_head.household_id != old_head.household_id {
                        return Err(ServiceError::ValidationError(
                            "new head must belong to the same household".to_string(),
                        ));
                    }

                    let mut active: resident::ActiveModel = new_head.into();
                    active.is_head = Set(true);
                    active.relationship_to_head = Set(Some(HEAD_RELATIONSHIP.to_string()));
                    let new_head = active.update(txn).await?;

                    sync_household_owner(txn, &new_head).await?;
                    resident::Entity::delete_by_id(old_head.id).exec(txn).await?;
                    Ok((old_head, new_head))
                })
            })
            .await
            .map_err(transaction_error)?;

        info!(
            household_id = %new_head.household_id,
            old_head = %old_head.full_name,
            new_head = %new_head.full_name,
            "Head of household transferred"
        );
        self.event_sender
            .send_or_log(Event::HeadTransferred {
                household_id: new_head.household_id,
                old_head_id: old_head.id,
                new_head_id: new_head.id,
            })
            .await;
        Ok(new_head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entities::household::HouseholdStatus, services::test_support};
    use assert_matches::assert_matches;

    struct Fixture {
        svc: ResidentService,
        db: Arc<DbPool>,
        household: household::Model,
    }

    async fn fixture() -> Fixture {
        let db = test_support::setup_db().await;
        let household = test_support::household(&db, "HK800", None, HouseholdStatus::Active).await;
        Fixture {
            svc: ResidentService::new(db.clone(), test_support::event_sender()),
            db,
            household,
        }
    }

    fn request(household_id: Uuid, name: &str, head: bool) -> CreateResidentRequest {
        CreateResidentRequest {
            household_id,
            full_name: name.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 6, 1),
            gender: None,
            identity_card: None,
            phone: Some(format!("09{:08}", name.len())),
            relationship_to_head: Some("Con".to_string()),
            status: None,
            is_head: Some(head),
        }
    }

    async fn heads(db: &DbPool, household_id: Uuid) -> Vec<resident::Model> {
        resident::Entity::find()
            .filter(resident::Column::HouseholdId.eq(household_id))
            .filter(resident::Column::IsHead.eq(true))
            .all(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn creating_a_head_updates_the_household_owner() {
        let f = fixture().await;
        let head = f
            .svc
            .create_resident(request(f.household.id, "Phạm Quốc Dũng", true))
            .await
            .unwrap();
        assert_eq!(head.relationship_to_head.as_deref(), Some(HEAD_RELATIONSHIP));
        assert_eq!(head.status, ResidentStatus::Active);

        let household = household::Entity::find_by_id(f.household.id)
            .one(&*f.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(household.owner_name, "Phạm Quốc Dũng");
    }

    #[tokio::test]
    async fn promoting_demotes_the_previous_head() {
        let f = fixture().await;
        let first = f.svc.create_resident(request(f.household.id, "A", true)).await.unwrap();
        let second = f.svc.create_resident(request(f.household.id, "B", false)).await.unwrap();

        f.svc
            .update_resident(
                second.id,
                UpdateResidentRequest {
                    is_head: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let heads = heads(&f.db, f.household.id).await;
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].id, second.id);
        let demoted = f.svc.get_resident(&first.id).await.unwrap().unwrap();
        assert_eq!(demoted.relationship_to_head.as_deref(), Some(MEMBER_RELATIONSHIP));
        assert!(f.svc.is_head(second.id).await.unwrap());
    }

    #[tokio::test]
    async fn head_cannot_be_deleted_or_demoted_directly() {
        let f = fixture().await;
        let head = f.svc.create_resident(request(f.household.id, "Head", true)).await.unwrap();

        assert_matches!(f.svc.delete_resident(head.id).await, Err(ServiceError::Conflict(_)));
        assert_matches!(
            f.svc
                .update_resident(
                    head.id,
                    UpdateResidentRequest {
                        is_head: Some(false),
                        ..Default::default()
                    },
                )
                .await,
            Err(ServiceError::Conflict(_))
        );

        let member = f.svc.create_resident(request(f.household.id, "Member", false)).await.unwrap();
        f.svc.delete_resident(member.id).await.unwrap();
        assert!(f.svc.get_resident(&member.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transfer_promotes_and_removes_the_old_head() {
        let f = fixture().await;
        let head = f.svc.create_resident(request(f.household.id, "Old Head", true)).await.unwrap();
        let heir = f.svc.create_resident(request(f.household.id, "Heir", false)).await.unwrap();

        let promoted = f.svc.transfer_head(head.id, heir.id).await.unwrap();
        assert!(promoted.is_head);
        assert_eq!(promoted.relationship_to_head.as_deref(), Some(HEAD_RELATIONSHIP));
        assert!(f.svc.get_resident(&head.id).await.unwrap().is_none());

        let household = household::Entity::find_by_id(f.household.id)
            .one(&*f.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(household.owner_name, "Heir");
    }

    #[tokio::test]
    async fn transfer_requires_head_and_same_household() {
        let f = fixture().await;
        let other = test_support::household(&f.db, "HK801", None, HouseholdStatus::Active).await;
        let head = f.svc.create_resident(request(f.household.id, "Head", true)).await.unwrap();
        let member = f.svc.create_resident(request(f.household.id, "Member", false)).await.unwrap();
        let stranger = f.svc.create_resident(request(other.id, "Stranger", false)).await.unwrap();

        assert_matches!(
            f.svc.transfer_head(member.id, head.id).await,
            Err(ServiceError::Conflict(_))
        );
        assert_matches!(
            f.svc.transfer_head(head.id, stranger.id).await,
            Err(ServiceError::ValidationError(_))
        );
        assert!(f.svc.is_head(head.id).await.unwrap());
    }

    #[tokio::test]
    async fn identity_card_is_unique() {
        let f = fixture().await;
        let mut first = request(f.household.id, "One", false);
        first.identity_card = Some("001190099999".to_string());
        let mut second = request(f.household.id, "Two", false);
        second.identity_card = Some("001190099999".to_string());

        f.svc.create_resident(first).await.unwrap();
        assert_matches!(f.svc.create_resident(second).await, Err(ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_by_household() {
        let f = fixture().await;
        let other = test_support::household(&f.db, "HK802", None, HouseholdStatus::Active).await;
        f.svc.create_resident(request(f.household.id, "X", false)).await.unwrap();
        f.svc.create_resident(request(other.id, "Y", false)).await.unwrap();

        let (residents, total) = f
            .svc
            .list_residents(Some(f.household.id), None, 1, 20)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(residents[0].full_name, "X");
    }
}
