use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_apartments_table::Migration),
            Box::new(m20240101_000002_create_households_table::Migration),
            Box::new(m20240101_000003_create_residents_table::Migration),
            Box::new(m20240101_000004_create_vehicles_table::Migration),
            Box::new(m20240101_000005_create_fee_items_table::Migration),
            Box::new(m20240101_000006_create_fee_periods_table::Migration),
            Box::new(m20240101_000007_create_fee_obligations_table::Migration),
            Box::new(m20240101_000008_create_fee_payments_table::Migration),
            Box::new(m20240101_000009_create_notifications_table::Migration),
            Box::new(m20240101_000010_create_users_table::Migration),
        ]
    }
}

mod m20240101_000001_create_apartments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_apartments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Apartments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Apartments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Apartments::Block).string().not_null())
                        .col(ColumnDef::new(Apartments::Floor).integer().not_null())
                        .col(ColumnDef::new(Apartments::Unit).string().not_null())
                        .col(ColumnDef::new(Apartments::Area).decimal().null())
                        .col(ColumnDef::new(Apartments::Status).string().not_null())
                        .col(ColumnDef::new(Apartments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Apartments::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_apartments_block_unit")
                        .table(Apartments::Table)
                        .col(Apartments::Block)
                        .col(Apartments::Unit)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_apartments_status")
                        .table(Apartments::Table)
                        .col(Apartments::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Apartments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Apartments {
        Table,
        Id,
        Block,
        Floor,
        Unit,
        Area,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_households_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_households_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Households::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Households::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Households::HouseholdCode)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Households::OwnerName).string().not_null())
                        .col(ColumnDef::new(Households::Phone).string().null())
                        .col(ColumnDef::new(Households::Address).string().null())
                        .col(ColumnDef::new(Households::MoveInDate).date().null())
                        .col(ColumnDef::new(Households::Status).string().not_null())
                        .col(ColumnDef::new(Households::ApartmentId).uuid().null())
                        .col(ColumnDef::new(Households::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Households::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_households_apartment_id")
                                .from(Households::Table, Households::ApartmentId)
                                .to(Apartments::Table, Apartments::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_households_status")
                        .table(Households::Table)
                        .col(Households::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_households_apartment_id")
                        .table(Households::Table)
                        .col(Households::ApartmentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Households::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Households {
        Table,
        Id,
        HouseholdCode,
        OwnerName,
        Phone,
        Address,
        MoveInDate,
        Status,
        ApartmentId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Apartments {
        Table,
        Id,
    }
}

mod m20240101_000003_create_residents_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_residents_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Residents::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Residents::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Residents::HouseholdId).uuid().not_null())
                        .col(ColumnDef::new(Residents::FullName).string().not_null())
                        .col(ColumnDef::new(Residents::DateOfBirth).date().null())
                        .col(ColumnDef::new(Residents::Gender).string().null())
                        .col(ColumnDef::new(Residents::IdentityCard).string().null())
                        .col(ColumnDef::new(Residents::Phone).string().null())
                        .col(ColumnDef::new(Residents::RelationshipToHead).string().null())
                        .col(ColumnDef::new(Residents::Status).string().not_null())
                        .col(
                            ColumnDef::new(Residents::IsHead)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Residents::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Residents::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_residents_household_id")
                                .from(Residents::Table, Residents::HouseholdId)
                                .to(Households::Table, Households::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Multiple NULL identity cards are allowed by both SQLite and PostgreSQL.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_residents_identity_card")
                        .table(Residents::Table)
                        .col(Residents::IdentityCard)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_residents_household_id")
                        .table(Residents::Table)
                        .col(Residents::HouseholdId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Residents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Residents {
        Table,
        Id,
        HouseholdId,
        FullName,
        DateOfBirth,
        Gender,
        IdentityCard,
        Phone,
        RelationshipToHead,
        Status,
        IsHead,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Households {
        Table,
        Id,
    }
}

mod m20240101_000004_create_vehicles_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_vehicles_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Vehicles::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Vehicles::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Vehicles::HouseholdId).uuid().not_null())
                        .col(ColumnDef::new(Vehicles::VehicleType).string().not_null())
                        .col(
                            ColumnDef::new(Vehicles::Plate)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Vehicles::Brand).string().null())
                        .col(ColumnDef::new(Vehicles::Color).string().null())
                        .col(ColumnDef::new(Vehicles::Status).string().not_null())
                        .col(ColumnDef::new(Vehicles::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Vehicles::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_vehicles_household_id")
                                .from(Vehicles::Table, Vehicles::HouseholdId)
                                .to(Households::Table, Households::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_vehicles_household_id")
                        .table(Vehicles::Table)
                        .col(Vehicles::HouseholdId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Vehicles::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Vehicles {
        Table,
        Id,
        HouseholdId,
        VehicleType,
        Plate,
        Brand,
        Color,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Households {
        Table,
        Id,
    }
}

mod m20240101_000005_create_fee_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_fee_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(FeeItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(FeeItems::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(FeeItems::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(FeeItems::FeeType).string().not_null())
                        .col(ColumnDef::new(FeeItems::Unit).string().not_null())
                        .col(
                            ColumnDef::new(FeeItems::Cost)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(FeeItems::Status).string().not_null())
                        .col(ColumnDef::new(FeeItems::Description).string().null())
                        .col(ColumnDef::new(FeeItems::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(FeeItems::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FeeItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum FeeItems {
        Table,
        Id,
        Name,
        FeeType,
        Unit,
        Cost,
        Status,
        Description,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000006_create_fee_periods_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_fee_periods_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(FeePeriods::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(FeePeriods::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(FeePeriods::Name).string().not_null())
                        .col(ColumnDef::new(FeePeriods::Status).string().not_null())
                        .col(ColumnDef::new(FeePeriods::StartDate).date().not_null())
                        .col(ColumnDef::new(FeePeriods::EndDate).date().not_null())
                        .col(ColumnDef::new(FeePeriods::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(FeePeriods::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_fee_periods_status")
                        .table(FeePeriods::Table)
                        .col(FeePeriods::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FeePeriods::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum FeePeriods {
        Table,
        Id,
        Name,
        Status,
        StartDate,
        EndDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000007_create_fee_obligations_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_fee_obligations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(FeeObligations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FeeObligations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(FeeObligations::HouseholdId).uuid().not_null())
                        .col(ColumnDef::new(FeeObligations::FeeItemId).uuid().not_null())
                        .col(ColumnDef::new(FeeObligations::FeeItemName).string().not_null())
                        .col(ColumnDef::new(FeeObligations::FeePeriodId).uuid().not_null())
                        .col(ColumnDef::new(FeeObligations::PeriodLabel).string().not_null())
                        .col(
                            ColumnDef::new(FeeObligations::ExpectedAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(FeeObligations::PaidAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(FeeObligations::DueDate).date().not_null())
                        .col(ColumnDef::new(FeeObligations::PayerName).string().null())
                        .col(ColumnDef::new(FeeObligations::PaidAt).timestamp().null())
                        .col(ColumnDef::new(FeeObligations::PaymentMethod).string().null())
                        .col(ColumnDef::new(FeeObligations::Note).string().null())
                        .col(
                            ColumnDef::new(FeeObligations::Version)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(FeeObligations::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(FeeObligations::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_fee_obligations_household_id")
                                .from(FeeObligations::Table, FeeObligations::HouseholdId)
                                .to(Households::Table, Households::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_fee_obligations_fee_item_id")
                                .from(FeeObligations::Table, FeeObligations::FeeItemId)
                                .to(FeeItems::Table, FeeItems::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_fee_obligations_fee_period_id")
                                .from(FeeObligations::Table, FeeObligations::FeePeriodId)
                                .to(FeePeriods::Table, FeePeriods::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One obligation per household, fee item and period.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_fee_obligations_household_item_period")
                        .table(FeeObligations::Table)
                        .col(FeeObligations::HouseholdId)
                        .col(FeeObligations::FeeItemId)
                        .col(FeeObligations::FeePeriodId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_fee_obligations_fee_period_id")
                        .table(FeeObligations::Table)
                        .col(FeeObligations::FeePeriodId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FeeObligations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum FeeObligations {
        Table,
        Id,
        HouseholdId,
        FeeItemId,
        FeeItemName,
        FeePeriodId,
        PeriodLabel,
        ExpectedAmount,
        PaidAmount,
        DueDate,
        PayerName,
        PaidAt,
        PaymentMethod,
        Note,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Households {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum FeeItems {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum FeePeriods {
        Table,
        Id,
    }
}

mod m20240101_000008_create_fee_payments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000008_create_fee_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(FeePayments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(FeePayments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(FeePayments::ObligationId).uuid().not_null())
                        .col(ColumnDef::new(FeePayments::Amount).decimal().not_null())
                        .col(ColumnDef::new(FeePayments::PaymentMethod).string().not_null())
                        .col(ColumnDef::new(FeePayments::PayerName).string().null())
                        .col(ColumnDef::new(FeePayments::Note).string().null())
                        .col(ColumnDef::new(FeePayments::RecordedBy).string().null())
                        .col(ColumnDef::new(FeePayments::PaidAt).timestamp().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_fee_payments_obligation_id")
                                .from(FeePayments::Table, FeePayments::ObligationId)
                                .to(FeeObligations::Table, FeeObligations::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_fee_payments_obligation_id")
                        .table(FeePayments::Table)
                        .col(FeePayments::ObligationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FeePayments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum FeePayments {
        Table,
        Id,
        ObligationId,
        Amount,
        PaymentMethod,
        PayerName,
        Note,
        RecordedBy,
        PaidAt,
    }

    #[derive(DeriveIden)]
    enum FeeObligations {
        Table,
        Id,
    }
}

mod m20240101_000009_create_notifications_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000009_create_notifications_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Notifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Notifications::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Notifications::Title).string().not_null())
                        .col(ColumnDef::new(Notifications::Content).text().not_null())
                        .col(
                            ColumnDef::new(Notifications::NotificationType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Notifications::TargetType).string().not_null())
                        .col(ColumnDef::new(Notifications::TargetValue).string().null())
                        .col(ColumnDef::new(Notifications::Status).string().not_null())
                        .col(ColumnDef::new(Notifications::CreatedBy).string().null())
                        .col(ColumnDef::new(Notifications::PublishedAt).timestamp().null())
                        .col(ColumnDef::new(Notifications::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Notifications::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_notifications_status")
                        .table(Notifications::Table)
                        .col(Notifications::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Notifications::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Notifications {
        Table,
        Id,
        Title,
        Content,
        NotificationType,
        TargetType,
        TargetValue,
        Status,
        CreatedBy,
        PublishedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000010_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000010_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Username)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::FullName).string().not_null())
                        .col(ColumnDef::new(Users::Email).string().null())
                        .col(ColumnDef::new(Users::Phone).string().null())
                        .col(ColumnDef::new(Users::Role).string().not_null())
                        .col(ColumnDef::new(Users::Status).string().not_null())
                        .col(ColumnDef::new(Users::HouseholdId).uuid().null())
                        .col(ColumnDef::new(Users::LastLoginAt).timestamp().null())
                        .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Users::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_users_household_id")
                                .from(Users::Table, Users::HouseholdId)
                                .to(Households::Table, Households::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Username,
        PasswordHash,
        FullName,
        Email,
        Phone,
        Role,
        Status,
        HouseholdId,
        LastLoginAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Households {
        Table,
        Id,
    }
}

/// Connects to `db_url` and applies every pending migration.
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
