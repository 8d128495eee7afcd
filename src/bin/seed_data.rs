//! Seed data script - populates the database with a small demo building
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - an ADMIN account (`SEED_ADMIN_USERNAME` / `SEED_ADMIN_PASSWORD`)
//! - one accountant and one block leader account
//! - 6 apartments across two blocks
//! - 4 households with residents and vehicles
//! - the standard fee catalog (service, management, parking)

use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use condo_api::{
    db,
    entities::{
        fee_item::{FeeType, FeeUnit},
        household, user::UserRole, vehicle::VehicleType,
    },
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        apartments::CreateApartmentRequest, fee_items::CreateFeeItemRequest,
        households::CreateHouseholdRequest, residents::CreateResidentRequest,
        users::CreateUserRequest, vehicles::CreateVehicleRequest,
    },
};

struct DemoHousehold {
    code: &'static str,
    owner: &'static str,
    phone: &'static str,
    members: &'static [&'static str],
    vehicles: &'static [(VehicleType, &'static str)],
}

const HOUSEHOLDS: &[DemoHousehold] = &[
    DemoHousehold {
        code: "HK-A101",
        owner: "Nguyễn Văn An",
        phone: "0901000101",
        members: &["Trần Thị Bình", "Nguyễn Minh Châu"],
        vehicles: &[(VehicleType::Motorbike, "29B1-12345")],
    },
    DemoHousehold {
        code: "HK-A102",
        owner: "Lê Thị Dung",
        phone: "0901000102",
        members: &["Phạm Văn Em"],
        vehicles: &[(VehicleType::Car, "30A-67890"), (VehicleType::Motorbike, "29C1-22222")],
    },
    DemoHousehold {
        code: "HK-B201",
        owner: "Hoàng Văn Giang",
        phone: "0901000201",
        members: &[],
        vehicles: &[],
    },
    DemoHousehold {
        code: "HK-B202",
        owner: "Vũ Thị Hạnh",
        phone: "0901000202",
        members: &["Đỗ Văn Khoa", "Đỗ Thị Lan", "Đỗ Minh Long"],
        vehicles: &[(VehicleType::ElectricBike, "29MĐ1-00042")],
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== condo-api seed data ===");

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://condo.db?mode=rwc".to_string());
    info!("Connecting to database: {}", database_url);
    let pool = db::establish_connection(&database_url)
        .await
        .context("connecting to database")?;
    db::run_migrations(&pool).await.context("running migrations")?;

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(events::process_events(rx));
    let services = AppServices::new(Arc::new(pool), Arc::new(EventSender::new(tx)));

    seed_accounts(&services).await?;

    info!("Creating apartments...");
    let mut apartment_ids = Vec::new();
    for (block, floor, unit, area) in [
        ("A", 1, "101", dec!(65.5)),
        ("A", 1, "102", dec!(72.0)),
        ("A", 1, "103", dec!(54.2)),
        ("B", 2, "201", dec!(80.0)),
        ("B", 2, "202", dec!(95.3)),
        ("B", 2, "203", dec!(60.0)),
    ] {
        let apartment = services
            .apartments
            .create_apartment(CreateApartmentRequest {
                block: block.to_string(),
                floor,
                unit: unit.to_string(),
                area: Some(area),
                status: None,
            })
            .await
            .with_context(|| format!("creating apartment {}{}", block, unit))?;
        apartment_ids.push(apartment.id);
    }
    info!("  Created {} apartments", apartment_ids.len());

    info!("Creating households...");
    // HK-A101, HK-A102 on block A; HK-B201, HK-B202 on block B. A-103 and B-203 stay empty.
    let slots = [0usize, 1, 3, 4];
    for (demo, slot) in HOUSEHOLDS.iter().zip(slots) {
        let household = seed_household(&services, demo, apartment_ids[slot]).await?;
        info!(
            code = %household.household_code,
            members = demo.members.len() + 1,
            vehicles = demo.vehicles.len(),
            "  Created household"
        );
    }

    info!("Creating fee catalog...");
    for (name, fee_type, unit, cost, description) in [
        (
            "Phí dịch vụ chung cư",
            FeeType::Service,
            FeeUnit::M2,
            dec!(7000),
            "Cleaning, security and common-area power, per m²",
        ),
        (
            "Phí quản lý",
            FeeType::Service,
            FeeUnit::Fixed,
            dec!(50000),
            "Building management, flat per household",
        ),
        (
            "Phí gửi xe",
            FeeType::Vehicle,
            FeeUnit::Slot,
            dec!(120000),
            "Parking, per active vehicle",
        ),
    ] {
        services
            .fee_items
            .create_fee_item(CreateFeeItemRequest {
                name: name.to_string(),
                fee_type,
                unit,
                cost,
                status: None,
                description: Some(description.to_string()),
            })
            .await
            .with_context(|| format!("creating fee item {}", name))?;
    }

    info!("=== Seed data complete ===");
    info!("Log in at POST /api/v1/auth/login, then try:");
    info!("  POST /api/v1/fee-periods {{\"name\":\"T01/2026\",\"start_date\":\"2026-01-01\",\"end_date\":\"2026-01-31\"}}");
    info!("  POST /api/v1/fee-periods/{{id}}/generate");
    info!("Or explore interactively at: http://localhost:8080/swagger-ui");

    Ok(())
}

async fn seed_accounts(services: &AppServices) -> anyhow::Result<()> {
    let admin_username =
        std::env::var("SEED_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let admin_password =
        std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "Blue-Harbor-2026".to_string());

    for (username, password, full_name, role) in [
        (
            admin_username.clone(),
            admin_password,
            "Quản trị viên",
            UserRole::Admin,
        ),
        (
            "ketoan".to_string(),
            "Ke-Toan-2026".to_string(),
            "Kế toán tòa nhà",
            UserRole::KeToan,
        ),
        (
            "totruong".to_string(),
            "To-Truong-2026".to_string(),
            "Tổ trưởng tổ dân phố",
            UserRole::ToTruong,
        ),
    ] {
        let user = services
            .users
            .create_user(CreateUserRequest {
                username: username.clone(),
                password,
                full_name: full_name.to_string(),
                email: None,
                phone: None,
                role,
                status: None,
                household_id: None,
            })
            .await
            .with_context(|| format!("creating account {}", username))?;
        info!(username = %user.username, role = %user.role, "Created account");
    }
    Ok(())
}

async fn seed_household(
    services: &AppServices,
    demo: &DemoHousehold,
    apartment_id: uuid::Uuid,
) -> anyhow::Result<household::Model> {
    let household = services
        .households
        .create_household(CreateHouseholdRequest {
            household_code: demo.code.to_string(),
            owner_name: demo.owner.to_string(),
            phone: Some(demo.phone.to_string()),
            address: None,
            move_in_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            status: None,
            apartment_id: Some(apartment_id),
        })
        .await
        .with_context(|| format!("creating household {}", demo.code))?;

    let head = std::iter::once((demo.owner, true));
    let members = demo.members.iter().map(|name| (*name, false));
    for (full_name, is_head) in head.chain(members) {
        services
            .residents
            .create_resident(CreateResidentRequest {
                household_id: household.id,
                full_name: full_name.to_string(),
                date_of_birth: None,
                gender: None,
                identity_card: None,
                phone: is_head.then(|| demo.phone.to_string()),
                relationship_to_head: None,
                status: None,
                is_head: Some(is_head),
            })
            .await
            .with_context(|| format!("adding {} to {}", full_name, demo.code))?;
    }

    for (vehicle_type, plate) in demo.vehicles {
        services
            .vehicles
            .create_vehicle(CreateVehicleRequest {
                household_id: household.id,
                vehicle_type: *vehicle_type,
                plate: plate.to_string(),
                brand: None,
                color: None,
                status: None,
            })
            .await
            .with_context(|| format!("registering vehicle {}", plate))?;
    }

    Ok(household)
}
