use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth, commands, entities, errors, handlers, services, ApiResponse, PaginatedResponse,
};

/// Registers the `bearer_auth` scheme referenced by every protected path.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Condo API",
        version = "1.0.0",
        description = r#"
# Apartment management and fee billing

Registries for apartments, households, residents and vehicles, plus the monthly
billing lifecycle:

1. Create a fee period (DRAFT).
2. Generate obligations: the period becomes OPEN and every ACTIVE household is billed
   for every ACTIVE fee item.
3. Record payments until obligations are PAID.
4. Close the period (CLOSED). Closed periods accept no payments.

## Authentication

Log in at `/api/v1/auth/login` and send the token as:

```
Authorization: Bearer <token>
```

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login, registration and caller identity"),
        (name = "apartments", description = "Apartment registry"),
        (name = "households", description = "Household registry"),
        (name = "residents", description = "Resident registry and head of household"),
        (name = "vehicles", description = "Vehicle registry"),
        (name = "fee-items", description = "Fee catalog"),
        (name = "fee-periods", description = "Billing periods: DRAFT, OPEN, CLOSED"),
        (name = "fee-obligations", description = "Obligations and payments"),
        (name = "reports", description = "Dashboard and collection reports"),
        (name = "notifications", description = "Announcements to residents"),
        (name = "users", description = "Console accounts"),
        (name = "health", description = "Health checks")
    ),
    paths(
        auth::login_handler,
        auth::register_handler,
        auth::me_handler,

        handlers::health::health_check,

        handlers::apartments::list_apartments,
        handlers::apartments::list_apartments_by_status,
        handlers::apartments::get_apartment,
        handlers::apartments::create_apartment,
        handlers::apartments::update_apartment,
        handlers::apartments::delete_apartment,

        handlers::households::list_households,
        handlers::households::list_households_by_status,
        handlers::households::get_household,
        handlers::households::get_household_by_code,
        handlers::households::get_household_details,
        handlers::households::create_household,
        handlers::households::update_household,
        handlers::households::move_out_household,
        handlers::households::delete_household,
        handlers::households::list_household_residents,
        handlers::households::add_household_resident,
        handlers::households::list_household_vehicles,
        handlers::households::add_household_vehicle,

        handlers::residents::list_residents,
        handlers::residents::list_residents_by_household,
        handlers::residents::get_resident,
        handlers::residents::is_head,
        handlers::residents::create_resident,
        handlers::residents::update_resident,
        handlers::residents::delete_resident,
        handlers::residents::transfer_head,

        handlers::vehicles::list_vehicles,
        handlers::vehicles::list_vehicles_by_household,
        handlers::vehicles::get_vehicle,
        handlers::vehicles::create_vehicle,
        handlers::vehicles::update_vehicle,
        handlers::vehicles::delete_vehicle,

        handlers::fee_items::list_fee_items,
        handlers::fee_items::list_fee_items_by_status,
        handlers::fee_items::list_fee_items_by_type,
        handlers::fee_items::get_fee_item,
        handlers::fee_items::create_fee_item,
        handlers::fee_items::update_fee_item,
        handlers::fee_items::delete_fee_item,

        handlers::fee_periods::list_fee_periods,
        handlers::fee_periods::current_fee_period,
        handlers::fee_periods::get_fee_period,
        handlers::fee_periods::create_fee_period,
        handlers::fee_periods::update_fee_period,
        handlers::fee_periods::delete_fee_period,
        handlers::fee_periods::generate_obligations,
        handlers::fee_periods::close_fee_period,

        handlers::fee_obligations::list_fee_obligations,
        handlers::fee_obligations::list_household_obligations,
        handlers::fee_obligations::list_period_obligations,
        handlers::fee_obligations::list_obligations_by_status,
        handlers::fee_obligations::get_fee_obligation,
        handlers::fee_obligations::create_fee_obligation,
        handlers::fee_obligations::update_fee_obligation,
        handlers::fee_obligations::delete_fee_obligation,
        handlers::fee_obligations::pay_fee_obligation,
        handlers::fee_obligations::list_payments,
        handlers::fee_obligations::generate_for_period,

        handlers::dashboard::dashboard,
        handlers::reports::summary,
        handlers::reports::analytics,
        handlers::reports::household_stats,

        handlers::notifications::list_notifications,
        handlers::notifications::list_notifications_by_status,
        handlers::notifications::get_notification,
        handlers::notifications::create_notification,
        handlers::notifications::update_notification,
        handlers::notifications::publish_notification,
        handlers::notifications::delete_notification,

        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::create_user,
        handlers::users::update_user,
        handlers::users::change_password,
        handlers::users::delete_user,
    ),
    components(
        schemas(
            ApiResponse<serde_json::Value>,
            PaginatedResponse<serde_json::Value>,
            errors::ErrorResponse,

            auth::LoginCredentials,
            auth::LoginResponse,
            auth::RegisterRequest,
            auth::UserInfo,
            auth::MeResponse,

            entities::apartment::Model,
            entities::apartment::ApartmentStatus,
            entities::household::Model,
            entities::household::HouseholdStatus,
            entities::resident::Model,
            entities::resident::ResidentStatus,
            entities::vehicle::Model,
            entities::vehicle::VehicleType,
            entities::vehicle::VehicleStatus,
            entities::fee_item::Model,
            entities::fee_item::FeeType,
            entities::fee_item::FeeUnit,
            entities::fee_item::FeeItemStatus,
            entities::fee_period::Model,
            entities::fee_period::FeePeriodStatus,
            entities::fee_obligation::ObligationStatus,
            entities::fee_obligation::PaymentMethod,
            entities::fee_payment::Model,
            entities::notification::Model,
            entities::notification::NotificationType,
            entities::notification::TargetType,
            entities::notification::NotificationStatus,
            entities::user::UserRole,
            entities::user::UserStatus,

            services::apartments::CreateApartmentRequest,
            services::apartments::UpdateApartmentRequest,
            services::households::CreateHouseholdRequest,
            services::households::UpdateHouseholdRequest,
            services::households::HouseholdDetails,
            services::residents::CreateResidentRequest,
            services::residents::UpdateResidentRequest,
            services::vehicles::CreateVehicleRequest,
            services::vehicles::UpdateVehicleRequest,
            services::fee_items::CreateFeeItemRequest,
            services::fee_items::UpdateFeeItemRequest,
            services::fee_periods::CreateFeePeriodRequest,
            services::fee_periods::UpdateFeePeriodRequest,
            services::fee_obligations::CreateFeeObligationRequest,
            services::fee_obligations::UpdateFeeObligationRequest,
            services::fee_obligations::FeeObligationView,
            services::reports::ReportSummary,
            services::reports::PeriodStat,
            services::reports::HouseholdPaymentStats,
            services::reports::DashboardAnalytics,
            services::dashboard::DashboardStats,
            services::notifications::CreateNotificationRequest,
            services::notifications::UpdateNotificationRequest,
            services::users::CreateUserRequest,
            services::users::UpdateUserRequest,
            services::users::ChangePasswordRequest,

            commands::fee_periods::generate_obligations_command::GenerateObligationsResult,
            commands::fee_periods::generate_obligations_command::SkippedObligation,
            commands::fee_periods::generate_obligations_command::SkipReason,
            commands::fee_obligations::PayFeeObligationResult,

            handlers::fee_obligations::PayObligationRequest,
            handlers::residents::IsHeadResponse,
            handlers::health::HealthResponse,
            handlers::health::ComponentHealth,
            handlers::health::ComponentStatus,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
