pub mod apartments;
pub mod common;
pub mod dashboard;
pub mod fee_items;
pub mod fee_obligations;
pub mod fee_periods;
pub mod health;
pub mod households;
pub mod notifications;
pub mod reports;
pub mod residents;
pub mod users;
pub mod vehicles;

use crate::{db::DbPool, events::EventSender, services};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub apartments: Arc<services::apartments::ApartmentService>,
    pub households: Arc<services::households::HouseholdService>,
    pub residents: Arc<services::residents::ResidentService>,
    pub vehicles: Arc<services::vehicles::VehicleService>,
    pub fee_items: Arc<services::fee_items::FeeItemService>,
    pub fee_periods: Arc<services::fee_periods::FeePeriodService>,
    pub fee_obligations: Arc<services::fee_obligations::FeeObligationService>,
    pub reports: Arc<services::reports::ReportService>,
    pub dashboard: Arc<services::dashboard::DashboardService>,
    pub notifications: Arc<services::notifications::NotificationService>,
    pub users: Arc<services::users::UserService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            apartments: Arc::new(services::apartments::ApartmentService::new(db_pool.clone())),
            households: Arc::new(services::households::HouseholdService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            residents: Arc::new(services::residents::ResidentService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            vehicles: Arc::new(services::vehicles::VehicleService::new(db_pool.clone())),
            fee_items: Arc::new(services::fee_items::FeeItemService::new(db_pool.clone())),
            fee_periods: Arc::new(services::fee_periods::FeePeriodService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            fee_obligations: Arc::new(services::fee_obligations::FeeObligationService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            reports: Arc::new(services::reports::ReportService::new(db_pool.clone())),
            dashboard: Arc::new(services::dashboard::DashboardService::new(db_pool.clone())),
            notifications: Arc::new(services::notifications::NotificationService::new(
                db_pool.clone(),
                event_sender,
            )),
            users: Arc::new(services::users::UserService::new(db_pool)),
        }
    }
}
