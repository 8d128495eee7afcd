//! SeaORM entities for the condominium domain.

pub mod apartment;
pub mod fee_item;
pub mod fee_obligation;
pub mod fee_payment;
pub mod fee_period;
pub mod household;
pub mod notification;
pub mod resident;
pub mod user;
pub mod vehicle;
