pub mod pay_fee_obligation_command;

pub use pay_fee_obligation_command::{PayFeeObligationCommand, PayFeeObligationResult};
