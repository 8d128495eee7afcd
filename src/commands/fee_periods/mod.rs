pub mod close_fee_period_command;
pub mod generate_obligations_command;

pub use close_fee_period_command::CloseFeePeriodCommand;
pub use generate_obligations_command::{
    compute_expected_amount, plan_obligations, BillableHousehold, GenerateObligationsCommand,
    GenerateObligationsResult, GenerationPlan, PlannedObligation, SkipReason, SkippedObligation,
};
