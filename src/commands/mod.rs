use crate::{db::DbPool, errors::ServiceError, events::EventSender};
use async_trait::async_trait;
use sea_orm::TransactionError;
use std::sync::Arc;

pub mod fee_obligations;
pub mod fee_periods;

/// Command trait for implementing the Command Pattern
///
/// A command carries everything one business operation needs, runs it
/// against the store and publishes the resulting domain events.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

/// Unwraps the error of a `DatabaseConnection::transaction` callback.
pub(crate) fn transaction_error(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(db_err) => ServiceError::from(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
