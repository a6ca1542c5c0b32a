//! Error taxonomy shared by the unit of work and repositories.
//!
//! # Invariants
//! - Database errors from statement round trips are passed through unmodified
//!   in `UowError::Database`.
//! - `update`/`delete` reporting `false` is an outcome, never an error.

use crate::uow::TransactionId;
use std::time::Duration;
use thiserror::Error;

pub type UowResult<T> = Result<T, UowError>;

#[derive(Debug, Error)]
pub enum UowError {
    /// Invalid or missing connection settings. Raised before any connection
    /// is opened.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying commit failed. The transaction has been rolled back and
    /// replaced before this error reaches the caller.
    #[error("commit failed: {0}")]
    Commit(#[source] rusqlite::Error),

    #[error("{entity} does not support {operation}")]
    UnsupportedOperation {
        entity: &'static str,
        operation: &'static str,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unit of work has been disposed")]
    Disposed,

    #[error("no active transaction; the last renew attempt failed")]
    NoActiveTransaction,

    #[error("statement attached to transaction {attached} but {current} is active")]
    StaleTransaction {
        attached: TransactionId,
        current: TransactionId,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The engine rolled back the whole transaction while handling `cause`
    /// (an interrupted write, for one). All uncommitted work since the last
    /// commit is gone; a new transaction is already live.
    #[error("transaction rolled back by the database: {cause}")]
    TransactionRolledBack {
        #[source]
        cause: Box<UowError>,
    },

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error("blocking task failed: {0}")]
    Runtime(String),
}

impl UowError {
    pub(crate) fn unsupported<T: ?Sized>(operation: &'static str) -> Self {
        Self::UnsupportedOperation {
            entity: short_type_name::<T>(),
            operation,
        }
    }
}

/// Last path segment of a type name, `my_app::model::Order` -> `Order`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
