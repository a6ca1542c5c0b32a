//! Transactional data access for SQLite: a unit of work owning one
//! connection and one live transaction, and generic repositories bound to it.
//!
//! Blocking and non-blocking (`tokio`) forms share one protocol:
//! open, issue repository calls, `commit` (which begins a fresh
//! transaction), and `dispose`.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod uow;

pub use config::{ConnectionConfig, SqlConnectionConfiguration};
pub use db::{CancelSignal, SqlDialect};
pub use error::{UowError, UowResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::audit::AuditFields;
pub use model::entity::{Entity, EntityKey, KeyStrategy, TableMap};
pub use repo::{
    AsyncRepository, CommandKind, ConditionalOptions, Repository, SelectOptions,
    SqliteAsyncRepository, SqliteRepository,
};
pub use uow::{
    AsyncUnitOfWork, SqliteAsyncUnitOfWork, SqliteUnitOfWork, TransactionId, UnitOfWork,
    UnitOfWorkState,
};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
