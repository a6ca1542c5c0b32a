//! Unit of work: one connection, one live transaction, and the
//! commit/renew/dispose protocol.
//!
//! # Responsibility
//! - Open the connection and begin a transaction eagerly.
//! - Commit atomically; on failure roll back, surface the error, and renew.
//! - Release the connection exactly once.
//!
//! # Invariants
//! - Repositories never change transaction state; only `commit` and
//!   `dispose` do.
//! - Uncommitted work is rolled back on dispose, never committed implicitly.

mod async_unit_of_work;
pub(crate) mod session;
mod transaction;
mod unit_of_work;

pub use async_unit_of_work::{AsyncUnitOfWork, SqliteAsyncUnitOfWork};
pub use transaction::{TransactionId, UnitOfWorkState};
pub use unit_of_work::{SqliteUnitOfWork, UnitOfWork};
