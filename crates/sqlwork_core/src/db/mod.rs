//! Driver-facing plumbing: connection bootstrap, dialects, statement
//! building, and interruption of in-flight statements.
//!
//! # Responsibility
//! - Keep SQL text generation and driver setup out of repositories.
//!
//! # Invariants
//! - Only SQLite connections are opened; other dialects are render-only.

mod dialect;
mod interrupt;
mod open;
pub mod statement;

pub use dialect::SqlDialect;
pub use interrupt::CancelSignal;
pub(crate) use interrupt::InterruptGuard;
pub use open::open_connection;
pub use statement::{Conditions, Statement, StatementBuilder};
