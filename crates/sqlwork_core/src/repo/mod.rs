//! Repository layer: typed data access bound to a unit of work.
//!
//! # Responsibility
//! - Expose CRUD, conditional queries, and raw statements per entity type.
//! - Keep SQL text and driver calls out of caller code.
//!
//! # Invariants
//! - Every statement joins the live transaction of the owning unit of work,
//!   resolved at call time.
//! - Capability checks (delete, audit) are decided by the entity type.
//!
//! # See also
//! - `crate::uow` for the commit and dispose protocol.

mod async_repository;
mod ops;
mod options;
mod repository;

pub use async_repository::{AsyncRepository, SqliteAsyncRepository};
pub use options::{CommandKind, ConditionalOptions, SelectOptions};
pub use repository::{Repository, SqliteRepository};
