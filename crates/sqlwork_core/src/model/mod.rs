//! Entity contracts that flow through repositories.
//!
//! # Responsibility
//! - Describe how a record maps onto one table (`TableMap`).
//! - Declare the optional audit and deletable capabilities per entity type.
//!
//! # Invariants
//! - An entity's key is only changed by the core to copy back a
//!   database-generated identity after insert.
//! - Capabilities are properties of the type, never of an instance.

pub mod audit;
pub mod entity;
