//! Statement options supplied through configuration callbacks.
//!
//! # Invariants
//! - Repositories attach the live transaction after the caller's callback
//!   runs, overriding any transaction the caller attached.

use crate::db::Conditions;
use crate::error::{UowError, UowResult};
use crate::uow::TransactionId;
use rusqlite::types::Value;
use std::time::Duration;

/// How raw statement text is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandKind {
    #[default]
    Text,
    /// The text is a procedure name; the dialect renders the call.
    StoredProcedure,
}

/// Options for `find`: conditions, ordering, paging, timeout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    pub(crate) conditions: Option<Conditions>,
    pub(crate) order_by: Option<String>,
    pub(crate) top: Option<u64>,
    pub(crate) skip: Option<u64>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) transaction: Option<TransactionId>,
}

impl SelectOptions {
    /// `WHERE` clause without the keyword, with `?` placeholders.
    pub fn where_clause(&mut self, clause: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.conditions = Some(Conditions::new(clause, params));
        self
    }

    /// `ORDER BY` clause without the keyword.
    pub fn order_by(&mut self, clause: impl Into<String>) -> &mut Self {
        self.order_by = Some(clause.into());
        self
    }

    pub fn top(&mut self, rows: u64) -> &mut Self {
        self.top = Some(rows);
        self
    }

    pub fn skip(&mut self, rows: u64) -> &mut Self {
        self.skip = Some(rows);
        self
    }

    /// Interrupts the statement once `timeout` elapses. A timed-out write
    /// rolls back the whole transaction (`TransactionRolledBack`).
    pub fn with_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn attach_to_transaction(&mut self, transaction: TransactionId) -> &mut Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn attached_transaction(&self) -> Option<TransactionId> {
        self.transaction
    }
}

/// Options for `count` and `bulk_update`: conditions and timeout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionalOptions {
    pub(crate) conditions: Option<Conditions>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) transaction: Option<TransactionId>,
}

impl ConditionalOptions {
    pub fn where_clause(&mut self, clause: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.conditions = Some(Conditions::new(clause, params));
        self
    }

    /// Interrupts the statement once `timeout` elapses. A timed-out write
    /// rolls back the whole transaction (`TransactionRolledBack`).
    pub fn with_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn attach_to_transaction(&mut self, transaction: TransactionId) -> &mut Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn attached_transaction(&self) -> Option<TransactionId> {
        self.transaction
    }
}

/// Rejects statements attached to anything but the live transaction.
pub(crate) fn ensure_attached(
    attached: Option<TransactionId>,
    current: TransactionId,
) -> UowResult<()> {
    match attached {
        Some(attached) if attached == current => Ok(()),
        Some(attached) => Err(UowError::StaleTransaction { attached, current }),
        None => Err(UowError::NoActiveTransaction),
    }
}
