//! Entity identity and table mapping contract.
//!
//! # Responsibility
//! - Map a record type onto one table: key column, non-key columns, and who
//!   generates the key.
//! - Convert keys to and from driver values.
//!
//! # Invariants
//! - `Entity::column_values()` yields values in `TableMap::columns` order.
//! - For `KeyStrategy::Generated` the key column is never written by inserts.

use crate::model::audit::AuditFields;
use rusqlite::types::Value;
use rusqlite::Row;
use std::fmt::Debug;

/// Who produces the primary-key value of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// The database generates the key on insert (identity/rowid column).
    ///
    /// The identity is read with `last_insert_rowid()`, so the table must be
    /// a rowid table; `WITHOUT ROWID` tables have to use `Assigned`. An
    /// insert that writes no row (an `IGNORE` trigger, say) reports `0`.
    Generated,
    /// The caller supplies the key; the database generates no identity.
    Assigned,
}

/// Static description of the table behind an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMap {
    pub table: &'static str,
    pub key: &'static str,
    /// Non-key columns, in the order produced by `Entity::column_values()`.
    pub columns: &'static [&'static str],
    pub key_strategy: KeyStrategy,
}

impl TableMap {
    /// Columns written by an insert. The key leads when it is caller assigned.
    pub fn insert_columns(&self) -> Vec<&'static str> {
        match self.key_strategy {
            KeyStrategy::Generated => self.columns.to_vec(),
            KeyStrategy::Assigned => std::iter::once(self.key)
                .chain(self.columns.iter().copied())
                .collect(),
        }
    }

    /// Columns read back by every select: key first, then `columns`.
    pub fn select_columns(&self) -> Vec<&'static str> {
        std::iter::once(self.key)
            .chain(self.columns.iter().copied())
            .collect()
    }
}

/// Key types an entity can use.
pub trait EntityKey: Clone + Debug + Send + 'static {
    fn to_value(&self) -> Value;

    /// Converts a database-generated identity into this key type.
    ///
    /// Returns `None` when the key type cannot hold generated identities.
    fn from_generated(identity: i64) -> Option<Self>;
}

impl EntityKey for i64 {
    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_generated(identity: i64) -> Option<Self> {
        Some(identity)
    }
}

impl EntityKey for i32 {
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_generated(identity: i64) -> Option<Self> {
        i32::try_from(identity).ok()
    }
}

impl EntityKey for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_generated(_identity: i64) -> Option<Self> {
        None
    }
}

/// A record persisted through a repository.
///
/// Optional capabilities are declared on the type:
/// - audit: override `audit`/`audit_mut` to expose embedded `AuditFields`;
///   inserts then stamp `created_at` and updates stamp `updated_at`.
/// - deletable: set `DELETABLE = true`; repositories refuse deletes otherwise.
pub trait Entity: Clone + Send + Sync + 'static {
    type Key: EntityKey;

    const TABLE: TableMap;

    /// Authorizes irreversible deletes for this entity type.
    const DELETABLE: bool = false;

    fn id(&self) -> &Self::Key;

    fn set_id(&mut self, id: Self::Key);

    /// Values for `TABLE.columns`, same order.
    fn column_values(&self) -> Vec<Value>;

    /// Builds a record from a row selected with `TABLE.select_columns()`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn audit(&self) -> Option<&AuditFields> {
        None
    }

    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        None
    }
}

/// Values bound by an insert, matching `TableMap::insert_columns()`.
pub(crate) fn insert_values<T: Entity>(entity: &T) -> Vec<Value> {
    let mut values = Vec::with_capacity(T::TABLE.columns.len() + 1);
    if T::TABLE.key_strategy == KeyStrategy::Assigned {
        values.push(entity.id().to_value());
    }
    values.extend(entity.column_values());
    values
}
