//! Blocking repository contract and its SQLite implementation.
//!
//! # Responsibility
//! - Provide typed CRUD plus raw statement access over one entity type.
//! - Route every statement through the owning unit of work's live
//!   transaction.
//!
//! # Invariants
//! - Writes on audit entities run `AuditFields::validate()` and stamp
//!   timestamps before any SQL mutation.
//! - `insert` and `update` modify the caller's entity only when the
//!   statement succeeds.
//! - `delete` is refused before any round trip unless `T::DELETABLE`.
//! - `update` and `bulk_update` overwrite every non-key column; callers must
//!   load the full record first or fields they did not set are clobbered.

use crate::db::{CancelSignal, StatementBuilder};
use crate::error::{UowError, UowResult};
use crate::model::entity::Entity;
use crate::repo::ops;
use crate::repo::options::{CommandKind, ConditionalOptions, SelectOptions};
use crate::uow::session::Session;
use crate::uow::TransactionId;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::marker::PhantomData;
use std::sync::Weak;
use std::time::Duration;

/// Repository interface for one entity type.
pub trait Repository<T: Entity> {
    /// Runs a statement and returns the affected row count.
    fn execute(&self, sql: &str, params: &[Value], kind: CommandKind) -> UowResult<usize>;

    /// Runs a query and maps every row with `T::from_row`.
    fn query(&self, sql: &str, params: &[Value], kind: CommandKind) -> UowResult<Vec<T>>;

    /// Runs a query and reads the first column of every row as an integer.
    fn query_scalar_int(
        &self,
        sql: &str,
        params: &[Value],
        kind: CommandKind,
    ) -> UowResult<Vec<i64>>;

    /// Inserts `entity` and returns the generated identity, or `0` when the
    /// table generates none or no row was written. On success the stamped
    /// record, with any positive identity, is written back to `entity`.
    fn insert(&self, entity: &mut T) -> UowResult<i64>;

    /// Reloads `entity` by key.
    fn get(&self, entity: &T) -> UowResult<Option<T>>;

    fn get_all(&self) -> UowResult<Vec<T>>;

    fn find<F>(&self, configure: F) -> UowResult<Vec<T>>
    where
        F: FnOnce(&mut SelectOptions);

    fn count<F>(&self, configure: F) -> UowResult<i64>
    where
        F: FnOnce(&mut ConditionalOptions);

    /// Overwrites the row with `entity`'s key. `false` when no row matched.
    fn update(&self, entity: &mut T) -> UowResult<bool>;

    /// Writes `template`'s non-key columns to every row matching the
    /// configured conditions, or to every row when none are configured.
    fn bulk_update<F>(&self, template: &T, configure: F) -> UowResult<usize>
    where
        F: FnOnce(&mut ConditionalOptions);

    /// Deletes the row with `entity`'s key. `false` when no row matched.
    fn delete(&self, entity: &T) -> UowResult<bool>;
}

/// SQLite-backed repository vended by `SqliteUnitOfWork::repository`.
///
/// Holds a weak handle: once the unit of work is disposed or dropped every
/// call fails with `UowError::Disposed`.
pub struct SqliteRepository<T> {
    session: Weak<Session>,
    cancel: Option<CancelSignal>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> SqliteRepository<T> {
    pub(crate) fn new(session: Weak<Session>) -> Self {
        Self {
            session,
            cancel: None,
            _entity: PhantomData,
        }
    }

    /// Same repository, with every call observing `signal`.
    ///
    /// Interrupting a read leaves the transaction intact and fails with
    /// `Cancelled`. Interrupting a write makes SQLite roll back the whole
    /// transaction; that fails with `TransactionRolledBack` and all
    /// uncommitted work is lost.
    pub fn with_cancel(&self, signal: &CancelSignal) -> Self {
        Self {
            session: Weak::clone(&self.session),
            cancel: Some(signal.clone()),
            _entity: PhantomData,
        }
    }

    fn run<R>(
        &self,
        timeout: Option<Duration>,
        op: impl FnOnce(&Connection, StatementBuilder, TransactionId) -> UowResult<R>,
    ) -> UowResult<R> {
        let session = self.session.upgrade().ok_or(UowError::Disposed)?;
        let builder = session.builder();
        session.run(self.cancel.as_ref(), timeout, |conn, current| {
            op(conn, builder, current)
        })
    }
}

impl<T> Clone for SqliteRepository<T> {
    fn clone(&self) -> Self {
        Self {
            session: Weak::clone(&self.session),
            cancel: self.cancel.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> for SqliteRepository<T> {
    fn execute(&self, sql: &str, params: &[Value], kind: CommandKind) -> UowResult<usize> {
        self.run(None, |conn, builder, _| {
            ops::execute(conn, builder, sql, params, kind)
        })
    }

    fn query(&self, sql: &str, params: &[Value], kind: CommandKind) -> UowResult<Vec<T>> {
        self.run(None, |conn, builder, _| {
            ops::query(conn, builder, sql, params, kind)
        })
    }

    fn query_scalar_int(
        &self,
        sql: &str,
        params: &[Value],
        kind: CommandKind,
    ) -> UowResult<Vec<i64>> {
        self.run(None, |conn, builder, _| {
            ops::query_scalar_int(conn, builder, sql, params, kind)
        })
    }

    fn insert(&self, entity: &mut T) -> UowResult<i64> {
        self.run(None, |conn, builder, _| ops::insert(conn, builder, entity))
    }

    fn get(&self, entity: &T) -> UowResult<Option<T>> {
        self.run(None, |conn, builder, _| ops::get(conn, builder, entity))
    }

    fn get_all(&self) -> UowResult<Vec<T>> {
        self.find(|_| {})
    }

    fn find<F>(&self, configure: F) -> UowResult<Vec<T>>
    where
        F: FnOnce(&mut SelectOptions),
    {
        let mut options = SelectOptions::default();
        configure(&mut options);
        self.run(options.timeout, |conn, builder, current| {
            options.attach_to_transaction(current);
            ops::find(conn, builder, current, &options)
        })
    }

    fn count<F>(&self, configure: F) -> UowResult<i64>
    where
        F: FnOnce(&mut ConditionalOptions),
    {
        let mut options = ConditionalOptions::default();
        configure(&mut options);
        self.run(options.timeout, |conn, builder, current| {
            options.attach_to_transaction(current);
            ops::count::<T>(conn, builder, current, &options)
        })
    }

    fn update(&self, entity: &mut T) -> UowResult<bool> {
        self.run(None, |conn, builder, _| ops::update(conn, builder, entity))
    }

    fn bulk_update<F>(&self, template: &T, configure: F) -> UowResult<usize>
    where
        F: FnOnce(&mut ConditionalOptions),
    {
        let mut options = ConditionalOptions::default();
        configure(&mut options);
        self.run(options.timeout, |conn, builder, current| {
            options.attach_to_transaction(current);
            ops::bulk_update(conn, builder, current, template, &options)
        })
    }

    fn delete(&self, entity: &T) -> UowResult<bool> {
        ops::ensure_deletable::<T>()?;
        self.run(None, |conn, builder, _| ops::delete(conn, builder, entity))
    }
}
