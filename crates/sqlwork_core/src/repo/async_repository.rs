//! Non-blocking repository. Mirrors `Repository`; statements run on the
//! tokio blocking pool against the owning unit of work's live transaction.

use crate::db::{CancelSignal, StatementBuilder};
use crate::error::{UowError, UowResult};
use crate::model::entity::Entity;
use crate::repo::ops;
use crate::repo::options::{CommandKind, ConditionalOptions, SelectOptions};
use crate::uow::session::{run_blocking, Session};
use crate::uow::TransactionId;
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::marker::PhantomData;
use std::sync::Weak;
use std::time::Duration;

#[async_trait]
pub trait AsyncRepository<T: Entity>: Send + Sync {
    async fn execute(&self, sql: &str, params: Vec<Value>, kind: CommandKind)
        -> UowResult<usize>;

    async fn query(&self, sql: &str, params: Vec<Value>, kind: CommandKind) -> UowResult<Vec<T>>;

    async fn query_scalar_int(
        &self,
        sql: &str,
        params: Vec<Value>,
        kind: CommandKind,
    ) -> UowResult<Vec<i64>>;

    async fn insert(&self, entity: &mut T) -> UowResult<i64>;

    async fn get(&self, entity: &T) -> UowResult<Option<T>>;

    async fn get_all(&self) -> UowResult<Vec<T>>;

    async fn find<F>(&self, configure: F) -> UowResult<Vec<T>>
    where
        F: FnOnce(&mut SelectOptions) + Send;

    async fn count<F>(&self, configure: F) -> UowResult<i64>
    where
        F: FnOnce(&mut ConditionalOptions) + Send;

    async fn update(&self, entity: &mut T) -> UowResult<bool>;

    async fn bulk_update<F>(&self, template: &T, configure: F) -> UowResult<usize>
    where
        F: FnOnce(&mut ConditionalOptions) + Send;

    async fn delete(&self, entity: &T) -> UowResult<bool>;
}

pub struct SqliteAsyncRepository<T> {
    session: Weak<Session>,
    cancel: Option<CancelSignal>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> SqliteAsyncRepository<T> {
    pub(crate) fn new(session: Weak<Session>) -> Self {
        Self {
            session,
            cancel: None,
            _entity: PhantomData,
        }
    }

    /// Same repository, with every call observing `signal`.
    ///
    /// Cancelling interrupts the statement in flight; the unit of work stays
    /// usable afterwards. An interrupted write rolls back the whole
    /// transaction and fails with `TransactionRolledBack`.
    pub fn with_cancel(&self, signal: &CancelSignal) -> Self {
        Self {
            session: Weak::clone(&self.session),
            cancel: Some(signal.clone()),
            _entity: PhantomData,
        }
    }

    async fn run<R, F>(&self, timeout: Option<Duration>, op: F) -> UowResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&Connection, StatementBuilder, TransactionId) -> UowResult<R> + Send + 'static,
    {
        let session = self.session.upgrade().ok_or(UowError::Disposed)?;
        let cancel = self.cancel.clone();
        run_blocking(session, move |session| {
            let builder = session.builder();
            session.run(cancel.as_ref(), timeout, |conn, current| {
                op(conn, builder, current)
            })
        })
        .await
    }
}

impl<T> Clone for SqliteAsyncRepository<T> {
    fn clone(&self) -> Self {
        Self {
            session: Weak::clone(&self.session),
            cancel: self.cancel.clone(),
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Entity> AsyncRepository<T> for SqliteAsyncRepository<T> {
    async fn execute(
        &self,
        sql: &str,
        params: Vec<Value>,
        kind: CommandKind,
    ) -> UowResult<usize> {
        let sql = sql.to_string();
        self.run(None, move |conn, builder, _| {
            ops::execute(conn, builder, &sql, &params, kind)
        })
        .await
    }

    async fn query(&self, sql: &str, params: Vec<Value>, kind: CommandKind) -> UowResult<Vec<T>> {
        let sql = sql.to_string();
        self.run(None, move |conn, builder, _| {
            ops::query(conn, builder, &sql, &params, kind)
        })
        .await
    }

    async fn query_scalar_int(
        &self,
        sql: &str,
        params: Vec<Value>,
        kind: CommandKind,
    ) -> UowResult<Vec<i64>> {
        let sql = sql.to_string();
        self.run(None, move |conn, builder, _| {
            ops::query_scalar_int(conn, builder, &sql, &params, kind)
        })
        .await
    }

    async fn insert(&self, entity: &mut T) -> UowResult<i64> {
        let mut record = entity.clone();
        let (record, identity) = self
            .run(None, move |conn, builder, _| {
                let identity = ops::insert(conn, builder, &mut record)?;
                Ok((record, identity))
            })
            .await?;
        *entity = record;
        Ok(identity)
    }

    async fn get(&self, entity: &T) -> UowResult<Option<T>> {
        let record = entity.clone();
        self.run(None, move |conn, builder, _| ops::get(conn, builder, &record))
            .await
    }

    async fn get_all(&self) -> UowResult<Vec<T>> {
        self.find(|_| {}).await
    }

    async fn find<F>(&self, configure: F) -> UowResult<Vec<T>>
    where
        F: FnOnce(&mut SelectOptions) + Send,
    {
        let mut options = SelectOptions::default();
        configure(&mut options);
        let timeout = options.timeout;
        self.run(timeout, move |conn, builder, current| {
            options.attach_to_transaction(current);
            ops::find(conn, builder, current, &options)
        })
        .await
    }

    async fn count<F>(&self, configure: F) -> UowResult<i64>
    where
        F: FnOnce(&mut ConditionalOptions) + Send,
    {
        let mut options = ConditionalOptions::default();
        configure(&mut options);
        let timeout = options.timeout;
        self.run(timeout, move |conn, builder, current| {
            options.attach_to_transaction(current);
            ops::count::<T>(conn, builder, current, &options)
        })
        .await
    }

    async fn update(&self, entity: &mut T) -> UowResult<bool> {
        let mut record = entity.clone();
        let (record, updated) = self
            .run(None, move |conn, builder, _| {
                let updated = ops::update(conn, builder, &mut record)?;
                Ok((record, updated))
            })
            .await?;
        *entity = record;
        Ok(updated)
    }

    async fn bulk_update<F>(&self, template: &T, configure: F) -> UowResult<usize>
    where
        F: FnOnce(&mut ConditionalOptions) + Send,
    {
        let mut options = ConditionalOptions::default();
        configure(&mut options);
        let timeout = options.timeout;
        let template = template.clone();
        self.run(timeout, move |conn, builder, current| {
            options.attach_to_transaction(current);
            ops::bulk_update(conn, builder, current, &template, &options)
        })
        .await
    }

    async fn delete(&self, entity: &T) -> UowResult<bool> {
        ops::ensure_deletable::<T>()?;
        let record = entity.clone();
        self.run(None, move |conn, builder, _| {
            ops::delete(conn, builder, &record)
        })
        .await
    }
}
