//! Blocking unit of work.

use crate::config::{ConnectionConfig, SqlConnectionConfiguration};
use crate::db::SqlDialect;
use crate::error::UowResult;
use crate::model::entity::Entity;
use crate::repo::SqliteRepository;
use crate::uow::session::Session;
use crate::uow::transaction::{ReleaseReason, TransactionId, UnitOfWorkState};
use std::sync::Arc;

/// Transaction boundary shared by every repository it vends.
pub trait UnitOfWork {
    /// Commits the live transaction and begins a new one.
    ///
    /// On failure the transaction is rolled back and the original error is
    /// returned; a new transaction is begun either way.
    fn commit(&self) -> UowResult<()>;

    /// Rolls back uncommitted work and releases the connection. Idempotent.
    fn dispose(&self);

    fn state(&self) -> UnitOfWorkState;

    /// `None` once disposed, or when the last renew failed.
    fn transaction_id(&self) -> Option<TransactionId>;
}

/// Unit of work over one SQLite connection.
///
/// Dropping an undisposed instance releases it and logs a warning; call
/// `dispose` to end its lifetime explicitly.
pub struct SqliteUnitOfWork {
    session: Arc<Session>,
}

impl SqliteUnitOfWork {
    /// Opens the connection and begins the first transaction.
    ///
    /// # Errors
    /// - `UowError::Configuration` for blank connection strings or dialects
    ///   without a driver. No connection is opened in that case.
    /// - `UowError::Database` when the driver fails to open or begin.
    pub fn open(config: impl Into<ConnectionConfig>) -> UowResult<Self> {
        let config = config.into();
        Ok(Self {
            session: Arc::new(Session::open(&config)?),
        })
    }

    /// Opens against a named connection string.
    pub fn open_named(settings: &SqlConnectionConfiguration, name: &str) -> UowResult<Self> {
        Self::open(settings.named(name)?)
    }

    /// Repository bound to this unit of work's live transaction.
    pub fn repository<T: Entity>(&self) -> SqliteRepository<T> {
        SqliteRepository::new(Arc::downgrade(&self.session))
    }

    pub fn dialect(&self) -> SqlDialect {
        self.session.dialect()
    }
}

impl UnitOfWork for SqliteUnitOfWork {
    fn commit(&self) -> UowResult<()> {
        self.session.commit().map(|_| ())
    }

    fn dispose(&self) {
        self.session.release(ReleaseReason::Disposed);
    }

    fn state(&self) -> UnitOfWorkState {
        self.session.state()
    }

    fn transaction_id(&self) -> Option<TransactionId> {
        self.session.transaction_id()
    }
}

impl Drop for SqliteUnitOfWork {
    fn drop(&mut self) {
        self.session.release(ReleaseReason::Dropped);
    }
}
