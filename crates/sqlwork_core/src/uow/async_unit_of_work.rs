//! Non-blocking unit of work. Same protocol as `SqliteUnitOfWork`; every
//! round trip runs on the tokio blocking pool.

use crate::config::{ConnectionConfig, SqlConnectionConfiguration};
use crate::db::SqlDialect;
use crate::error::{UowError, UowResult};
use crate::model::entity::Entity;
use crate::repo::SqliteAsyncRepository;
use crate::uow::session::{run_blocking, Session};
use crate::uow::transaction::{ReleaseReason, TransactionId, UnitOfWorkState};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait AsyncUnitOfWork: Send + Sync {
    async fn commit(&self) -> UowResult<()>;

    async fn dispose(&self);

    fn state(&self) -> UnitOfWorkState;

    fn transaction_id(&self) -> Option<TransactionId>;
}

/// Unit of work whose round trips run on the tokio blocking pool.
///
/// Prefer `dispose().await` over dropping. A drop inside a runtime hands the
/// rollback and close to the blocking pool and returns at once, so the
/// connection may still hold its write lock briefly after the drop. A drop
/// outside any runtime releases inline.
pub struct SqliteAsyncUnitOfWork {
    session: Arc<Session>,
}

impl SqliteAsyncUnitOfWork {
    pub async fn open(config: impl Into<ConnectionConfig>) -> UowResult<Self> {
        let config = config.into();
        // Validate on the caller's task so bad settings never reach the pool.
        config.validate()?;
        let session = tokio::task::spawn_blocking(move || Session::open(&config))
            .await
            .map_err(|err| UowError::Runtime(err.to_string()))??;
        Ok(Self {
            session: Arc::new(session),
        })
    }

    pub async fn open_named(settings: &SqlConnectionConfiguration, name: &str) -> UowResult<Self> {
        Self::open(settings.named(name)?).await
    }

    pub fn repository<T: Entity>(&self) -> SqliteAsyncRepository<T> {
        SqliteAsyncRepository::new(Arc::downgrade(&self.session))
    }

    pub fn dialect(&self) -> SqlDialect {
        self.session.dialect()
    }
}

#[async_trait]
impl AsyncUnitOfWork for SqliteAsyncUnitOfWork {
    async fn commit(&self) -> UowResult<()> {
        run_blocking(Arc::clone(&self.session), |session| session.commit().map(|_| ())).await
    }

    async fn dispose(&self) {
        let released = run_blocking(Arc::clone(&self.session), |session| {
            Ok(session.release(ReleaseReason::Disposed))
        })
        .await;
        if released.is_err() {
            // The blocking task never ran; release inline.
            self.session.release(ReleaseReason::Disposed);
        }
    }

    fn state(&self) -> UnitOfWorkState {
        self.session.state()
    }

    fn transaction_id(&self) -> Option<TransactionId> {
        self.session.transaction_id()
    }
}

impl Drop for SqliteAsyncUnitOfWork {
    fn drop(&mut self) {
        if self.session.state() == UnitOfWorkState::Disposed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let session = Arc::clone(&self.session);
                handle.spawn_blocking(move || {
                    session.release(ReleaseReason::Dropped);
                });
            }
            Err(_) => {
                self.session.release(ReleaseReason::Dropped);
            }
        }
    }
}
