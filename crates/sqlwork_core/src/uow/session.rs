//! Shared session cell: the connection, the live transaction, and the
//! commit/renew/release protocol.
//!
//! # Responsibility
//! - Own the single connection of a unit of work.
//! - Serialize every round trip in issuance order.
//! - Keep exactly one live transaction between commits.
//!
//! # Invariants
//! - After `commit` returns, successfully or not, a new transaction is live
//!   unless beginning it failed.
//! - `release` runs at most once; later calls are no-ops.
//! - Repositories read the live transaction through this cell, never a copy.

use crate::config::ConnectionConfig;
use crate::db::{open_connection, CancelSignal, InterruptGuard, SqlDialect, StatementBuilder};
use crate::error::{UowError, UowResult};
use crate::uow::transaction::{ReleaseReason, TransactionId, UnitOfWorkState};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const NO_TRANSACTION: u64 = 0;

pub(crate) struct Session {
    state: Mutex<SessionState>,
    builder: StatementBuilder,
    // Lock-free mirrors of `state` for status reads.
    current: AtomicU64,
    disposed: AtomicBool,
}

struct SessionState {
    conn: Option<Connection>,
    transaction: Option<TransactionId>,
    last_id: u64,
}

impl Session {
    /// Opens the connection and begins the first transaction.
    pub(crate) fn open(config: &ConnectionConfig) -> UowResult<Self> {
        let conn = open_connection(config)?;
        let mut last_id = 0;
        let transaction = begin(&conn, &mut last_id)?;
        info!(
            "event=uow_open module=uow status=ok dialect={} transaction={transaction}",
            config.dialect.as_str()
        );

        Ok(Self {
            state: Mutex::new(SessionState {
                conn: Some(conn),
                transaction: Some(transaction),
                last_id,
            }),
            builder: StatementBuilder::new(config.dialect),
            current: AtomicU64::new(transaction.get()),
            disposed: AtomicBool::new(false),
        })
    }

    pub(crate) fn builder(&self) -> StatementBuilder {
        self.builder
    }

    pub(crate) fn dialect(&self) -> SqlDialect {
        self.builder.dialect()
    }

    pub(crate) fn state(&self) -> UnitOfWorkState {
        if self.disposed.load(Ordering::SeqCst) {
            UnitOfWorkState::Disposed
        } else {
            UnitOfWorkState::Active
        }
    }

    pub(crate) fn transaction_id(&self) -> Option<TransactionId> {
        match self.current.load(Ordering::SeqCst) {
            NO_TRANSACTION => None,
            value => Some(TransactionId::new(value)),
        }
    }

    /// Runs `op` against the live transaction.
    ///
    /// The transaction is resolved here, at call time. If the engine ended the
    /// transaction on its own while `op` ran (interrupted write, raw `COMMIT`),
    /// a fresh one is begun before returning.
    ///
    /// # Errors
    /// - `UowError::TransactionRolledBack` wrapping the failure when `op`
    ///   failed and the engine rolled the transaction back with it.
    pub(crate) fn run<R>(
        &self,
        cancel: Option<&CancelSignal>,
        timeout: Option<Duration>,
        op: impl FnOnce(&Connection, TransactionId) -> UowResult<R>,
    ) -> UowResult<R> {
        let mut guard = self.state.lock();
        let SessionState {
            conn,
            transaction,
            last_id,
        } = &mut *guard;
        let conn = conn.as_ref().ok_or(UowError::Disposed)?;
        let current = (*transaction).ok_or(UowError::NoActiveTransaction)?;

        let outcome = {
            let interrupt = InterruptGuard::install(conn, cancel, timeout)?;
            op(conn, current).map_err(|err| interrupt.classify(err))
        };

        if !conn.is_autocommit() {
            return outcome;
        }

        warn!(
            "event=tx_lost module=uow status=warn transaction={current} after_error={}",
            outcome.is_err()
        );
        *transaction = None;
        match begin(conn, last_id) {
            Ok(renewed) => *transaction = Some(renewed),
            Err(err) => {
                error!("event=tx_renew module=uow status=error error_code=tx_begin_failed error={err}")
            }
        }
        self.publish(*transaction);

        // A failed round trip that ended the transaction took earlier work with it.
        outcome.map_err(|cause| UowError::TransactionRolledBack {
            cause: Box::new(cause),
        })
    }

    /// Commits the live transaction, rolling back on failure, then always
    /// begins a new one on the same connection.
    ///
    /// # Errors
    /// - `UowError::Commit` with the original driver error when commit fails.
    /// - `UowError::Database` when only the renew step fails.
    pub(crate) fn commit(&self) -> UowResult<TransactionId> {
        let mut guard = self.state.lock();
        let SessionState {
            conn,
            transaction,
            last_id,
        } = &mut *guard;
        let conn = conn.as_ref().ok_or(UowError::Disposed)?;

        let started_at = Instant::now();
        let live = transaction.take();
        let committing = live.map_or_else(|| "none".to_string(), |id| id.to_string());

        // No live transaction means the last renew failed; only retry the renew.
        let outcome = match live {
            Some(_) => conn.execute_batch("COMMIT"),
            None => Ok(()),
        };
        match &outcome {
            Ok(()) => info!(
                "event=tx_commit module=uow status=ok transaction={committing} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => {
                error!(
                    "event=tx_commit module=uow status=error transaction={committing} duration_ms={} error_code=tx_commit_failed error={err}",
                    started_at.elapsed().as_millis()
                );
                if !conn.is_autocommit() {
                    match conn.execute_batch("ROLLBACK") {
                        Ok(()) => warn!(
                            "event=tx_rollback module=uow status=ok transaction={committing} reason=commit_failed"
                        ),
                        Err(rollback_err) => error!(
                            "event=tx_rollback module=uow status=error transaction={committing} error={rollback_err}"
                        ),
                    }
                }
            }
        }

        let renewed = begin(conn, last_id);
        if let Err(err) = &renewed {
            error!("event=tx_renew module=uow status=error error_code=tx_begin_failed error={err}");
        }
        *transaction = renewed.as_ref().ok().copied();
        self.publish(*transaction);

        match (outcome, renewed) {
            (Err(err), _) => Err(UowError::Commit(err)),
            (Ok(()), Ok(renewed)) => Ok(renewed),
            (Ok(()), Err(err)) => Err(err.into()),
        }
    }

    /// Rolls back the live transaction and closes the connection.
    ///
    /// Best effort: teardown failures are logged, never returned. Returns
    /// `false` when the session was already released.
    pub(crate) fn release(&self, reason: ReleaseReason) -> bool {
        let mut guard = self.state.lock();
        let Some(conn) = guard.conn.take() else {
            return false;
        };
        let transaction = guard
            .transaction
            .take()
            .map_or_else(|| "none".to_string(), |id| id.to_string());
        self.disposed.store(true, Ordering::SeqCst);
        self.publish(None);

        if reason == ReleaseReason::Dropped {
            warn!(
                "event=uow_dispose module=uow status=warn reason={} transaction={transaction}",
                reason.as_str()
            );
        }

        if !conn.is_autocommit() {
            match conn.execute_batch("ROLLBACK") {
                Ok(()) => debug!(
                    "event=tx_rollback module=uow status=ok transaction={transaction} reason={}",
                    reason.as_str()
                ),
                Err(err) => warn!(
                    "event=tx_rollback module=uow status=error transaction={transaction} error={err}"
                ),
            }
        }

        if let Err((_conn, err)) = conn.close() {
            warn!("event=db_close module=db status=error error={err}");
        }

        info!(
            "event=uow_dispose module=uow status=ok reason={}",
            reason.as_str()
        );
        true
    }

    fn publish(&self, transaction: Option<TransactionId>) {
        self.current.store(
            transaction.map_or(NO_TRANSACTION, TransactionId::get),
            Ordering::SeqCst,
        );
    }
}

fn begin(conn: &Connection, last_id: &mut u64) -> rusqlite::Result<TransactionId> {
    conn.execute_batch("BEGIN DEFERRED")?;
    *last_id += 1;
    let transaction = TransactionId::new(*last_id);
    debug!("event=tx_begin module=uow status=ok transaction={transaction}");
    Ok(transaction)
}

/// Runs `op` on the blocking pool so async callers never block a worker.
pub(crate) async fn run_blocking<R, F>(session: Arc<Session>, op: F) -> UowResult<R>
where
    R: Send + 'static,
    F: FnOnce(&Session) -> UowResult<R> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&session))
        .await
        .map_err(|err| UowError::Runtime(err.to_string()))?
}
