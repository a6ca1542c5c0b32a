//! Cancellation and statement timeouts for in-flight round trips.
//!
//! # Invariants
//! - A signal that is already cancelled fails the operation before any SQL
//!   reaches the driver.
//! - The progress handler is removed when the guard drops, so it never leaks
//!   into the next operation.

use crate::error::UowError;
use rusqlite::{Connection, ErrorCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Virtual machine steps between two cancellation checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

/// Cloneable cancellation flag shared between a caller and its operations.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Installs a progress handler that interrupts the running statement once the
/// signal fires or the deadline passes.
pub(crate) struct InterruptGuard<'conn> {
    conn: &'conn Connection,
    installed: bool,
    cancel: Option<CancelSignal>,
    timeout: Option<Duration>,
}

impl<'conn> InterruptGuard<'conn> {
    pub(crate) fn install(
        conn: &'conn Connection,
        cancel: Option<&CancelSignal>,
        timeout: Option<Duration>,
    ) -> Result<Self, UowError> {
        if cancel.is_some_and(CancelSignal::is_cancelled) {
            return Err(UowError::Cancelled);
        }

        let installed = cancel.is_some() || timeout.is_some();
        if installed {
            let flag = cancel.map(|signal| Arc::clone(&signal.flag));
            let deadline = timeout.map(|timeout| Instant::now() + timeout);
            conn.progress_handler(
                PROGRESS_CHECK_OPS,
                Some(move || {
                    flag.as_ref()
                        .is_some_and(|flag| flag.load(Ordering::SeqCst))
                        || deadline.is_some_and(|deadline| Instant::now() >= deadline)
                }),
            );
        }

        Ok(Self {
            conn,
            installed,
            cancel: cancel.cloned(),
            timeout,
        })
    }

    /// Maps an interrupted statement to `Cancelled` or `Timeout`.
    pub(crate) fn classify(&self, err: UowError) -> UowError {
        if !is_interrupted(&err) {
            return err;
        }
        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return UowError::Cancelled;
        }
        match self.timeout {
            Some(timeout) => UowError::Timeout(timeout),
            None => err,
        }
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        if self.installed {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
    }
}

fn is_interrupted(err: &UowError) -> bool {
    matches!(
        err,
        UowError::Database(rusqlite::Error::SqliteFailure(failure, _))
            if failure.code == ErrorCode::OperationInterrupted
    )
}
