//! Connection bootstrap for unit-of-work sessions.
//!
//! # Responsibility
//! - Open the single physical connection owned by a unit of work.
//! - Configure pragmas required by transactional behavior.
//!
//! # Invariants
//! - Configuration is validated before the driver is touched.
//! - Returned connections have `foreign_keys=ON` and are in autocommit mode.

use crate::config::ConnectionConfig;
use crate::error::UowResult;
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::time::Instant;

/// Opens and configures the connection described by `config`.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(config: &ConnectionConfig) -> UowResult<Connection> {
    config.validate()?;

    let started_at = Instant::now();
    let mode = connection_mode(&config.connection_string);
    info!("event=db_open module=db status=start mode={mode}");

    let conn = match open_raw(&config.connection_string) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
                started_at.elapsed().as_millis()
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&conn, config) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} dialect={} duration_ms={}",
                config.dialect.as_str(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err.into())
        }
    }
}

fn open_raw(connection_string: &str) -> rusqlite::Result<Connection> {
    let target = connection_string.trim();
    if target == ":memory:" {
        return Connection::open_in_memory();
    }
    if target.starts_with("file:") {
        return Connection::open_with_flags(
            target,
            OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI,
        );
    }
    Connection::open(target)
}

fn bootstrap_connection(conn: &Connection, config: &ConnectionConfig) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(config.busy_timeout())?;
    Ok(())
}

fn connection_mode(connection_string: &str) -> &'static str {
    match connection_string.trim() {
        ":memory:" => "memory",
        value if value.starts_with("file:") => "uri",
        _ => "file",
    }
}

#[cfg(test)]
mod tests {
    use super::open_connection;
    use crate::config::ConnectionConfig;
    use crate::error::UowError;

    #[test]
    fn opens_in_memory_with_foreign_keys() {
        let conn = open_connection(&ConnectionConfig::new(":memory:")).expect("open");
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .expect("pragma");
        assert_eq!(enabled, 1);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn blank_connection_string_opens_nothing() {
        let err = open_connection(&ConnectionConfig::new("  ")).expect_err("blank must fail");
        assert!(matches!(err, UowError::Configuration(_)));
    }

    #[test]
    fn opens_file_and_uri_targets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("open.db");
        let path_str = path.to_str().expect("utf-8 path");

        open_connection(&ConnectionConfig::new(path_str)).expect("file open");
        assert!(path.exists());

        let uri = format!("file:{path_str}?mode=rw");
        open_connection(&ConnectionConfig::new(uri)).expect("uri open");
    }
}
