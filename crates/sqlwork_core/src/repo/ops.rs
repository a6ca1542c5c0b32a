//! Round trips shared by the blocking and non-blocking repositories.
//!
//! Every function runs against a connection whose live transaction has
//! already been resolved by the session.

use crate::db::{StatementBuilder, Statement};
use crate::error::{UowError, UowResult};
use crate::model::entity::{insert_values, Entity, EntityKey, KeyStrategy};
use crate::repo::options::{ensure_attached, CommandKind, ConditionalOptions, SelectOptions};
use crate::uow::TransactionId;
use chrono::Utc;
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::time::Instant;

pub(crate) fn execute(
    conn: &Connection,
    builder: StatementBuilder,
    sql: &str,
    params: &[Value],
    kind: CommandKind,
) -> UowResult<usize> {
    let started_at = Instant::now();
    let sql = resolve_command(builder, sql, params.len(), kind)?;
    let outcome = conn
        .execute(&sql, params_from_iter(params.iter()))
        .map_err(UowError::from);
    log_round_trip("execute", "-", started_at, &outcome);
    outcome
}

pub(crate) fn query<T: Entity>(
    conn: &Connection,
    builder: StatementBuilder,
    sql: &str,
    params: &[Value],
    kind: CommandKind,
) -> UowResult<Vec<T>> {
    let started_at = Instant::now();
    let sql = resolve_command(builder, sql, params.len(), kind)?;
    let outcome = load_rows(conn, &sql, params, |row| T::from_row(row));
    log_round_trip("query", T::TABLE.table, started_at, &outcome);
    outcome
}

pub(crate) fn query_scalar_int(
    conn: &Connection,
    builder: StatementBuilder,
    sql: &str,
    params: &[Value],
    kind: CommandKind,
) -> UowResult<Vec<i64>> {
    let started_at = Instant::now();
    let sql = resolve_command(builder, sql, params.len(), kind)?;
    let outcome = load_rows(conn, &sql, params, |row| row.get::<_, i64>(0));
    log_round_trip("query_scalar_int", "-", started_at, &outcome);
    outcome
}

/// Stamps `created_at`, inserts, and copies back the generated identity.
///
/// Returns `0` when the table generates no identity or the insert wrote no
/// row. `entity` is only modified when the insert succeeds.
pub(crate) fn insert<T: Entity>(
    conn: &Connection,
    builder: StatementBuilder,
    entity: &mut T,
) -> UowResult<i64> {
    let started_at = Instant::now();
    let mut record = entity.clone();
    if let Some(audit) = record.audit_mut() {
        audit.validate()?;
        audit.stamp_created(Utc::now());
    }

    let statement = builder.insert(&T::TABLE, insert_values(&record));
    let outcome = run_statement(conn, &statement).and_then(|inserted| {
        match (T::TABLE.key_strategy, inserted) {
            (KeyStrategy::Assigned, _) | (KeyStrategy::Generated, 0) => Ok(0),
            (KeyStrategy::Generated, _) => last_identity(conn, builder),
        }
    });

    if let Ok(identity) = &outcome {
        if *identity > 0 {
            match T::Key::from_generated(*identity) {
                Some(key) => record.set_id(key),
                None => warn!(
                    "event=repo_identity module=repo status=warn table={} identity={identity} reason=key_type_mismatch",
                    T::TABLE.table
                ),
            }
        }
        *entity = record;
    }

    log_round_trip("insert", T::TABLE.table, started_at, &outcome);
    outcome
}

pub(crate) fn get<T: Entity>(
    conn: &Connection,
    builder: StatementBuilder,
    entity: &T,
) -> UowResult<Option<T>> {
    let started_at = Instant::now();
    let statement = builder.select_by_key(&T::TABLE, entity.id().to_value());
    let outcome = load_rows(conn, &statement.sql, &statement.params, |row| T::from_row(row))
        .map(|rows| rows.into_iter().next());
    log_round_trip("get", T::TABLE.table, started_at, &outcome);
    outcome
}

pub(crate) fn find<T: Entity>(
    conn: &Connection,
    builder: StatementBuilder,
    current: TransactionId,
    options: &SelectOptions,
) -> UowResult<Vec<T>> {
    ensure_attached(options.transaction, current)?;
    let started_at = Instant::now();
    let statement = builder.select(
        &T::TABLE,
        options.conditions.as_ref(),
        options.order_by.as_deref(),
        options.top,
        options.skip,
    );
    let outcome = load_rows(conn, &statement.sql, &statement.params, |row| T::from_row(row));
    log_round_trip("find", T::TABLE.table, started_at, &outcome);
    outcome
}

pub(crate) fn count<T: Entity>(
    conn: &Connection,
    builder: StatementBuilder,
    current: TransactionId,
    options: &ConditionalOptions,
) -> UowResult<i64> {
    ensure_attached(options.transaction, current)?;
    let started_at = Instant::now();
    let statement = builder.count(&T::TABLE, options.conditions.as_ref());
    let outcome = conn
        .prepare_cached(&statement.sql)
        .and_then(|mut stmt| {
            stmt.query_row(params_from_iter(statement.params.iter()), |row| row.get(0))
        })
        .map_err(UowError::from);
    log_round_trip("count", T::TABLE.table, started_at, &outcome);
    outcome
}

/// Stamps `updated_at` and overwrites every non-key column by key.
///
/// Returns `false` when no row has the entity's key. `entity` is only
/// modified when the statement succeeds.
pub(crate) fn update<T: Entity>(
    conn: &Connection,
    builder: StatementBuilder,
    entity: &mut T,
) -> UowResult<bool> {
    let started_at = Instant::now();
    let mut record = entity.clone();
    if let Some(audit) = record.audit_mut() {
        audit.validate()?;
        audit.stamp_updated(Utc::now());
    }

    let statement =
        builder.update_by_key(&T::TABLE, record.column_values(), record.id().to_value());
    let outcome = run_statement(conn, &statement).map(|changed| changed > 0);
    if outcome.is_ok() {
        *entity = record;
    }
    log_round_trip("update", T::TABLE.table, started_at, &outcome);
    outcome
}

pub(crate) fn bulk_update<T: Entity>(
    conn: &Connection,
    builder: StatementBuilder,
    current: TransactionId,
    template: &T,
    options: &ConditionalOptions,
) -> UowResult<usize> {
    ensure_attached(options.transaction, current)?;
    let started_at = Instant::now();
    let statement = builder.bulk_update(
        &T::TABLE,
        template.column_values(),
        options.conditions.as_ref(),
    );
    let outcome = run_statement(conn, &statement);
    log_round_trip("bulk_update", T::TABLE.table, started_at, &outcome);
    outcome
}

pub(crate) fn delete<T: Entity>(
    conn: &Connection,
    builder: StatementBuilder,
    entity: &T,
) -> UowResult<bool> {
    ensure_deletable::<T>()?;
    let started_at = Instant::now();
    let statement = builder.delete_by_key(&T::TABLE, entity.id().to_value());
    let outcome = run_statement(conn, &statement).map(|changed| changed > 0);
    log_round_trip("delete", T::TABLE.table, started_at, &outcome);
    outcome
}

/// Type-level delete guard, evaluated on every call before any round trip.
pub(crate) fn ensure_deletable<T: Entity>() -> UowResult<()> {
    if T::DELETABLE {
        Ok(())
    } else {
        Err(UowError::unsupported::<T>("delete"))
    }
}

fn resolve_command(
    builder: StatementBuilder,
    sql: &str,
    param_count: usize,
    kind: CommandKind,
) -> UowResult<String> {
    match kind {
        CommandKind::Text => Ok(sql.to_string()),
        CommandKind::StoredProcedure => {
            let dialect = builder.dialect();
            dialect
                .procedure_call(sql.trim(), param_count)
                .ok_or(UowError::UnsupportedOperation {
                    entity: dialect.as_str(),
                    operation: "stored procedures",
                })
        }
    }
}

fn run_statement(conn: &Connection, statement: &Statement) -> UowResult<usize> {
    let mut stmt = conn.prepare_cached(&statement.sql)?;
    Ok(stmt.execute(params_from_iter(statement.params.iter()))?)
}

fn load_rows<R>(
    conn: &Connection,
    sql: &str,
    params: &[Value],
    map_row: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<R>,
) -> UowResult<Vec<R>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn last_identity(conn: &Connection, builder: StatementBuilder) -> UowResult<i64> {
    let identity = conn.query_row(builder.dialect().last_identity_sql(), [], |row| {
        row.get::<_, Option<i64>>(0)
    })?;
    Ok(identity.unwrap_or(0))
}

fn log_round_trip<R>(op: &str, table: &str, started_at: Instant, outcome: &UowResult<R>) {
    match outcome {
        Ok(_) => debug!(
            "event=repo_op module=repo status=ok op={op} table={table} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => debug!(
            "event=repo_op module=repo status=error op={op} table={table} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
}
