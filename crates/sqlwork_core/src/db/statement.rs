//! Statement builder: turns a `TableMap` plus an operation into SQL text and
//! positional parameters.
//!
//! # Invariants
//! - Identifiers are always quoted for the target dialect.
//! - Caller-supplied condition clauses are inserted verbatim; their
//!   placeholders must follow the dialect's style.

use crate::db::SqlDialect;
use crate::model::entity::TableMap;
use rusqlite::types::Value;

/// SQL text and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Caller-supplied `WHERE` clause (without the keyword) and its parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    pub clause: String,
    pub params: Vec<Value>,
}

impl Conditions {
    pub fn new(clause: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            clause: clause.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder {
    dialect: SqlDialect,
}

impl StatementBuilder {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn insert(&self, map: &TableMap, values: Vec<Value>) -> Statement {
        let columns = map.insert_columns();
        let placeholders = (1..=columns.len())
            .map(|index| self.dialect.placeholder(index))
            .collect::<Vec<_>>()
            .join(", ");
        Statement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.dialect.quote_ident(map.table),
                self.column_list(&columns),
                placeholders
            ),
            params: values,
        }
    }

    pub fn select_by_key(&self, map: &TableMap, key: Value) -> Statement {
        Statement {
            sql: format!(
                "SELECT {} FROM {} WHERE {} = {}",
                self.column_list(&map.select_columns()),
                self.dialect.quote_ident(map.table),
                self.dialect.quote_ident(map.key),
                self.dialect.placeholder(1)
            ),
            params: vec![key],
        }
    }

    pub fn select(
        &self,
        map: &TableMap,
        conditions: Option<&Conditions>,
        order_by: Option<&str>,
        top: Option<u64>,
        skip: Option<u64>,
    ) -> Statement {
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.column_list(&map.select_columns()),
            self.dialect.quote_ident(map.table)
        );
        let params = push_where(&mut sql, conditions);

        let paging = self.dialect.paging_clause(top, skip);
        match order_by {
            Some(order_by) => {
                sql.push_str(" ORDER BY ");
                sql.push_str(order_by);
            }
            None if paging.is_some() && self.dialect == SqlDialect::MsSql => {
                sql.push_str(" ORDER BY (SELECT NULL)");
            }
            None => {}
        }
        if let Some(paging) = paging {
            sql.push(' ');
            sql.push_str(&paging);
        }

        Statement { sql, params }
    }

    pub fn count(&self, map: &TableMap, conditions: Option<&Conditions>) -> Statement {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.dialect.quote_ident(map.table));
        let params = push_where(&mut sql, conditions);
        Statement { sql, params }
    }

    /// Full-record update: every non-key column is overwritten.
    pub fn update_by_key(&self, map: &TableMap, values: Vec<Value>, key: Value) -> Statement {
        let assignments = self.assignments(map, 0);
        let mut params = values;
        params.push(key);
        Statement {
            sql: format!(
                "UPDATE {} SET {} WHERE {} = {}",
                self.dialect.quote_ident(map.table),
                assignments,
                self.dialect.quote_ident(map.key),
                self.dialect.placeholder(map.columns.len() + 1)
            ),
            params,
        }
    }

    /// Set-based update of every non-key column on rows matching `conditions`.
    pub fn bulk_update(
        &self,
        map: &TableMap,
        values: Vec<Value>,
        conditions: Option<&Conditions>,
    ) -> Statement {
        let numbered = self.dialect.placeholder(1) != self.dialect.placeholder(2);
        let condition_params = conditions.map_or(0, |conditions| conditions.params.len());
        // Numbered placeholders in the caller's clause start at 1, so the SET
        // placeholders are numbered after them.
        let offset = if numbered { condition_params } else { 0 };

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.dialect.quote_ident(map.table),
            self.assignments(map, offset)
        );
        let where_params = push_where(&mut sql, conditions);

        let params = if numbered {
            where_params.into_iter().chain(values).collect()
        } else {
            values.into_iter().chain(where_params).collect()
        };
        Statement { sql, params }
    }

    pub fn delete_by_key(&self, map: &TableMap, key: Value) -> Statement {
        Statement {
            sql: format!(
                "DELETE FROM {} WHERE {} = {}",
                self.dialect.quote_ident(map.table),
                self.dialect.quote_ident(map.key),
                self.dialect.placeholder(1)
            ),
            params: vec![key],
        }
    }

    fn column_list(&self, columns: &[&str]) -> String {
        columns
            .iter()
            .map(|column| self.dialect.quote_ident(column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn assignments(&self, map: &TableMap, offset: usize) -> String {
        map.columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                format!(
                    "{} = {}",
                    self.dialect.quote_ident(column),
                    self.dialect.placeholder(offset + index + 1)
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn push_where(sql: &mut String, conditions: Option<&Conditions>) -> Vec<Value> {
    match conditions {
        Some(conditions) if !conditions.clause.trim().is_empty() => {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.clause);
            conditions.params.clone()
        }
        _ => Vec::new(),
    }
}
