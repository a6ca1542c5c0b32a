#![allow(dead_code)]

use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use sqlwork_core::{AuditFields, Entity, KeyStrategy, TableMap};
use tempfile::TempDir;

pub const SCHEMA: &str = "
CREATE TABLE orders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    customer TEXT NOT NULL,
    total INTEGER NOT NULL CHECK (total >= 0),
    created_by TEXT NOT NULL,
    created TEXT NOT NULL,
    last_modified_by TEXT,
    last_modified TEXT
);
CREATE TABLE ledger (
    code TEXT PRIMARY KEY,
    memo TEXT NOT NULL,
    amount INTEGER NOT NULL
);
CREATE TABLE order_lines (
    id INTEGER PRIMARY KEY,
    order_id INTEGER NOT NULL REFERENCES orders(id) DEFERRABLE INITIALLY DEFERRED,
    sku TEXT NOT NULL
);
";

/// Auditable, deletable, database-generated key.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer: String,
    pub total: i64,
    pub audit: AuditFields,
}

impl Order {
    pub fn new(customer: &str, total: i64) -> Self {
        Self {
            id: 0,
            customer: customer.to_string(),
            total,
            audit: AuditFields::new("clerk-01"),
        }
    }
}

impl Entity for Order {
    type Key = i64;

    const TABLE: TableMap = TableMap {
        table: "orders",
        key: "id",
        columns: &[
            "customer",
            "total",
            "created_by",
            "created",
            "last_modified_by",
            "last_modified",
        ],
        key_strategy: KeyStrategy::Generated,
    };

    const DELETABLE: bool = true;

    fn id(&self) -> &i64 {
        &self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn column_values(&self) -> Vec<Value> {
        let mut values = vec![
            Value::Text(self.customer.clone()),
            Value::Integer(self.total),
        ];
        values.extend(self.audit.values());
        values
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            customer: row.get("customer")?,
            total: row.get("total")?,
            audit: AuditFields::from_row(row)?,
        })
    }

    fn audit(&self) -> Option<&AuditFields> {
        Some(&self.audit)
    }

    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        Some(&mut self.audit)
    }
}

/// Caller-assigned key, not deletable, not audited.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub code: String,
    pub memo: String,
    pub amount: i64,
}

impl LedgerEntry {
    pub fn new(code: &str, memo: &str, amount: i64) -> Self {
        Self {
            code: code.to_string(),
            memo: memo.to_string(),
            amount,
        }
    }
}

impl Entity for LedgerEntry {
    type Key = String;

    const TABLE: TableMap = TableMap {
        table: "ledger",
        key: "code",
        columns: &["memo", "amount"],
        key_strategy: KeyStrategy::Assigned,
    };

    fn id(&self) -> &String {
        &self.code
    }

    fn set_id(&mut self, id: String) {
        self.code = id;
    }

    fn column_values(&self) -> Vec<Value> {
        vec![Value::Text(self.memo.clone()), Value::Integer(self.amount)]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get("code")?,
            memo: row.get("memo")?,
            amount: row.get("amount")?,
        })
    }
}

/// References `orders` through a deferred foreign key, checked at commit.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub sku: String,
}

impl Entity for OrderLine {
    type Key = i64;

    const TABLE: TableMap = TableMap {
        table: "order_lines",
        key: "id",
        columns: &["order_id", "sku"],
        key_strategy: KeyStrategy::Generated,
    };

    fn id(&self) -> &i64 {
        &self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn column_values(&self) -> Vec<Value> {
        vec![Value::Integer(self.order_id), Value::Text(self.sku.clone())]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            order_id: row.get("order_id")?,
            sku: row.get("sku")?,
        })
    }
}

/// On-disk database with the test schema applied. Keep the `TempDir` alive
/// for the duration of the test.
pub fn schema_db() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sqlwork.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    (dir, path.to_str().unwrap().to_string())
}

/// Row count seen by an independent connection, i.e. committed rows only.
pub fn committed_rows(path: &str, table: &str) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

/// Never terminates on its own; only an interrupt stops it.
pub const RUNAWAY_CONDITION: &str = "(WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) SELECT count(*) FROM n) > 0";
