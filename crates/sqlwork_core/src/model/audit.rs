//! Audit fields embedded by auditable entities.
//!
//! # Invariants
//! - `created_at` is stamped once, by insert.
//! - `updated_at` stays `None` until the first update.
//! - Actor identities are caller supplied and at most 36 characters.

use crate::error::{UowError, UowResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Maximum length of `created_by` / `updated_by`.
pub const MAX_ACTOR_CHARS: usize = 36;

/// Persisted column names, in `AuditFields::values()` order.
pub const AUDIT_COLUMNS: [&str; 4] = ["created_by", "created", "last_modified_by", "last_modified"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AuditFields {
    pub fn new(created_by: impl Into<String>) -> Self {
        Self {
            created_by: created_by.into(),
            ..Self::default()
        }
    }

    /// Column values for `AUDIT_COLUMNS`.
    pub fn values(&self) -> [Value; 4] {
        [
            Value::Text(self.created_by.clone()),
            timestamp_value(&self.created_at),
            self.updated_by
                .as_ref()
                .map_or(Value::Null, |actor| Value::Text(actor.clone())),
            self.updated_at.as_ref().map_or(Value::Null, timestamp_value),
        ]
    }

    /// Reads `AUDIT_COLUMNS` from a row by name.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            created_by: row.get("created_by")?,
            created_at: row.get("created")?,
            updated_by: row.get("last_modified_by")?,
            updated_at: row.get("last_modified")?,
        })
    }

    /// # Errors
    /// - `UowError::Validation` when an actor exceeds `MAX_ACTOR_CHARS`.
    pub fn validate(&self) -> UowResult<()> {
        check_actor("created_by", &self.created_by)?;
        if let Some(actor) = &self.updated_by {
            check_actor("updated_by", actor)?;
        }
        Ok(())
    }

    pub(crate) fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
    }

    pub(crate) fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

fn check_actor(field: &str, actor: &str) -> UowResult<()> {
    let len = actor.chars().count();
    if len > MAX_ACTOR_CHARS {
        return Err(UowError::Validation(format!(
            "{field} is {len} characters; at most {MAX_ACTOR_CHARS} allowed"
        )));
    }
    Ok(())
}

// Same text layout rusqlite uses when binding `DateTime<Utc>`.
fn timestamp_value(value: &DateTime<Utc>) -> Value {
    Value::Text(value.format("%F %T%.f%:z").to_string())
}
