//! SQL dialect differences the statement builder cares about.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Sqlite,
    MsSql,
    PostgreSql,
    MySql,
}

impl SqlDialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MsSql => "mssql",
            Self::PostgreSql => "postgresql",
            Self::MySql => "mysql",
        }
    }

    /// Whether this build can open connections for the dialect.
    pub fn has_driver(self) -> bool {
        matches!(self, Self::Sqlite)
    }

    pub fn quote_ident(self, ident: &str) -> String {
        match self {
            Self::Sqlite | Self::PostgreSql => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::MsSql => format!("[{}]", ident.replace(']', "]]")),
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Sqlite | Self::MySql => "?".to_string(),
            Self::MsSql => format!("@p{index}"),
            Self::PostgreSql => format!("${index}"),
        }
    }

    /// Query returning the identity generated by the last insert on this
    /// connection. A null result means no identity was generated.
    pub fn last_identity_sql(self) -> &'static str {
        match self {
            Self::Sqlite => "SELECT last_insert_rowid()",
            Self::MsSql => "SELECT ISNULL(@@IDENTITY, 0)",
            Self::PostgreSql => "SELECT LASTVAL()",
            Self::MySql => "SELECT LAST_INSERT_ID()",
        }
    }

    /// Stored procedure invocation with `param_count` parameters.
    ///
    /// Returns `None` when the dialect has no stored procedures.
    pub fn procedure_call(self, name: &str, param_count: usize) -> Option<String> {
        let params = (1..=param_count)
            .map(|index| self.placeholder(index))
            .collect::<Vec<_>>()
            .join(", ");
        match self {
            Self::Sqlite => None,
            Self::MsSql if param_count == 0 => Some(format!("EXEC {name}")),
            Self::MsSql => Some(format!("EXEC {name} {params}")),
            Self::PostgreSql | Self::MySql => Some(format!("CALL {name}({params})")),
        }
    }

    /// Row-limiting suffix. SQL Server needs an `ORDER BY` in front of it.
    pub fn paging_clause(self, top: Option<u64>, skip: Option<u64>) -> Option<String> {
        match (self, top, skip) {
            (_, None, None) => None,
            (Self::MsSql, top, skip) => {
                let mut clause = format!("OFFSET {} ROWS", skip.unwrap_or(0));
                if let Some(top) = top {
                    clause.push_str(&format!(" FETCH NEXT {top} ROWS ONLY"));
                }
                Some(clause)
            }
            (_, Some(top), None) => Some(format!("LIMIT {top}")),
            (_, Some(top), Some(skip)) => Some(format!("LIMIT {top} OFFSET {skip}")),
            (Self::Sqlite, None, Some(skip)) => Some(format!("LIMIT -1 OFFSET {skip}")),
            (Self::MySql, None, Some(skip)) => {
                Some(format!("LIMIT 18446744073709551615 OFFSET {skip}"))
            }
            (Self::PostgreSql, None, Some(skip)) => Some(format!("OFFSET {skip}")),
        }
    }
}
