use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fully qualified warehouse table name (`database.schema.table`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TableName {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Resolve a configured name against the default database and schema.
    ///
    /// `table` is qualified with both defaults, `schema.table` with the
    /// default database, and a three-part name is taken as-is.
    pub fn resolve(name: &str, database: &str, schema: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = name.trim().split('.').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::InvalidTableName(name.to_string()));
        }
        match parts.as_slice() {
            [t] => Ok(Self::new(database, schema, t.trim())),
            [s, t] => Ok(Self::new(database, s.trim(), t.trim())),
            [d, s, t] => Ok(Self::new(d.trim(), s.trim(), t.trim())),
            _ => Err(ConfigError::InvalidTableName(name.to_string())),
        }
    }

    /// Quoted identifier for use in SQL text.
    pub fn quoted(&self) -> String {
        format!(
            "{}.{}.{}",
            quote_ident(&self.database),
            quote_ident(&self.schema),
            quote_ident(&self.table)
        )
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
