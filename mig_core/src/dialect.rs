//! SQL dialect differences the engine has to care about.

use std::fmt;
use std::str::FromStr;

/// The SQL flavour spoken by a [`Database`](crate::Database).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL: `$1, $2, ...` placeholders.
    Postgres,
    /// MySQL and MariaDB: `?` placeholders.
    MySql,
}

/// Returned when a driver name does not map to a known [`Dialect`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown database driver `{0}`")]
pub struct DialectError(pub String);

impl Dialect {
    /// Returns the positional parameter token for the 1-based `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::MySql => "?".to_string(),
        }
    }

    /// Renders `count` comma separated placeholders starting at 1.
    pub fn placeholders(&self, count: usize) -> String {
        (1..=count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn timestamp_type(&self) -> &'static str {
        match self {
            Dialect::Postgres => "TIMESTAMPTZ",
            Dialect::MySql => "DATETIME(6)",
        }
    }
}

impl FromStr for Dialect {
    type Err = DialectError;

    fn from_str(driver: &str) -> Result<Self, Self::Err> {
        match driver.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pgx" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            _ => Err(DialectError(driver.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::MySql => write!(f, "mysql"),
        }
    }
}
