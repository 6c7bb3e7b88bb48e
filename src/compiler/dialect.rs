use serde::{Deserialize, Serialize};

/// Supported SQL engines.
///
/// This is the caller-facing selector; each variant maps to a strategy
/// struct implementing [`super::SqlDialect`]. Use
/// [`super::compile_with`] directly to configure a strategy (engine
/// version, camel-cased field names) beyond the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    Postgres,
    MySQL,
    MariaDB,
    Oracle,
    Snowflake,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::Postgres
    }
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySQL => "mysql",
            Dialect::MariaDB => "mariadb",
            Dialect::Oracle => "oracle",
            Dialect::Snowflake => "snowflake",
        }
    }
}
