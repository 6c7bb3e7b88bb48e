use crate::compiler::traits::SqlDialect;

/// PostgreSQL strategy. The trait's default bodies are the Postgres
/// behavior, so this mostly carries configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect {
    /// Engine version as `major*10000 + minor*100 + patch`
    pub db_version: u32,
    /// Emit camelCased JSON field keys
    pub camelcase: bool,
}

impl PostgresDialect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn enable_camelcase(&self) -> bool {
        self.camelcase
    }
}
