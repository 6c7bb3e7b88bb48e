//! SQL compiler for resolved query plans.
//!
//! Turns a [`QCode`](crate::qcode::QCode) into one executable SQL artifact
//! (a single statement, or a `;`-separated script for linear mutations) plus
//! an ordered parameter vector. All engine divergence lives behind the
//! [`SqlDialect`] strategy trait.

pub mod context;
pub mod dialect;
pub mod mutation;
pub mod query;
pub mod split;
pub mod sql;
pub mod traits;

#[cfg(test)]
mod tests;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::qcode::{OpKind, QCode};

pub use context::Ctx;
pub use dialect::Dialect;
pub use split::split_query;
pub use traits::SqlDialect;

pub use sql::mariadb::MariaDbDialect;
pub use sql::mysql::MysqlDialect;
pub use sql::oracle::OracleDialect;
pub use sql::postgres::PostgresDialect;
pub use sql::snowflake::SnowflakeDialect;

/// One bind slot of a compiled statement. The i-th entry binds to the i-th
/// occurrence of the dialect's bind token in the SQL text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    /// Declared SQL type of the value
    pub ptype: String,
    #[serde(default)]
    pub is_array: bool,
    /// Caller must JSON-encode a scalar value into a one-element array
    #[serde(default)]
    pub wrap_in_array: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ptype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ptype: ptype.into(),
            is_array: false,
            wrap_in_array: false,
        }
    }
}

/// Compiler options supplied by the caller alongside the plan.
#[derive(Debug, Clone, Default)]
pub struct CompileOpts {
    /// Overrides the plan's action-input variable name when non-empty
    pub action_var: String,
    /// Opaque prefix prepended to emitted cursor payloads
    pub sec_prefix: String,
    /// Config variables substituted as literals during emission
    pub config_vars: IndexMap<String, String>,
}

/// The compiled artifact: SQL text plus ordered bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Compiled {
    /// Bind ordinals (0-based) grouped by parameter name, in first-seen
    /// order. Callers resolving repeated references against an argument map
    /// look duplicates up here.
    pub fn params_by_name(&self) -> IndexMap<&str, Vec<usize>> {
        let mut map: IndexMap<&str, Vec<usize>> = IndexMap::new();
        for (i, p) in self.params.iter().enumerate() {
            map.entry(p.name.as_str()).or_default().push(i);
        }
        map
    }
}

/// Compile a plan for the given engine with default dialect configuration.
pub fn compile(qc: &QCode, dialect: Dialect, opts: &CompileOpts) -> CompileResult<Compiled> {
    match dialect {
        Dialect::Postgres => compile_with(&PostgresDialect::default(), qc, opts),
        Dialect::MySQL => compile_with(&MysqlDialect::default(), qc, opts),
        Dialect::MariaDB => compile_with(&MariaDbDialect::default(), qc, opts),
        Dialect::Oracle => compile_with(&OracleDialect::default(), qc, opts),
        Dialect::Snowflake => compile_with(&SnowflakeDialect::default(), qc, opts),
    }
}

/// Compile a plan against a caller-configured dialect strategy.
pub fn compile_with<D: SqlDialect>(
    d: &D,
    qc: &QCode,
    opts: &CompileOpts,
) -> CompileResult<Compiled> {
    validate(qc)?;
    tracing::debug!(op = ?qc.op, dialect = d.name(), "compiling plan");

    let mut ctx = Ctx::new(qc, opts);
    match qc.op {
        OpKind::Query => query::compile_query(d, &mut ctx)?,
        OpKind::Subscription => query::compile_subscription(d, &mut ctx)?,
        OpKind::Mutation => mutation::compile_mutation(d, &mut ctx)?,
    }
    Ok(ctx.finish())
}

/// Structural plan checks done before any emission starts.
fn validate(qc: &QCode) -> CompileResult<()> {
    for (i, s) in qc.selects.iter().enumerate() {
        if s.id != i {
            return Err(CompileError::input(format!(
                "select id {} does not match its arena slot {}",
                s.id, i
            )));
        }
        if s.table.name.is_empty() {
            return Err(CompileError::input(format!(
                "select {} has no table name",
                s.id
            )));
        }
        if let Some(p) = s.parent {
            if p >= qc.selects.len() {
                return Err(CompileError::input(format!(
                    "select {} has unknown parent {}",
                    s.id, p
                )));
            }
        }
        for c in &s.children {
            if *c >= qc.selects.len() {
                return Err(CompileError::input(format!(
                    "select {} has unknown child {}",
                    s.id, c
                )));
            }
        }
        if s.parent.is_some() && s.rel.is_none() && s.typ == crate::qcode::SelectType::Regular {
            return Err(CompileError::input(format!(
                "select {} has a parent but no relationship",
                s.id
            )));
        }
    }
    for r in &qc.roots {
        if *r >= qc.selects.len() {
            return Err(CompileError::input(format!("unknown root select {}", r)));
        }
    }
    for (i, m) in qc.mutates.iter().enumerate() {
        if m.id != i {
            return Err(CompileError::input(format!(
                "mutation id {} does not match its arena slot {}",
                m.id, i
            )));
        }
        if m.table.pk.name.is_empty() {
            return Err(CompileError::input(format!(
                "mutation {} table '{}' has no primary column",
                m.id, m.table.name
            )));
        }
        for dep in &m.depends_on {
            if *dep >= qc.mutates.len() {
                return Err(CompileError::input(format!(
                    "mutation {} depends on unknown mutation {}",
                    m.id, dep
                )));
            }
        }
    }
    if qc.op == OpKind::Mutation && qc.mutates.is_empty() {
        return Err(CompileError::input("mutation plan has no mutations"));
    }
    Ok(())
}
