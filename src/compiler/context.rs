//! Emission buffer and parameter sink.

use crate::compiler::traits::SqlDialect;
use crate::compiler::{Compiled, CompileOpts, Param};
use crate::error::{CompileError, CompileResult};
use crate::qcode::{QCode, Select};

/// Linear text builder plus the ordered parameter vector for one compile.
///
/// Every write is observed in call order; the i-th [`Ctx::add_param`] call
/// corresponds to the i-th bind slot. One `Ctx` is mutated by one walker at
/// a time and never shared across compiles.
pub struct Ctx<'a> {
    pub(crate) buf: String,
    pub(crate) params: Vec<Param>,
    /// Bind ordinals continue from here (nested compiles of a larger script)
    pub(crate) ordinal_offset: usize,
    /// Subscription batching: parameters render as `"_sg_sub"` column
    /// references and are collected here instead of the bind vector
    pub(crate) sub_batch: bool,
    pub(crate) sub_params: Vec<Param>,
    /// Current scope for unqualified columns, when it is not the walked
    /// select's alias (mutation statements reference the raw table)
    pub(crate) alias_override: Option<String>,
    pub qc: &'a QCode,
    pub opts: &'a CompileOpts,
}

impl<'a> Ctx<'a> {
    pub fn new(qc: &'a QCode, opts: &'a CompileOpts) -> Self {
        Self {
            buf: String::with_capacity(1024),
            params: Vec::new(),
            ordinal_offset: 0,
            sub_batch: false,
            sub_params: Vec::new(),
            alias_override: None,
            qc,
            opts,
        }
    }

    /// Append verbatim.
    #[inline]
    pub fn w(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    /// Append a SQL single-quoted literal, doubling embedded quotes.
    pub fn squote(&mut self, s: &str) {
        self.buf.push('\'');
        self.buf.push_str(&s.replace('\'', "''"));
        self.buf.push('\'');
    }

    /// Append `<quoted table>.<quoted column>`.
    pub fn col_with_table<D: SqlDialect + ?Sized>(&mut self, d: &D, table: &str, col: &str) {
        self.buf.push_str(&d.quote(table));
        self.buf.push('.');
        self.buf.push_str(&d.quote(col));
    }

    /// Append the dialect's bind symbol for the next ordinal and record the
    /// parameter. In subscription-batching mode the parameter instead
    /// renders as a `"_sg_sub"` column reference and is collected aside.
    pub fn add_param<D: SqlDialect + ?Sized>(&mut self, d: &D, p: Param) {
        if self.sub_batch {
            let name = p.name.clone();
            if !self.sub_params.iter().any(|sp| sp.name == name) {
                self.sub_params.push(p);
            }
            self.col_with_table(d, "_sg_sub", &name);
            return;
        }
        let ordinal = self.ordinal_offset + self.params.len() + 1;
        d.bind_var(&mut self.buf, ordinal);
        self.params.push(p);
    }

    /// Number of parameters bound so far.
    pub fn params_len(&self) -> usize {
        self.params.len()
    }

    /// Read a config variable substituted as a literal.
    pub fn config_var(&self, name: &str) -> Option<&str> {
        self.opts.config_vars.get(name).map(|s| s.as_str())
    }

    /// Secure prefix prepended to cursor payloads.
    pub fn sec_prefix(&self) -> &str {
        &self.opts.sec_prefix
    }

    /// Effective action-input variable name for mutations.
    pub fn action_var(&self) -> &str {
        if !self.opts.action_var.is_empty() {
            &self.opts.action_var
        } else if !self.qc.action_var.is_empty() {
            &self.qc.action_var
        } else {
            "data"
        }
    }

    /// Select lookup; a miss is an internal invariant violation.
    pub fn child(&self, id: usize) -> CompileResult<&'a Select> {
        self.qc
            .select(id)
            .ok_or_else(|| CompileError::internal(format!("select {} not found", id)))
    }

    /// The root select that requested cursor pagination, if any.
    pub fn root_with_cursor(&self) -> Option<&'a Select> {
        self.qc.root_with_cursor()
    }

    pub fn finish(self) -> Compiled {
        Compiled {
            sql: self.buf,
            params: self.params,
        }
    }
}
