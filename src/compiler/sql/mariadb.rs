//! MariaDB strategy.
//!
//! Shares the MySQL surface (quoting, JSON functions, linear scripts with
//! `LAST_INSERT_ID()` capture) through the mysql module's emission helpers,
//! but composes children inline: no LATERAL, correlated subqueries with the
//! `_gj_t` derived table, and every nested JSON value re-promoted through
//! `JSON_QUERY(.., '$')` because JSON travels as LOB strings.

use crate::compiler::context::Ctx;
use crate::compiler::sql::mysql::{self, MysqlDialect};
use crate::compiler::traits::SqlDialect;
use crate::compiler::Param;
use crate::error::CompileResult;
use crate::qcode::{Column, Exp, ExpOp, Mutate, OrderDir, Select};

/// First version with `INSERT ... RETURNING`.
const RETURNING_VERSION: u32 = 100500;

#[derive(Debug, Clone, Copy)]
pub struct MariaDbDialect {
    pub base: MysqlDialect,
    /// Engine version as `major*10000 + minor*100 + patch`
    pub db_version: u32,
}

impl Default for MariaDbDialect {
    fn default() -> Self {
        Self {
            base: MysqlDialect::default(),
            db_version: RETURNING_VERSION,
        }
    }
}

impl MariaDbDialect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(db_version: u32) -> Self {
        Self {
            base: MysqlDialect::default(),
            db_version,
        }
    }
}

impl SqlDialect for MariaDbDialect {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    fn quote(&self, ident: &str) -> String {
        self.base.quote(ident)
    }

    fn bind_var(&self, buf: &mut String, ordinal: usize) {
        self.base.bind_var(buf, ordinal);
    }

    fn supports_named_params(&self) -> bool {
        false
    }

    fn enable_camelcase(&self) -> bool {
        self.base.camelcase
    }

    fn supports_lateral(&self) -> bool {
        false
    }

    fn supports_returning(&self) -> bool {
        self.db_version >= RETURNING_VERSION
    }

    fn supports_writable_cte(&self) -> bool {
        false
    }

    fn supports_subscription_batching(&self) -> bool {
        false
    }

    fn supports_linear_execution(&self) -> bool {
        true
    }

    fn wrap_recursive_select(&self) -> bool {
        true
    }

    fn requires_json_as_string(&self) -> bool {
        true
    }

    fn requires_json_query_wrapper(&self) -> bool {
        true
    }

    fn json_obj_open(&self) -> &'static str {
        self.base.json_obj_open()
    }

    fn json_agg_open(&self) -> &'static str {
        self.base.json_agg_open()
    }

    fn render_limit(&self, ctx: &mut Ctx, sel: &Select) {
        mysql::render_limit(self, ctx, sel);
    }

    fn render_order_term(&self, ctx: &mut Ctx, expr: &str, dir: OrderDir) {
        mysql::render_order_term(self, ctx, expr, dir);
    }

    fn render_array_position(&self, ctx: &mut Ctx, var: &str, col_expr: &str) {
        mysql::render_array_position(self, ctx, var, col_expr);
    }

    fn render_distinct_on(&self, ctx: &mut Ctx, _sel: &Select) {
        ctx.w("DISTINCT ");
    }

    fn render_cursor_cte(&self, ctx: &mut Ctx, sel: &Select) -> CompileResult<()> {
        mysql::render_cursor_cte(self, ctx, sel)
    }

    fn render_op(&self, op: ExpOp) -> CompileResult<&'static str> {
        mysql::render_op(self, op)
    }

    fn render_exp_special(&self, ctx: &mut Ctx, sel: &Select, exp: &Exp) -> CompileResult<bool> {
        mysql::render_exp_special(self, ctx, sel, exp)
    }

    fn render_json_path(
        &self,
        ctx: &mut Ctx,
        tref: &str,
        col: &Column,
        path: &[String],
        as_text: bool,
    ) {
        mysql::render_json_path(self, ctx, tref, col, path, as_text);
    }

    fn render_ts_query(&self, ctx: &mut Ctx, sel: &Select, exp: &Exp) -> CompileResult<()> {
        mysql::render_ts_query(self, ctx, sel, exp)
    }

    fn render_rel_array_cond(&self, ctx: &mut Ctx, left: &str, right: &str, _json: bool) {
        ctx.w(&format!("JSON_CONTAINS({}, CAST({} AS JSON))", right, left));
    }

    fn cast_type(&self, t: &str) -> String {
        mysql::cast_type(t)
    }

    fn json_table_type(&self, t: &str) -> String {
        mysql::json_table_type(t)
    }

    fn render_json_virtual_table(
        &self,
        ctx: &mut Ctx,
        sel: &Select,
        parent_ref: &str,
        payload: &Column,
    ) {
        mysql::render_json_virtual_table(self, ctx, sel, parent_ref, payload);
    }

    fn render_json_pk_select(&self, ctx: &mut Ctx, action_var: &str, key: &str, ctype: &str) {
        mysql::render_json_pk_select(self, ctx, action_var, key, ctype);
    }

    fn render_setup(&self, ctx: &mut Ctx) {
        ctx.w("SET SESSION sql_mode = CONCAT(@@sql_mode, ',ANSI_QUOTES'); ");
    }

    fn render_linear_insert(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        mysql::render_linear_insert(self, ctx, m, false)
    }

    fn render_linear_upsert(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        mysql::render_linear_insert(self, ctx, m, true)
    }

    fn render_linear_update(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        mysql::render_linear_update(self, ctx, m)
    }

    fn render_linear_delete(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        mysql::render_linear_delete(self, ctx, m)
    }

    fn render_linear_connect(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        mysql::render_linear_connect(self, ctx, m, false)
    }

    fn render_linear_disconnect(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        mysql::render_linear_connect(self, ctx, m, true)
    }

    fn render_subscription_unbox(
        &self,
        _ctx: &mut Ctx,
        _params: &[Param],
        _inner: &str,
    ) -> CompileResult<()> {
        Err(crate::error::CompileError::UnsupportedFeature {
            feature: "subscription batching",
            dialect: self.name(),
        })
    }
}
