//! Snowflake-style analytics strategy.
//!
//! Extends the Postgres defaults: lateral composition and the same JSON
//! construction, but `?` positional binds, case-preserved identifiers, no
//! writable CTEs (linear scripts capture ids through the `_gj_ids` /
//! `_gj_prev_ids` transient tables), no JSON key-test operators and no
//! subscription batching.

use crate::compiler::context::Ctx;
use crate::compiler::mutation::{captured_as_list, dependent_src_cols, render_mutation_where};
use crate::compiler::traits::SqlDialect;
use crate::compiler::Param;
use crate::error::{CompileError, CompileResult};
use crate::qcode::{Column, ExpOp, Mutate, Select};

#[derive(Debug, Clone, Copy, Default)]
pub struct SnowflakeDialect {
    /// Engine version as `major*10000 + minor*100 + patch`
    pub db_version: u32,
    pub camelcase: bool,
}

impl SnowflakeDialect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SqlDialect for SnowflakeDialect {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn bind_var(&self, buf: &mut String, _ordinal: usize) {
        buf.push('?');
    }

    fn supports_named_params(&self) -> bool {
        false
    }

    fn enable_camelcase(&self) -> bool {
        self.camelcase
    }

    fn supports_writable_cte(&self) -> bool {
        false
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn supports_conflict_update(&self) -> bool {
        false
    }

    fn supports_subscription_batching(&self) -> bool {
        false
    }

    fn supports_linear_execution(&self) -> bool {
        true
    }

    fn render_op(&self, op: ExpOp) -> CompileResult<&'static str> {
        Ok(match op {
            ExpOp::Equals => "=",
            ExpOp::NotEquals => "!=",
            ExpOp::GreaterThan => ">",
            ExpOp::GreaterOrEquals => ">=",
            ExpOp::LesserThan => "<",
            ExpOp::LesserOrEquals => "<=",
            ExpOp::In => "IN",
            ExpOp::NotIn => "NOT IN",
            ExpOp::Like => "LIKE",
            ExpOp::NotLike => "NOT LIKE",
            ExpOp::ILike => "ILIKE",
            ExpOp::NotILike => "NOT ILIKE",
            ExpOp::Regex | ExpOp::IRegex => "RLIKE",
            other => {
                return Err(CompileError::UnsupportedOperator {
                    op: other.name(),
                    dialect: self.name(),
                });
            }
        })
    }

    fn render_cursor_cte(&self, ctx: &mut Ctx, sel: &Select) -> CompileResult<()> {
        let var = sel
            .paging
            .cursor_var
            .clone()
            .ok_or_else(|| CompileError::internal("cursor CTE without cursor variable"))?;
        let sep = self.cursor_sep();
        ctx.w("WITH ");
        ctx.w(&self.quote("__cur"));
        ctx.w(" AS (SELECT ");
        for (i, ob) in sel.order_by.iter().enumerate() {
            if i > 0 {
                ctx.w(", ");
            }
            ctx.w("NULLIF(SPLIT_PART(");
            ctx.add_param(self, Param::new(var.clone(), "text"));
            ctx.w(&format!(", '{}', {}), '') AS ", sep, i + 2));
            ctx.w(&self.quote(&ob.col.name));
        }
        ctx.w(") ");
        Ok(())
    }

    fn render_ts_query(
        &self,
        _ctx: &mut Ctx,
        _sel: &Select,
        _exp: &crate::qcode::Exp,
    ) -> CompileResult<()> {
        Err(CompileError::UnsupportedFeature {
            feature: "full-text search",
            dialect: self.name(),
        })
    }

    fn render_geo_op(
        &self,
        _ctx: &mut Ctx,
        _sel: &Select,
        _exp: &crate::qcode::Exp,
    ) -> CompileResult<()> {
        Err(CompileError::UnsupportedFeature {
            feature: "spatial predicates",
            dialect: self.name(),
        })
    }

    fn render_try_cast(&self, ctx: &mut Ctx, expr: &str, t: &str) {
        ctx.w(&format!("TRY_CAST({} AS {})", expr, self.cast_type(t)));
    }

    fn render_var(&self, ctx: &mut Ctx, name: &str) {
        // captured ids live in the session-scoped `_gj_ids` table
        ctx.w(&format!(
            "(SELECT {} FROM {} WHERE {} = '{}')",
            self.quote("id"),
            self.quote("_gj_ids"),
            self.quote("tag"),
            name
        ));
    }

    fn returning_id_filter(&self, _action_var: &str, m: &Mutate) -> crate::qcode::Exp {
        use crate::qcode::{Exp, Operand};
        Exp::binary(
            ExpOp::In,
            Operand::col(m.table.pk.clone()),
            Operand::DbVar(m.tag()),
        )
    }

    // ---- linear execution ----------------------------------------------

    fn render_setup(&self, ctx: &mut Ctx) {
        ctx.w("CREATE TEMPORARY TABLE IF NOT EXISTS ");
        ctx.w(&self.quote("_gj_ids"));
        ctx.w(" (");
        ctx.w(&self.quote("tag"));
        ctx.w(" TEXT, ");
        ctx.w(&self.quote("id"));
        ctx.w(" BIGINT, ");
        ctx.w(&self.quote("val"));
        ctx.w(" TEXT); DELETE FROM ");
        ctx.w(&self.quote("_gj_ids"));
        ctx.w("; ");
    }

    fn render_linear_insert(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        let table = self.quote(&m.table.name);
        let pk = self.quote(&m.table.pk.name);
        // snapshot existing keys so the delta after the insert is this
        // mutation's rows
        ctx.w("CREATE TEMPORARY TABLE ");
        ctx.w(&self.quote("_gj_prev_ids"));
        ctx.w(&format!(" AS SELECT {} FROM ", pk));
        ctx.w(&table);
        ctx.w("; INSERT INTO ");
        ctx.w(&table);
        ctx.w(" (");
        let mut first = true;
        for c in &m.cols {
            if !first {
                ctx.w(", ");
            }
            first = false;
            ctx.w(&self.quote(&c.col.name));
        }
        for rc in &m.rcols {
            if !first {
                ctx.w(", ");
            }
            first = false;
            ctx.w(&self.quote(&rc.col.name));
        }
        ctx.w(") SELECT ");
        let mut first = true;
        for c in &m.cols {
            if !first {
                ctx.w(", ");
            }
            first = false;
            match &c.value {
                Some(v) => ctx.w(v),
                None => {
                    ctx.w("CAST(");
                    ctx.col_with_table(self, "t", &c.field_name);
                    ctx.w(&format!(" AS {})", self.cast_type(&c.col.col_type)));
                }
            }
        }
        for rc in &m.rcols {
            if !first {
                ctx.w(", ");
            }
            first = false;
            let dep = ctx
                .qc
                .mutates
                .get(rc.mutate_id)
                .ok_or_else(|| CompileError::internal("unknown mutation dependency"))?;
            self.render_capture_read(ctx, dep, &rc.src_col, rc.col.is_array);
        }
        ctx.w(" FROM ");
        let action = ctx.action_var().to_string();
        if m.is_array {
            ctx.w("json_populate_recordset(NULL::");
        } else {
            ctx.w("json_populate_record(NULL::");
        }
        ctx.w(&table);
        ctx.w(", CAST(");
        ctx.add_param(self, Param::new(action, "json"));
        ctx.w(" AS json)");
        for seg in &m.path {
            ctx.w("->");
            ctx.squote(seg);
        }
        ctx.w(")");
        self.render_as_alias(ctx, "t");
        // delta capture
        ctx.w("; INSERT INTO ");
        ctx.w(&self.quote("_gj_ids"));
        ctx.w(" (");
        ctx.w(&self.quote("tag"));
        ctx.w(", ");
        ctx.w(&self.quote("id"));
        ctx.w(&format!(") SELECT '{}', {} FROM ", m.tag(), pk));
        ctx.w(&table);
        ctx.w(&format!(" WHERE {} NOT IN (SELECT {} FROM ", pk, pk));
        ctx.w(&self.quote("_gj_prev_ids"));
        ctx.w("); DROP TABLE ");
        ctx.w(&self.quote("_gj_prev_ids"));
        ctx.w("; ");
        Ok(())
    }

    fn render_linear_upsert(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        // no conflict-update primitive; an upsert is an insert whose rows
        // the caller de-duplicated upstream
        self.render_linear_insert(ctx, m)
    }

    fn render_linear_update(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        let table = self.quote(&m.table.name);
        let pk = self.quote(&m.table.pk.name);
        // capture the touched keys first, plus one stringified row per
        // column a dependent reads
        if let Some(w) = &m.where_ {
            let extras = dependent_src_cols(ctx.qc, m);
            ctx.w("INSERT INTO ");
            ctx.w(&self.quote("_gj_ids"));
            ctx.w(" (");
            ctx.w(&self.quote("tag"));
            ctx.w(", ");
            ctx.w(&self.quote("id"));
            ctx.w(&format!(") SELECT '{}', {} FROM ", m.tag(), pk));
            ctx.w(&table);
            ctx.w(" WHERE (");
            render_mutation_where(self, ctx, m, w)?;
            ctx.w("); ");
            for c in &extras {
                ctx.w("INSERT INTO ");
                ctx.w(&self.quote("_gj_ids"));
                ctx.w(" (");
                ctx.w(&self.quote("tag"));
                ctx.w(", ");
                ctx.w(&self.quote("val"));
                ctx.w(&format!(
                    ") SELECT '{}_{}', CAST({} AS text) FROM ",
                    m.tag(),
                    c.name,
                    self.quote(&c.name)
                ));
                ctx.w(&table);
                ctx.w(" WHERE (");
                render_mutation_where(self, ctx, m, w)?;
                ctx.w("); ");
            }
        }
        ctx.w("UPDATE ");
        ctx.w(&table);
        ctx.w(" SET ");
        let mut first = true;
        for c in &m.cols {
            if !first {
                ctx.w(", ");
            }
            first = false;
            ctx.w(&self.quote(&c.col.name));
            ctx.w(" = ");
            match &c.value {
                Some(v) => ctx.w(v),
                None => {
                    let action = ctx.action_var().to_string();
                    ctx.w("CAST(CAST(");
                    ctx.add_param(self, Param::new(action, "json"));
                    ctx.w(" AS json)");
                    for seg in &m.path {
                        ctx.w("->");
                        ctx.squote(seg);
                    }
                    ctx.w("->>");
                    ctx.squote(&c.field_name);
                    ctx.w(&format!(" AS {})", self.cast_type(&c.col.col_type)));
                }
            }
        }
        for rc in &m.rcols {
            if !first {
                ctx.w(", ");
            }
            first = false;
            ctx.w(&self.quote(&rc.col.name));
            ctx.w(" = ");
            let dep = ctx
                .qc
                .mutates
                .get(rc.mutate_id)
                .ok_or_else(|| CompileError::internal("unknown mutation dependency"))?;
            self.render_capture_read(ctx, dep, &rc.src_col, rc.col.is_array);
        }
        if let Some(w) = &m.where_ {
            ctx.w(" WHERE (");
            render_mutation_where(self, ctx, m, w)?;
            ctx.w(")");
        }
        ctx.w("; ");
        Ok(())
    }

    fn render_linear_delete(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        let table = self.quote(&m.table.name);
        let pk = self.quote(&m.table.pk.name);
        if let Some(w) = &m.where_ {
            ctx.w("INSERT INTO ");
            ctx.w(&self.quote("_gj_ids"));
            ctx.w(" (");
            ctx.w(&self.quote("tag"));
            ctx.w(", ");
            ctx.w(&self.quote("id"));
            ctx.w(&format!(") SELECT '{}', {} FROM ", m.tag(), pk));
            ctx.w(&table);
            ctx.w(" WHERE (");
            render_mutation_where(self, ctx, m, w)?;
            ctx.w("); ");
        }
        ctx.w("DELETE FROM ");
        ctx.w(&table);
        if let Some(w) = &m.where_ {
            ctx.w(" WHERE (");
            render_mutation_where(self, ctx, m, w)?;
            ctx.w(")");
        }
        ctx.w("; ");
        Ok(())
    }

    fn render_linear_connect(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        self.render_connect_inner(ctx, m, false)
    }

    fn render_linear_disconnect(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        self.render_connect_inner(ctx, m, true)
    }

    fn render_subscription_unbox(
        &self,
        _ctx: &mut Ctx,
        _params: &[Param],
        _inner: &str,
    ) -> CompileResult<()> {
        Err(CompileError::UnsupportedFeature {
            feature: "subscription batching",
            dialect: self.name(),
        })
    }
}

impl SnowflakeDialect {
    /// Read one captured value back out of `_gj_ids`: the `id` column for
    /// key captures, the stringified `val` column for any other captured
    /// column, and the first `id` row when a list capture feeds a scalar
    /// FK.
    fn render_capture_read(
        &self,
        ctx: &mut Ctx,
        dep: &Mutate,
        src_col: &Column,
        fk_is_array: bool,
    ) {
        let list = captured_as_list(ctx.qc, dep.id);
        if list && !fk_is_array {
            ctx.w(&format!(
                "(SELECT {} FROM {} WHERE {} = '{}' LIMIT 1)",
                self.quote("id"),
                self.quote("_gj_ids"),
                self.quote("tag"),
                dep.tag()
            ));
        } else if list || src_col.name == dep.table.pk.name {
            let tag = dep.tag();
            self.render_var(ctx, &tag);
        } else {
            ctx.w(&format!(
                "(SELECT CAST({} AS {}) FROM {} WHERE {} = '{}_{}')",
                self.quote("val"),
                self.cast_type(&src_col.col_type),
                self.quote("_gj_ids"),
                self.quote("tag"),
                dep.tag(),
                src_col.name
            ));
        }
    }

    fn render_connect_inner(
        &self,
        ctx: &mut Ctx,
        m: &Mutate,
        disconnect: bool,
    ) -> CompileResult<()> {
        let rel = m
            .rel
            .as_ref()
            .ok_or_else(|| CompileError::input("connect without a relationship"))?;
        let table = self.quote(&m.table.name);
        ctx.w("INSERT INTO ");
        ctx.w(&self.quote("_gj_ids"));
        ctx.w(" (");
        ctx.w(&self.quote("tag"));
        ctx.w(", ");
        ctx.w(&self.quote("id"));
        ctx.w(&format!(
            ") SELECT '{}', {} FROM ",
            m.tag(),
            self.quote(&rel.left.col.name)
        ));
        ctx.w(&table);
        if let Some(w) = &m.where_ {
            ctx.w(" WHERE (");
            render_mutation_where(self, ctx, m, w)?;
            ctx.w(")");
        }
        ctx.w("; UPDATE ");
        ctx.w(&table);
        ctx.w(" SET ");
        ctx.w(&self.quote(&rel.left.col.name));
        ctx.w(" = ");
        if disconnect {
            ctx.w("NULL");
        } else {
            let parent = m
                .parent
                .and_then(|p| ctx.qc.mutates.get(p))
                .ok_or_else(|| CompileError::input("connect without a parent mutation"))?;
            // a list-captured parent feeds a scalar FK its first row
            self.render_capture_read(ctx, parent, &parent.table.pk, rel.left.col.is_array);
        }
        if let Some(w) = &m.where_ {
            ctx.w(" WHERE (");
            render_mutation_where(self, ctx, m, w)?;
            ctx.w(")");
        }
        ctx.w("; ");
        Ok(())
    }
}
