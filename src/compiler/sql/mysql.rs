//! MySQL strategy.
//!
//! Lateral composition with native JSON construction, `?` binds, linear
//! mutation scripts with `LAST_INSERT_ID()` capture in user variables.
//! The emission helpers are free functions generic over the dialect so
//! MariaDB reuses them with its own quoting, separators and flags.

use crate::compiler::context::Ctx;
use crate::compiler::mutation::{
    capture_name, captured_as_list, dependent_src_cols, payload_path, render_mutation_where,
};
use crate::compiler::query::exp as qexp;
use crate::compiler::traits::SqlDialect;
use crate::compiler::Param;
use crate::error::{CompileError, CompileResult};
use crate::qcode::{Column, Exp, ExpOp, Mutate, Operand, OrderDir, Select};

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect {
    /// Engine version as `major*10000 + minor*100 + patch`
    pub db_version: u32,
    pub camelcase: bool,
}

impl MysqlDialect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SqlDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
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

    fn supports_returning(&self) -> bool {
        false
    }

    fn supports_writable_cte(&self) -> bool {
        false
    }

    fn supports_linear_execution(&self) -> bool {
        true
    }

    fn wrap_recursive_select(&self) -> bool {
        true
    }

    fn json_obj_open(&self) -> &'static str {
        "JSON_OBJECT("
    }

    fn json_agg_open(&self) -> &'static str {
        "COALESCE(JSON_ARRAYAGG("
    }

    fn render_limit(&self, ctx: &mut Ctx, sel: &Select) {
        render_limit(self, ctx, sel);
    }

    fn render_order_term(&self, ctx: &mut Ctx, expr: &str, dir: OrderDir) {
        render_order_term(self, ctx, expr, dir);
    }

    fn render_array_position(&self, ctx: &mut Ctx, var: &str, col_expr: &str) {
        render_array_position(self, ctx, var, col_expr);
    }

    fn render_distinct_on(&self, ctx: &mut Ctx, _sel: &Select) {
        ctx.w("DISTINCT ");
    }

    fn render_cursor_cte(&self, ctx: &mut Ctx, sel: &Select) -> CompileResult<()> {
        render_cursor_cte(self, ctx, sel)
    }

    fn render_op(&self, op: ExpOp) -> CompileResult<&'static str> {
        render_op(self, op)
    }

    fn render_exp_special(&self, ctx: &mut Ctx, sel: &Select, exp: &Exp) -> CompileResult<bool> {
        render_exp_special(self, ctx, sel, exp)
    }

    fn render_json_path(
        &self,
        ctx: &mut Ctx,
        tref: &str,
        col: &Column,
        path: &[String],
        as_text: bool,
    ) {
        render_json_path(self, ctx, tref, col, path, as_text);
    }

    fn render_ts_query(&self, ctx: &mut Ctx, sel: &Select, exp: &Exp) -> CompileResult<()> {
        render_ts_query(self, ctx, sel, exp)
    }

    fn render_rel_array_cond(&self, ctx: &mut Ctx, left: &str, right: &str, _json: bool) {
        ctx.w(&format!("JSON_CONTAINS({}, CAST({} AS JSON))", right, left));
    }

    fn cast_type(&self, t: &str) -> String {
        cast_type(t)
    }

    fn json_table_type(&self, t: &str) -> String {
        json_table_type(t)
    }

    fn render_json_virtual_table(
        &self,
        ctx: &mut Ctx,
        sel: &Select,
        parent_ref: &str,
        payload: &Column,
    ) {
        render_json_virtual_table(self, ctx, sel, parent_ref, payload);
    }

    fn render_json_pk_select(&self, ctx: &mut Ctx, action_var: &str, key: &str, ctype: &str) {
        render_json_pk_select(self, ctx, action_var, key, ctype);
    }

    fn render_setup(&self, ctx: &mut Ctx) {
        ctx.w("SET SESSION sql_mode = CONCAT(@@sql_mode, ',ANSI_QUOTES'); ");
    }

    fn render_linear_insert(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        render_linear_insert(self, ctx, m, false)
    }

    fn render_linear_upsert(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        render_linear_insert(self, ctx, m, true)
    }

    fn render_linear_update(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        render_linear_update(self, ctx, m)
    }

    fn render_linear_delete(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        render_linear_delete(self, ctx, m)
    }

    fn render_linear_connect(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        render_linear_connect(self, ctx, m, false)
    }

    fn render_linear_disconnect(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        render_linear_connect(self, ctx, m, true)
    }

    fn render_subscription_unbox(
        &self,
        ctx: &mut Ctx,
        params: &[Param],
        inner: &str,
    ) -> CompileResult<()> {
        render_subscription_unbox(self, ctx, params, inner)
    }
}

// ---- shared emission helpers (also used by MariaDB) ------------------------

pub(crate) fn render_limit<D: SqlDialect + ?Sized>(d: &D, ctx: &mut Ctx, sel: &Select) {
    const MAX_LIMIT: &str = "18446744073709551610";
    let p = &sel.paging;
    if sel.singular {
        ctx.w(" LIMIT 1");
    } else if let Some(var) = &p.limit_var {
        ctx.w(" LIMIT ");
        ctx.add_param(d, Param::new(var.clone(), "integer"));
    } else if let Some(n) = p.limit {
        ctx.w(&format!(" LIMIT {}", n));
    } else if p.no_limit || p.offset.is_some() || p.offset_var.is_some() {
        // OFFSET needs a LIMIT here, so the maximum stands in
        ctx.w(" LIMIT ");
        ctx.w(MAX_LIMIT);
    }
    if let Some(var) = &p.offset_var {
        ctx.w(" OFFSET ");
        ctx.add_param(d, Param::new(var.clone(), "integer"));
    } else if let Some(n) = p.offset {
        ctx.w(&format!(" OFFSET {}", n));
    }
}

pub(crate) fn render_order_term<D: SqlDialect + ?Sized>(
    _d: &D,
    ctx: &mut Ctx,
    expr: &str,
    dir: OrderDir,
) {
    // NULLs sort first ascending and last descending, so only the two
    // opposite placements need the ISNULL() prefix
    match dir {
        OrderDir::Asc | OrderDir::AscNullsFirst => {
            ctx.w(expr);
            ctx.w(" ASC");
        }
        OrderDir::Desc | OrderDir::DescNullsLast => {
            ctx.w(expr);
            ctx.w(" DESC");
        }
        OrderDir::AscNullsLast => {
            ctx.w(&format!("ISNULL({}), {} ASC", expr, expr));
        }
        OrderDir::DescNullsFirst => {
            ctx.w(&format!("ISNULL({}) DESC, {} DESC", expr, expr));
        }
    }
}

pub(crate) fn render_array_position<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    var: &str,
    col_expr: &str,
) {
    ctx.w("JSON_UNQUOTE(JSON_SEARCH(");
    let mut p = Param::new(var, "json");
    p.is_array = true;
    ctx.add_param(d, p);
    ctx.w(&format!(", 'one', CAST({} AS CHAR)))", col_expr));
}

pub(crate) fn render_cursor_cte<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    let var = sel
        .paging
        .cursor_var
        .clone()
        .ok_or_else(|| CompileError::internal("cursor CTE without cursor variable"))?;
    let sep = d.cursor_sep();
    ctx.w("WITH ");
    ctx.w(&d.quote("__cur"));
    ctx.w(" AS (SELECT ");
    for (i, ob) in sel.order_by.iter().enumerate() {
        if i > 0 {
            ctx.w(", ");
        }
        ctx.w(&format!(
            "NULLIF(SUBSTRING_INDEX(SUBSTRING_INDEX({}.{}, '{}', {}), '{}', -1), '') AS {}",
            d.quote("a"),
            d.quote("i"),
            sep,
            i + 2,
            sep,
            d.quote(&ob.col.name)
        ));
    }
    ctx.w(" FROM (SELECT ");
    ctx.add_param(d, Param::new(var, "text"));
    ctx.w(" AS ");
    ctx.w(&d.quote("i"));
    ctx.w(")");
    d.render_as_alias(ctx, "a");
    ctx.w(") ");
    Ok(())
}

pub(crate) fn render_op<D: SqlDialect + ?Sized>(d: &D, op: ExpOp) -> CompileResult<&'static str> {
    Ok(match op {
        ExpOp::Equals => "=",
        ExpOp::NotEquals => "!=",
        ExpOp::GreaterThan => ">",
        ExpOp::GreaterOrEquals => ">=",
        ExpOp::LesserThan => "<",
        ExpOp::LesserOrEquals => "<=",
        ExpOp::In => "IN",
        ExpOp::NotIn => "NOT IN",
        ExpOp::Like | ExpOp::ILike => "LIKE",
        ExpOp::NotLike | ExpOp::NotILike => "NOT LIKE",
        ExpOp::Regex | ExpOp::IRegex => "REGEXP",
        ExpOp::NotRegex | ExpOp::NotIRegex => "NOT REGEXP",
        other => {
            return Err(CompileError::UnsupportedOperator {
                op: other.name(),
                dialect: d.name(),
            });
        }
    })
}

/// JSON key tests, containment and membership over JSON arrays have no
/// operator spelling here; rewrite them as function calls.
pub(crate) fn render_exp_special<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
    exp: &Exp,
) -> CompileResult<bool> {
    match exp.op {
        ExpOp::HasKey | ExpOp::HasKeyAny | ExpOp::HasKeyAll => {
            let mode = if exp.op == ExpOp::HasKeyAll { "'all'" } else { "'one'" };
            ctx.w("JSON_CONTAINS_PATH(");
            qexp::render_operand(d, ctx, sel, &exp.left, None)?;
            ctx.w(", ");
            ctx.w(mode);
            match &exp.right {
                Operand::Val { v, .. } => {
                    ctx.w(", ");
                    ctx.squote(&format!("$.{}", v));
                }
                Operand::List { items, .. } => {
                    for key in items {
                        ctx.w(", ");
                        ctx.squote(&format!("$.{}", key));
                    }
                }
                Operand::Var(name) => {
                    ctx.w(", CONCAT('$.', ");
                    ctx.add_param(d, Param::new(name.clone(), "text"));
                    ctx.w(")");
                }
                _ => return Err(CompileError::input("has_key needs a key operand")),
            }
            ctx.w(")");
            Ok(true)
        }
        ExpOp::Contains | ExpOp::ContainedIn => {
            ctx.w("JSON_CONTAINS(");
            if exp.op == ExpOp::Contains {
                qexp::render_operand(d, ctx, sel, &exp.left, None)?;
                ctx.w(", ");
                render_json_operand(d, ctx, sel, &exp.right)?;
            } else {
                render_json_operand(d, ctx, sel, &exp.right)?;
                ctx.w(", ");
                qexp::render_operand(d, ctx, sel, &exp.left, None)?;
            }
            ctx.w(")");
            Ok(true)
        }
        ExpOp::In | ExpOp::NotIn => {
            let Operand::Var(name) = &exp.right else {
                return Ok(false);
            };
            if exp.op == ExpOp::NotIn {
                ctx.w("NOT ");
            }
            ctx.w("JSON_CONTAINS(");
            let mut p = Param::new(name.clone(), "json");
            p.is_array = true;
            p.wrap_in_array = true;
            ctx.add_param(d, p);
            ctx.w(", CAST(");
            qexp::render_operand(d, ctx, sel, &exp.left, None)?;
            ctx.w(" AS JSON))");
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn render_json_operand<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
    op: &Operand,
) -> CompileResult<()> {
    match op {
        Operand::Var(name) => {
            let mut p = Param::new(name.clone(), "json");
            p.is_array = true;
            ctx.add_param(d, p);
            Ok(())
        }
        other => qexp::render_operand(d, ctx, sel, other, None),
    }
}

pub(crate) fn render_json_path<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    tref: &str,
    col: &Column,
    path: &[String],
    as_text: bool,
) {
    if as_text {
        ctx.w("JSON_UNQUOTE(");
    }
    ctx.w("JSON_EXTRACT(");
    ctx.col_with_table(d, tref, &col.name);
    ctx.w(", ");
    ctx.squote(&format!("$.{}", path.join(".")));
    ctx.w(")");
    if as_text {
        ctx.w(")");
    }
}

pub(crate) fn render_ts_query<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
    exp: &Exp,
) -> CompileResult<()> {
    let Operand::Col { col, .. } = &exp.left else {
        return Err(CompileError::input("search filter needs a column operand"));
    };
    ctx.w("MATCH(");
    ctx.col_with_table(d, &sel.table_alias(), &col.name);
    ctx.w(") AGAINST(");
    qexp::render_operand(d, ctx, sel, &exp.right, Some(col))?;
    ctx.w(" IN NATURAL LANGUAGE MODE)");
    Ok(())
}

pub(crate) fn cast_type(t: &str) -> String {
    let t = t.to_lowercase();
    match t.as_str() {
        "text" | "character varying" | "varchar" | "char" => "CHAR".into(),
        "bigint" | "integer" | "int" | "smallint" | "boolean" => "SIGNED".into(),
        "numeric" | "decimal" => "DECIMAL".into(),
        "real" | "double precision" | "float" => "DOUBLE".into(),
        "date" => "DATE".into(),
        "timestamp" | "timestamp without time zone" | "timestamp with time zone"
        | "datetime" => "DATETIME".into(),
        "json" | "jsonb" => "JSON".into(),
        _ => "CHAR".into(),
    }
}

pub(crate) fn json_table_type(t: &str) -> String {
    let t = t.to_lowercase();
    match t.as_str() {
        "bigint" => "BIGINT".into(),
        "integer" | "int" | "smallint" => "INT".into(),
        "boolean" => "TINYINT".into(),
        "numeric" | "decimal" => "DECIMAL(18,6)".into(),
        "real" | "double precision" | "float" => "DOUBLE".into(),
        "date" => "DATE".into(),
        "timestamp" | "timestamp without time zone" | "timestamp with time zone"
        | "datetime" => "DATETIME".into(),
        "json" | "jsonb" => "JSON".into(),
        _ => "VARCHAR(255)".into(),
    }
}

pub(crate) fn render_json_virtual_table<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
    parent_ref: &str,
    payload: &Column,
) {
    ctx.w("JSON_TABLE(");
    ctx.col_with_table(d, parent_ref, &payload.name);
    ctx.w(", '$[*]' COLUMNS(");
    let mut first = true;
    for f in &sel.fields {
        if let crate::qcode::Field::Col { col, .. } = f {
            if !first {
                ctx.w(", ");
            }
            first = false;
            ctx.w(&d.quote(&col.name));
            ctx.w(" ");
            ctx.w(&d.json_table_type(&col.col_type));
            ctx.w(&format!(" PATH '$.{}'", col.name));
        }
    }
    ctx.w("))");
    d.render_as_alias(ctx, &sel.table_alias());
}

pub(crate) fn render_json_pk_select<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    action_var: &str,
    key: &str,
    ctype: &str,
) {
    ctx.w("(SELECT ");
    ctx.col_with_table(d, "_jt", key);
    ctx.w(" FROM JSON_TABLE(");
    let mut p = Param::new(action_var, "json");
    p.is_array = true;
    ctx.add_param(d, p);
    ctx.w(", '$[*]' COLUMNS(");
    ctx.w(&d.quote(key));
    ctx.w(" ");
    ctx.w(&d.json_table_type(ctype));
    ctx.w(&format!(" PATH '$.{}'))", key));
    d.render_as_alias(ctx, "_jt");
    ctx.w(")");
}

/// The captured value a dependent statement reads for one related column,
/// addressed by the source column the dependency captured it under.
fn rcol_value<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    rc: &crate::qcode::RelTail,
) -> CompileResult<()> {
    let dep = ctx
        .qc
        .mutates
        .get(rc.mutate_id)
        .ok_or_else(|| CompileError::internal("unknown mutation dependency"))?;
    if captured_as_list(ctx.qc, rc.mutate_id) {
        let tag = dep.tag();
        if rc.col.is_array {
            d.render_var(ctx, &tag);
        } else {
            // list capture feeding a scalar FK reads the first element
            ctx.w("JSON_UNQUOTE(JSON_EXTRACT(");
            d.render_var(ctx, &tag);
            ctx.w(", '$[0]'))");
        }
    } else {
        let var = capture_name(dep, &rc.src_col);
        d.render_var(ctx, &var);
    }
    Ok(())
}

pub(crate) fn render_linear_insert<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    m: &Mutate,
    upsert: bool,
) -> CompileResult<()> {
    let table = d.quote(&m.table.name);
    ctx.w("INSERT INTO ");
    ctx.w(&table);
    ctx.w(" (");
    let mut first = true;
    for c in &m.cols {
        if !first {
            ctx.w(", ");
        }
        first = false;
        ctx.w(&d.quote(&c.col.name));
    }
    for rc in &m.rcols {
        if !first {
            ctx.w(", ");
        }
        first = false;
        ctx.w(&d.quote(&rc.col.name));
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
            None => ctx.col_with_table(d, "_jt", &c.field_name),
        }
    }
    for rc in &m.rcols {
        if !first {
            ctx.w(", ");
        }
        first = false;
        rcol_value(d, ctx, rc)?;
    }
    ctx.w(" FROM JSON_TABLE(");
    let action = ctx.action_var().to_string();
    let mut p = Param::new(action, "json");
    p.is_array = m.is_array;
    ctx.add_param(d, p);
    ctx.w(&format!(", '{}' COLUMNS(", payload_path(m)));
    let mut first = true;
    for c in m.cols.iter().filter(|c| c.value.is_none()) {
        if !first {
            ctx.w(", ");
        }
        first = false;
        ctx.w(&d.quote(&c.field_name));
        ctx.w(" ");
        ctx.w(&d.json_table_type(&c.col.col_type));
        ctx.w(&format!(" PATH '$.{}'", c.field_name));
    }
    ctx.w("))");
    d.render_as_alias(ctx, "_jt");
    if upsert {
        ctx.w(" ON DUPLICATE KEY UPDATE ");
        let mut first = true;
        for c in m.cols.iter().filter(|c| c.col.name != m.table.pk.name) {
            if !first {
                ctx.w(", ");
            }
            first = false;
            ctx.w(&d.quote(&c.col.name));
            ctx.w(" = VALUES(");
            ctx.w(&d.quote(&c.col.name));
            ctx.w(")");
        }
    }
    ctx.w("; SET ");
    d.render_var(ctx, &m.tag());
    ctx.w(" = LAST_INSERT_ID(); ");
    Ok(())
}

pub(crate) fn render_linear_update<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    m: &Mutate,
) -> CompileResult<()> {
    let table = d.quote(&m.table.name);
    // capture the touched row's key, and every column a dependent reads,
    // before the write so the values survive the update
    if let Some(w) = &m.where_ {
        let extras = dependent_src_cols(ctx.qc, m);
        ctx.w("SELECT ");
        ctx.w(&d.quote(&m.table.pk.name));
        for c in &extras {
            ctx.w(", ");
            ctx.w(&d.quote(&c.name));
        }
        ctx.w(" INTO ");
        d.render_var(ctx, &m.tag());
        for c in &extras {
            ctx.w(", ");
            let var = capture_name(m, c);
            d.render_var(ctx, &var);
        }
        ctx.w(" FROM ");
        ctx.w(&table);
        ctx.w(" WHERE (");
        render_mutation_where(d, ctx, m, w)?;
        ctx.w(") LIMIT 1; ");
    }
    ctx.w("UPDATE ");
    ctx.w(&table);
    ctx.w(" SET ");
    let base = {
        let mut p = String::from("$");
        for seg in &m.path {
            p.push('.');
            p.push_str(seg);
        }
        p
    };
    let mut first = true;
    for c in &m.cols {
        if !first {
            ctx.w(", ");
        }
        first = false;
        ctx.w(&d.quote(&c.col.name));
        ctx.w(" = ");
        match &c.value {
            Some(v) => ctx.w(v),
            None => {
                ctx.w("JSON_UNQUOTE(JSON_EXTRACT(");
                let action = ctx.action_var().to_string();
                ctx.add_param(d, Param::new(action, "json"));
                ctx.w(&format!(", '{}.{}'))", base, c.field_name));
            }
        }
    }
    for rc in &m.rcols {
        if !first {
            ctx.w(", ");
        }
        first = false;
        ctx.w(&d.quote(&rc.col.name));
        ctx.w(" = ");
        rcol_value(d, ctx, rc)?;
    }
    if let Some(w) = &m.where_ {
        ctx.w(" WHERE (");
        render_mutation_where(d, ctx, m, w)?;
        ctx.w(")");
    }
    ctx.w("; ");
    Ok(())
}

pub(crate) fn render_linear_delete<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    m: &Mutate,
) -> CompileResult<()> {
    let table = d.quote(&m.table.name);
    if let Some(w) = &m.where_ {
        ctx.w("SELECT JSON_ARRAYAGG(");
        ctx.w(&d.quote(&m.table.pk.name));
        ctx.w(") INTO ");
        d.render_var(ctx, &m.tag());
        ctx.w(" FROM ");
        ctx.w(&table);
        ctx.w(" WHERE (");
        render_mutation_where(d, ctx, m, w)?;
        ctx.w("); ");
    }
    ctx.w("DELETE FROM ");
    ctx.w(&table);
    if let Some(w) = &m.where_ {
        ctx.w(" WHERE (");
        render_mutation_where(d, ctx, m, w)?;
        ctx.w(")");
    }
    ctx.w("; ");
    Ok(())
}

pub(crate) fn render_linear_connect<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    m: &Mutate,
    disconnect: bool,
) -> CompileResult<()> {
    let rel = m
        .rel
        .as_ref()
        .ok_or_else(|| CompileError::input("connect without a relationship"))?;
    let table = d.quote(&m.table.name);
    // capture the touched keys for dependent reads
    ctx.w("SELECT JSON_ARRAYAGG(");
    ctx.w(&d.quote(&rel.left.col.name));
    ctx.w(") INTO ");
    d.render_var(ctx, &m.tag());
    ctx.w(" FROM ");
    ctx.w(&table);
    if let Some(w) = &m.where_ {
        ctx.w(" WHERE (");
        render_mutation_where(d, ctx, m, w)?;
        ctx.w(")");
    }
    ctx.w("; ");
    // the actual FK assignment
    ctx.w("UPDATE ");
    ctx.w(&table);
    ctx.w(" SET ");
    ctx.w(&d.quote(&rel.left.col.name));
    ctx.w(" = ");
    if disconnect {
        ctx.w("NULL");
    } else {
        let parent = m
            .parent
            .and_then(|p| ctx.qc.mutates.get(p))
            .ok_or_else(|| CompileError::input("connect without a parent mutation"))?;
        let tag = parent.tag();
        if captured_as_list(ctx.qc, parent.id) && !rel.left.col.is_array {
            // the parent's capture is itself a JSON list; a scalar FK
            // takes its first element
            ctx.w("JSON_UNQUOTE(JSON_EXTRACT(");
            d.render_var(ctx, &tag);
            ctx.w(", '$[0]'))");
        } else {
            d.render_var(ctx, &tag);
        }
    }
    if let Some(w) = &m.where_ {
        ctx.w(" WHERE (");
        render_mutation_where(d, ctx, m, w)?;
        ctx.w(")");
    }
    ctx.w("; ");
    Ok(())
}

pub(crate) fn render_subscription_unbox<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    params: &[Param],
    inner: &str,
) -> CompileResult<()> {
    ctx.w("SELECT ");
    ctx.col_with_table(d, "__sub", "__root");
    ctx.w(" FROM JSON_TABLE(");
    let mut p = Param::new("__subs", "json");
    p.is_array = true;
    ctx.add_param(d, p);
    ctx.w(", '$[*]' COLUMNS(");
    for (i, sp) in params.iter().enumerate() {
        if i > 0 {
            ctx.w(", ");
        }
        ctx.w(&d.quote(&sp.name));
        ctx.w(" ");
        ctx.w(&d.json_table_type(&sp.ptype));
        ctx.w(&format!(" PATH '$.{}'", sp.name));
    }
    ctx.w("))");
    d.render_as_alias(ctx, "_sg_sub");
    ctx.w(", LATERAL (");
    ctx.w(inner);
    ctx.w(")");
    d.render_as_alias(ctx, "__sub");
    Ok(())
}
