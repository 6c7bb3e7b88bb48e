//! Oracle strategy.
//!
//! Inline-child composition, `:n` binds, uppercased quoted identifiers,
//! LOB-JSON with `FORMAT JSON` / `JSON_QUERY` re-promotion, and linear
//! mutation scripts as one anonymous PL/SQL block: ids are captured with
//! `RETURNING ... INTO v_x` and the returning select goes out through a ref
//! cursor and `DBMS_SQL.RETURN_RESULT`.

use crate::compiler::context::Ctx;
use crate::compiler::mutation::{
    capture_name, captured_as_list, dependent_src_cols, render_mutation_where,
};
use crate::compiler::query::exp as qexp;
use crate::compiler::traits::{camel_case, SqlDialect};
use crate::compiler::Param;
use crate::error::{CompileError, CompileResult};
use crate::qcode::{Column, Exp, ExpOp, Mutate, MutateKind, Operand, Select};

#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect {
    /// Engine version as `major*10000 + minor*100 + patch`
    pub db_version: u32,
    pub camelcase: bool,
}

impl OracleDialect {
    pub fn new() -> Self {
        Self::default()
    }

    /// `'$.path.field'` JSON path of one payload column.
    fn field_path(m: &Mutate, field: &str) -> String {
        let mut p = String::from("$");
        for seg in &m.path {
            p.push('.');
            p.push_str(seg);
        }
        p.push('.');
        p.push_str(field);
        p
    }

    fn capture_var(m: &Mutate) -> String {
        format!("v_{}", m.tag())
    }
}

impl SqlDialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.to_uppercase().replace('"', "\"\""))
    }

    fn bind_var(&self, buf: &mut String, ordinal: usize) {
        buf.push(':');
        buf.push_str(&ordinal.to_string());
    }

    fn supports_named_params(&self) -> bool {
        false
    }

    fn enable_camelcase(&self) -> bool {
        self.camelcase
    }

    fn supports_lateral(&self) -> bool {
        false
    }

    fn supports_writable_cte(&self) -> bool {
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

    fn requires_recursive_keyword(&self) -> bool {
        false
    }

    fn requires_recursive_cte_column_list(&self) -> bool {
        true
    }

    fn requires_json_as_string(&self) -> bool {
        true
    }

    fn requires_boolean_as_int(&self) -> bool {
        true
    }

    fn requires_json_query_wrapper(&self) -> bool {
        true
    }

    fn requires_null_on_empty_select(&self) -> bool {
        true
    }

    fn json_obj_open(&self) -> &'static str {
        "JSON_OBJECT("
    }

    fn json_agg_open(&self) -> &'static str {
        "COALESCE(JSON_ARRAYAGG("
    }

    fn json_agg_close(&self) -> &'static str {
        " RETURNING CLOB), '[]')"
    }

    fn render_json_root_base(&self, ctx: &mut Ctx) {
        ctx.w(" FROM DUAL");
    }

    fn render_json_key(&self, ctx: &mut Ctx, name: &str) {
        if self.enable_camelcase() {
            ctx.squote(&camel_case(name));
        } else {
            ctx.squote(name);
        }
        ctx.w(" VALUE ");
    }

    fn render_json_value_suffix(&self, ctx: &mut Ctx, is_json: bool) {
        if is_json {
            ctx.w(" FORMAT JSON");
        }
    }

    fn render_as_alias(&self, ctx: &mut Ctx, name: &str) {
        ctx.w(" ");
        ctx.w(&self.quote(name));
    }

    fn render_limit(&self, ctx: &mut Ctx, sel: &Select) {
        let p = &sel.paging;
        if let Some(var) = &p.offset_var {
            ctx.w(" OFFSET ");
            ctx.add_param(self, Param::new(var.clone(), "integer"));
            ctx.w(" ROWS");
        } else if let Some(n) = p.offset {
            ctx.w(&format!(" OFFSET {} ROWS", n));
        }
        if sel.singular {
            ctx.w(" FETCH NEXT 1 ROWS ONLY");
        } else if let Some(var) = &p.limit_var {
            ctx.w(" FETCH NEXT ");
            ctx.add_param(self, Param::new(var.clone(), "integer"));
            ctx.w(" ROWS ONLY");
        } else if let Some(n) = p.limit {
            ctx.w(&format!(" FETCH NEXT {} ROWS ONLY", n));
        }
        // no_limit emits no clause: FETCH is optional here
    }

    fn render_array_position(&self, ctx: &mut Ctx, _var: &str, col_expr: &str) {
        // no array-position primitive over bound JSON arrays; fall back to
        // the plain column so the ordering stays deterministic
        ctx.w(col_expr);
    }

    fn render_distinct_on(&self, ctx: &mut Ctx, _sel: &Select) {
        ctx.w("DISTINCT ");
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
            ctx.w("NULLIF(REGEXP_SUBSTR(");
            ctx.add_param(self, Param::new(var.clone(), "text"));
            ctx.w(&format!(", '[^{}]+', 1, {}), '') AS ", sep, i + 2));
            ctx.w(&self.quote(&ob.col.name));
        }
        ctx.w(" FROM DUAL) ");
        Ok(())
    }

    /// CONCAT is two-argument here, so the cursor tuple concatenates
    /// with `||`.
    fn render_cursor_value(&self, ctx: &mut Ctx, sel: &Select, tref: &str) {
        let sep = self.cursor_sep();
        let origin = format!("{}{}", ctx.sec_prefix(), sel.id);
        ctx.squote(&origin);
        for i in 0..sel.order_by.len() {
            ctx.w(&format!(" || '{}' || ", sep));
            ctx.w(&format!(
                "max({}.{})",
                self.quote(tref),
                self.quote(&format!("__cur_{}", i))
            ));
        }
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
            other => {
                return Err(CompileError::UnsupportedOperator {
                    op: other.name(),
                    dialect: self.name(),
                });
            }
        })
    }

    fn render_exp_special(&self, ctx: &mut Ctx, sel: &Select, exp: &Exp) -> CompileResult<bool> {
        match exp.op {
            ExpOp::ILike | ExpOp::NotILike => {
                if exp.op == ExpOp::NotILike {
                    ctx.w("NOT ");
                }
                ctx.w("LOWER(");
                qexp::render_operand(self, ctx, sel, &exp.left, None)?;
                ctx.w(") LIKE LOWER(");
                qexp::render_operand(self, ctx, sel, &exp.right, qexp::left_column(&exp.left))?;
                ctx.w(")");
                Ok(true)
            }
            ExpOp::Regex | ExpOp::NotRegex | ExpOp::IRegex | ExpOp::NotIRegex => {
                if matches!(exp.op, ExpOp::NotRegex | ExpOp::NotIRegex) {
                    ctx.w("NOT ");
                }
                ctx.w("REGEXP_LIKE(");
                qexp::render_operand(self, ctx, sel, &exp.left, None)?;
                ctx.w(", ");
                qexp::render_operand(self, ctx, sel, &exp.right, qexp::left_column(&exp.left))?;
                if matches!(exp.op, ExpOp::IRegex | ExpOp::NotIRegex) {
                    ctx.w(", 'i'");
                }
                ctx.w(")");
                Ok(true)
            }
            ExpOp::HasKey | ExpOp::HasKeyAny | ExpOp::HasKeyAll => {
                let keys: Vec<String> = match &exp.right {
                    Operand::Val { v, .. } => vec![v.clone()],
                    Operand::List { items, .. } => items.clone(),
                    _ => {
                        return Err(CompileError::UnsupportedOperator {
                            op: exp.op.name(),
                            dialect: self.name(),
                        });
                    }
                };
                let joiner = if exp.op == ExpOp::HasKeyAll { " AND " } else { " OR " };
                ctx.w("(");
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        ctx.w(joiner);
                    }
                    ctx.w("JSON_EXISTS(");
                    qexp::render_operand(self, ctx, sel, &exp.left, None)?;
                    ctx.w(&format!(", '$.{}')", key));
                }
                ctx.w(")");
                Ok(true)
            }
            ExpOp::In | ExpOp::NotIn => {
                let Operand::Var(name) = &exp.right else {
                    return Ok(false);
                };
                qexp::render_operand(self, ctx, sel, &exp.left, None)?;
                ctx.w(if exp.op == ExpOp::NotIn { " NOT IN " } else { " IN " });
                let jtype = qexp::left_column(&exp.left)
                    .map(|c| self.json_table_type(&c.col_type))
                    .unwrap_or_else(|| "VARCHAR2(4000)".into());
                ctx.w("(SELECT ");
                ctx.col_with_table(self, "_jt", "v");
                ctx.w(" FROM JSON_TABLE(");
                let mut p = Param::new(name.clone(), "json");
                p.is_array = true;
                p.wrap_in_array = true;
                ctx.add_param(self, p);
                ctx.w(", '$[*]' COLUMNS (");
                ctx.w(&self.quote("v"));
                ctx.w(&format!(" {} PATH '$'))", jtype));
                self.render_as_alias(ctx, "_jt");
                ctx.w(")");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn render_json_path(
        &self,
        ctx: &mut Ctx,
        tref: &str,
        col: &Column,
        path: &[String],
        _as_text: bool,
    ) {
        ctx.w("JSON_VALUE(");
        ctx.col_with_table(self, tref, &col.name);
        ctx.w(", ");
        ctx.squote(&format!("$.{}", path.join(".")));
        ctx.w(")");
    }

    fn render_ts_query(&self, _ctx: &mut Ctx, _sel: &Select, _exp: &Exp) -> CompileResult<()> {
        Err(CompileError::UnsupportedFeature {
            feature: "full-text search",
            dialect: self.name(),
        })
    }

    fn render_geo_op(&self, _ctx: &mut Ctx, _sel: &Select, _exp: &Exp) -> CompileResult<()> {
        Err(CompileError::UnsupportedFeature {
            feature: "spatial predicates",
            dialect: self.name(),
        })
    }

    fn render_rel_array_cond(&self, ctx: &mut Ctx, left: &str, right: &str, _json: bool) {
        ctx.w(&format!(
            "{} IN (SELECT {}.{} FROM JSON_TABLE({}, '$[*]' COLUMNS ({} NUMBER PATH '$')) {})",
            left,
            self.quote("_jt"),
            self.quote("v"),
            right,
            self.quote("v"),
            self.quote("_jt")
        ));
    }

    fn cast_type(&self, t: &str) -> String {
        let t = t.to_lowercase();
        match t.as_str() {
            "text" | "character varying" | "varchar" | "char" => "VARCHAR2(4000)".into(),
            "bigint" | "integer" | "int" | "smallint" | "numeric" | "decimal" => "NUMBER".into(),
            "boolean" => "NUMBER(1)".into(),
            "real" | "double precision" | "float" => "BINARY_DOUBLE".into(),
            "date" => "DATE".into(),
            "timestamp" | "timestamp without time zone" | "timestamp with time zone" => {
                "TIMESTAMP".into()
            }
            "json" | "jsonb" => "CLOB".into(),
            _ => "VARCHAR2(4000)".into(),
        }
    }

    fn render_var(&self, ctx: &mut Ctx, name: &str) {
        ctx.w("v_");
        ctx.w(name);
    }

    fn render_json_pk_select(&self, ctx: &mut Ctx, action_var: &str, key: &str, ctype: &str) {
        ctx.w("(SELECT ");
        ctx.col_with_table(self, "_jt", key);
        ctx.w(" FROM JSON_TABLE(");
        let mut p = Param::new(action_var, "json");
        p.is_array = true;
        ctx.add_param(self, p);
        ctx.w(", '$[*]' COLUMNS (");
        ctx.w(&self.quote(key));
        ctx.w(&format!(" {} PATH '$.{}'))", self.json_table_type(ctype), key));
        self.render_as_alias(ctx, "_jt");
        ctx.w(")");
    }

    fn render_json_virtual_table(
        &self,
        ctx: &mut Ctx,
        sel: &Select,
        parent_ref: &str,
        payload: &Column,
    ) {
        ctx.w("JSON_TABLE(");
        ctx.col_with_table(self, parent_ref, &payload.name);
        ctx.w(", '$[*]' COLUMNS (");
        let mut first = true;
        for f in &sel.fields {
            if let crate::qcode::Field::Col { col, .. } = f {
                if !first {
                    ctx.w(", ");
                }
                first = false;
                ctx.w(&self.quote(&col.name));
                ctx.w(&format!(
                    " {} PATH '$.{}'",
                    self.json_table_type(&col.col_type),
                    col.name
                ));
            }
        }
        ctx.w("))");
        self.render_as_alias(ctx, &sel.table_alias());
    }

    // ---- linear execution ----------------------------------------------

    fn render_begin(&self, ctx: &mut Ctx) {
        let qc = ctx.qc;
        ctx.w("DECLARE ");
        for m in &qc.mutates {
            let var = Self::capture_var(m);
            let vtype = match m.kind {
                MutateKind::Connect | MutateKind::Disconnect => "VARCHAR2(32767)",
                _ => "NUMBER",
            };
            ctx.w(&format!("{} {}; ", var, vtype));
            // one extra variable per captured non-PK column dependents read
            for c in dependent_src_cols(qc, m) {
                ctx.w(&format!(
                    "v_{} {}; ",
                    capture_name(m, &c),
                    self.cast_type(&c.col_type)
                ));
            }
        }
        ctx.w("c SYS_REFCURSOR; BEGIN ");
    }

    fn render_query_prefix(&self, ctx: &mut Ctx) {
        ctx.w("OPEN c FOR ");
    }

    fn render_mutation_postamble(&self, ctx: &mut Ctx) {
        ctx.w("; DBMS_SQL.RETURN_RESULT(c); END;");
    }

    fn render_linear_insert(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        let table = self.quote(&m.table.name);
        ctx.w("INSERT INTO ");
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
        if m.is_array {
            ctx.w(") SELECT ");
            let mut first = true;
            for c in &m.cols {
                if !first {
                    ctx.w(", ");
                }
                first = false;
                match &c.value {
                    Some(v) => ctx.w(v),
                    None => ctx.col_with_table(self, "_jt", &c.field_name),
                }
            }
            for rc in &m.rcols {
                if !first {
                    ctx.w(", ");
                }
                first = false;
                self.render_rcol_value(ctx, rc)?;
            }
            ctx.w(" FROM JSON_TABLE(");
            let action = ctx.action_var().to_string();
            let mut p = Param::new(action, "json");
            p.is_array = true;
            ctx.add_param(self, p);
            ctx.w(&format!(
                ", '{}' COLUMNS (",
                crate::compiler::mutation::payload_path(m)
            ));
            let mut first = true;
            for c in m.cols.iter().filter(|c| c.value.is_none()) {
                if !first {
                    ctx.w(", ");
                }
                first = false;
                ctx.w(&self.quote(&c.field_name));
                ctx.w(&format!(
                    " {} PATH '$.{}'",
                    self.json_table_type(&c.col.col_type),
                    c.field_name
                ));
            }
            ctx.w("))");
            self.render_as_alias(ctx, "_jt");
            // bulk inserts cannot capture through RETURNING INTO; read the
            // high-water mark instead
            ctx.w("; SELECT MAX(");
            ctx.w(&self.quote(&m.table.pk.name));
            ctx.w(&format!(") INTO {} FROM ", Self::capture_var(m)));
            ctx.w(&table);
            ctx.w("; ");
        } else {
            ctx.w(") VALUES (");
            let mut first = true;
            for c in &m.cols {
                if !first {
                    ctx.w(", ");
                }
                first = false;
                match &c.value {
                    Some(v) => ctx.w(v),
                    None => {
                        ctx.w("JSON_VALUE(");
                        let action = ctx.action_var().to_string();
                        ctx.add_param(self, Param::new(action, "json"));
                        ctx.w(&format!(", '{}')", Self::field_path(m, &c.field_name)));
                    }
                }
            }
            for rc in &m.rcols {
                if !first {
                    ctx.w(", ");
                }
                first = false;
                self.render_rcol_value(ctx, rc)?;
            }
            // single-row capture carries the key plus every column a
            // dependent reads
            let extras = dependent_src_cols(ctx.qc, m);
            ctx.w(") RETURNING ");
            ctx.w(&self.quote(&m.table.pk.name));
            for c in &extras {
                ctx.w(", ");
                ctx.w(&self.quote(&c.name));
            }
            ctx.w(&format!(" INTO {}", Self::capture_var(m)));
            for c in &extras {
                ctx.w(&format!(", v_{}", capture_name(m, c)));
            }
            ctx.w("; ");
        }
        Ok(())
    }

    fn render_linear_upsert(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        let table = self.quote(&m.table.name);
        ctx.w("MERGE INTO ");
        ctx.w(&table);
        self.render_as_alias(ctx, "t");
        ctx.w(" USING (SELECT ");
        let mut first = true;
        for c in &m.cols {
            if !first {
                ctx.w(", ");
            }
            first = false;
            match &c.value {
                Some(v) => ctx.w(v),
                None => {
                    ctx.w("JSON_VALUE(");
                    let action = ctx.action_var().to_string();
                    ctx.add_param(self, Param::new(action, "json"));
                    ctx.w(&format!(", '{}')", Self::field_path(m, &c.field_name)));
                }
            }
            ctx.w(" AS ");
            ctx.w(&self.quote(&c.col.name));
        }
        ctx.w(" FROM DUAL)");
        self.render_as_alias(ctx, "s");
        ctx.w(" ON (");
        ctx.col_with_table(self, "t", &m.table.pk.name);
        ctx.w(" = ");
        ctx.col_with_table(self, "s", &m.table.pk.name);
        ctx.w(")");
        let updates: Vec<&crate::qcode::MutateCol> = m
            .cols
            .iter()
            .filter(|c| c.col.name != m.table.pk.name)
            .collect();
        if !updates.is_empty() {
            ctx.w(" WHEN MATCHED THEN UPDATE SET ");
            for (i, c) in updates.iter().enumerate() {
                if i > 0 {
                    ctx.w(", ");
                }
                ctx.col_with_table(self, "t", &c.col.name);
                ctx.w(" = ");
                ctx.col_with_table(self, "s", &c.col.name);
            }
        }
        ctx.w(" WHEN NOT MATCHED THEN INSERT (");
        for (i, c) in m.cols.iter().enumerate() {
            if i > 0 {
                ctx.w(", ");
            }
            ctx.w(&self.quote(&c.col.name));
        }
        ctx.w(") VALUES (");
        for (i, c) in m.cols.iter().enumerate() {
            if i > 0 {
                ctx.w(", ");
            }
            ctx.col_with_table(self, "s", &c.col.name);
        }
        ctx.w("); SELECT MAX(");
        ctx.w(&self.quote(&m.table.pk.name));
        ctx.w(&format!(") INTO {} FROM ", Self::capture_var(m)));
        ctx.w(&table);
        ctx.w("; ");
        Ok(())
    }

    fn render_linear_update(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        let table = self.quote(&m.table.name);
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
                    ctx.w("JSON_VALUE(");
                    let action = ctx.action_var().to_string();
                    ctx.add_param(self, Param::new(action, "json"));
                    ctx.w(&format!(", '{}')", Self::field_path(m, &c.field_name)));
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
            self.render_rcol_value(ctx, rc)?;
        }
        if let Some(w) = &m.where_ {
            ctx.w(" WHERE (");
            render_mutation_where(self, ctx, m, w)?;
            ctx.w(")");
        }
        // capture the key plus every column a dependent reads
        let extras = dependent_src_cols(ctx.qc, m);
        ctx.w(" RETURNING ");
        ctx.w(&self.quote(&m.table.pk.name));
        for c in &extras {
            ctx.w(", ");
            ctx.w(&self.quote(&c.name));
        }
        ctx.w(&format!(" INTO {}", Self::capture_var(m)));
        for c in &extras {
            ctx.w(&format!(", v_{}", capture_name(m, c)));
        }
        ctx.w("; ");
        Ok(())
    }

    fn render_linear_delete(&self, ctx: &mut Ctx, m: &Mutate) -> CompileResult<()> {
        let table = self.quote(&m.table.name);
        ctx.w("DELETE FROM ");
        ctx.w(&table);
        if let Some(w) = &m.where_ {
            ctx.w(" WHERE (");
            render_mutation_where(self, ctx, m, w)?;
            ctx.w(")");
        }
        ctx.w(" RETURNING ");
        ctx.w(&self.quote(&m.table.pk.name));
        ctx.w(&format!(" INTO {}; ", Self::capture_var(m)));
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

impl OracleDialect {
    fn render_rcol_value(&self, ctx: &mut Ctx, rc: &crate::qcode::RelTail) -> CompileResult<()> {
        let dep = ctx
            .qc
            .mutates
            .get(rc.mutate_id)
            .ok_or_else(|| CompileError::internal("unknown mutation dependency"))?;
        if captured_as_list(ctx.qc, rc.mutate_id) {
            let var = Self::capture_var(dep);
            if rc.col.is_array {
                ctx.w(&var);
            } else {
                ctx.w(&format!("JSON_VALUE({}, '$[0]')", var));
            }
        } else {
            // address the capture by the source column it was taken from
            ctx.w(&format!("v_{}", capture_name(dep, &rc.src_col)));
        }
        Ok(())
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
        ctx.w("SELECT JSON_ARRAYAGG(");
        ctx.w(&self.quote(&rel.left.col.name));
        ctx.w(&format!(") INTO {} FROM ", Self::capture_var(m)));
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
            let var = Self::capture_var(parent);
            if captured_as_list(ctx.qc, parent.id) && !rel.left.col.is_array {
                // the parent's capture is itself a JSON list; a scalar FK
                // takes its first element
                ctx.w(&format!("JSON_VALUE({}, '$[0]')", var));
            } else {
                ctx.w(&var);
            }
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
