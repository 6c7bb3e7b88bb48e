//! The dialect strategy trait.
//!
//! Every place the emitted SQL differs between engines goes through one of
//! these operations. Default bodies carry PostgreSQL behavior; the concrete
//! strategies in [`super::sql`] override what diverges. MariaDB composes the
//! MySQL strategy and Snowflake the Postgres one, delegating explicitly.

use crate::compiler::context::Ctx;
use crate::compiler::query::exp as qexp;
use crate::compiler::split;
use crate::compiler::Param;
use crate::error::{CompileError, CompileResult};
use crate::qcode::{Column, Exp, ExpOp, Mutate, MutateKind, OrderDir, Select, ValType};

/// Marker prefix of the encoded bulk-update PK filter, decoded by
/// [`SqlDialect::render_json_pk_select`].
pub(crate) const JSON_PK_SENTINEL: &str = "__gj_json_pk";
/// Field separator inside the sentinel payload.
pub(crate) const SENTINEL_SEP: &str = ":gj_sep:";

pub(crate) fn json_pk_sentinel(action_var: &str, key: &str, col_type: &str) -> String {
    format!(
        "{}{}{}{}{}{}{}",
        JSON_PK_SENTINEL, SENTINEL_SEP, action_var, SENTINEL_SEP, key, SENTINEL_SEP, col_type
    )
}

/// snake_case → camelCase for JSON field keys.
pub(crate) fn camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Engine-specific SQL emission strategy.
pub trait SqlDialect {
    // ---- identity & syntax -------------------------------------------------

    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column or alias).
    fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Append the bind symbol for a 1-based ordinal.
    fn bind_var(&self, buf: &mut String, ordinal: usize) {
        buf.push('$');
        buf.push_str(&ordinal.to_string());
    }

    /// Driver can bind parameters by name rather than position.
    fn supports_named_params(&self) -> bool {
        true
    }

    /// Emit camelCased JSON field keys.
    fn enable_camelcase(&self) -> bool {
        false
    }

    // ---- feature flags -----------------------------------------------------

    fn supports_lateral(&self) -> bool {
        true
    }
    fn supports_returning(&self) -> bool {
        true
    }
    fn supports_writable_cte(&self) -> bool {
        true
    }
    fn supports_conflict_update(&self) -> bool {
        true
    }
    fn supports_subscription_batching(&self) -> bool {
        true
    }
    fn supports_linear_execution(&self) -> bool {
        false
    }
    fn requires_recursive_keyword(&self) -> bool {
        true
    }
    fn requires_recursive_cte_column_list(&self) -> bool {
        false
    }
    fn wrap_recursive_select(&self) -> bool {
        false
    }
    /// JSON values travel as LOB strings and need re-promotion.
    fn requires_json_as_string(&self) -> bool {
        false
    }
    fn requires_lowercase_identifiers(&self) -> bool {
        false
    }
    fn requires_boolean_as_int(&self) -> bool {
        false
    }
    /// Nested JSON expressions must be wrapped in `JSON_QUERY(.., '$')`.
    fn requires_json_query_wrapper(&self) -> bool {
        false
    }
    /// Empty selects emit NULL so the object constructor is never called
    /// without arguments.
    fn requires_null_on_empty_select(&self) -> bool {
        false
    }
    /// Bound for OR-chain expansion of recursive relationships on engines
    /// without outer-scope correlation in recursive CTEs.
    fn max_recursive_depth(&self) -> u64 {
        20
    }
    /// Cursor payload separator: `,` on lateral engines, `:` on
    /// inline-child engines.
    fn cursor_sep(&self) -> char {
        if self.supports_lateral() { ',' } else { ':' }
    }

    // ---- JSON composition --------------------------------------------------

    fn json_obj_open(&self) -> &'static str {
        "json_build_object("
    }
    fn json_obj_close(&self) -> &'static str {
        ")"
    }
    /// Aggregation over object rows; pairs with [`Self::json_agg_close`].
    fn json_agg_open(&self) -> &'static str {
        "COALESCE(json_agg("
    }
    fn json_agg_close(&self) -> &'static str {
        "), '[]')"
    }

    /// `SELECT <obj open>` of the root JSON document.
    fn render_json_root_open(&self, ctx: &mut Ctx) {
        ctx.w("SELECT ");
        ctx.w(self.json_obj_open());
    }

    /// Close the root object and alias it `__root`.
    fn render_json_root_close(&self, ctx: &mut Ctx) {
        ctx.w(self.json_obj_close());
        ctx.w(" AS ");
        ctx.w(&self.quote("__root"));
    }

    /// Seed relation the root object selects over.
    fn render_json_root_base(&self, ctx: &mut Ctx) {
        ctx.w(" FROM (SELECT true)");
        self.render_as_alias(ctx, "__root_x");
    }

    /// Final text after the whole statement (none by default).
    fn render_root_terminator(&self, _ctx: &mut Ctx) {}

    /// `'key', ` (or the engine's key/value spelling).
    fn render_json_key(&self, ctx: &mut Ctx, name: &str) {
        if self.enable_camelcase() {
            ctx.squote(&camel_case(name));
        } else {
            ctx.squote(name);
        }
        ctx.w(", ");
    }

    /// Trailer after a JSON-typed value inside an object constructor
    /// (`FORMAT JSON` on Oracle).
    fn render_json_value_suffix(&self, _ctx: &mut Ctx, _is_json: bool) {}

    /// Open/close of the LOB re-promotion wrapper. No-ops unless
    /// [`Self::requires_json_query_wrapper`].
    fn render_json_promote_open(&self, ctx: &mut Ctx) {
        if self.requires_json_query_wrapper() {
            ctx.w("JSON_QUERY(");
        }
    }
    fn render_json_promote_close(&self, ctx: &mut Ctx) {
        if self.requires_json_query_wrapper() {
            ctx.w(", '$')");
        }
    }

    /// Placeholder for a cursor field the requesting role may not read.
    fn render_null_cursor_field(&self, ctx: &mut Ctx) {
        ctx.w("NULL");
    }

    // ---- composition model -------------------------------------------------

    fn render_lateral_open(&self, ctx: &mut Ctx) {
        ctx.w(" LEFT OUTER JOIN LATERAL (");
    }

    fn render_lateral_close(&self, ctx: &mut Ctx, sel_id: usize) {
        ctx.w(")");
        self.render_as_alias(ctx, &format!("__sj_{}", sel_id));
        ctx.w(" ON true");
    }

    /// ` AS "name"` (Oracle drops the keyword).
    fn render_as_alias(&self, ctx: &mut Ctx, name: &str) {
        ctx.w(" AS ");
        ctx.w(&self.quote(name));
    }

    // ---- pagination & ordering ---------------------------------------------

    /// LIMIT/OFFSET clause for a select. A mandatory-limit engine never
    /// omits the clause; `no_limit` renders its maximum instead.
    fn render_limit(&self, ctx: &mut Ctx, sel: &Select) {
        let p = &sel.paging;
        if sel.singular {
            ctx.w(" LIMIT 1");
        } else if let Some(var) = &p.limit_var {
            ctx.w(" LIMIT ");
            ctx.add_param(self, Param::new(var.clone(), "integer"));
        } else if let Some(n) = p.limit {
            ctx.w(&format!(" LIMIT {}", n));
        } else if p.no_limit {
            // no clause: the engine has no mandatory limit
        }
        if let Some(var) = &p.offset_var {
            ctx.w(" OFFSET ");
            ctx.add_param(self, Param::new(var.clone(), "integer"));
        } else if let Some(n) = p.offset {
            ctx.w(&format!(" OFFSET {}", n));
        }
    }

    /// One ORDER BY term: pre-rendered expression plus direction.
    fn render_order_term(&self, ctx: &mut Ctx, expr: &str, dir: OrderDir) {
        ctx.w(expr);
        ctx.w(match dir {
            OrderDir::Asc => " ASC",
            OrderDir::Desc => " DESC",
            OrderDir::AscNullsFirst => " ASC NULLS FIRST",
            OrderDir::DescNullsFirst => " DESC NULLS FIRST",
            OrderDir::AscNullsLast => " ASC NULLS LAST",
            OrderDir::DescNullsLast => " DESC NULLS LAST",
        });
    }

    /// Order a column by its position inside an array-valued variable.
    fn render_array_position(&self, ctx: &mut Ctx, var: &str, col_expr: &str) {
        ctx.w("array_position(CAST(");
        let mut p = Param::new(var, "text[]");
        p.is_array = true;
        ctx.add_param(self, p);
        ctx.w(" AS text[]), CAST(");
        ctx.w(col_expr);
        ctx.w(" AS text))");
    }

    /// `DISTINCT ON (...)` prefix of the base select column list.
    fn render_distinct_on(&self, ctx: &mut Ctx, sel: &Select) {
        ctx.w("DISTINCT ON (");
        for (i, c) in sel.distinct_on.iter().enumerate() {
            if i > 0 {
                ctx.w(", ");
            }
            ctx.col_with_table(self, &sel.table_alias(), &c.name);
        }
        ctx.w(") ");
    }

    /// Decode a previously emitted cursor payload into the `__cur` CTE.
    /// Element 1 is the origin select id; values start at element 2.
    fn render_cursor_cte(&self, ctx: &mut Ctx, sel: &Select) -> CompileResult<()> {
        let var = sel
            .paging
            .cursor_var
            .clone()
            .ok_or_else(|| CompileError::internal("cursor CTE without cursor variable"))?;
        ctx.w("WITH ");
        ctx.w(&self.quote("__cur"));
        ctx.w(" AS (SELECT ");
        for (i, ob) in sel.order_by.iter().enumerate() {
            if i > 0 {
                ctx.w(", ");
            }
            ctx.w(&format!("(\"a\".\"i\")[{}] AS ", i + 2));
            ctx.w(&self.quote(&ob.col.name));
        }
        ctx.w(" FROM (SELECT string_to_array(");
        ctx.add_param(self, Param::new(var, "text"));
        ctx.w(&format!(", '{}') AS \"i\") AS \"a\") ", self.cursor_sep()));
        Ok(())
    }

    /// The serialized cursor value emitted alongside the JSON rows:
    /// `<secPrefix><selID><sep><v1><sep>…`, aggregated over the page.
    /// `tref` is the derived-table alias carrying the `__cur_<i>` exports.
    fn render_cursor_value(&self, ctx: &mut Ctx, sel: &Select, tref: &str) {
        let sep = self.cursor_sep();
        let origin = format!("{}{}", ctx.sec_prefix(), sel.id);
        ctx.w("CONCAT(");
        ctx.squote(&origin);
        for i in 0..sel.order_by.len() {
            ctx.w(&format!(", '{}', ", sep));
            ctx.w(&format!(
                "max({}.{})",
                self.quote(tref),
                self.quote(&format!("__cur_{}", i))
            ));
        }
        ctx.w(")");
    }

    // ---- filter emission ---------------------------------------------------

    /// Plain operator keyword, or `UnsupportedOperator` when the engine has
    /// no equivalent primitive.
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
            ExpOp::Similar => "SIMILAR TO",
            ExpOp::NotSimilar => "NOT SIMILAR TO",
            ExpOp::Regex => "~",
            ExpOp::NotRegex => "!~",
            ExpOp::IRegex => "~*",
            ExpOp::NotIRegex => "!~*",
            ExpOp::Contains => "@>",
            ExpOp::ContainedIn => "<@",
            ExpOp::HasKey => "?",
            ExpOp::HasKeyAny => "?|",
            ExpOp::HasKeyAll => "?&",
            other => {
                return Err(CompileError::UnsupportedOperator {
                    op: other.name(),
                    dialect: self.name(),
                });
            }
        })
    }

    /// Intercept an expression the engine cannot spell with a plain
    /// operator keyword. Returns true when fully rendered.
    fn render_exp_special(
        &self,
        _ctx: &mut Ctx,
        _sel: &Select,
        _exp: &Exp,
    ) -> CompileResult<bool> {
        Ok(false)
    }

    /// Render a literal value. Encoded bulk-PK sentinels are routed to
    /// [`Self::render_json_pk_select`].
    fn render_literal(&self, ctx: &mut Ctx, v: &str, vt: ValType) -> CompileResult<()> {
        if let Some(rest) = v.strip_prefix(JSON_PK_SENTINEL) {
            let mut it = rest.split(SENTINEL_SEP).skip(1);
            let (Some(action), Some(key), Some(ctype)) = (it.next(), it.next(), it.next()) else {
                return Err(CompileError::internal("malformed bulk-PK sentinel"));
            };
            let (action, key, ctype) =
                (action.to_string(), key.to_string(), ctype.to_string());
            self.render_json_pk_select(ctx, &action, &key, &ctype);
            return Ok(());
        }
        match vt {
            ValType::Str => ctx.squote(v),
            ValType::Num => ctx.w(v),
            ValType::Bool => {
                if self.requires_boolean_as_int() {
                    ctx.w(if v == "true" { "1" } else { "0" });
                } else {
                    ctx.w(v);
                }
            }
        }
        Ok(())
    }

    /// Subselect of primary keys out of a JSON bulk payload.
    fn render_json_pk_select(&self, ctx: &mut Ctx, action_var: &str, key: &str, ctype: &str) {
        ctx.w("(SELECT CAST(\"x\".");
        ctx.w(&self.quote(key));
        ctx.w(&format!(" AS {}) FROM json_to_recordset(CAST(", ctype));
        let mut p = Param::new(action_var, "json");
        p.is_array = true;
        ctx.add_param(self, p);
        ctx.w(" AS json)) AS \"x\"(");
        ctx.w(&self.quote(key));
        ctx.w(&format!(" {}))", ctype));
    }

    /// Session-local variable reference inside a linear script.
    fn render_var(&self, ctx: &mut Ctx, name: &str) {
        ctx.w("@");
        ctx.w(name);
    }

    /// Truth test applied to an already-rendered boolean expression
    /// (`@skip`/`@include` variables).
    fn render_is_true(&self, ctx: &mut Ctx, negated: bool) {
        if self.requires_boolean_as_int() {
            ctx.w(if negated { " != 1" } else { " = 1" });
        } else {
            ctx.w(if negated { " IS NOT TRUE" } else { " IS TRUE" });
        }
    }

    /// Relationship condition when the parent side is array-valued.
    /// `left` / `right` are pre-rendered column expressions.
    fn render_rel_array_cond(
        &self,
        ctx: &mut Ctx,
        left: &str,
        right: &str,
        right_is_json: bool,
    ) {
        if right_is_json {
            ctx.w(&format!(
                "{} IN (SELECT CAST(\"j\".\"value\" AS bigint) FROM json_array_elements_text({}) AS \"j\")",
                left, right
            ));
        } else {
            ctx.w(&format!("{} = ANY({})", left, right));
        }
    }

    /// JSON subpath accessor below a column.
    fn render_json_path(
        &self,
        ctx: &mut Ctx,
        tref: &str,
        col: &Column,
        path: &[String],
        as_text: bool,
    ) {
        ctx.col_with_table(self, tref, &col.name);
        for (i, seg) in path.iter().enumerate() {
            let last = i + 1 == path.len();
            ctx.w(if last && as_text { "->>" } else { "->" });
            ctx.squote(seg);
        }
    }

    /// Full-text search primitive.
    fn render_ts_query(&self, ctx: &mut Ctx, sel: &Select, exp: &Exp) -> CompileResult<()> {
        let crate::qcode::Operand::Col { col, .. } = &exp.left else {
            return Err(CompileError::input("search filter needs a column operand"));
        };
        if col.col_type == "tsvector" {
            ctx.col_with_table(self, &sel.table_alias(), &col.name);
        } else {
            ctx.w("to_tsvector(");
            ctx.col_with_table(self, &sel.table_alias(), &col.name);
            ctx.w(")");
        }
        ctx.w(" @@ websearch_to_tsquery(");
        qexp::render_operand(self, ctx, sel, &exp.right, Some(col))?;
        ctx.w(")");
        Ok(())
    }

    /// Spatial predicates, or `UnsupportedFeature` on non-spatial engines.
    fn render_geo_op(&self, ctx: &mut Ctx, sel: &Select, exp: &Exp) -> CompileResult<()> {
        let func = match exp.op {
            ExpOp::GeoIntersects => "ST_Intersects",
            ExpOp::GeoContains => "ST_Contains",
            ExpOp::GeoDwithin => "ST_DWithin",
            _ => return Err(CompileError::internal("not a spatial operator")),
        };
        ctx.w(func);
        ctx.w("(");
        qexp::render_operand(self, ctx, sel, &exp.left, None)?;
        ctx.w(", ST_GeomFromGeoJSON(");
        qexp::render_operand(self, ctx, sel, &exp.right, None)?;
        ctx.w(")");
        if exp.op == ExpOp::GeoDwithin {
            ctx.w(", ");
            if let Some(dist) = exp.children.first() {
                qexp::render_operand(self, ctx, sel, &dist.left, None)?;
            } else {
                ctx.w("0");
            }
        }
        ctx.w(")");
        Ok(())
    }

    /// Array literal constructor.
    fn render_array(&self, ctx: &mut Ctx, items: &[String], vt: ValType) -> CompileResult<()> {
        ctx.w("ARRAY[");
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                ctx.w(", ");
            }
            self.render_literal(ctx, item, vt)?;
        }
        ctx.w("]");
        Ok(())
    }

    /// Remove an element from an array-valued column (disconnect on
    /// array FKs).
    fn render_array_remove(&self, ctx: &mut Ctx, col_expr: &str, value: &str) {
        ctx.w(&format!("array_remove({}, {})", col_expr, value));
    }

    /// Map an introspected column type to the engine's castable spelling.
    fn cast_type(&self, t: &str) -> String {
        t.to_string()
    }

    /// Cast that degrades to NULL on conversion failure where the engine
    /// offers one; plain CAST otherwise. Used on decoded cursor values.
    fn render_try_cast(&self, ctx: &mut Ctx, expr: &str, t: &str) {
        ctx.w(&format!("CAST({} AS {})", expr, self.cast_type(t)));
    }

    /// Column type spelling inside a record-set / JSON_TABLE column list.
    fn json_table_type(&self, t: &str) -> String {
        self.cast_type(t)
    }

    /// Suffix operators for `IN`/`NOT IN` against an array-valued variable.
    /// The left operand is already rendered.
    fn render_in_var(&self, ctx: &mut Ctx, p: Param, not: bool) {
        ctx.w(if not { " != ALL(" } else { " = ANY(" });
        ctx.add_param(self, p);
        ctx.w(")");
    }

    // ---- JSON-virtual selects ----------------------------------------------

    /// Derived table unpacking rows from a parent JSON column.
    fn render_json_virtual_table(
        &self,
        ctx: &mut Ctx,
        sel: &Select,
        parent_ref: &str,
        payload: &Column,
    ) {
        ctx.w("json_to_recordset(");
        ctx.col_with_table(self, parent_ref, &payload.name);
        ctx.w(")");
        self.render_as_alias(ctx, &sel.table_alias());
        ctx.w("(");
        let mut first = true;
        for f in &sel.fields {
            if let crate::qcode::Field::Col { col, .. } = f {
                if !first {
                    ctx.w(", ");
                }
                first = false;
                ctx.w(&self.quote(&col.name));
                ctx.w(" ");
                ctx.w(&self.cast_type(&col.col_type));
            }
        }
        ctx.w(")");
    }

    // ---- mutation primitives -----------------------------------------------

    /// The `_sg_input` CTE carrying the root mutation payload.
    fn render_mutation_input(&self, ctx: &mut Ctx) {
        ctx.w(&self.quote("_sg_input"));
        ctx.w(" AS (SELECT CAST(");
        let mut p = Param::new(ctx.action_var(), "json");
        p.is_array = false;
        ctx.add_param(self, p);
        ctx.w(" AS json) AS \"j\")");
    }

    /// JSON payload → derived table of typed columns. `payload` is the
    /// pre-rendered JSON expression the record set unpacks.
    fn render_mutate_to_record_set(&self, ctx: &mut Ctx, m: &Mutate, payload: &str) {
        if m.is_array {
            ctx.w("json_populate_recordset(NULL::");
        } else {
            ctx.w("json_populate_record(NULL::");
        }
        ctx.w(&self.quote(&m.table.name));
        ctx.w(", ");
        ctx.w(payload);
        ctx.w(")");
        self.render_as_alias(ctx, "t");
    }

    /// WHERE filter the returning select uses to read back mutated rows.
    fn returning_id_filter(&self, action_var: &str, m: &Mutate) -> Exp {
        use crate::qcode::Operand;
        let pk = Operand::col(m.table.pk.clone());
        if m.is_json && m.is_array && m.cols.iter().any(|c| c.col.name == m.table.pk.name) {
            let sentinel =
                json_pk_sentinel(action_var, &m.table.pk.name, &m.table.pk.col_type);
            return Exp::binary(ExpOp::In, pk, Operand::str(sentinel));
        }
        if m.is_array && m.kind == MutateKind::Insert {
            return Exp::binary(
                ExpOp::GreaterOrEquals,
                pk,
                Operand::DbVar(m.tag()),
            );
        }
        Exp::binary(ExpOp::Equals, pk, Operand::DbVar(m.tag()))
    }

    // ---- linear execution --------------------------------------------------

    /// Session preamble of a linear script (SQL mode, temp tables).
    fn render_setup(&self, _ctx: &mut Ctx) {}
    /// Opens the procedural block when the engine uses one.
    fn render_begin(&self, _ctx: &mut Ctx) {}
    /// Script epilogue.
    fn render_teardown(&self, _ctx: &mut Ctx) {}
    /// Prefix of the returning select (`OPEN c FOR ` on Oracle).
    fn render_query_prefix(&self, _ctx: &mut Ctx) {}
    /// Text between the returning select and the end of the script.
    fn render_mutation_postamble(&self, _ctx: &mut Ctx) {}

    fn render_linear_insert(&self, _ctx: &mut Ctx, _m: &Mutate) -> CompileResult<()> {
        Err(CompileError::internal("linear execution not supported"))
    }
    fn render_linear_update(&self, _ctx: &mut Ctx, _m: &Mutate) -> CompileResult<()> {
        Err(CompileError::internal("linear execution not supported"))
    }
    fn render_linear_upsert(&self, _ctx: &mut Ctx, _m: &Mutate) -> CompileResult<()> {
        Err(CompileError::internal("linear execution not supported"))
    }
    fn render_linear_delete(&self, _ctx: &mut Ctx, _m: &Mutate) -> CompileResult<()> {
        Err(CompileError::internal("linear execution not supported"))
    }
    fn render_linear_connect(&self, _ctx: &mut Ctx, _m: &Mutate) -> CompileResult<()> {
        Err(CompileError::internal("linear execution not supported"))
    }
    fn render_linear_disconnect(&self, _ctx: &mut Ctx, _m: &Mutate) -> CompileResult<()> {
        Err(CompileError::internal("linear execution not supported"))
    }

    // ---- subscription batching ---------------------------------------------

    /// Wrap one compiled query in a per-tuple driver so a single round trip
    /// executes it for many argument tuples.
    fn render_subscription_unbox(
        &self,
        ctx: &mut Ctx,
        params: &[Param],
        inner: &str,
    ) -> CompileResult<()> {
        ctx.w("WITH ");
        ctx.w(&self.quote("_sg_sub"));
        ctx.w(" AS (SELECT \"x\".* FROM json_to_recordset(CAST(");
        let mut p = Param::new("__subs", "json");
        p.is_array = true;
        ctx.add_param(self, p);
        ctx.w(" AS json)) AS \"x\"(");
        for (i, sp) in params.iter().enumerate() {
            if i > 0 {
                ctx.w(", ");
            }
            ctx.w(&self.quote(&sp.name));
            ctx.w(" ");
            ctx.w(&self.cast_type(&sp.ptype));
        }
        ctx.w(")) SELECT \"__sub\".* FROM ");
        ctx.w(&self.quote("_sg_sub"));
        ctx.w(", LATERAL (");
        ctx.w(inner);
        ctx.w(")");
        self.render_as_alias(ctx, "__sub");
        Ok(())
    }

    // ---- script handling ---------------------------------------------------

    /// Split a multi-statement script on top-level `;`, preserving quoted
    /// and commented content.
    fn split_script(&self, script: &str) -> Vec<String> {
        split::split_query(script)
    }
}
