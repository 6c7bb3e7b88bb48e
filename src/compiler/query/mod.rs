//! Query compiler.
//!
//! Walks a plan of kind Query/Subscription and emits one SQL statement whose
//! result is a single row with a single `__root` column holding the entire
//! JSON response. Children compose either through LATERAL joins or, on
//! engines without LATERAL, as correlated subqueries inlined into the
//! parent's object constructor.

pub mod cursor;
pub mod exp;
pub mod order;

use crate::compiler::context::Ctx;
use crate::compiler::query::exp::qcol;
use crate::compiler::traits::SqlDialect;
use crate::compiler::Param;
use crate::error::{CompileError, CompileResult};
use crate::qcode::{Field, RelKind, Select, SelectType};

/// Alias of the derived table every inline-child select wraps its base in.
const INLINE_ALIAS: &str = "_gj_t";

/// One key/value pair of a select's JSON object.
enum Pair<'a> {
    Field(&'a Field),
    Child(&'a Select),
    Typename(&'a str),
}

impl<'a> Pair<'a> {
    fn key(&self) -> &str {
        match self {
            Pair::Field(f) => f.alias(),
            Pair::Child(c) => &c.field_name,
            Pair::Typename(alias) => alias,
        }
    }
}

/// Compile a plan of kind Query into the context.
pub fn compile_query<D: SqlDialect + ?Sized>(d: &D, ctx: &mut Ctx) -> CompileResult<()> {
    // cursor decode CTE, at most one per plan
    if let Some(sel) = ctx.root_with_cursor() {
        if sel.paging.cursor_var.is_some() {
            d.render_cursor_cte(ctx, sel)?;
        }
    }

    let qc = ctx.qc;
    let roots: Vec<&Select> = qc
        .roots
        .iter()
        .filter_map(|id| qc.select(*id))
        .filter(|s| !s.skip.is_absent())
        .collect();

    d.render_json_root_open(ctx);
    let mut first = true;
    for sel in &roots {
        if !first {
            ctx.w(", ");
        }
        first = false;
        d.render_json_key(ctx, &sel.field_name);
        if sel.skip.is_nulled() {
            ctx.w("NULL");
        } else {
            render_root_field_value(d, ctx, sel)?;
            d.render_json_value_suffix(ctx, true);
        }
    }
    if let Some(csel) = ctx.root_with_cursor() {
        if !csel.skip.is_absent() {
            if !first {
                ctx.w(", ");
            }
            let key = format!("{}_cursor", csel.field_name);
            d.render_json_key(ctx, &key);
            if csel.skip.is_nulled() {
                d.render_null_cursor_field(ctx);
            } else if d.supports_lateral() {
                ctx.w(&qcol(d, &format!("__sj_{}", csel.id), "cursor"));
            } else {
                render_inline_cursor_value(d, ctx, csel)?;
            }
        }
    }
    d.render_json_root_close(ctx);
    d.render_json_root_base(ctx);

    if d.supports_lateral() {
        for sel in &roots {
            if !sel.skip.is_nulled() {
                render_lateral(d, ctx, sel)?;
            }
        }
    }
    d.render_root_terminator(ctx);
    Ok(())
}

/// Compile a plan of kind Subscription. With batching support the query is
/// wrapped in a per-tuple driver; otherwise it compiles as a plain query
/// and the caller runs it once per subscriber.
pub fn compile_subscription<D: SqlDialect + ?Sized>(d: &D, ctx: &mut Ctx) -> CompileResult<()> {
    if !d.supports_subscription_batching() {
        tracing::debug!(dialect = d.name(), "subscription batching off, plain query");
        return compile_query(d, ctx);
    }
    let mut inner = Ctx::new(ctx.qc, ctx.opts);
    inner.sub_batch = true;
    compile_query(d, &mut inner)?;
    if inner.sub_params.is_empty() {
        return compile_query(d, ctx);
    }
    tracing::debug!(
        dialect = d.name(),
        tuples = inner.sub_params.len(),
        "batching subscription"
    );
    let params = std::mem::take(&mut inner.sub_params);
    d.render_subscription_unbox(ctx, &params, &inner.buf)
}

/// Root JSON field value for one select, with the `@skip`/`@include`
/// CASE wrap when the filter is variable-driven.
fn render_root_field_value<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    let skip_var = sel.where_.as_ref().and_then(exp::skip_variable);
    if let Some((var, negated)) = &skip_var {
        ctx.w("CASE WHEN ");
        ctx.add_param(d, Param::new(var.clone(), "boolean"));
        d.render_is_true(ctx, *negated);
        ctx.w(" THEN ");
    }
    if d.supports_lateral() {
        let sj = format!("__sj_{}", sel.id);
        if sel.singular {
            ctx.w(&qcol(d, &sj, "json"));
        } else {
            ctx.w("COALESCE(");
            ctx.w(&qcol(d, &sj, "json"));
            ctx.w(", '[]')");
        }
    } else {
        render_inline_value(d, ctx, sel)?;
    }
    if skip_var.is_some() {
        ctx.w(" ELSE NULL END");
    }
    Ok(())
}

/// `LEFT OUTER JOIN LATERAL (<select json>) AS "__sj_n" ON true`.
fn render_lateral<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    d.render_lateral_open(ctx);
    render_select_json(d, ctx, sel)?;
    d.render_lateral_close(ctx, sel.id);
    Ok(())
}

fn visible_children<'a>(ctx: &Ctx<'a>, sel: &Select) -> CompileResult<Vec<&'a Select>> {
    let mut out = Vec::with_capacity(sel.children.len());
    for id in &sel.children {
        let c = ctx.child(*id)?;
        if !c.skip.is_absent() {
            out.push(c);
        }
    }
    Ok(out)
}

fn collect_pairs<'a>(ctx: &Ctx<'a>, sel: &'a Select) -> CompileResult<Vec<Pair<'a>>> {
    let mut pairs = Vec::new();
    for f in &sel.fields {
        match f {
            Field::Col { skip, .. } if skip.is_absent() => continue,
            Field::Typename { alias } => {
                pairs.push(Pair::Typename(alias));
                continue;
            }
            _ => {}
        }
        pairs.push(Pair::Field(f));
    }
    for c in visible_children(ctx, sel)? {
        pairs.push(Pair::Child(c));
    }
    if sel.typename {
        pairs.push(Pair::Typename("__typename"));
    }
    Ok(pairs)
}

/// The aggregated JSON select of one node, used inside a lateral join.
fn render_select_json<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    let pairs = collect_pairs(ctx, sel)?;
    ctx.w("SELECT ");
    let plural = !sel.singular;
    if plural {
        ctx.w(d.json_agg_open());
    }
    render_json_object(d, ctx, sel, &pairs, &sel.table_alias())?;
    if plural {
        ctx.w(d.json_agg_close());
    }
    ctx.w(" AS ");
    ctx.w(&d.quote("json"));
    if sel.paging.cursor {
        ctx.w(", ");
        d.render_cursor_value(ctx, sel, &sel.table_alias());
        ctx.w(" AS ");
        ctx.w(&d.quote("cursor"));
    }
    ctx.w(" FROM (");
    render_base_select(d, ctx, sel)?;
    ctx.w(")");
    d.render_as_alias(ctx, &sel.table_alias());
    for c in visible_children(ctx, sel)? {
        if !c.skip.is_nulled() {
            render_lateral(d, ctx, c)?;
        }
    }
    Ok(())
}

/// One select as a correlated scalar subquery (engines without LATERAL),
/// re-promoted through `JSON_QUERY(.., '$')` on LOB-JSON engines.
fn render_inline_value<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    d.render_json_promote_open(ctx);
    ctx.w("(");
    let pairs = collect_pairs(ctx, sel)?;
    ctx.w("SELECT ");
    let plural = !sel.singular;
    if plural {
        ctx.w(d.json_agg_open());
    }
    render_json_object(d, ctx, sel, &pairs, INLINE_ALIAS)?;
    if plural {
        ctx.w(d.json_agg_close());
    }
    ctx.w(" FROM (");
    render_base_select(d, ctx, sel)?;
    ctx.w(")");
    d.render_as_alias(ctx, INLINE_ALIAS);
    ctx.w(")");
    d.render_json_promote_close(ctx);
    Ok(())
}

/// The object constructor over one row of the derived table `tref`.
fn render_json_object<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
    pairs: &[Pair<'_>],
    tref: &str,
) -> CompileResult<()> {
    if pairs.is_empty() && d.requires_null_on_empty_select() {
        ctx.w("NULL");
        return Ok(());
    }
    ctx.w(d.json_obj_open());
    for (i, pair) in pairs.iter().enumerate() {
        if i > 0 {
            ctx.w(", ");
        }
        d.render_json_key(ctx, pair.key());
        match pair {
            Pair::Field(f) => render_field_value(d, ctx, f, tref)?,
            Pair::Child(c) => {
                if c.skip.is_nulled() {
                    ctx.w("NULL");
                } else if d.supports_lateral() {
                    let sj = format!("__sj_{}", c.id);
                    if c.singular {
                        ctx.w(&qcol(d, &sj, "json"));
                    } else {
                        ctx.w("COALESCE(");
                        ctx.w(&qcol(d, &sj, "json"));
                        ctx.w(", '[]')");
                    }
                    d.render_json_value_suffix(ctx, true);
                } else {
                    render_inline_value(d, ctx, c)?;
                    d.render_json_value_suffix(ctx, true);
                }
            }
            Pair::Typename(_) => {
                ctx.squote(&sel.table.name);
            }
        }
    }
    ctx.w(d.json_obj_close());
    Ok(())
}

/// Value expression of one field pair, referencing the derived table.
fn render_field_value<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    f: &Field,
    tref: &str,
) -> CompileResult<()> {
    match f {
        Field::Col {
            col,
            alias,
            skip,
            filter,
        } => {
            if skip.is_nulled() {
                ctx.w("NULL");
                return Ok(());
            }
            // filtered columns are computed (and aliased) in the base select
            let name = if filter.is_some() { alias } else { &col.name };
            if col.is_json {
                d.render_json_promote_open(ctx);
                ctx.w(&qcol(d, tref, name));
                d.render_json_promote_close(ctx);
                d.render_json_value_suffix(ctx, true);
            } else {
                ctx.w(&qcol(d, tref, name));
            }
            Ok(())
        }
        Field::Func { alias, .. } => {
            ctx.w(&qcol(d, tref, alias));
            Ok(())
        }
        Field::Typename { .. } => {
            ctx.w(&qcol(d, tref, "__typename"));
            Ok(())
        }
    }
}

/// Resolve the parent-side table reference a child correlates against.
fn parent_ref<D: SqlDialect + ?Sized>(d: &D, ctx: &Ctx, sel: &Select) -> CompileResult<String> {
    let pid = sel
        .parent
        .ok_or_else(|| CompileError::internal(format!("select {} has no parent", sel.id)))?;
    if d.supports_lateral() {
        Ok(ctx.child(pid)?.table_alias())
    } else {
        Ok(INLINE_ALIAS.to_string())
    }
}

/// The flat base select: raw table (aliased `<table>_<id>`), column
/// exports, relationship/user/cursor filters, grouping, ordering, limits.
fn render_base_select<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    let alias = sel.table_alias();
    let recursive = matches!(&sel.rel, Some(r) if r.kind == RelKind::Recursive);

    if recursive && d.supports_lateral() {
        render_recursive_cte(d, ctx, sel)?;
    }

    ctx.w("SELECT ");
    if !sel.distinct_on.is_empty() {
        d.render_distinct_on(ctx, sel);
    }
    render_exports(d, ctx, sel)?;
    ctx.w(" FROM ");
    render_from(d, ctx, sel, recursive)?;

    // WHERE: relationship filter, user filter and cursor keyset, ANDed
    let rel_cond = sel.parent.is_some()
        && sel.typ == SelectType::Regular
        && matches!(&sel.rel, Some(r) if matches!(r.kind, RelKind::OneToOne | RelKind::OneToMany))
        || (recursive && !d.supports_lateral());
    let user_cond = sel.where_.is_some();
    let cursor_cond = sel.paging.cursor_var.is_some();
    if rel_cond || user_cond || cursor_cond {
        ctx.w(" WHERE ");
        let mut first = true;
        if rel_cond {
            ctx.w("(");
            if recursive {
                render_recursive_or_chain(d, ctx, sel)?;
            } else {
                render_rel_where(d, ctx, sel)?;
            }
            ctx.w(")");
            first = false;
        }
        if let Some(w) = &sel.where_ {
            if !first {
                ctx.w(" AND ");
            }
            first = false;
            ctx.w("(");
            exp::render_exp(d, ctx, sel, w)?;
            ctx.w(")");
        }
        if cursor_cond {
            if !first {
                ctx.w(" AND ");
            }
            ctx.w("(");
            cursor::render_cursor_where(d, ctx, sel)?;
            ctx.w(")");
        }
    }

    // GROUP BY all plain columns when aggregates are present
    let has_funcs = sel.fields.iter().any(|f| matches!(f, Field::Func { .. }));
    if sel.group_by && has_funcs {
        let plain: Vec<String> = sel
            .fields
            .iter()
            .filter_map(|f| match f {
                Field::Col {
                    col,
                    filter: None,
                    skip,
                    ..
                } if !skip.is_absent() && !skip.is_nulled() => {
                    Some(qcol(d, &alias, &col.name))
                }
                _ => None,
            })
            .collect();
        if !plain.is_empty() {
            ctx.w(" GROUP BY ");
            ctx.w(&plain.join(", "));
        }
    }

    order::render_order_by(d, ctx, sel)?;
    d.render_limit(ctx, sel);
    Ok(())
}

/// Column list of the base select: field columns, relationship exports the
/// children correlate on, and cursor value exports.
fn render_exports<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    let alias = sel.table_alias();
    let mut exported: Vec<String> = Vec::new();
    let mut first = true;
    let mut sep = |ctx: &mut Ctx, first: &mut bool| {
        if !*first {
            ctx.w(", ");
        }
        *first = false;
    };

    for f in &sel.fields {
        match f {
            Field::Col {
                col,
                skip,
                filter: None,
                ..
            } => {
                if skip.is_absent() || skip.is_nulled() {
                    continue;
                }
                sep(ctx, &mut first);
                ctx.col_with_table(d, &alias, &col.name);
                exported.push(col.name.clone());
            }
            Field::Col {
                col,
                alias: falias,
                skip,
                filter: Some(fx),
            } => {
                if skip.is_absent() || skip.is_nulled() {
                    continue;
                }
                sep(ctx, &mut first);
                ctx.w("CASE WHEN ");
                exp::render_exp(d, ctx, sel, fx)?;
                ctx.w(" THEN ");
                ctx.col_with_table(d, &alias, &col.name);
                ctx.w(" ELSE NULL END AS ");
                ctx.w(&d.quote(falias));
                exported.push(falias.clone());
            }
            Field::Func { name, args, alias: falias } => {
                sep(ctx, &mut first);
                render_func(d, ctx, sel, name, args)?;
                ctx.w(" AS ");
                ctx.w(&d.quote(falias));
                exported.push(falias.clone());
            }
            Field::Typename { .. } => {}
        }
    }

    // columns children correlate on
    for id in &sel.children {
        let c = ctx.child(*id)?;
        if c.skip.is_absent() {
            continue;
        }
        if let Some(rel) = &c.rel {
            if rel.right.table == sel.table.name && !exported.contains(&rel.right.col.name) {
                sep(ctx, &mut first);
                ctx.col_with_table(d, &alias, &rel.right.col.name);
                exported.push(rel.right.col.name.clone());
            }
        }
    }

    // cursor value exports: last row's ORDER BY tuple
    if sel.paging.cursor {
        for (i, ob) in sel.order_by.iter().enumerate() {
            sep(ctx, &mut first);
            ctx.w("LAST_VALUE(");
            ctx.col_with_table(d, &alias, &ob.col.name);
            ctx.w(") OVER() AS ");
            ctx.w(&d.quote(&format!("__cur_{}", i)));
        }
    }

    if first {
        // nothing visible: export the primary key so the select stays valid
        ctx.col_with_table(d, &alias, &sel.table.pk.name);
    }
    Ok(())
}

fn render_func<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
    name: &str,
    args: &[crate::qcode::FuncArg],
) -> CompileResult<()> {
    ctx.w(&name.to_uppercase());
    ctx.w("(");
    if args.is_empty() {
        ctx.w("*");
    }
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            ctx.w(", ");
        }
        match a {
            crate::qcode::FuncArg::Col(c) => {
                ctx.col_with_table(d, &sel.table_alias(), &c.name);
            }
            crate::qcode::FuncArg::Val(v) => ctx.w(v),
        }
    }
    ctx.w(")");
    Ok(())
}

/// FROM clause of the base select.
fn render_from<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
    recursive: bool,
) -> CompileResult<()> {
    if sel.typ == SelectType::Json {
        let pref = parent_ref(d, ctx, sel)?;
        let payload = sel
            .rel
            .as_ref()
            .map(|r| r.right.col.clone())
            .ok_or_else(|| CompileError::input("JSON select without a relationship"))?;
        d.render_json_virtual_table(ctx, sel, &pref, &payload);
        return Ok(());
    }
    if recursive && d.supports_lateral() {
        ctx.w(&d.quote(&format!("__rcte_{}", sel.id)));
        d.render_as_alias(ctx, &sel.table_alias());
        return Ok(());
    }
    if let Some(schema) = &sel.table.schema {
        ctx.w(&d.quote(schema));
        ctx.w(".");
    }
    ctx.w(&d.quote(&sel.table.name));
    d.render_as_alias(ctx, &sel.table_alias());
    Ok(())
}

/// `WITH RECURSIVE "__rcte_n" AS (anchor UNION ALL step) ` ahead of the
/// base select, for engines that allow outer correlation in the anchor.
fn render_recursive_cte<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    let rel = sel
        .rel
        .as_ref()
        .ok_or_else(|| CompileError::internal("recursive select without relationship"))?;
    let pref = parent_ref(d, ctx, sel)?;
    let table = d.quote(&sel.table.name);
    let rcte = d.quote(&format!("__rcte_{}", sel.id));

    ctx.w("WITH ");
    if d.requires_recursive_keyword() {
        ctx.w("RECURSIVE ");
    }
    ctx.w(&rcte);
    ctx.w(" AS (");
    if d.wrap_recursive_select() {
        ctx.w("(");
    }
    // anchor: direct children of the parent row
    ctx.w(&format!(
        "SELECT {}.* FROM {} WHERE {} = {}",
        table,
        table,
        qcol(d, &sel.table.name, &rel.left.col.name),
        qcol(d, &pref, &rel.right.col.name)
    ));
    if d.wrap_recursive_select() {
        ctx.w(")");
    }
    ctx.w(" UNION ALL ");
    if d.wrap_recursive_select() {
        ctx.w("(");
    }
    ctx.w(&format!(
        "SELECT {}.* FROM {}, {} WHERE {} = {}",
        table,
        table,
        rcte,
        qcol(d, &sel.table.name, &rel.left.col.name),
        qcol(d, &format!("__rcte_{}", sel.id), &rel.right.col.name)
    ));
    if d.wrap_recursive_select() {
        ctx.w(")");
    }
    ctx.w(") ");
    Ok(())
}

/// Bounded OR-chain expansion of a recursive relationship on engines that
/// cannot correlate inside recursive CTEs. Depth is the user limit capped
/// by the dialect maximum.
fn render_recursive_or_chain<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    let rel = sel
        .rel
        .as_ref()
        .ok_or_else(|| CompileError::internal("recursive select without relationship"))?;
    let alias = sel.table_alias();
    let pref = parent_ref(d, ctx, sel)?;
    let max = d.max_recursive_depth();
    let depth = sel.paging.limit.unwrap_or(max).min(max).max(1);

    let left = qcol(d, &alias, &rel.left.col.name);
    let parent_right = qcol(d, &pref, &rel.right.col.name);
    let table = d.quote(&sel.table.name);
    let inner_left = d.quote(&rel.left.col.name);
    let inner_right = d.quote(&rel.right.col.name);

    ctx.w("(");
    for lvl in 0..depth {
        if lvl > 0 {
            ctx.w(" OR ");
        }
        if lvl == 0 {
            ctx.w(&format!("{} = {}", left, parent_right));
            continue;
        }
        ctx.w(&left);
        for _ in 0..lvl {
            ctx.w(&format!(
                " IN (SELECT {} FROM {} WHERE {}",
                inner_right, table, inner_left
            ));
        }
        ctx.w(&format!(" = {}", parent_right));
        for _ in 0..lvl {
            ctx.w(")");
        }
    }
    ctx.w(")");
    Ok(())
}

/// Relationship filter joining the child to its parent.
fn render_rel_where<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    let rel = sel
        .rel
        .as_ref()
        .ok_or_else(|| CompileError::internal("related select without relationship"))?;
    let pref = parent_ref(d, ctx, sel)?;
    let child_expr = qcol(d, &sel.table_alias(), &rel.left.col.name);
    let parent_expr = qcol(d, &pref, &rel.right.col.name);
    if rel.right.array {
        d.render_rel_array_cond(ctx, &child_expr, &parent_expr, rel.right.col.is_json);
    } else if rel.left.array {
        d.render_rel_array_cond(ctx, &parent_expr, &child_expr, rel.left.col.is_json);
    } else {
        ctx.w(&child_expr);
        ctx.w(" = ");
        ctx.w(&parent_expr);
    }
    Ok(())
}

/// Cursor value as a correlated scalar subquery for inline-child engines.
fn render_inline_cursor_value<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    ctx.w("(SELECT ");
    d.render_cursor_value(ctx, sel, INLINE_ALIAS);
    ctx.w(" FROM (");
    render_base_select(d, ctx, sel)?;
    ctx.w(")");
    d.render_as_alias(ctx, INLINE_ALIAS);
    ctx.w(")");
    Ok(())
}
