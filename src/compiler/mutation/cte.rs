//! Writable-CTE mutation strategy (single statement).
//!
//! Every mutation becomes a named CTE; dependents select captured ids from
//! sibling CTEs; the final select is the standard query-compiled root, whose
//! table references resolve to the CTE names.

use crate::compiler::context::Ctx;
use crate::compiler::mutation::render_mutation_where;
use crate::compiler::query;
use crate::compiler::traits::SqlDialect;
use crate::error::{CompileError, CompileResult};
use crate::qcode::{Mutate, MutateKind, QCode};

pub(crate) fn compile<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    order: &[usize],
) -> CompileResult<()> {
    ctx.w("WITH ");
    d.render_mutation_input(ctx);
    let qc = ctx.qc;
    for &i in order {
        let m = &qc.mutates[i];
        ctx.w(", ");
        ctx.w(&d.quote(&cte_name(qc, m)));
        ctx.w(" AS (");
        match m.kind {
            MutateKind::Insert => render_insert(d, ctx, m, false)?,
            MutateKind::Upsert => render_insert(d, ctx, m, true)?,
            MutateKind::Update => render_update(d, ctx, m)?,
            MutateKind::Delete => render_delete(d, ctx, m)?,
            MutateKind::Connect => render_connect(d, ctx, m)?,
            MutateKind::Disconnect => render_disconnect(d, ctx, m)?,
        }
        ctx.w(")");
    }
    ctx.w(" ");
    query::compile_query(d, ctx)
}

/// CTE name for a mutation: the plain table name, disambiguated with the
/// mutation id when the same table is mutated more than once.
pub(crate) fn cte_name(qc: &QCode, m: &Mutate) -> String {
    let shared = qc
        .mutates
        .iter()
        .filter(|o| o.table.name == m.table.name)
        .count()
        > 1;
    if shared { m.tag() } else { m.table.name.clone() }
}

/// The `"i"."j"->'path'` JSON expression holding this mutation's payload.
fn payload_expr<D: SqlDialect + ?Sized>(d: &D, m: &Mutate) -> String {
    let mut e = format!("{}.{}", d.quote("i"), d.quote("j"));
    for seg in &m.path {
        e.push_str("->");
        e.push('\'');
        e.push_str(seg);
        e.push('\'');
    }
    e
}

fn render_insert<D: SqlDialect + ?Sized>(
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
            // presets arrive pre-rendered
            Some(v) => ctx.w(v),
            None => {
                ctx.w("CAST(");
                ctx.col_with_table(d, "t", &c.field_name);
                ctx.w(&format!(" AS {})", d.cast_type(&c.col.col_type)));
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
        ctx.col_with_table(d, &cte_name(ctx.qc, dep), &rc.src_col.name);
    }
    ctx.w(" FROM ");
    ctx.w(&d.quote("_sg_input"));
    d.render_as_alias(ctx, "i");
    ctx.w(", ");
    let payload = payload_expr(d, m);
    d.render_mutate_to_record_set(ctx, m, &payload);
    for rc in &m.rcols {
        let dep = &ctx.qc.mutates[rc.mutate_id];
        ctx.w(", ");
        ctx.w(&d.quote(&cte_name(ctx.qc, dep)));
    }
    if upsert {
        if !d.supports_conflict_update() {
            return Err(CompileError::UnsupportedFeature {
                feature: "conflict update",
                dialect: d.name(),
            });
        }
        ctx.w(" ON CONFLICT (");
        ctx.w(&d.quote(&m.table.pk.name));
        ctx.w(") DO UPDATE SET ");
        let mut first = true;
        for c in m.cols.iter().filter(|c| c.col.name != m.table.pk.name) {
            if !first {
                ctx.w(", ");
            }
            first = false;
            ctx.w(&d.quote(&c.col.name));
            ctx.w(" = EXCLUDED.");
            ctx.w(&d.quote(&c.col.name));
        }
    }
    ctx.w(" RETURNING ");
    ctx.w(&table);
    ctx.w(".*");
    Ok(())
}

fn render_update<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    m: &Mutate,
) -> CompileResult<()> {
    let table = d.quote(&m.table.name);
    ctx.w("UPDATE ");
    ctx.w(&table);
    ctx.w(" SET ");
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
                ctx.w("CAST(");
                ctx.col_with_table(d, "t", &c.field_name);
                ctx.w(&format!(" AS {})", d.cast_type(&c.col.col_type)));
            }
        }
    }
    for rc in &m.rcols {
        if !first {
            ctx.w(", ");
        }
        first = false;
        let dep = &ctx.qc.mutates[rc.mutate_id];
        ctx.w(&d.quote(&rc.col.name));
        ctx.w(" = ");
        ctx.col_with_table(d, &cte_name(ctx.qc, dep), &rc.src_col.name);
    }
    ctx.w(" FROM ");
    ctx.w(&d.quote("_sg_input"));
    d.render_as_alias(ctx, "i");
    ctx.w(", ");
    let payload = payload_expr(d, m);
    d.render_mutate_to_record_set(ctx, m, &payload);
    for rc in &m.rcols {
        let dep = &ctx.qc.mutates[rc.mutate_id];
        ctx.w(", ");
        ctx.w(&d.quote(&cte_name(ctx.qc, dep)));
    }
    if let Some(w) = &m.where_ {
        ctx.w(" WHERE (");
        render_mutation_where(d, ctx, m, w)?;
        ctx.w(")");
    }
    ctx.w(" RETURNING ");
    ctx.w(&table);
    ctx.w(".*");
    Ok(())
}

fn render_delete<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    m: &Mutate,
) -> CompileResult<()> {
    let table = d.quote(&m.table.name);
    ctx.w("DELETE FROM ");
    ctx.w(&table);
    if let Some(w) = &m.where_ {
        ctx.w(" WHERE (");
        render_mutation_where(d, ctx, m, w)?;
        ctx.w(")");
    }
    ctx.w(" RETURNING ");
    ctx.w(&table);
    ctx.w(".*");
    Ok(())
}

/// Connect selects the rows being attached so dependents (and the
/// returning select) can read their keys.
fn render_connect<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    m: &Mutate,
) -> CompileResult<()> {
    let table = d.quote(&m.table.name);
    ctx.w("SELECT ");
    ctx.w(&table);
    ctx.w(".* FROM ");
    ctx.w(&table);
    if let Some(w) = &m.where_ {
        ctx.w(" WHERE (");
        render_mutation_where(d, ctx, m, w)?;
        ctx.w(")");
    }
    Ok(())
}

fn render_disconnect<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    m: &Mutate,
) -> CompileResult<()> {
    let rel = m
        .rel
        .as_ref()
        .ok_or_else(|| CompileError::input("disconnect without a relationship"))?;
    let table = d.quote(&m.table.name);
    ctx.w("UPDATE ");
    ctx.w(&table);
    ctx.w(" SET ");
    ctx.w(&d.quote(&rel.left.col.name));
    if rel.left.col.is_array {
        ctx.w(" = ");
        let col_expr = format!("{}.{}", table, d.quote(&rel.left.col.name));
        let parent = m
            .parent
            .and_then(|p| ctx.qc.mutates.get(p))
            .ok_or_else(|| CompileError::input("array disconnect without a parent"))?;
        let value = format!(
            "(SELECT {} FROM {})",
            d.quote(&rel.right.col.name),
            d.quote(&cte_name(ctx.qc, parent))
        );
        d.render_array_remove(ctx, &col_expr, &value);
    } else {
        ctx.w(" = NULL");
    }
    if let Some(w) = &m.where_ {
        ctx.w(" WHERE (");
        render_mutation_where(d, ctx, m, w)?;
        ctx.w(")");
    }
    ctx.w(" RETURNING ");
    ctx.w(&table);
    ctx.w(".*");
    Ok(())
}
