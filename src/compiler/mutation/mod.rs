//! Mutation compiler.
//!
//! Emits DML for one or more mutations in dependency order, capturing
//! generated ids for cross-mutation references, and ends with a returning
//! select shaped exactly like a query. Engines with writable CTEs get a
//! single statement; everyone else gets a linear script with session-local
//! id capture.

pub mod cte;
pub mod linear;

use crate::compiler::context::Ctx;
use crate::compiler::query::exp;
use crate::compiler::traits::SqlDialect;
use crate::error::{CompileError, CompileResult};
use crate::qcode::{Column, Exp, Mutate, MutateKind, QCode, Select};

pub fn compile_mutation<D: SqlDialect + ?Sized>(d: &D, ctx: &mut Ctx) -> CompileResult<()> {
    let order = topo_order(ctx.qc)?;
    if d.supports_writable_cte() {
        tracing::debug!(dialect = d.name(), "writable-CTE mutation strategy");
        cte::compile(d, ctx, &order)
    } else if d.supports_linear_execution() {
        tracing::debug!(dialect = d.name(), "linear mutation strategy");
        linear::compile(d, ctx, &order)
    } else {
        Err(CompileError::internal(
            "dialect supports neither writable CTEs nor linear execution",
        ))
    }
}

/// Topological order over `depends_on`, stable by id. Cycles are an input
/// error.
pub(crate) fn topo_order(qc: &QCode) -> CompileResult<Vec<usize>> {
    let n = qc.mutates.len();
    let mut indeg = vec![0usize; n];
    for m in &qc.mutates {
        for _ in &m.depends_on {
            indeg[m.id] += 1;
        }
    }
    let mut ready: Vec<usize> = (0..n).filter(|i| indeg[*i] == 0).collect();
    let mut out = Vec::with_capacity(n);
    while let Some(i) = ready.first().copied() {
        ready.remove(0);
        out.push(i);
        for m in &qc.mutates {
            if m.depends_on.contains(&i) {
                indeg[m.id] -= 1;
                if indeg[m.id] == 0 {
                    ready.push(m.id);
                    ready.sort_unstable();
                }
            }
        }
    }
    if out.len() != n {
        return Err(CompileError::input("cyclic mutation dependencies"));
    }
    Ok(out)
}

/// JSON path of a mutation's payload inside the action variable.
pub(crate) fn payload_path(m: &Mutate) -> String {
    let mut p = String::from("$");
    for seg in &m.path {
        p.push('.');
        p.push_str(seg);
    }
    if m.is_array {
        p.push_str("[*]");
    }
    p
}

/// Scope stand-in so filter emission resolves unqualified columns against
/// the mutation's table.
pub(crate) fn scope_select(m: &Mutate) -> Select {
    Select::new(m.id, m.table.clone(), "")
}

/// Render a mutation WHERE clause with unqualified columns bound to the
/// raw (unaliased) table name.
pub(crate) fn render_mutation_where<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    m: &Mutate,
    w: &Exp,
) -> CompileResult<()> {
    let scope = scope_select(m);
    ctx.alias_override = Some(m.table.name.clone());
    let res = exp::render_exp(d, ctx, &scope, w);
    ctx.alias_override = None;
    res
}

/// Whether a dependency's captured variable holds a JSON array (connect /
/// disconnect capture lists; inserts capture a scalar id).
pub(crate) fn captured_as_list(qc: &QCode, mutate_id: usize) -> bool {
    qc.mutates
        .get(mutate_id)
        .map(|m| matches!(m.kind, MutateKind::Connect | MutateKind::Disconnect))
        .unwrap_or(false)
}

/// Session-state name one captured column of `m` is read back through: the
/// mutation tag for the primary key, `<tag>_<col>` for any other column.
pub(crate) fn capture_name(m: &Mutate, col: &Column) -> String {
    if col.name == m.table.pk.name {
        m.tag()
    } else {
        format!("{}_{}", m.tag(), col.name)
    }
}

/// Distinct non-PK columns other mutations read from `m`'s captured row
/// through their related columns, in first-seen order. A linear update
/// must capture these next to the primary key.
pub(crate) fn dependent_src_cols(qc: &QCode, m: &Mutate) -> Vec<Column> {
    let mut out: Vec<Column> = Vec::new();
    for other in &qc.mutates {
        if other.id == m.id {
            continue;
        }
        for rc in &other.rcols {
            if rc.mutate_id == m.id
                && rc.src_col.name != m.table.pk.name
                && !out.iter().any(|c| c.name == rc.src_col.name)
            {
                out.push(rc.src_col.clone());
            }
        }
    }
    out
}

/// Returning plan for the linear strategy: root selects with no user
/// filter get the captured-id filter injected. An explicit user WHERE
/// always stands alone.
pub(crate) fn returning_plan<D: SqlDialect + ?Sized>(d: &D, ctx: &Ctx) -> QCode {
    let action_var = ctx.action_var().to_string();
    let mut qc = ctx.qc.clone();
    qc.op = crate::qcode::OpKind::Query;
    for rid in qc.roots.clone() {
        let table = qc.selects[rid].table.name.clone();
        if qc.selects[rid].where_.is_some() {
            continue;
        }
        if let Some(m) = qc.mutates.iter().find(|m| m.table.name == table) {
            qc.selects[rid].where_ = Some(d.returning_id_filter(&action_var, m));
        }
    }
    qc
}
