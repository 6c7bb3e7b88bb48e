//! Linear mutation strategy (multi-statement script).
//!
//! Statements run in dependency order on a single connection inside one
//! transaction; generated ids are captured in session-local state chosen by
//! the dialect (user variables, `RETURNING INTO`, temp tables). The script
//! ends with the standard query-compiled returning select, filtered by the
//! captured ids unless the plan carries an explicit user filter.

use crate::compiler::context::Ctx;
use crate::compiler::mutation::returning_plan;
use crate::compiler::query;
use crate::compiler::traits::SqlDialect;
use crate::error::CompileResult;
use crate::qcode::MutateKind;

pub(crate) fn compile<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    order: &[usize],
) -> CompileResult<()> {
    d.render_setup(ctx);
    d.render_begin(ctx);
    let qc = ctx.qc;
    for &i in order {
        let m = &qc.mutates[i];
        match m.kind {
            MutateKind::Insert => d.render_linear_insert(ctx, m)?,
            MutateKind::Upsert => d.render_linear_upsert(ctx, m)?,
            MutateKind::Update => d.render_linear_update(ctx, m)?,
            MutateKind::Delete => d.render_linear_delete(ctx, m)?,
            MutateKind::Connect => d.render_linear_connect(ctx, m)?,
            MutateKind::Disconnect => d.render_linear_disconnect(ctx, m)?,
        }
    }

    let qc2 = returning_plan(d, ctx);
    d.render_query_prefix(ctx);
    let mut inner = Ctx::new(&qc2, ctx.opts);
    inner.ordinal_offset = ctx.params_len();
    query::compile_query(d, &mut inner)?;
    ctx.w(&inner.buf);
    ctx.params.extend(inner.params);
    d.render_mutation_postamble(ctx);
    d.render_teardown(ctx);
    Ok(())
}
