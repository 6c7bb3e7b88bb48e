//! ORDER BY emission.

use crate::compiler::context::Ctx;
use crate::compiler::query::exp::qcol;
use crate::compiler::traits::SqlDialect;
use crate::compiler::Param;
use crate::error::CompileResult;
use crate::qcode::{OrderDir, Select};

/// Direction keyword without NULLS placement, for computed order terms.
fn plain_dir(dir: OrderDir) -> &'static str {
    match dir {
        OrderDir::Asc | OrderDir::AscNullsFirst | OrderDir::AscNullsLast => " ASC",
        OrderDir::Desc | OrderDir::DescNullsFirst | OrderDir::DescNullsLast => " DESC",
    }
}

/// Emit the full ORDER BY clause of a base select.
pub(crate) fn render_order_by<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    if sel.order_by.is_empty() {
        return Ok(());
    }
    let alias = sel.table_alias();
    ctx.w(" ORDER BY ");
    for (i, ob) in sel.order_by.iter().enumerate() {
        if i > 0 {
            ctx.w(", ");
        }
        let col_expr = qcol(d, &alias, &ob.col.name);
        if let Some(var) = &ob.var {
            // order rows by the column's index inside the variable's array
            d.render_array_position(ctx, var, &col_expr);
            ctx.w(plain_dir(ob.dir));
        } else if let (Some(key_var), Some(key)) = (&ob.key_var, &ob.key) {
            // tenant-selected ordering: the entry applies only when the
            // key variable matches
            ctx.w("CASE WHEN ");
            ctx.add_param(d, Param::new(key_var.clone(), "text"));
            ctx.w(" = ");
            ctx.squote(key);
            ctx.w(" THEN ");
            ctx.w(&col_expr);
            ctx.w(" END");
            ctx.w(plain_dir(ob.dir));
        } else {
            d.render_order_term(ctx, &col_expr, ob.dir);
        }
    }
    Ok(())
}
