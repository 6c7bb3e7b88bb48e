//! Keyset-cursor predicates.
//!
//! The decode CTE itself is dialect-rendered
//! ([`SqlDialect::render_cursor_cte`]); this module emits the lexicographic
//! WHERE expansion that resumes a page from the decoded `__cur` values.

use crate::compiler::context::Ctx;
use crate::compiler::query::exp::qcol;
use crate::compiler::traits::SqlDialect;
use crate::error::CompileResult;
use crate::qcode::{OrderDir, Select};

fn cmp(dir: OrderDir) -> &'static str {
    match dir {
        OrderDir::Asc | OrderDir::AscNullsFirst | OrderDir::AscNullsLast => " > ",
        OrderDir::Desc | OrderDir::DescNullsFirst | OrderDir::DescNullsLast => " < ",
    }
}

/// Scalar read of one decoded cursor value, cast back to the column type.
/// Uses the dialect's lenient cast so a garbled cursor degrades to NULL
/// where the engine offers one.
fn write_cur_value<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    col_name: &str,
    col_type: &str,
) {
    let subsel = format!("(SELECT {} FROM {})", d.quote(col_name), d.quote("__cur"));
    d.render_try_cast(ctx, &subsel, col_type);
}

/// Keyset predicate over the select's ORDER BY tuple:
/// `(a > A) OR (a = A AND b > B) OR ...`
pub(crate) fn render_cursor_where<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
) -> CompileResult<()> {
    let alias = sel.table_alias();
    ctx.w("(");
    for (i, ob) in sel.order_by.iter().enumerate() {
        if i > 0 {
            ctx.w(" OR ");
        }
        ctx.w("(");
        for (j, prev) in sel.order_by.iter().take(i).enumerate() {
            if j > 0 {
                ctx.w(" AND ");
            }
            ctx.w(&qcol(d, &alias, &prev.col.name));
            ctx.w(" = ");
            write_cur_value(d, ctx, &prev.col.name, &prev.col.col_type);
        }
        if i > 0 {
            ctx.w(" AND ");
        }
        ctx.w(&qcol(d, &alias, &ob.col.name));
        ctx.w(cmp(ob.dir));
        write_cur_value(d, ctx, &ob.col.name, &ob.col.col_type);
        ctx.w(")");
    }
    ctx.w(")");
    Ok(())
}
