//! Filter-expression emission.

use crate::compiler::context::Ctx;
use crate::compiler::traits::SqlDialect;
use crate::compiler::Param;
use crate::error::{CompileError, CompileResult};
use crate::qcode::{Column, Exp, ExpOp, Operand, Select};

/// Quoted `"table"."column"` reference.
pub(crate) fn qcol<D: SqlDialect + ?Sized>(d: &D, t: &str, c: &str) -> String {
    format!("{}.{}", d.quote(t), d.quote(c))
}

/// Render one expression tree node into the buffer.
pub fn render_exp<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
    exp: &Exp,
) -> CompileResult<()> {
    match exp.op {
        ExpOp::And | ExpOp::Or => {
            if exp.children.is_empty() {
                ctx.w("true");
                return Ok(());
            }
            let joiner = if exp.op == ExpOp::And { " AND " } else { " OR " };
            ctx.w("(");
            for (i, c) in exp.children.iter().enumerate() {
                if i > 0 {
                    ctx.w(joiner);
                }
                ctx.w("(");
                render_exp(d, ctx, sel, c)?;
                ctx.w(")");
            }
            ctx.w(")");
            return Ok(());
        }
        ExpOp::Not => {
            let child = exp
                .children
                .first()
                .ok_or_else(|| CompileError::internal("NOT without a child"))?;
            ctx.w("NOT (");
            render_exp(d, ctx, sel, child)?;
            ctx.w(")");
            return Ok(());
        }
        _ => {}
    }

    // Engine-specific rewrites (JSON key tests, membership over JSON
    // arrays, case folding) take the whole expression over.
    if d.render_exp_special(ctx, sel, exp)? {
        return Ok(());
    }

    match exp.op {
        ExpOp::IsNull | ExpOp::IsNotNull => {
            render_operand(d, ctx, sel, &exp.left, None)?;
            ctx.w(if exp.op == ExpOp::IsNull {
                " IS NULL"
            } else {
                " IS NOT NULL"
            });
        }
        ExpOp::EqualsTrue | ExpOp::NotEqualsTrue => {
            render_operand(d, ctx, sel, &exp.right, None)?;
            d.render_is_true(ctx, exp.op == ExpOp::NotEqualsTrue);
        }
        ExpOp::SelectExists => render_exists(d, ctx, sel, exp)?,
        ExpOp::TsQuery => d.render_ts_query(ctx, sel, exp)?,
        ExpOp::GeoIntersects | ExpOp::GeoContains | ExpOp::GeoDwithin => {
            d.render_geo_op(ctx, sel, exp)?
        }
        ExpOp::In | ExpOp::NotIn => {
            let not = exp.op == ExpOp::NotIn;
            render_operand(d, ctx, sel, &exp.left, None)?;
            match &exp.right {
                Operand::List { items, vt } => {
                    ctx.w(if not { " NOT IN (" } else { " IN (" });
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            ctx.w(", ");
                        }
                        d.render_literal(ctx, item, *vt)?;
                    }
                    ctx.w(")");
                }
                Operand::Var(name) => {
                    let hint = left_column(&exp.left);
                    let mut p = Param::new(
                        name.clone(),
                        hint.map(|c| c.col_type.clone())
                            .unwrap_or_else(|| "text".into()),
                    );
                    p.is_array = true;
                    p.wrap_in_array = true;
                    d.render_in_var(ctx, p, not);
                }
                other => {
                    ctx.w(if not { " NOT IN " } else { " IN " });
                    render_operand(d, ctx, sel, other, left_column(&exp.left))?;
                }
            }
        }
        op => {
            let keyword = d.render_op(op)?;
            render_operand(d, ctx, sel, &exp.left, None)?;
            ctx.w(" ");
            ctx.w(keyword);
            ctx.w(" ");
            match (&exp.right, op) {
                // array containment compares against an array constructor
                (Operand::List { items, vt }, ExpOp::Contains | ExpOp::ContainedIn) => {
                    d.render_array(ctx, items, *vt)?;
                }
                (other, _) => render_operand(d, ctx, sel, other, left_column(&exp.left))?,
            }
        }
    }
    Ok(())
}

/// EXISTS over the expression's sub-joins. Joined outer tables take the
/// `_0`-suffixed alias so correlated subqueries see a stable name.
fn render_exists<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
    exp: &Exp,
) -> CompileResult<()> {
    if exp.joins.is_empty() {
        return Err(CompileError::input("exists filter without sub-joins"));
    }
    ctx.w("EXISTS (SELECT 1 FROM ");
    for (i, j) in exp.joins.iter().enumerate() {
        if i > 0 {
            ctx.w(", ");
        }
        ctx.w(&d.quote(&j.table));
        d.render_as_alias(ctx, &format!("{}_0", j.table));
    }
    ctx.w(" WHERE ");
    for (i, j) in exp.joins.iter().enumerate() {
        if i > 0 {
            ctx.w(" AND ");
        }
        ctx.w("(");
        render_exp(d, ctx, sel, &j.on)?;
        ctx.w(")");
    }
    ctx.w(")");
    Ok(())
}

/// Render one operand. `hint` carries the opposite side's column so
/// variable binds pick up a declared type.
pub fn render_operand<D: SqlDialect + ?Sized>(
    d: &D,
    ctx: &mut Ctx,
    sel: &Select,
    opnd: &Operand,
    hint: Option<&Column>,
) -> CompileResult<()> {
    match opnd {
        Operand::None => Err(CompileError::internal("missing operand")),
        Operand::Col {
            col,
            table,
            sel_id,
            path,
        } => {
            let tref = match (table, sel_id) {
                (Some(t), _) => t.clone(),
                (None, Some(id)) => ctx.child(*id)?.table_alias(),
                (None, None) => ctx
                    .alias_override
                    .clone()
                    .unwrap_or_else(|| sel.table_alias()),
            };
            if !path.is_empty() {
                d.render_json_path(ctx, &tref, col, path, true);
            } else {
                ctx.col_with_table(d, &tref, &col.name);
            }
            Ok(())
        }
        Operand::Val { v, vt } => d.render_literal(ctx, v, *vt),
        Operand::Var(name) => {
            if let Some(val) = ctx.config_var(name) {
                let val = val.to_string();
                ctx.squote(&val);
                return Ok(());
            }
            let mut p = Param::new(
                name.clone(),
                hint.map(|c| c.col_type.clone())
                    .unwrap_or_else(|| "text".into()),
            );
            p.is_array = hint.map(|c| c.is_array).unwrap_or(false);
            ctx.add_param(d, p);
            Ok(())
        }
        Operand::DbVar(name) => {
            d.render_var(ctx, name);
            Ok(())
        }
        Operand::List { items, vt } => {
            ctx.w("(");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    ctx.w(", ");
                }
                d.render_literal(ctx, item, *vt)?;
            }
            ctx.w(")");
            Ok(())
        }
    }
}

/// The column on the left side of a comparison, if any.
pub(crate) fn left_column(op: &Operand) -> Option<&Column> {
    match op {
        Operand::Col { col, .. } => Some(col),
        _ => None,
    }
}

/// Detect a top-level `@skip`/`@include` variable test. Returns the
/// variable name and whether the test is negated.
pub(crate) fn skip_variable(exp: &Exp) -> Option<(String, bool)> {
    match exp.op {
        ExpOp::EqualsTrue => var_name(&exp.right).map(|n| (n, false)),
        ExpOp::NotEqualsTrue => var_name(&exp.right).map(|n| (n, true)),
        ExpOp::And => exp.children.iter().find_map(skip_variable),
        _ => None,
    }
}

fn var_name(op: &Operand) -> Option<String> {
    match op {
        Operand::Var(n) => Some(n.clone()),
        _ => None,
    }
}
