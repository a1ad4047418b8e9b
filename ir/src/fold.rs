//! Variable substitution and constant folding.
//!
//! Both are identity preserving: a subtree the operation does not change is
//! handed back as the same allocation. The lowering passes themselves never
//! fold — the expressions they emit are shaped for later simplification — but
//! downstream stages and the tests resolve offsets through here.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::expr::{Expr, ExprKind};
use crate::types::{BinaryOp, ConstValue};

/// Replace free variables by name.
pub fn substitute(expr: &Arc<Expr>, bindings: &HashMap<String, Arc<Expr>>) -> Arc<Expr> {
    match expr.kind() {
        ExprKind::Const(_) => expr.clone(),
        ExprKind::Var { name } => match bindings.get(name) {
            Some(replacement) => replacement.clone(),
            None => expr.clone(),
        },
        ExprKind::Cast { value } => {
            let folded = substitute(value, bindings);
            if folded.same_as(value) {
                expr.clone()
            } else {
                Expr::cast(expr.dtype(), folded)
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = substitute(lhs, bindings);
            let r = substitute(rhs, bindings);
            if l.same_as(lhs) && r.same_as(rhs) {
                expr.clone()
            } else {
                Expr::binary(*op, l, r)
            }
        }
        ExprKind::RegionRead { name, coords, value_index, origin } => {
            let (coords, changed) = substitute_list(coords, bindings);
            if changed {
                Expr::region_read(expr.dtype(), name.clone(), coords, *value_index, *origin)
            } else {
                expr.clone()
            }
        }
        ExprKind::Call { name, args, kind } => {
            let (args, changed) = substitute_list(args, bindings);
            if changed {
                Expr::call(expr.dtype(), name.clone(), args, *kind)
            } else {
                expr.clone()
            }
        }
        ExprKind::Load { name, offset, origin } => {
            let o = substitute(offset, bindings);
            if o.same_as(offset) {
                expr.clone()
            } else {
                Expr::load(expr.dtype(), name.clone(), o, *origin)
            }
        }
    }
}

fn substitute_list(
    items: &[Arc<Expr>],
    bindings: &HashMap<String, Arc<Expr>>,
) -> (SmallVec<[Arc<Expr>; 4]>, bool) {
    let out: SmallVec<[Arc<Expr>; 4]> =
        items.iter().map(|item| substitute(item, bindings)).collect();
    let changed = out.iter().zip(items).any(|(new, old)| !new.same_as(old));
    (out, changed)
}

/// Bottom-up constant folding: binary arithmetic over matching constants,
/// plus the integer unit laws x+0, x-0, x*1, x*0, x/1. Division and
/// remainder by a constant zero are left unfolded; casts are not folded.
pub fn fold(expr: &Arc<Expr>) -> Arc<Expr> {
    match expr.kind() {
        ExprKind::Const(_) | ExprKind::Var { .. } => expr.clone(),
        ExprKind::Cast { value } => {
            let v = fold(value);
            if v.same_as(value) {
                expr.clone()
            } else {
                Expr::cast(expr.dtype(), v)
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = fold(lhs);
            let r = fold(rhs);
            if let Some(value) = eval_binary(*op, &l, &r) {
                return Expr::constant(expr.dtype(), value);
            }
            let int_typed = expr.dtype().is_int() || expr.dtype().is_uint();
            if int_typed {
                match op {
                    BinaryOp::Add => {
                        if is_zero(&l) {
                            return r;
                        }
                        if is_zero(&r) {
                            return l;
                        }
                    }
                    BinaryOp::Sub => {
                        if is_zero(&r) {
                            return l;
                        }
                    }
                    BinaryOp::Mul => {
                        if is_one(&l) {
                            return r;
                        }
                        if is_one(&r) {
                            return l;
                        }
                        if is_zero(&l) {
                            return l;
                        }
                        if is_zero(&r) {
                            return r;
                        }
                    }
                    BinaryOp::Div => {
                        if is_one(&r) {
                            return l;
                        }
                    }
                    _ => {}
                }
            }
            if l.same_as(lhs) && r.same_as(rhs) {
                expr.clone()
            } else {
                Expr::binary(*op, l, r)
            }
        }
        ExprKind::RegionRead { name, coords, value_index, origin } => {
            let (coords, changed) = fold_list(coords);
            if changed {
                Expr::region_read(expr.dtype(), name.clone(), coords, *value_index, *origin)
            } else {
                expr.clone()
            }
        }
        ExprKind::Call { name, args, kind } => {
            let (args, changed) = fold_list(args);
            if changed {
                Expr::call(expr.dtype(), name.clone(), args, *kind)
            } else {
                expr.clone()
            }
        }
        ExprKind::Load { name, offset, origin } => {
            let o = fold(offset);
            if o.same_as(offset) {
                expr.clone()
            } else {
                Expr::load(expr.dtype(), name.clone(), o, *origin)
            }
        }
    }
}

fn fold_list(items: &[Arc<Expr>]) -> (SmallVec<[Arc<Expr>; 4]>, bool) {
    let out: SmallVec<[Arc<Expr>; 4]> = items.iter().map(fold).collect();
    let changed = out.iter().zip(items).any(|(new, old)| !new.same_as(old));
    (out, changed)
}

fn as_const(expr: &Arc<Expr>) -> Option<ConstValue> {
    match expr.kind() {
        ExprKind::Const(value) => Some(*value),
        _ => None,
    }
}

fn is_zero(expr: &Arc<Expr>) -> bool {
    matches!(as_const(expr), Some(ConstValue::Int(0)) | Some(ConstValue::UInt(0)))
}

fn is_one(expr: &Arc<Expr>) -> bool {
    matches!(as_const(expr), Some(ConstValue::Int(1)) | Some(ConstValue::UInt(1)))
}

fn eval_binary(op: BinaryOp, lhs: &Arc<Expr>, rhs: &Arc<Expr>) -> Option<ConstValue> {
    use BinaryOp::*;
    use ConstValue::*;
    let value = match (as_const(lhs)?, as_const(rhs)?) {
        (Int(a), Int(b)) => Int(match op {
            Add => a.wrapping_add(b),
            Sub => a.wrapping_sub(b),
            Mul => a.wrapping_mul(b),
            Div => a.checked_div(b)?,
            Mod => a.checked_rem(b)?,
            Min => a.min(b),
            Max => a.max(b),
        }),
        (UInt(a), UInt(b)) => UInt(match op {
            Add => a.wrapping_add(b),
            Sub => a.wrapping_sub(b),
            Mul => a.wrapping_mul(b),
            Div => a.checked_div(b)?,
            Mod => a.checked_rem(b)?,
            Min => a.min(b),
            Max => a.max(b),
        }),
        (Float(a), Float(b)) => Float(match op {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Div => a / b,
            Mod => a % b,
            Min => a.min(b),
            Max => a.max(b),
        }),
        _ => return None,
    };
    Some(value)
}
