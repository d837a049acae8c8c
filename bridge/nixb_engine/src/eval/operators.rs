//! Strict binary operators over forced values.
//!
//! Lazy operators (`&&`, `||`, `->`) and the ones that need to force nested
//! values (`==`, `<` on lists) live on the evaluator.

use std::cmp::Ordering;
use std::rc::Rc;

use super::value::Val;
use crate::errors::{cannot_compare, division_by_zero, eval_error, integer_overflow, type_mismatch, NativeResult};
use crate::syntax::BinaryOp;

/// `+ - * /` with checked integer arithmetic and int/float promotion.
pub(crate) fn arithmetic(op: BinaryOp, left: &Val, right: &Val) -> NativeResult<Val> {
    match (left, right) {
        (Val::Int(a), Val::Int(b)) => int_op(op, *a, *b),
        (Val::Int(a), Val::Float(b)) => float_op(op, *a as f64, *b),
        (Val::Float(a), Val::Int(b)) => float_op(op, *a, *b as f64),
        (Val::Float(a), Val::Float(b)) => float_op(op, *a, *b),
        (Val::Str(a), Val::Str(b)) if op == BinaryOp::Add => Ok(Val::Str(concat_str(a, b))),
        (Val::Path(a), Val::Str(b) | Val::Path(b)) if op == BinaryOp::Add => {
            Ok(Val::Path(concat_str(a, b)))
        }
        (Val::Str(a), Val::Path(b)) if op == BinaryOp::Add => Ok(Val::Str(concat_str(a, b))),
        (Val::Int(_) | Val::Float(_), other) | (other, _) => {
            let expected = if op == BinaryOp::Add {
                "a number, string or path"
            } else {
                "an integer or a float"
            };
            Err(type_mismatch(expected, other.show_type()))
        }
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> NativeResult<Val> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(|| integer_overflow("addition"))?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(|| integer_overflow("subtraction"))?,
        BinaryOp::Mul => a
            .checked_mul(b)
            .ok_or_else(|| integer_overflow("multiplication"))?,
        BinaryOp::Div => {
            if b == 0 {
                return Err(division_by_zero());
            }
            a.checked_div(b).ok_or_else(|| integer_overflow("division"))?
        }
        _ => return Err(unsupported(op)),
    };
    Ok(Val::Int(result))
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> NativeResult<Val> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(division_by_zero());
            }
            a / b
        }
        _ => return Err(unsupported(op)),
    };
    Ok(Val::Float(result))
}

fn unsupported(op: BinaryOp) -> crate::errors::NativeError {
    eval_error(format!("operator '{}' is not arithmetic", op.as_symbol()))
}

fn concat_str(a: &str, b: &str) -> Rc<str> {
    let mut out = String::with_capacity(a.len() + b.len());
    out.push_str(a);
    out.push_str(b);
    Rc::from(out)
}

/// `++`
pub(crate) fn concat_lists(left: &Val, right: &Val) -> NativeResult<Val> {
    match (left, right) {
        (Val::List(a), Val::List(b)) => {
            let mut items = Vec::with_capacity(a.len() + b.len());
            items.extend(a.iter().cloned());
            items.extend(b.iter().cloned());
            Ok(Val::List(Rc::new(items)))
        }
        (Val::List(_), other) | (other, _) => Err(type_mismatch("a list", other.show_type())),
    }
}

/// `//`: right operand wins on conflicts.
pub(crate) fn update(left: &Val, right: &Val) -> NativeResult<Val> {
    match (left, right) {
        (Val::Attrs(a), Val::Attrs(b)) => {
            if b.is_empty() {
                return Ok(left.clone());
            }
            if a.is_empty() {
                return Ok(right.clone());
            }
            let mut merged = (**a).clone();
            merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Val::Attrs(Rc::new(merged)))
        }
        (Val::Attrs(_), other) | (other, _) => Err(type_mismatch("a set", other.show_type())),
    }
}

/// Ordering of two scalars. `None` for unordered floats (NaN).
pub(crate) fn compare_scalars(left: &Val, right: &Val) -> NativeResult<Option<Ordering>> {
    match (left, right) {
        (Val::Int(a), Val::Int(b)) => Ok(Some(a.cmp(b))),
        (Val::Int(a), Val::Float(b)) => Ok((*a as f64).partial_cmp(b)),
        (Val::Float(a), Val::Int(b)) => Ok(a.partial_cmp(&(*b as f64))),
        (Val::Float(a), Val::Float(b)) => Ok(a.partial_cmp(b)),
        (Val::Str(a), Val::Str(b)) | (Val::Path(a), Val::Path(b)) => Ok(Some(a.cmp(b))),
        _ => Err(cannot_compare(left.show_type(), right.show_type())),
    }
}

/// Equality of two scalars; `None` when either side needs deep comparison.
pub(crate) fn scalars_equal(left: &Val, right: &Val) -> Option<bool> {
    let equal = match (left, right) {
        (Val::Int(a), Val::Int(b)) => a == b,
        (Val::Int(a), Val::Float(b)) | (Val::Float(b), Val::Int(a)) => (*a as f64) == *b,
        (Val::Float(a), Val::Float(b)) => a == b,
        (Val::Bool(a), Val::Bool(b)) => a == b,
        (Val::Str(a), Val::Str(b)) | (Val::Path(a), Val::Path(b)) => a == b,
        (Val::Null, Val::Null) => true,
        (Val::External(a), Val::External(b)) => a == b,
        (Val::List(_), Val::List(_)) | (Val::Attrs(_), Val::Attrs(_)) => return None,
        _ => false,
    };
    Some(equal)
}
