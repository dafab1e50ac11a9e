//! Zone-map evaluation of a [`Predicate`] against one block's statistics.
//!
//! Every function answers "may this block contain a matching row?". `false`
//! is only returned when the statistics prove the block disjoint from the
//! predicate; missing statistics, unknown columns, incomparable types and
//! unsupported nodes all answer `true`.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::catalog::stats::{ColumnStats, ScalarValue};
use crate::prune::predicate::{CmpOp, Operand, Predicate};

pub(crate) fn may_match(predicate: &Predicate, stats: &HashMap<String, ColumnStats>) -> bool {
    match predicate {
        Predicate::And(left, right) => may_match(left, stats) && may_match(right, stats),
        Predicate::Or(left, right) => may_match(left, stats) || may_match(right, stats),
        Predicate::Range { column, low, high } => eval_range(column, low, high, stats),
        Predicate::InList { column, values } => eval_in_list(column, values, stats),
        Predicate::Comparison { op, left, right } => eval_comparison(*op, left, right, stats),
        Predicate::Unsupported => true,
    }
}

fn bounds<'a>(
    column: &str,
    stats: &'a HashMap<String, ColumnStats>,
) -> Option<(&'a ScalarValue, &'a ScalarValue)> {
    stats.get(column)?.range()
}

/// `a < b`, where an undefined comparison counts as "not provably".
fn lt(a: &ScalarValue, b: &ScalarValue) -> bool {
    a.partial_cmp(b) == Some(Ordering::Less)
}

fn le(a: &ScalarValue, b: &ScalarValue) -> bool {
    matches!(a.partial_cmp(b), Some(Ordering::Less | Ordering::Equal))
}

fn eval_range(
    column: &str,
    low: &ScalarValue,
    high: &ScalarValue,
    stats: &HashMap<String, ColumnStats>,
) -> bool {
    let Some((min, max)) = bounds(column, stats) else {
        return true;
    };
    // Excluded iff max < low or min > high.
    !(lt(max, low) || lt(high, min))
}

fn outside(value: &ScalarValue, min: &ScalarValue, max: &ScalarValue) -> bool {
    lt(value, min) || lt(max, value)
}

fn eval_in_list(column: &str, values: &[ScalarValue], stats: &HashMap<String, ColumnStats>) -> bool {
    let Some((min, max)) = bounds(column, stats) else {
        return true;
    };
    if values.is_empty() {
        return true;
    }
    !values.iter().all(|v| outside(v, min, max))
}

fn eval_comparison(
    op: CmpOp,
    left: &Operand,
    right: &Operand,
    stats: &HashMap<String, ColumnStats>,
) -> bool {
    // Normalise to `column <op> constant`.
    let (column, op, constant) = match (left, right) {
        (Operand::Column(c), Operand::Literal(v)) => (c, op, v),
        (Operand::Literal(v), Operand::Column(c)) => (c, op.flip(), v),
        _ => return true,
    };
    let Some((min, max)) = bounds(column, stats) else {
        return true;
    };

    let excluded = match op {
        CmpOp::Eq => outside(constant, min, max),
        CmpOp::NotEq => false,
        CmpOp::Gt => le(max, constant),
        CmpOp::GtEq => lt(max, constant),
        CmpOp::Lt => le(constant, min),
        CmpOp::LtEq => lt(constant, min),
    };
    !excluded
}
