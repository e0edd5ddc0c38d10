//! 数值比较操作符

use super::{Operator, as_f64, as_number_range, is_number_range, is_numeric};
use serde_json::Value;

/// 全部数值操作符
pub(super) fn operators() -> Vec<Operator> {
    vec![
        less_than(),
        less_or_equal(),
        greater_than(),
        greater_than_or_equal(),
        in_range_number(),
    ]
}

/// 构造数值二元比较操作符，两侧都要求数值或数值字符串
fn numeric_compare(
    name: &'static str,
    cmp: impl Fn(f64, f64) -> bool + Send + Sync + 'static,
) -> Operator {
    Operator::binary(name, move |lhs: &Value, rhs: &Value| {
        match (as_f64(lhs), as_f64(rhs)) {
            (Some(a), Some(b)) => cmp(a, b),
            _ => false,
        }
    })
    .with_lhs_guard(is_numeric)
    .with_rhs_guard(is_numeric)
}

fn less_than() -> Operator {
    numeric_compare("lessThan", |a, b| a < b)
}

fn less_or_equal() -> Operator {
    numeric_compare("lessOrEqual", |a, b| a <= b)
}

fn greater_than() -> Operator {
    numeric_compare("greaterThan", |a, b| a > b)
}

fn greater_than_or_equal() -> Operator {
    numeric_compare("greaterThanOrEqual", |a, b| a >= b)
}

/// 变量数值在 [min, max] 闭区间内
fn in_range_number() -> Operator {
    Operator::binary("inRangeNumber", |lhs, rhs| {
        match (as_f64(lhs), as_number_range(rhs)) {
            (Some(value), Some((min, max))) => value >= min && value <= max,
            _ => false,
        }
    })
    .with_lhs_guard(is_numeric)
    .with_rhs_guard(is_number_range)
}
