//! 基础操作符（相等、存在性、包含、模式匹配）

use super::{
    Operator, is_array, is_simple, is_string, is_valid_regex, parse_regex, values_equal,
};
use serde_json::Value;

/// 全部基础操作符
pub(super) fn operators() -> Vec<Operator> {
    vec![
        equals(),
        not_equals(),
        is_defined(),
        is_undefined(),
        in_array(),
        not_in_array(),
        in_string(),
        not_in_string(),
        matches_pattern(),
    ]
}

/// 变量值等于指定值
fn equals() -> Operator {
    Operator::binary("equals", values_equal)
}

/// 变量值不等于指定值
fn not_equals() -> Operator {
    Operator::binary("notEquals", |lhs, rhs| !values_equal(lhs, rhs))
}

/// 变量已有值
fn is_defined() -> Operator {
    Operator::unary("isDefined", |value| value.is_some())
}

/// 变量尚无值
fn is_undefined() -> Operator {
    Operator::unary("isUndefined", |value| value.is_none())
}

/// 变量值在指定列表中
fn in_array() -> Operator {
    Operator::binary("inArray", |lhs, rhs| array_contains_value(rhs, lhs))
        .with_lhs_guard(is_simple)
        .with_rhs_guard(is_array)
}

/// 变量值不在指定列表中
fn not_in_array() -> Operator {
    Operator::binary("notInArray", |lhs, rhs| !array_contains_value(rhs, lhs))
        .with_lhs_guard(is_simple)
        .with_rhs_guard(is_array)
}

/// 变量文本是指定文本的子串
fn in_string() -> Operator {
    Operator::binary("inString", |lhs, rhs| {
        match (lhs.as_str(), rhs.as_str()) {
            (Some(needle), Some(haystack)) => haystack.contains(needle),
            _ => false,
        }
    })
    .with_lhs_guard(is_string)
    .with_rhs_guard(is_string)
}

/// 变量文本不是指定文本的子串
fn not_in_string() -> Operator {
    Operator::binary("notInString", |lhs, rhs| {
        match (lhs.as_str(), rhs.as_str()) {
            (Some(needle), Some(haystack)) => !haystack.contains(needle),
            _ => false,
        }
    })
    .with_lhs_guard(is_string)
    .with_rhs_guard(is_string)
}

/// 变量文本匹配指定正则表达式
fn matches_pattern() -> Operator {
    Operator::binary("matchesPattern", |lhs, rhs| {
        match (lhs.as_str(), parse_regex(rhs)) {
            (Some(text), Some(regex)) => regex.is_match(text),
            _ => false,
        }
    })
    .with_lhs_guard(is_string)
    .with_rhs_guard(is_valid_regex)
}

/// 列表中是否包含与给定值宽松相等的元素
pub(super) fn array_contains_value(array: &Value, value: &Value) -> bool {
    array
        .as_array()
        .is_some_and(|items| items.iter().any(|item| values_equal(item, value)))
}
