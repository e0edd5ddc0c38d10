//! 数组与长度操作符
//!
//! `all*` 系列要求数组中全部元素满足谓词（空数组为真），
//! `one*` 系列要求至少一个元素满足（空数组为假），
//! `length*` 系列比较数组长度。

use super::basic::array_contains_value;
use super::{
    Operator, as_f64, as_number_range, is_array, is_number_range, is_numeric, is_simple,
    is_string, is_valid_regex, parse_regex, values_equal,
};
use serde_json::Value;

/// 全部数组操作符
pub(super) fn operators() -> Vec<Operator> {
    vec![
        array_contains(),
        not_array_contains(),
        string_contains(),
        not_string_contains(),
        all_equal(),
        all_greater(),
        all_lower(),
        all_in(),
        all_not_in(),
        all_match(),
        all_range_number(),
        one_equals(),
        one_greater(),
        one_lower(),
        one_in(),
        one_matches(),
        one_range_number(),
        length_equals(),
        length_not_equals(),
        length_less_than(),
        length_less_than_or_equals(),
        length_greater_than(),
        length_greater_than_or_equals(),
    ]
}

/// lhs 数组的全部元素满足谓词
fn for_all(lhs: &Value, predicate: impl Fn(&Value) -> bool) -> bool {
    lhs.as_array()
        .is_some_and(|items| items.iter().all(predicate))
}

/// lhs 数组中至少一个元素满足谓词
fn for_one(lhs: &Value, predicate: impl Fn(&Value) -> bool) -> bool {
    lhs.as_array()
        .is_some_and(|items| items.iter().any(predicate))
}

/// 变量数组中存在等于指定值的元素
fn array_contains() -> Operator {
    Operator::binary("arrayContains", |lhs, rhs| array_contains_value(lhs, rhs))
        .with_lhs_guard(is_array)
        .with_rhs_guard(is_simple)
}

/// 变量数组中所有元素都不等于指定值
fn not_array_contains() -> Operator {
    Operator::binary("notArrayContains", |lhs, rhs| {
        !array_contains_value(lhs, rhs)
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_simple)
}

/// 变量文本包含指定子串
fn string_contains() -> Operator {
    Operator::binary("stringContains", |lhs, rhs| {
        match (lhs.as_str(), rhs.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        }
    })
    .with_lhs_guard(is_string)
    .with_rhs_guard(is_string)
}

/// 变量文本不包含指定子串
fn not_string_contains() -> Operator {
    Operator::binary("notStringContains", |lhs, rhs| {
        match (lhs.as_str(), rhs.as_str()) {
            (Some(haystack), Some(needle)) => !haystack.contains(needle),
            _ => false,
        }
    })
    .with_lhs_guard(is_string)
    .with_rhs_guard(is_string)
}

/// 数组所有元素等于指定值
fn all_equal() -> Operator {
    Operator::binary("allEqual", |lhs, rhs| {
        for_all(lhs, |item| values_equal(item, rhs))
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_simple)
}

/// 数组所有数值元素大于指定值
fn all_greater() -> Operator {
    Operator::binary("allGreater", |lhs, rhs| {
        let Some(bound) = as_f64(rhs) else {
            return false;
        };
        for_all(lhs, |item| as_f64(item).is_some_and(|v| v > bound))
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_numeric)
}

/// 数组所有数值元素小于指定值
fn all_lower() -> Operator {
    Operator::binary("allLower", |lhs, rhs| {
        let Some(bound) = as_f64(rhs) else {
            return false;
        };
        for_all(lhs, |item| as_f64(item).is_some_and(|v| v < bound))
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_numeric)
}

/// 数组所有元素都在指定列表中
fn all_in() -> Operator {
    Operator::binary("allIn", |lhs, rhs| {
        for_all(lhs, |item| array_contains_value(rhs, item))
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_array)
}

/// 数组所有元素都不在指定列表中
fn all_not_in() -> Operator {
    Operator::binary("allNotIn", |lhs, rhs| {
        for_all(lhs, |item| !array_contains_value(rhs, item))
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_array)
}

/// 数组所有文本元素匹配指定正则
fn all_match() -> Operator {
    Operator::binary("allMatch", |lhs, rhs| {
        let Some(regex) = parse_regex(rhs) else {
            return false;
        };
        for_all(lhs, |item| {
            item.as_str().is_some_and(|s| regex.is_match(s))
        })
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_valid_regex)
}

/// 数组所有数值元素在 [min, max] 区间内
fn all_range_number() -> Operator {
    Operator::binary("allRangeNumber", |lhs, rhs| {
        let Some((min, max)) = as_number_range(rhs) else {
            return false;
        };
        for_all(lhs, |item| {
            as_f64(item).is_some_and(|v| v >= min && v <= max)
        })
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_number_range)
}

/// 数组中存在等于指定值的元素
fn one_equals() -> Operator {
    Operator::binary("oneEquals", |lhs, rhs| {
        for_one(lhs, |item| values_equal(item, rhs))
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_simple)
}

/// 数组中存在大于指定值的数值元素
fn one_greater() -> Operator {
    Operator::binary("oneGreater", |lhs, rhs| {
        let Some(bound) = as_f64(rhs) else {
            return false;
        };
        for_one(lhs, |item| as_f64(item).is_some_and(|v| v > bound))
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_numeric)
}

/// 数组中存在小于指定值的数值元素
fn one_lower() -> Operator {
    Operator::binary("oneLower", |lhs, rhs| {
        let Some(bound) = as_f64(rhs) else {
            return false;
        };
        for_one(lhs, |item| as_f64(item).is_some_and(|v| v < bound))
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_numeric)
}

/// 数组中存在属于指定列表的元素
fn one_in() -> Operator {
    Operator::binary("oneIn", |lhs, rhs| {
        for_one(lhs, |item| array_contains_value(rhs, item))
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_array)
}

/// 数组中存在匹配指定正则的文本元素
fn one_matches() -> Operator {
    Operator::binary("oneMatches", |lhs, rhs| {
        let Some(regex) = parse_regex(rhs) else {
            return false;
        };
        for_one(lhs, |item| {
            item.as_str().is_some_and(|s| regex.is_match(s))
        })
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_valid_regex)
}

/// 数组中存在位于 [min, max] 区间内的数值元素
fn one_range_number() -> Operator {
    Operator::binary("oneRangeNumber", |lhs, rhs| {
        let Some((min, max)) = as_number_range(rhs) else {
            return false;
        };
        for_one(lhs, |item| {
            as_f64(item).is_some_and(|v| v >= min && v <= max)
        })
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_number_range)
}

fn length_compare(
    name: &'static str,
    cmp: impl Fn(usize, f64) -> bool + Send + Sync + 'static,
) -> Operator {
    Operator::binary(name, move |lhs: &Value, rhs: &Value| {
        match (lhs.as_array(), as_f64(rhs)) {
            (Some(items), Some(expected)) => cmp(items.len(), expected),
            _ => false,
        }
    })
    .with_lhs_guard(is_array)
    .with_rhs_guard(is_numeric)
}

fn length_equals() -> Operator {
    length_compare("lengthEquals", |len, n| len as f64 == n)
}

fn length_not_equals() -> Operator {
    length_compare("lengthNotEquals", |len, n| len as f64 != n)
}

fn length_less_than() -> Operator {
    length_compare("lengthLessThan", |len, n| (len as f64) < n)
}

fn length_less_than_or_equals() -> Operator {
    length_compare("lengthLessThanOrEquals", |len, n| len as f64 <= n)
}

fn length_greater_than() -> Operator {
    length_compare("lengthGreaterThan", |len, n| len as f64 > n)
}

fn length_greater_than_or_equals() -> Operator {
    length_compare("lengthGreaterThanOrEquals", |len, n| len as f64 >= n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_contains() {
        let op = array_contains();
        assert!(op.apply(Some(&json!(["a", "b", "c"])), Some(&json!("b"))));
        assert!(!op.apply(Some(&json!(["a", "b", "c"])), Some(&json!("d"))));
        // lhs 守卫：非数组返回 false
        assert!(!op.apply(Some(&json!("abc")), Some(&json!("b"))));
    }

    #[test]
    fn test_string_contains() {
        let op = string_contains();
        assert!(op.apply(Some(&json!("hello world")), Some(&json!("world"))));
        assert!(!op.apply(Some(&json!("hello world")), Some(&json!("mars"))));
        assert!(
            not_string_contains().apply(Some(&json!("hello world")), Some(&json!("mars")))
        );
    }

    #[test]
    fn test_all_equal() {
        let op = all_equal();
        assert!(op.apply(Some(&json!([2, 2, 2])), Some(&json!(2))));
        assert!(!op.apply(Some(&json!([2, 3, 2])), Some(&json!(2))));
        // 空数组为真
        assert!(op.apply(Some(&json!([])), Some(&json!(2))));
    }

    #[test]
    fn test_all_greater_and_lower() {
        assert!(all_greater().apply(Some(&json!([5, 6, 7])), Some(&json!(4))));
        assert!(!all_greater().apply(Some(&json!([5, 3, 7])), Some(&json!(4))));
        assert!(all_lower().apply(Some(&json!([1, 2, 3])), Some(&json!(4))));
        // 非数值元素使 all 谓词失败
        assert!(!all_greater().apply(Some(&json!([5, "abc"])), Some(&json!(4))));
    }

    #[test]
    fn test_all_in_and_not_in() {
        assert!(all_in().apply(Some(&json!(["a", "b"])), Some(&json!(["a", "b", "c"]))));
        assert!(!all_in().apply(Some(&json!(["a", "d"])), Some(&json!(["a", "b", "c"]))));
        assert!(all_not_in().apply(Some(&json!(["x", "y"])), Some(&json!(["a", "b"]))));
        assert!(!all_not_in().apply(Some(&json!(["x", "a"])), Some(&json!(["a", "b"]))));
    }

    #[test]
    fn test_all_match_and_one_matches() {
        let pattern = json!("^item-\\d+$");
        assert!(all_match().apply(Some(&json!(["item-1", "item-2"])), Some(&pattern)));
        assert!(!all_match().apply(Some(&json!(["item-1", "other"])), Some(&pattern)));
        assert!(one_matches().apply(Some(&json!(["other", "item-9"])), Some(&pattern)));
        assert!(!one_matches().apply(Some(&json!(["other"])), Some(&pattern)));
    }

    #[test]
    fn test_range_operators() {
        assert!(all_range_number().apply(Some(&json!([1, 5, 9])), Some(&json!([0, 10]))));
        assert!(!all_range_number().apply(Some(&json!([1, 50])), Some(&json!([0, 10]))));
        assert!(one_range_number().apply(Some(&json!([50, 5])), Some(&json!([0, 10]))));
        assert!(!one_range_number().apply(Some(&json!([50, 60])), Some(&json!([0, 10]))));
    }

    #[test]
    fn test_one_operators_empty_array_is_false() {
        assert!(!one_equals().apply(Some(&json!([])), Some(&json!(1))));
        assert!(!one_in().apply(Some(&json!([])), Some(&json!([1, 2]))));
    }

    #[test]
    fn test_one_comparisons() {
        assert!(one_equals().apply(Some(&json!([1, 2, 3])), Some(&json!(2))));
        assert!(one_greater().apply(Some(&json!([1, 9])), Some(&json!(5))));
        assert!(!one_greater().apply(Some(&json!([1, 2])), Some(&json!(5))));
        assert!(one_lower().apply(Some(&json!([9, 2])), Some(&json!(5))));
        assert!(one_in().apply(Some(&json!(["x", "a"])), Some(&json!(["a", "b"]))));
    }

    #[test]
    fn test_length_operators() {
        let arr = json!(["a", "b", "c"]);
        assert!(length_equals().apply(Some(&arr), Some(&json!(3))));
        assert!(length_not_equals().apply(Some(&arr), Some(&json!(2))));
        assert!(length_less_than().apply(Some(&arr), Some(&json!(4))));
        assert!(length_less_than_or_equals().apply(Some(&arr), Some(&json!(3))));
        assert!(length_greater_than().apply(Some(&arr), Some(&json!(2))));
        assert!(length_greater_than_or_equals().apply(Some(&arr), Some(&json!(3))));
        assert!(!length_greater_than().apply(Some(&arr), Some(&json!(3))));
    }
}
