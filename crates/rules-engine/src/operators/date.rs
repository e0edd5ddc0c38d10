//! 日期比较操作符
//!
//! 操作数接受 RFC 3339 或 %Y-%m-%d 格式的字符串。
//! 相对时间操作符隐式依赖当前时间事实：宿主周期性写入该事实即可
//! 驱动重评估，求值本身读取传入的时钟。

use chrono::{DateTime, Duration, Utc};

use super::{
    Operator, as_date_range, as_f64, is_date_range, is_numeric, is_valid_date, parse_datetime,
};

/// 相对时间操作符隐式依赖的事实名
pub const CURRENT_TIME_FACT: &str = "currentTime";

/// 全部日期操作符
pub(super) fn operators() -> Vec<Operator> {
    vec![
        date_before(),
        date_after(),
        date_equals(),
        date_not_equals(),
        in_range_date(),
        date_in_next_minutes(Utc::now),
        date_not_in_next_minutes(Utc::now),
    ]
}

fn date_compare(
    name: &'static str,
    cmp: impl Fn(DateTime<Utc>, DateTime<Utc>) -> bool + Send + Sync + 'static,
) -> Operator {
    Operator::binary(name, move |lhs, rhs| {
        match (parse_datetime(lhs), parse_datetime(rhs)) {
            (Some(a), Some(b)) => cmp(a, b),
            _ => false,
        }
    })
    .with_lhs_guard(is_valid_date)
    .with_rhs_guard(is_valid_date)
}

/// 变量日期早于指定日期
fn date_before() -> Operator {
    date_compare("dateBefore", |a, b| a < b)
}

/// 变量日期晚于指定日期
fn date_after() -> Operator {
    date_compare("dateAfter", |a, b| a > b)
}

/// 变量日期等于指定日期
fn date_equals() -> Operator {
    date_compare("dateEquals", |a, b| a == b)
}

/// 变量日期不等于指定日期
fn date_not_equals() -> Operator {
    date_compare("dateNotEquals", |a, b| a != b)
}

/// 变量日期在 [from, to] 闭区间内
fn in_range_date() -> Operator {
    Operator::binary("inRangeDate", |lhs, rhs| {
        match (parse_datetime(lhs), as_date_range(rhs)) {
            (Some(date), Some((from, to))) => date >= from && date <= to,
            _ => false,
        }
    })
    .with_lhs_guard(is_valid_date)
    .with_rhs_guard(is_date_range)
}

/// 变量日期落在 [当前时间, 当前时间 + rhs 分钟] 闭区间内。
/// 已过去的日期恒为 false，rhs 为负时同样为 false
fn date_in_next_minutes(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Operator {
    Operator::binary("dateInNextMinutes", move |lhs, rhs| {
        match (parse_datetime(lhs), as_f64(rhs)) {
            (Some(date), Some(minutes)) if minutes >= 0.0 => {
                let now = clock();
                let end = now + Duration::milliseconds((minutes * 60_000.0) as i64);
                date >= now && date <= end
            }
            _ => false,
        }
    })
    .with_lhs_guard(is_valid_date)
    .with_rhs_guard(is_numeric)
    .with_implicit_facts(vec![CURRENT_TIME_FACT.to_string()])
}

/// 变量日期晚于当前时间 + rhs 分钟。已过去的日期为 false
fn date_not_in_next_minutes(
    clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
) -> Operator {
    Operator::binary("dateNotInNextMinutes", move |lhs, rhs| {
        match (parse_datetime(lhs), as_f64(rhs)) {
            (Some(date), Some(minutes)) if minutes >= 0.0 => {
                let end = clock() + Duration::milliseconds((minutes * 60_000.0) as i64);
                date > end
            }
            _ => false,
        }
    })
    .with_lhs_guard(is_valid_date)
    .with_rhs_guard(is_numeric)
    .with_implicit_facts(vec![CURRENT_TIME_FACT.to_string()])
}
