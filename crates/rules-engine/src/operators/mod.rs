//! 操作符定义与注册表
//!
//! 操作符是条件叶子使用的命名比较/谓词函数，支持：
//! - 二元操作符（lhs 与 rhs），可附带操作数类型守卫
//! - 一元操作符（仅 lhs，可感知"值不存在"）
//! - 运行时注册自定义操作符

mod array;
mod basic;
mod date;
mod number;

pub use date::CURRENT_TIME_FACT;

use crate::error::{Result, RuleError};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// 操作数类型守卫
pub type GuardFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
/// 二元求值函数
pub type BinaryEvalFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;
/// 一元求值函数，入参 None 表示操作数未解析出值
pub type UnaryEvalFn = Arc<dyn Fn(Option<&Value>) -> bool + Send + Sync>;

/// 操作符求值逻辑
#[derive(Clone)]
pub enum OperatorKind {
    Binary {
        evaluator: BinaryEvalFn,
        validate_lhs: Option<GuardFn>,
        validate_rhs: Option<GuardFn>,
    },
    Unary { evaluator: UnaryEvalFn },
}

/// 操作符定义
#[derive(Clone)]
pub struct Operator {
    name: String,
    kind: OperatorKind,
    /// 操作符隐式读取的事实（如相对时间操作符读取当前时间事实），
    /// 参与规则输入事实的收集
    fact_implicit_dependencies: Vec<String>,
}

impl Operator {
    /// 构造二元操作符
    pub fn binary(
        name: impl Into<String>,
        evaluator: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind: OperatorKind::Binary {
                evaluator: Arc::new(evaluator),
                validate_lhs: None,
                validate_rhs: None,
            },
            fact_implicit_dependencies: Vec::new(),
        }
    }

    /// 构造一元操作符
    pub fn unary(
        name: impl Into<String>,
        evaluator: impl Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind: OperatorKind::Unary {
                evaluator: Arc::new(evaluator),
            },
            fact_implicit_dependencies: Vec::new(),
        }
    }

    /// 设置 lhs 类型守卫（仅对二元操作符生效）
    pub fn with_lhs_guard(mut self, guard: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        if let OperatorKind::Binary { validate_lhs, .. } = &mut self.kind {
            *validate_lhs = Some(Arc::new(guard));
        }
        self
    }

    /// 设置 rhs 类型守卫（仅对二元操作符生效）
    pub fn with_rhs_guard(mut self, guard: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        if let OperatorKind::Binary { validate_rhs, .. } = &mut self.kind {
            *validate_rhs = Some(Arc::new(guard));
        }
        self
    }

    /// 声明隐式依赖的事实
    pub fn with_implicit_facts(mut self, facts: Vec<String>) -> Self {
        self.fact_implicit_dependencies = facts;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fact_implicit_dependencies(&self) -> &[String] {
        &self.fact_implicit_dependencies
    }

    /// 应用守卫并求值
    ///
    /// 规则整体求值必须是全函数：缺失操作数或守卫不通过时叶子按 false
    /// 处理，绝不 panic、绝不中断所在规则树。
    pub fn apply(&self, lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
        match &self.kind {
            OperatorKind::Unary { evaluator } => evaluator(lhs),
            OperatorKind::Binary {
                evaluator,
                validate_lhs,
                validate_rhs,
            } => {
                let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
                    return false;
                };
                if let Some(guard) = validate_lhs {
                    if !guard(lhs) {
                        warn!("操作符 {} 的 lhs 校验未通过", self.name);
                        return false;
                    }
                }
                if let Some(guard) = validate_rhs {
                    if !guard(rhs) {
                        warn!("操作符 {} 的 rhs 校验未通过", self.name);
                        return false;
                    }
                }
                evaluator(lhs, rhs)
            }
        }
    }
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator").field("name", &self.name).finish()
    }
}

/// 操作符注册表
///
/// 名称到操作符定义的线程安全映射，可在多个执行器间共享。
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    operators: Arc<DashMap<String, Arc<Operator>>>,
}

impl OperatorRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建包含全部内置操作符的注册表
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for operator in basic::operators()
            .into_iter()
            .chain(number::operators())
            .chain(date::operators())
            .chain(array::operators())
        {
            registry.upsert(operator);
        }
        registry
    }

    /// 注册操作符，名称已存在时报错
    pub fn register(&self, operator: Operator) -> Result<()> {
        if self.operators.contains_key(&operator.name) {
            return Err(RuleError::DuplicateOperator(operator.name.clone()));
        }
        self.upsert(operator);
        Ok(())
    }

    /// 注册或覆盖操作符
    pub fn upsert(&self, operator: Operator) {
        self.operators
            .insert(operator.name.clone(), Arc::new(operator));
    }

    /// 按名称解析操作符
    ///
    /// 规则集引用未注册的操作符属于编写或版本不匹配错误，对所在规则
    /// 是致命的（该规则本次产出为空），由调用方隔离处理。
    pub fn resolve(&self, name: &str) -> Result<Arc<Operator>> {
        self.operators
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RuleError::UnknownOperator(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.operators.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

// ============================================================================
// 操作数辅助函数（供各内置操作符模块使用）
// ============================================================================

/// 尝试将 Value 转换为 f64（数值或数值字符串）
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 宽松相等比较
///
/// 数值统一转为浮点数比较，避免整数与浮点（如 100 与 100.0）比较失败；
/// 其余类型按严格相等处理。
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return (x - y).abs() < f64::EPSILON;
    }
    a == b
}

pub(crate) fn is_string(value: &Value) -> bool {
    value.is_string()
}

pub(crate) fn is_array(value: &Value) -> bool {
    value.is_array()
}

/// 是否为数值或数值字符串
pub(crate) fn is_numeric(value: &Value) -> bool {
    as_f64(value).is_some()
}

/// 是否为简单类型（字符串、数值、布尔）
pub(crate) fn is_simple(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// 是否为 [min, max] 数值区间
pub(crate) fn is_number_range(value: &Value) -> bool {
    as_number_range(value).is_some()
}

/// 解析 [min, max] 数值区间
pub(crate) fn as_number_range(value: &Value) -> Option<(f64, f64)> {
    let arr = value.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    Some((as_f64(&arr[0])?, as_f64(&arr[1])?))
}

/// 解析日期时间（RFC 3339 或 %Y-%m-%d 格式字符串）
pub(crate) fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

pub(crate) fn is_valid_date(value: &Value) -> bool {
    parse_datetime(value).is_some()
}

/// 是否为 [from, to] 日期区间
pub(crate) fn is_date_range(value: &Value) -> bool {
    as_date_range(value).is_some()
}

/// 解析 [from, to] 日期区间
pub(crate) fn as_date_range(value: &Value) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let arr = value.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    Some((parse_datetime(&arr[0])?, parse_datetime(&arr[1])?))
}

/// 解析正则表达式操作数
pub(crate) fn parse_regex(value: &Value) -> Option<Regex> {
    Regex::new(value.as_str()?).ok()
}

pub(crate) fn is_valid_regex(value: &Value) -> bool {
    parse_regex(value).is_some()
}
