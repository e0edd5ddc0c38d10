//! 事实存储
//!
//! 使用 DashMap 持有所有命名事实的当前值，评估开始时取一次快照，
//! 保证单次评估内读到一致的事实视图。

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// 事实存储
///
/// 写入方为宿主应用（组件/服务），读取方为条件评估。
/// 未注册的事实读取返回 None 而非报错，规则可以引用尚未产生的事实。
#[derive(Clone, Default)]
pub struct FactStore {
    facts: Arc<DashMap<String, Value>>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入事实，返回值是否发生变化
    ///
    /// 与旧值深度相等的写入是 no-op，避免触发无意义的重评估。
    #[instrument(skip(self, value))]
    pub fn set(&self, name: &str, value: Value) -> bool {
        if let Some(current) = self.facts.get(name) {
            if *current == value {
                return false;
            }
        }
        debug!("事实已更新: {}", name);
        self.facts.insert(name.to_string(), value);
        true
    }

    /// 读取事实当前值
    pub fn get(&self, name: &str) -> Option<Value> {
        self.facts.get(name).map(|v| v.clone())
    }

    /// 判断事实是否已注册
    pub fn contains(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

    /// 获取所有已注册的事实名
    pub fn names(&self) -> Vec<String> {
        self.facts.iter().map(|e| e.key().clone()).collect()
    }

    /// 取当前所有事实值的快照
    pub fn snapshot(&self) -> FactSnapshot {
        FactSnapshot {
            values: self
                .facts
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        }
    }
}

/// 单次评估使用的事实快照
#[derive(Debug, Clone, Default)]
pub struct FactSnapshot {
    values: HashMap<String, Value>,
}

impl FactSnapshot {
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self { values }
    }

    /// 读取事实值
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// 读取事实值并沿 JSON 路径下钻
    ///
    /// 路径中缺失的中间字段返回 None，由操作符按"不匹配"处理。
    pub fn get_with_path<'a>(&'a self, name: &str, path: Option<&str>) -> Option<&'a Value> {
        let value = self.values.get(name)?;
        match path {
            Some(path) => resolve_path(value, path),
            None => Some(value),
        }
    }
}

/// 路径分段（对象键或数组下标）
enum PathSegment {
    Key(String),
    Index(usize),
}

/// 解析 JSON 路径表达式
///
/// 支持 `$.a.b`、`a.b`、`a[0].b`、`a['b']` 与 `a["b"]` 形式，
/// 非法路径返回 None。
fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut chars = path.strip_prefix('$').unwrap_or(path).chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
            }
            '[' => {
                chars.next();
                match chars.peek() {
                    Some(&quote @ ('\'' | '"')) => {
                        chars.next();
                        let mut key = String::new();
                        loop {
                            match chars.next() {
                                Some(c) if c == quote => break,
                                Some(c) => key.push(c),
                                None => return None,
                            }
                        }
                        if chars.next() != Some(']') {
                            return None;
                        }
                        segments.push(PathSegment::Key(key));
                    }
                    _ => {
                        let mut digits = String::new();
                        loop {
                            match chars.next() {
                                Some(']') => break,
                                Some(c) => digits.push(c),
                                None => return None,
                            }
                        }
                        segments.push(PathSegment::Index(digits.trim().parse().ok()?));
                    }
                }
            }
            _ => {
                let mut key = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' || c == '[' {
                        break;
                    }
                    key.push(c);
                    chars.next();
                }
                segments.push(PathSegment::Key(key));
            }
        }
    }

    Some(segments)
}

/// 沿路径在 JSON 值中下钻
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path)?;
    let mut current = root;

    for segment in &segments {
        match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => {
                current = map.get(key)?;
            }
            // 点号后跟数字也可作数组下标，如 "items.0.name"
            (PathSegment::Key(key), Value::Array(arr)) => {
                current = arr.get(key.parse::<usize>().ok()?)?;
            }
            (PathSegment::Index(index), Value::Array(arr)) => {
                current = arr.get(*index)?;
            }
            _ => return None,
        }
    }

    Some(current)
}
