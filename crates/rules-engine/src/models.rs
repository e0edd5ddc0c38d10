//! 规则引擎领域模型
//!
//! 与持久化/传输用的 JSON 规则集格式一一对应：
//! 规则集 → 规则 → 规则块（IF_ELSE）→ 条件树 + 动作列表。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 规则集文档（JSON 顶层结构）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetDocument {
    #[serde(rename = "ruleSets")]
    pub rule_sets: Vec<Ruleset>,
}

/// 规则集定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ruleset {
    pub id: String,
    pub name: String,
    /// 生效时间窗口，None 表示永久有效
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_range: Option<ValidityRange>,
    pub rules: Vec<Rule>,
}

impl Ruleset {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            validity_range: None,
            rules,
        }
    }
}

/// 规则集生效时间窗口
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityRange {
    /// 生效时间，None 表示立即生效
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    /// 失效时间，None 表示永久有效
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl ValidityRange {
    /// 判断给定时刻是否在生效窗口内
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// 规则定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    /// 本规则读取的运行时事实
    #[serde(default)]
    pub input_runtime_facts: Vec<String>,
    /// 本规则可能写入的运行时事实
    #[serde(default)]
    pub output_runtime_facts: Vec<String>,
    pub root_element: RuleBlock,
}

impl Rule {
    pub fn new(name: impl Into<String>, root_element: RuleBlock) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            input_runtime_facts: Vec::new(),
            output_runtime_facts: Vec::new(),
            root_element,
        }
    }
}

/// 规则树节点（规则块或终端动作）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "elementType")]
pub enum RuleElement {
    #[serde(rename = "RULE_BLOCK")]
    Block(RuleBlock),
    #[serde(rename = "ACTION")]
    Action(Action),
}

/// 块类型，目前仅支持 IF_ELSE
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    #[default]
    #[serde(rename = "IF_ELSE")]
    IfElse,
}

/// IF_ELSE 规则块
///
/// 条件为真时按序走 `success_elements`，为假时走 `failure_elements`；
/// 缺省条件视为恒真。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleBlock {
    pub block_type: BlockType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub success_elements: Vec<RuleElement>,
    #[serde(default)]
    pub failure_elements: Vec<RuleElement>,
}

impl RuleBlock {
    pub fn new(
        condition: Option<Condition>,
        success_elements: Vec<RuleElement>,
        failure_elements: Vec<RuleElement>,
    ) -> Self {
        Self {
            block_type: BlockType::IfElse,
            condition,
            success_elements,
            failure_elements,
        }
    }
}

/// 条件树节点
///
/// 叶子为 `{lhs, operator, rhs?}` 三元组，组合节点为 all / any / not。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
    Not { not: Box<Condition> },
    Comparison(ConditionProperties),
}

impl Condition {
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self::All { all: conditions }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self::Any { any: conditions }
    }

    pub fn not(condition: Condition) -> Self {
        Self::Not {
            not: Box::new(condition),
        }
    }

    /// 构造二元比较叶子
    pub fn comparison(lhs: Operand, operator: impl Into<String>, rhs: Operand) -> Self {
        Self::Comparison(ConditionProperties {
            lhs,
            operator: operator.into(),
            rhs: Some(rhs),
        })
    }

    /// 构造一元比较叶子（无 rhs）
    pub fn unary(lhs: Operand, operator: impl Into<String>) -> Self {
        Self::Comparison(ConditionProperties {
            lhs,
            operator: operator.into(),
            rhs: None,
        })
    }
}

/// 条件叶子
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionProperties {
    pub lhs: Operand,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhs: Option<Operand>,
}

/// 操作数（事实引用、运行时事实引用或字面量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operand {
    #[serde(rename = "FACT")]
    Fact {
        value: String,
        /// JSON 路径，用于在事实值内部取子字段，如 `$.items[0].id`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    #[serde(rename = "RUNTIME_FACT")]
    RuntimeFact { value: String },
    #[serde(rename = "LITERAL")]
    Literal { value: Value },
}

impl Operand {
    pub fn fact(name: impl Into<String>) -> Self {
        Self::Fact {
            value: name.into(),
            path: None,
        }
    }

    pub fn fact_path(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Fact {
            value: name.into(),
            path: Some(path.into()),
        }
    }

    pub fn runtime_fact(name: impl Into<String>) -> Self {
        Self::RuntimeFact { value: name.into() }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }
}

/// 终端动作，按 `actionType` 分发给对应的处理器
///
/// 未知动作类型落入 `Custom`，保留完整负载，由部署方自行注册处理器。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "actionType")]
pub enum Action {
    #[serde(rename = "UPDATE_CONFIG")]
    UpdateConfig {
        library: String,
        component: String,
        property: String,
        value: Value,
    },
    #[serde(rename = "UPDATE_LOCALISATION")]
    UpdateLocalisation { key: String, value: String },
    #[serde(rename = "UPDATE_ASSET")]
    UpdateAsset { asset: String, value: String },
    /// 写入规则集作用域的运行时事实，不会被分发给处理器
    #[serde(rename = "SET_FACT")]
    SetFact { fact: String, value: Value },
    #[serde(untagged)]
    Custom(CustomAction),
}

/// 自定义动作（部署方扩展的动作类型）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAction {
    #[serde(rename = "actionType")]
    pub action_type: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

impl Action {
    /// 获取动作类型判别符
    pub fn action_type(&self) -> &str {
        match self {
            Self::UpdateConfig { .. } => "UPDATE_CONFIG",
            Self::UpdateLocalisation { .. } => "UPDATE_LOCALISATION",
            Self::UpdateAsset { .. } => "UPDATE_ASSET",
            Self::SetFact { .. } => "SET_FACT",
            Self::Custom(custom) => &custom.action_type,
        }
    }
}
