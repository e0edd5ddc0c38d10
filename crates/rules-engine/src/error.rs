//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("规则执行失败: {0}")]
    ExecutionError(String),

    #[error("操作符未注册: {0}")]
    UnknownOperator(String),

    #[error("操作符已注册: {0}")]
    DuplicateOperator(String),

    #[error("规则集 ID 重复: {0}")]
    DuplicateRulesetId(String),

    #[error("动作类型 {0} 已有处理器注册")]
    DuplicateActionHandler(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
