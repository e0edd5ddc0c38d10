//! 规则引擎
//!
//! 针对 JSON 规则集的响应式求值引擎：
//!
//! - **事实仓库**：应用运行期写入的键值事实，深度相等的写入不触发求值
//! - **操作符注册表**：内置 30 余个比较操作符，支持注册自定义操作符
//! - **规则集执行器**：条件树短路求值，单条规则失败不影响其他规则
//! - **动作派发器**：按动作类型分组交给认领的处理器
//! - **引擎服务**：事实变更驱动求值通道，密集变更合并，产出整体替换
//!
//! # 示例
//!
//! ```no_run
//! use rules_engine::RulesEngine;
//! use serde_json::json;
//!
//! # async fn demo(ruleset_json: &str) -> anyhow::Result<()> {
//! let engine = RulesEngine::new();
//! engine.load_rulesets_from_json(ruleset_json)?;
//! engine.spawn();
//! engine.set_fact("isMobileDevice", json!(true));
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod executor;
pub mod facts;
pub mod handlers;
pub mod models;
pub mod operators;

pub use compiler::{CompiledRuleset, RulesetCompiler};
pub use dispatcher::{ActionDispatcher, ActionHandler};
pub use engine::RulesEngine;
pub use error::{Result, RuleError};
pub use executor::RulesetExecutor;
pub use facts::{FactSnapshot, FactStore};
pub use handlers::{
    AssetPathOverrideHandler, ConfigurationActionHandler, ConfigurationOverrideStore,
    LocalisationOverrideHandler, compute_item_identifier,
};
pub use models::{
    Action, BlockType, Condition, ConditionProperties, CustomAction, Operand, Rule, RuleBlock,
    RuleElement, Ruleset, RulesetDocument, ValidityRange,
};
pub use operators::{CURRENT_TIME_FACT, Operator, OperatorRegistry};
