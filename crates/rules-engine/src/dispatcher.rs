//! 动作派发器
//!
//! 每次求值后把全量动作列表交给各注册处理器：处理器拿到属于自己
//! 认领类型的动作批次（保持求值产出顺序），没有命中时拿到空批次，
//! 以便整体替换式的覆盖表自动回退。每种动作类型只允许一个处理器
//! 认领，重复注册在注册期报错。

use crate::error::{Result, RuleError};
use crate::models::Action;
use dashmap::DashSet;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// 动作处理器。实现方声明认领的动作类型并批量消费动作
#[async_trait::async_trait]
pub trait ActionHandler: Send + Sync {
    /// 本处理器认领的动作类型列表
    fn supporting_actions(&self) -> &[&str];

    /// 消费一次求值通道内属于本处理器的全部动作。
    /// 空批次表示本轮没有动作命中，处理器应清空其覆盖状态
    async fn execute_actions(&self, actions: Vec<Action>) -> anyhow::Result<()>;
}

/// 动作派发器
#[derive(Clone, Default)]
pub struct ActionDispatcher {
    /// 已被认领的动作类型，用于重复认领检测与无主动作告警
    claims: Arc<DashSet<String>>,
    /// 按注册顺序保存的处理器列表
    handlers: Arc<Mutex<Vec<Arc<dyn ActionHandler>>>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器，逐个认领其声明的动作类型
    pub fn register(&self, handler: Arc<dyn ActionHandler>) -> Result<()> {
        for action_type in handler.supporting_actions() {
            if self.claims.contains(*action_type) {
                return Err(RuleError::DuplicateActionHandler(action_type.to_string()));
            }
        }
        for action_type in handler.supporting_actions() {
            self.claims.insert(action_type.to_string());
        }
        self.handlers.lock().push(handler);
        Ok(())
    }

    /// 派发一轮求值的全量动作
    ///
    /// 每个处理器按注册顺序收到其认领类型的动作批次（可能为空）。
    /// 单个处理器失败只记录日志，不影响其他处理器。
    #[instrument(skip(self, actions), fields(action_count = actions.len()))]
    pub async fn dispatch(&self, actions: Vec<Action>) {
        let handlers: Vec<Arc<dyn ActionHandler>> = self.handlers.lock().clone();

        let mut unclaimed: HashSet<&str> = HashSet::new();
        for action in &actions {
            let action_type = action.action_type();
            if !self.claims.contains(action_type) {
                unclaimed.insert(action_type);
            }
        }
        for action_type in unclaimed {
            warn!(action_type = %action_type, "动作类型无处理器认领，丢弃");
        }

        for handler in handlers {
            let claimed = handler.supporting_actions();
            let batch: Vec<Action> = actions
                .iter()
                .filter(|action| claimed.contains(&action.action_type()))
                .cloned()
                .collect();
            debug!(count = batch.len(), "派发动作批次");
            if let Err(e) = handler.execute_actions(batch).await {
                error!(error = %e, "动作处理器执行失败");
            }
        }
    }
}
