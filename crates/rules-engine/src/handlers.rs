//! 内置动作处理器
//!
//! 覆盖三类标准动作：组件配置、本地化文案、静态资源路径。
//! 每个处理器维护一份覆盖表，每次求值通道整体替换，规则不再命中时覆盖自动回退。

use crate::dispatcher::ActionHandler;
use crate::models::Action;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 配置项标识，格式为 `{library}#{component}`
pub fn compute_item_identifier(component: &str, library: &str) -> String {
    format!("{library}#{component}")
}

/// 组件配置覆盖表，按配置项标识索引属性覆盖
#[derive(Clone, Default)]
pub struct ConfigurationOverrideStore {
    overrides: Arc<RwLock<HashMap<String, HashMap<String, Value>>>>,
}

impl ConfigurationOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询某配置项某属性的当前覆盖值
    pub fn property_override(&self, item_identifier: &str, property: &str) -> Option<Value> {
        self.overrides
            .read()
            .get(item_identifier)
            .and_then(|props| props.get(property))
            .cloned()
    }

    /// 当前全部覆盖的快照
    pub fn all_overrides(&self) -> HashMap<String, HashMap<String, Value>> {
        self.overrides.read().clone()
    }

    fn replace(&self, next: HashMap<String, HashMap<String, Value>>) {
        *self.overrides.write() = next;
    }
}

/// 组件配置动作处理器
pub struct ConfigurationActionHandler {
    store: ConfigurationOverrideStore,
}

impl ConfigurationActionHandler {
    pub fn new(store: ConfigurationOverrideStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ActionHandler for ConfigurationActionHandler {
    fn supporting_actions(&self) -> &[&str] {
        &["UPDATE_CONFIG"]
    }

    async fn execute_actions(&self, actions: Vec<Action>) -> anyhow::Result<()> {
        let mut next: HashMap<String, HashMap<String, Value>> = HashMap::new();
        for action in actions {
            match action {
                Action::UpdateConfig {
                    library,
                    component,
                    property,
                    value,
                } => {
                    // 同一属性多次覆盖时后写覆盖先写
                    next.entry(compute_item_identifier(&component, &library))
                        .or_default()
                        .insert(property, value);
                }
                other => {
                    warn!(action_type = %other.action_type(), "配置处理器收到非配置动作，忽略");
                }
            }
        }
        debug!(item_count = next.len(), "替换组件配置覆盖表");
        self.store.replace(next);
        Ok(())
    }
}

/// 本地化文案覆盖处理器
#[derive(Default)]
pub struct LocalisationOverrideHandler {
    overrides: Arc<RwLock<HashMap<String, String>>>,
}

impl LocalisationOverrideHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某文案键的当前覆盖目标键
    pub fn key_override(&self, key: &str) -> Option<String> {
        self.overrides.read().get(key).cloned()
    }

    pub fn all_overrides(&self) -> HashMap<String, String> {
        self.overrides.read().clone()
    }
}

#[async_trait::async_trait]
impl ActionHandler for LocalisationOverrideHandler {
    fn supporting_actions(&self) -> &[&str] {
        &["UPDATE_LOCALISATION"]
    }

    async fn execute_actions(&self, actions: Vec<Action>) -> anyhow::Result<()> {
        let mut next = HashMap::new();
        for action in actions {
            if let Action::UpdateLocalisation { key, value } = action {
                next.insert(key, value);
            }
        }
        debug!(key_count = next.len(), "替换本地化覆盖表");
        *self.overrides.write() = next;
        Ok(())
    }
}

/// 静态资源路径覆盖处理器
#[derive(Default)]
pub struct AssetPathOverrideHandler {
    overrides: Arc<RwLock<HashMap<String, String>>>,
}

impl AssetPathOverrideHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某资源路径的当前覆盖路径
    pub fn asset_override(&self, asset: &str) -> Option<String> {
        self.overrides.read().get(asset).cloned()
    }

    pub fn all_overrides(&self) -> HashMap<String, String> {
        self.overrides.read().clone()
    }
}

#[async_trait::async_trait]
impl ActionHandler for AssetPathOverrideHandler {
    fn supporting_actions(&self) -> &[&str] {
        &["UPDATE_ASSET"]
    }

    async fn execute_actions(&self, actions: Vec<Action>) -> anyhow::Result<()> {
        let mut next = HashMap::new();
        for action in actions {
            if let Action::UpdateAsset { asset, value } = action {
                next.insert(asset, value);
            }
        }
        debug!(asset_count = next.len(), "替换资源路径覆盖表");
        *self.overrides.write() = next;
        Ok(())
    }
}
