//! 规则引擎服务
//!
//! 串联事实仓库、操作符注册表、规则集执行器与动作派发器。
//! 事实变更触发求值通道：同一时刻最多一次在途求值，密集变更合并为
//! 一次补充求值；每次求值基于单一事实快照，产出动作整体替换上一轮。

use crate::compiler::{CompiledRuleset, RulesetCompiler};
use crate::dispatcher::{ActionDispatcher, ActionHandler};
use crate::error::Result;
use crate::executor::RulesetExecutor;
use crate::facts::FactStore;
use crate::models::{Action, Ruleset, RulesetDocument};
use crate::operators::OperatorRegistry;
use arc_swap::ArcSwap;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

struct EngineInner {
    facts: FactStore,
    operators: OperatorRegistry,
    dispatcher: ActionDispatcher,
    executor: RulesetExecutor,
    /// 当前加载的规则集，整体替换
    rulesets: ArcSwap<Vec<CompiledRuleset>>,
    /// 自上次求值以来发生变更的事实名
    changed_facts: parking_lot::Mutex<HashSet<String>>,
    /// 各规则集上一轮的动作缓存，输入事实未变时复用
    last_actions: parking_lot::Mutex<HashMap<String, Vec<Action>>>,
    /// 置位后下一轮求值忽略缓存
    force_full: AtomicBool,
    /// 求值触发信号。在途求值期间的重复触发合并为一次补充求值
    notify: Notify,
    /// 串行化求值通道
    pass_lock: tokio::sync::Mutex<()>,
    /// 求值通道序号，单调递增
    pass_seq: AtomicU64,
    /// 派发闸门：串行化处理器调用并记录最近完成派发的求值序号，
    /// 过期一轮的动作在更新一轮派发完成后直接跳过
    dispatch_gate: tokio::sync::Mutex<u64>,
    /// 已完成派发的求值序号广播，refresh 用于等待派发落地
    dispatched_tx: watch::Sender<u64>,
    events_tx: watch::Sender<Vec<Action>>,
}

/// 规则引擎服务句柄，可廉价克隆
#[derive(Clone)]
pub struct RulesEngine {
    inner: Arc<EngineInner>,
}

impl RulesEngine {
    /// 以内置操作符目录创建引擎
    pub fn new() -> Self {
        Self::with_registry(OperatorRegistry::with_defaults())
    }

    /// 以指定操作符注册表创建引擎
    pub fn with_registry(operators: OperatorRegistry) -> Self {
        let (events_tx, _events_rx) = watch::channel(Vec::new());
        let (dispatched_tx, _dispatched_rx) = watch::channel(0);
        Self {
            inner: Arc::new(EngineInner {
                facts: FactStore::new(),
                executor: RulesetExecutor::new(operators.clone()),
                operators,
                dispatcher: ActionDispatcher::new(),
                rulesets: ArcSwap::from_pointee(Vec::new()),
                changed_facts: parking_lot::Mutex::new(HashSet::new()),
                last_actions: parking_lot::Mutex::new(HashMap::new()),
                force_full: AtomicBool::new(false),
                notify: Notify::new(),
                pass_lock: tokio::sync::Mutex::new(()),
                pass_seq: AtomicU64::new(0),
                dispatch_gate: tokio::sync::Mutex::new(0),
                dispatched_tx,
                events_tx,
            }),
        }
    }

    /// 操作符注册表，可在加载规则集前注册自定义操作符
    pub fn operators(&self) -> &OperatorRegistry {
        &self.inner.operators
    }

    /// 注册动作处理器
    pub fn register_handler(&self, handler: Arc<dyn ActionHandler>) -> Result<()> {
        self.inner.dispatcher.register(handler)
    }

    /// 加载规则集，整体替换当前集合并触发一次全量求值
    #[instrument(skip(self, rulesets), fields(ruleset_count = rulesets.len()))]
    pub fn load_rulesets(&self, rulesets: Vec<Ruleset>) -> Result<()> {
        let compiler = RulesetCompiler::new(self.inner.operators.clone());
        let compiled = compiler.compile_all(rulesets)?;
        info!(ruleset_count = compiled.len(), "规则集已加载");
        self.inner.rulesets.store(Arc::new(compiled));
        self.inner.last_actions.lock().clear();
        self.inner.force_full.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();
        Ok(())
    }

    /// 从 JSON 文档加载规则集
    pub fn load_rulesets_from_json(&self, json: &str) -> Result<()> {
        let document: RulesetDocument = serde_json::from_str(json)?;
        self.load_rulesets(document.rule_sets)
    }

    /// 写入事实。值与当前值深度相等时为空操作，不触发求值
    pub fn set_fact(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if self.inner.facts.set(&name, value.into()) {
            self.inner.changed_facts.lock().insert(name);
            self.inner.notify.notify_one();
        }
    }

    /// 批量写入事实，合并为一次触发
    pub fn upsert_facts(&self, facts: impl IntoIterator<Item = (String, Value)>) {
        let mut changed = false;
        for (name, value) in facts {
            if self.inner.facts.set(&name, value) {
                self.inner.changed_facts.lock().insert(name);
                changed = true;
            }
        }
        if changed {
            self.inner.notify.notify_one();
        }
    }

    /// 读取事实当前值
    pub fn fact(&self, name: &str) -> Option<Value> {
        self.inner.facts.get(name)
    }

    /// 订阅求值产出。每次求值后整体替换为本轮的全量动作列表
    pub fn events(&self) -> watch::Receiver<Vec<Action>> {
        self.inner.events_tx.subscribe()
    }

    /// 强制执行一次全量求值，并等待其动作派发落地
    pub async fn refresh(&self) {
        self.inner.force_full.store(true, Ordering::SeqCst);
        let mut dispatched = self.inner.dispatched_tx.subscribe();
        let seq = self.evaluate_pass().await;
        while *dispatched.borrow_and_update() < seq {
            if dispatched.changed().await.is_err() {
                break;
            }
        }
    }

    /// 启动求值循环。事实或规则集变更后自动求值并派发动作
    pub fn spawn(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            loop {
                engine.inner.notify.notified().await;
                engine.evaluate_pass().await;
            }
        })
    }

    /// 执行一次求值通道：快照、按需重算、派发。返回本轮序号
    #[instrument(skip(self))]
    async fn evaluate_pass(&self) -> u64 {
        let guard = self.inner.pass_lock.lock().await;
        let seq = self.inner.pass_seq.fetch_add(1, Ordering::SeqCst) + 1;

        // 必须先取走变更集再拍快照：两步之间落下的写入会重新置位
        // 并重新触发，保证快照之后的变更不会被本轮白白消费掉
        let changed: HashSet<String> = std::mem::take(&mut *self.inner.changed_facts.lock());
        let force_full = self.inner.force_full.swap(false, Ordering::SeqCst);
        let snapshot = self.inner.facts.snapshot();
        let rulesets = self.inner.rulesets.load();
        let now = Utc::now();

        let mut all_actions = Vec::new();
        {
            let mut cache = self.inner.last_actions.lock();
            for compiled in rulesets.iter() {
                if !compiled.is_active_at(now) {
                    // 失效的规则集不贡献动作，同时丢弃其缓存
                    cache.remove(compiled.id());
                    continue;
                }

                let needs_run = force_full
                    || !cache.contains_key(compiled.id())
                    || compiled.input_facts.iter().any(|f| changed.contains(f));

                if needs_run {
                    let actions = self.inner.executor.execute(compiled, &snapshot);
                    cache.insert(compiled.id().to_string(), actions.clone());
                    all_actions.extend(actions);
                } else {
                    debug!(ruleset_id = %compiled.id(), "输入事实未变更，复用上一轮动作");
                    all_actions.extend(cache[compiled.id()].iter().cloned());
                }
            }
        }

        debug!(action_count = all_actions.len(), "求值通道完成");
        self.inner.events_tx.send_replace(all_actions.clone());
        drop(guard);

        // 派发放到独立任务，慢处理器不会阻塞后续求值通道；
        // 闸门保证处理器按求值顺序收到批次，过期批次直接跳过
        let engine = self.clone();
        tokio::spawn(async move {
            let mut last_dispatched = engine.inner.dispatch_gate.lock().await;
            if seq > *last_dispatched {
                engine.inner.dispatcher.dispatch(all_actions).await;
                *last_dispatched = seq;
            }
            engine.inner.dispatched_tx.send_replace(*last_dispatched);
        });
        seq
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}
