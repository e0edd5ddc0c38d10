//! 规则集编译器
//!
//! 在加载时校验规则集结构，并预提取每条规则引用的事实名，
//! 供变更驱动的重评估使用（跳过与变更事实无关的规则集）。

use crate::error::{Result, RuleError};
use crate::models::{Condition, Operand, Rule, RuleBlock, RuleElement, Ruleset};
use crate::operators::OperatorRegistry;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// 编译后的规则集
#[derive(Debug, Clone)]
pub struct CompiledRuleset {
    /// 原始规则集
    pub ruleset: Ruleset,
    /// 每条规则引用的事实名（含操作符隐式依赖）
    pub rule_input_facts: HashMap<String, HashSet<String>>,
    /// 整个规则集引用的事实名并集
    pub input_facts: HashSet<String>,
}

impl CompiledRuleset {
    pub fn id(&self) -> &str {
        &self.ruleset.id
    }

    pub fn name(&self) -> &str {
        &self.ruleset.name
    }

    /// 规则集在给定时刻是否处于生效窗口内
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.ruleset
            .validity_range
            .as_ref()
            .is_none_or(|range| range.contains(at))
    }
}

/// 规则集编译器
pub struct RulesetCompiler {
    registry: OperatorRegistry,
}

impl RulesetCompiler {
    pub fn new(registry: OperatorRegistry) -> Self {
        Self { registry }
    }

    /// 编译一批规则集，校验 ID 全局唯一
    pub fn compile_all(&self, rulesets: Vec<Ruleset>) -> Result<Vec<CompiledRuleset>> {
        let mut seen = HashSet::new();
        for ruleset in &rulesets {
            if !seen.insert(ruleset.id.clone()) {
                return Err(RuleError::DuplicateRulesetId(ruleset.id.clone()));
            }
        }
        rulesets.into_iter().map(|rs| self.compile(rs)).collect()
    }

    /// 编译单个规则集
    pub fn compile(&self, ruleset: Ruleset) -> Result<CompiledRuleset> {
        self.validate(&ruleset)?;

        let mut rule_input_facts = HashMap::with_capacity(ruleset.rules.len());
        let mut input_facts = HashSet::new();

        for rule in &ruleset.rules {
            let mut facts = HashSet::new();
            self.collect_block_facts(&rule.root_element, &mut facts);
            input_facts.extend(facts.iter().cloned());
            rule_input_facts.insert(rule.id.clone(), facts);
        }

        Ok(CompiledRuleset {
            ruleset,
            rule_input_facts,
            input_facts,
        })
    }

    /// 校验规则集结构
    fn validate(&self, ruleset: &Ruleset) -> Result<()> {
        if ruleset.id.is_empty() {
            return Err(RuleError::ParseError("规则集 ID 不能为空".to_string()));
        }
        if ruleset.name.is_empty() {
            return Err(RuleError::ParseError(format!(
                "规则集 '{}' 的名称不能为空",
                ruleset.id
            )));
        }

        let mut rule_ids = HashSet::new();
        for rule in &ruleset.rules {
            self.validate_rule(ruleset, rule)?;
            if !rule_ids.insert(rule.id.as_str()) {
                return Err(RuleError::ParseError(format!(
                    "规则集 '{}' 内规则 ID 重复: {}",
                    ruleset.id, rule.id
                )));
            }
        }

        Ok(())
    }

    fn validate_rule(&self, ruleset: &Ruleset, rule: &Rule) -> Result<()> {
        if rule.id.is_empty() {
            return Err(RuleError::ParseError(format!(
                "规则集 '{}' 内存在 ID 为空的规则",
                ruleset.id
            )));
        }
        if rule.name.is_empty() {
            return Err(RuleError::ParseError(format!(
                "规则 '{}' 的名称不能为空",
                rule.id
            )));
        }
        Ok(())
    }

    /// 递归收集规则块（含两个分支的嵌套块）引用的事实名
    fn collect_block_facts(&self, block: &RuleBlock, facts: &mut HashSet<String>) {
        if let Some(condition) = &block.condition {
            self.collect_condition_facts(condition, facts);
        }
        for element in block
            .success_elements
            .iter()
            .chain(&block.failure_elements)
        {
            if let RuleElement::Block(nested) = element {
                self.collect_block_facts(nested, facts);
            }
        }
    }

    fn collect_condition_facts(&self, condition: &Condition, facts: &mut HashSet<String>) {
        match condition {
            Condition::All { all } => {
                all.iter()
                    .for_each(|c| self.collect_condition_facts(c, facts));
            }
            Condition::Any { any } => {
                any.iter()
                    .for_each(|c| self.collect_condition_facts(c, facts));
            }
            Condition::Not { not } => self.collect_condition_facts(not, facts),
            Condition::Comparison(props) => {
                for operand in std::iter::once(&props.lhs).chain(props.rhs.as_ref()) {
                    if let Operand::Fact { value, .. } = operand {
                        facts.insert(value.clone());
                    }
                }
                // 未注册的操作符留到求值期按规则级失败处理
                if let Ok(operator) = self.registry.resolve(&props.operator) {
                    facts.extend(operator.fact_implicit_dependencies().iter().cloned());
                }
            }
        }
    }
}
