//! 规则集执行器
//!
//! 基于一次事实快照对编译后的规则集求值，产出待派发的动作列表。
//! 单条规则失败只记录日志并跳过该规则，不影响同规则集内的其他规则。

use crate::compiler::CompiledRuleset;
use crate::error::Result;
use crate::facts::FactSnapshot;
use crate::models::{Action, Condition, Operand, Rule, RuleBlock, RuleElement};
use crate::operators::OperatorRegistry;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, instrument};

/// 规则集执行器
#[derive(Clone)]
pub struct RulesetExecutor {
    registry: OperatorRegistry,
}

impl RulesetExecutor {
    pub fn new(registry: OperatorRegistry) -> Self {
        Self { registry }
    }

    /// 对规则集求值，按规则声明顺序收集动作
    #[instrument(skip(self, compiled, snapshot), fields(ruleset_id = %compiled.id()))]
    pub fn execute(&self, compiled: &CompiledRuleset, snapshot: &FactSnapshot) -> Vec<Action> {
        let mut actions = Vec::new();
        // 运行时事实仅在本次规则集求值内可见
        let mut runtime: HashMap<String, Value> = HashMap::new();

        for rule in &compiled.ruleset.rules {
            match self.evaluate_rule(rule, snapshot, &mut runtime) {
                Ok(rule_actions) => actions.extend(rule_actions),
                Err(e) => {
                    error!(
                        ruleset_id = %compiled.id(),
                        rule_id = %rule.id,
                        error = %e,
                        "规则求值失败，跳过该规则"
                    );
                }
            }
        }

        debug!(
            ruleset_id = %compiled.id(),
            action_count = actions.len(),
            "规则集求值完成"
        );
        actions
    }

    /// 对单条规则求值。失败时不提交任何运行时事实写入
    fn evaluate_rule(
        &self,
        rule: &Rule,
        snapshot: &FactSnapshot,
        runtime: &mut HashMap<String, Value>,
    ) -> Result<Vec<Action>> {
        let mut actions = Vec::new();
        let mut working = runtime.clone();
        self.evaluate_block(&rule.root_element, snapshot, &mut working, &mut actions)?;
        *runtime = working;
        Ok(actions)
    }

    /// 对规则块求值：无条件视为恒真，按分支顺序收集动作并递归嵌套块
    fn evaluate_block(
        &self,
        block: &RuleBlock,
        snapshot: &FactSnapshot,
        runtime: &mut HashMap<String, Value>,
        actions: &mut Vec<Action>,
    ) -> Result<()> {
        let passed = match &block.condition {
            Some(condition) => self.evaluate_condition(condition, snapshot, runtime)?,
            None => true,
        };

        let elements = if passed {
            &block.success_elements
        } else {
            &block.failure_elements
        };

        for element in elements {
            match element {
                RuleElement::Block(nested) => {
                    self.evaluate_block(nested, snapshot, runtime, actions)?;
                }
                RuleElement::Action(Action::SetFact { fact, value }) => {
                    // 运行时事实写入不进入派发队列
                    runtime.insert(fact.clone(), value.clone());
                }
                RuleElement::Action(action) => actions.push(action.clone()),
            }
        }

        Ok(())
    }

    /// 对条件树求值，短路处理组合条件
    fn evaluate_condition(
        &self,
        condition: &Condition,
        snapshot: &FactSnapshot,
        runtime: &HashMap<String, Value>,
    ) -> Result<bool> {
        match condition {
            Condition::All { all } => {
                for inner in all {
                    if !self.evaluate_condition(inner, snapshot, runtime)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any { any } => {
                for inner in any {
                    if self.evaluate_condition(inner, snapshot, runtime)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not { not } => Ok(!self.evaluate_condition(not, snapshot, runtime)?),
            Condition::Comparison(props) => {
                let operator = self.registry.resolve(&props.operator)?;
                let lhs = resolve_operand(&props.lhs, snapshot, runtime);
                let rhs = props
                    .rhs
                    .as_ref()
                    .and_then(|operand| resolve_operand(operand, snapshot, runtime));
                Ok(operator.apply(lhs, rhs))
            }
        }
    }
}

/// 将操作数解析为当前快照下的值。缺失的事实解析为 None
fn resolve_operand<'a>(
    operand: &'a Operand,
    snapshot: &'a FactSnapshot,
    runtime: &'a HashMap<String, Value>,
) -> Option<&'a Value> {
    match operand {
        Operand::Fact { value, path } => snapshot.get_with_path(value, path.as_deref()),
        Operand::RuntimeFact { value } => runtime.get(value),
        Operand::Literal { value } => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RulesetCompiler;
    use crate::facts::FactStore;
    use crate::models::Ruleset;
    use serde_json::json;

    fn compile(ruleset: Ruleset) -> CompiledRuleset {
        RulesetCompiler::new(OperatorRegistry::with_defaults())
            .compile(ruleset)
            .unwrap()
    }

    fn executor() -> RulesetExecutor {
        RulesetExecutor::new(OperatorRegistry::with_defaults())
    }

    fn localisation(key: &str) -> RuleElement {
        RuleElement::Action(Action::UpdateLocalisation {
            key: key.to_string(),
            value: format!("{key}.value"),
        })
    }

    fn rule_with_block(block: RuleBlock) -> Rule {
        Rule {
            id: "r-1".to_string(),
            name: "rule".to_string(),
            input_runtime_facts: Vec::new(),
            output_runtime_facts: Vec::new(),
            root_element: block,
        }
    }

    fn ruleset_with_rules(rules: Vec<Rule>) -> Ruleset {
        Ruleset {
            id: "rs-1".to_string(),
            name: "ruleset".to_string(),
            validity_range: None,
            rules,
        }
    }

    fn snapshot_with(entries: &[(&str, Value)]) -> FactSnapshot {
        let store = FactStore::new();
        for (name, value) in entries {
            store.set(name, value.clone());
        }
        store.snapshot()
    }

    #[test]
    fn test_success_branch_selected() {
        let block = RuleBlock::new(
            Some(Condition::comparison(
                Operand::fact("isMobileDevice"),
                "equals",
                Operand::literal(true),
            )),
            vec![localisation("success")],
            vec![localisation("failure")],
        );
        let compiled = compile(ruleset_with_rules(vec![rule_with_block(block)]));
        let snapshot = snapshot_with(&[("isMobileDevice", json!(true))]);

        let actions = executor().execute(&compiled, &snapshot);
        assert_eq!(actions.len(), 1);
        assert!(
            matches!(&actions[0], Action::UpdateLocalisation { key, .. } if key == "success")
        );
    }

    #[test]
    fn test_failure_branch_on_missing_fact() {
        let block = RuleBlock::new(
            Some(Condition::comparison(
                Operand::fact("isMobileDevice"),
                "equals",
                Operand::literal(true),
            )),
            vec![localisation("success")],
            vec![localisation("failure")],
        );
        let compiled = compile(ruleset_with_rules(vec![rule_with_block(block)]));
        let snapshot = snapshot_with(&[]);

        let actions = executor().execute(&compiled, &snapshot);
        assert!(
            matches!(&actions[0], Action::UpdateLocalisation { key, .. } if key == "failure")
        );
    }

    #[test]
    fn test_missing_condition_is_true() {
        let block = RuleBlock::new(None, vec![localisation("always")], vec![]);
        let compiled = compile(ruleset_with_rules(vec![rule_with_block(block)]));

        let actions = executor().execute(&compiled, &snapshot_with(&[]));
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_empty_combinators() {
        let ex = executor();
        let snapshot = snapshot_with(&[]);
        let runtime = HashMap::new();

        assert!(
            ex.evaluate_condition(&Condition::all(vec![]), &snapshot, &runtime)
                .unwrap()
        );
        assert!(
            !ex.evaluate_condition(&Condition::any(vec![]), &snapshot, &runtime)
                .unwrap()
        );
    }

    #[test]
    fn test_fact_path_resolution() {
        let block = RuleBlock::new(
            Some(Condition::comparison(
                Operand::fact_path("cart", "$.xmasHampers[0].hamperItems[1].id"),
                "equals",
                Operand::literal("foieGras"),
            )),
            vec![localisation("success")],
            vec![localisation("failure")],
        );
        let compiled = compile(ruleset_with_rules(vec![rule_with_block(block)]));
        let cart = json!({
            "xmasHampers": [{
                "hamperItems": [
                    {"id": "terrine", "quantity": 1},
                    {"id": "foieGras", "quantity": 2},
                ],
            }],
        });

        let actions = executor().execute(&compiled, &snapshot_with(&[("cart", cart)]));
        assert!(
            matches!(&actions[0], Action::UpdateLocalisation { key, .. } if key == "success")
        );
    }

    #[test]
    fn test_set_fact_feeds_later_rule() {
        let setter = rule_with_block(RuleBlock::new(
            None,
            vec![RuleElement::Action(Action::SetFact {
                fact: "tier".to_string(),
                value: json!("gold"),
            })],
            vec![],
        ));
        let mut reader = rule_with_block(RuleBlock::new(
            Some(Condition::comparison(
                Operand::runtime_fact("tier"),
                "equals",
                Operand::literal("gold"),
            )),
            vec![localisation("gold")],
            vec![],
        ));
        reader.id = "r-2".to_string();

        let compiled = compile(ruleset_with_rules(vec![setter, reader]));
        let actions = executor().execute(&compiled, &snapshot_with(&[]));

        // SET_FACT 本身不产生派发动作
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], Action::UpdateLocalisation { key, .. } if key == "gold"));
    }

    #[test]
    fn test_unknown_operator_isolates_rule() {
        let broken = rule_with_block(RuleBlock::new(
            Some(Condition::comparison(
                Operand::fact("a"),
                "noSuchOperator",
                Operand::literal(1),
            )),
            vec![localisation("broken")],
            vec![localisation("broken")],
        ));
        let mut healthy = rule_with_block(RuleBlock::new(None, vec![localisation("healthy")], vec![]));
        healthy.id = "r-2".to_string();

        let compiled = compile(ruleset_with_rules(vec![broken, healthy]));
        let actions = executor().execute(&compiled, &snapshot_with(&[]));

        assert_eq!(actions.len(), 1);
        assert!(
            matches!(&actions[0], Action::UpdateLocalisation { key, .. } if key == "healthy")
        );
    }

    #[test]
    fn test_failed_rule_discards_runtime_writes() {
        let broken = rule_with_block(RuleBlock::new(
            None,
            vec![
                RuleElement::Action(Action::SetFact {
                    fact: "partial".to_string(),
                    value: json!(true),
                }),
                RuleElement::Block(RuleBlock::new(
                    Some(Condition::comparison(
                        Operand::fact("a"),
                        "noSuchOperator",
                        Operand::literal(1),
                    )),
                    vec![],
                    vec![],
                )),
            ],
            vec![],
        ));
        let mut reader = rule_with_block(RuleBlock::new(
            Some(Condition::unary(Operand::runtime_fact("partial"), "isDefined")),
            vec![localisation("seen")],
            vec![localisation("unseen")],
        ));
        reader.id = "r-2".to_string();

        let compiled = compile(ruleset_with_rules(vec![broken, reader]));
        let actions = executor().execute(&compiled, &snapshot_with(&[]));

        assert_eq!(actions.len(), 1);
        assert!(
            matches!(&actions[0], Action::UpdateLocalisation { key, .. } if key == "unseen")
        );
    }

    #[test]
    fn test_nested_blocks_walk_both_levels() {
        let inner = RuleBlock::new(
            Some(Condition::comparison(
                Operand::fact("count"),
                "greaterThan",
                Operand::literal(10),
            )),
            vec![localisation("inner.success")],
            vec![localisation("inner.failure")],
        );
        let outer = RuleBlock::new(
            Some(Condition::comparison(
                Operand::fact("enabled"),
                "equals",
                Operand::literal(true),
            )),
            vec![localisation("outer.success"), RuleElement::Block(inner)],
            vec![],
        );
        let compiled = compile(ruleset_with_rules(vec![rule_with_block(outer)]));
        let snapshot = snapshot_with(&[("enabled", json!(true)), ("count", json!(5))]);

        let actions = executor().execute(&compiled, &snapshot);
        let keys: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                Action::UpdateLocalisation { key, .. } => Some(key.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec!["outer.success", "inner.failure"]);
    }

    #[test]
    fn test_execution_is_idempotent_for_unchanged_snapshot() {
        let block = RuleBlock::new(
            Some(Condition::any(vec![
                Condition::comparison(Operand::fact("a"), "equals", Operand::literal(1)),
                Condition::comparison(Operand::fact("b"), "greaterThan", Operand::literal(10)),
            ])),
            vec![localisation("success"), localisation("extra")],
            vec![localisation("failure")],
        );
        let compiled = compile(ruleset_with_rules(vec![rule_with_block(block)]));
        let snapshot = snapshot_with(&[("a", json!(1)), ("b", json!(5))]);
        let ex = executor();

        // 快照不变时重复求值产出深度相等的动作列表
        let first = ex.execute(&compiled, &snapshot);
        let second = ex.execute(&compiled, &snapshot);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_empty_branches_yield_no_actions() {
        let block_true = RuleBlock::new(
            Some(Condition::comparison(
                Operand::fact("flag"),
                "equals",
                Operand::literal(true),
            )),
            vec![],
            vec![],
        );
        let block_false = block_true.clone();
        let mut rule_false = rule_with_block(block_false);
        rule_false.id = "r-2".to_string();

        // 两个分支都为空时，无论条件结果如何都不产出动作
        let compiled = compile(ruleset_with_rules(vec![
            rule_with_block(block_true),
            rule_false,
        ]));
        assert!(
            executor()
                .execute(&compiled, &snapshot_with(&[("flag", json!(true))]))
                .is_empty()
        );
        assert!(
            executor()
                .execute(&compiled, &snapshot_with(&[("flag", json!(false))]))
                .is_empty()
        );
    }

    #[test]
    fn test_combinator_short_circuit_and_not() {
        let condition = Condition::all(vec![
            Condition::comparison(Operand::fact("a"), "equals", Operand::literal(1)),
            Condition::not(Condition::any(vec![Condition::comparison(
                Operand::fact("b"),
                "equals",
                Operand::literal(2),
            )])),
        ]);
        let block = RuleBlock::new(condition.into(), vec![localisation("hit")], vec![]);
        let compiled = compile(ruleset_with_rules(vec![rule_with_block(block)]));

        let snapshot = snapshot_with(&[("a", json!(1)), ("b", json!(3))]);
        assert_eq!(executor().execute(&compiled, &snapshot).len(), 1);

        let snapshot = snapshot_with(&[("a", json!(1)), ("b", json!(2))]);
        assert!(executor().execute(&compiled, &snapshot).is_empty());
    }
}
