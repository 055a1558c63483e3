//! [`InferenceEngine`]: working memory, agenda, and the recognize-act cycle.
//!
//! This is the outermost layer embedders talk to. It owns a [`ReteNetwork`]
//! and a pluggable [`ConflictResolutionStrategy`], and drives the match ->
//! select -> act loop described in section 4.7.

use crate::conflict_resolution::{
    build_strategy, AgendaEntry, ConflictResolutionStrategy, StrategyKind,
};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::node_sharing::ReteNetwork;
use crate::types::{Action, Condition, Production, WmeRef};
use rete_types::WmeValue;
use std::collections::HashSet;
use tracing::{debug, info, instrument, trace};

/// Identifier returned by [`InferenceEngine::add_production`].
pub type ProductionId = u64;

/// Working memory, the discrimination network, the conflict-resolution
/// strategy, and the recognize-act loop that ties them together.
pub struct InferenceEngine {
    network: ReteNetwork,
    strategy: Box<dyn ConflictResolutionStrategy>,
    config: EngineConfig,
    cycles_executed: u64,
    /// Instantiations already fired, keyed by `(production, contributing
    /// WME timestamps)`. Refraction (section 4.7/9): a match stays excluded
    /// from the agenda until one of its supporting WMEs is retracted and
    /// reasserted, which mints a fresh timestamp and so a fresh key.
    fired: HashSet<(u64, Vec<u64>)>,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("strategy", &self.strategy.name())
            .field("config", &self.config)
            .field("cycles_executed", &self.cycles_executed)
            .field("production_count", &self.network.production_nodes().len())
            .field("working_memory_count", &self.network.working_memory().len())
            .field("fired_count", &self.fired.len())
            .finish()
    }
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceEngine {
    /// Builds an engine with [`EngineConfig::default`].
    #[instrument]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Builds an engine, installing the strategy and GBB parameters named by
    /// `config`.
    #[instrument(skip(config))]
    pub fn with_config(config: EngineConfig) -> Self {
        info!(strategy = ?config.default_strategy, "creating inference engine");
        let strategy =
            build_strategy(config.default_strategy, config.initial_weight, config.learning_rate, config.epsilon);
        Self { network: ReteNetwork::new(), strategy, config, cycles_executed: 0, fired: HashSet::new() }
    }

    /// Swaps the active conflict-resolution strategy. Takes effect on the
    /// next `run` (never mid-cycle, per section 5).
    pub fn set_conflict_resolution_strategy(&mut self, strategy: Box<dyn ConflictResolutionStrategy>) {
        info!(strategy = strategy.name(), "installing conflict-resolution strategy");
        self.strategy = strategy;
    }

    /// Registers a production. `MalformedRule` conditions (a variable that
    /// never recurs) are logged as a warning and the rule is still accepted
    /// (section 7a) — there is currently no condition under which this
    /// returns `Err`, but the `Result` is part of the contract so a future
    /// stricter validation mode can add one without an API break.
    #[instrument(skip(self, conditions, actions), fields(rule = %name))]
    pub fn add_production(
        &mut self,
        name: impl Into<String>,
        conditions: Vec<Condition>,
        actions: Vec<Action>,
    ) -> Result<ProductionId, EngineError> {
        let name = name.into();
        debug!(condition_count = conditions.len(), "adding production");
        Ok(self.network.add_production(name, conditions, actions))
    }

    /// Asserts a WME. A duplicate of an already-present triple is a silent
    /// no-op (section 7).
    #[instrument(skip(self, identifier, attribute, value))]
    pub fn add_wme(
        &mut self,
        identifier: impl Into<WmeValue>,
        attribute: impl Into<WmeValue>,
        value: impl Into<WmeValue>,
    ) -> WmeRef {
        let wme = self.network.add_wme(identifier.into(), attribute.into(), value.into());
        trace!(wme = %wme, "asserted wme");
        wme
    }

    /// Retracts a WME and everything it supported (section 4.5).
    #[instrument(skip(self, wme))]
    pub fn remove_wme(&mut self, wme: &WmeRef) {
        trace!(wme = %wme, "retracting wme");
        self.network.remove_wme(wme);
    }

    /// Forwards a success signal to the active strategy (e.g. GBB). No-op
    /// for strategies that don't maintain state.
    pub fn provide_feedback(&mut self, production_name: &str, success_factor: f64) {
        self.strategy.provide_feedback(production_name, success_factor);
    }

    /// Identifies an instantiation by the production it would fire and the
    /// timestamps of the WMEs contributing to the token, in condition order
    /// — stable as long as those exact WMEs remain asserted, and guaranteed
    /// fresh if any of them is retracted and reasserted (section 4.7).
    fn instantiation_key(production_id: u64, token: &crate::beta_network::Token) -> (u64, Vec<u64>) {
        let timestamps = token.wmes_in_condition_order().iter().map(|w| w.timestamp).collect();
        (production_id, timestamps)
    }

    /// Recomputes the agenda as the flat list of `(production, token)` pairs
    /// over every production node's current items, excluding instantiations
    /// already fired (section 4.7, refraction). The production nodes'
    /// `items` match sets themselves are never filtered — only this agenda
    /// view.
    fn build_conflict_set(&self) -> Vec<AgendaEntry> {
        let mut agenda = Vec::new();
        let mut insertion_order = 0;
        for node in self.network.production_nodes() {
            let node = node.borrow();
            let prod = node.as_production().expect("production_nodes() only holds production nodes");
            for token in &prod.items {
                let key = Self::instantiation_key(prod.production.id, token);
                if self.fired.contains(&key) {
                    continue;
                }
                agenda.push(AgendaEntry {
                    production_id: prod.production.id,
                    production_name: prod.production.name.clone(),
                    token: std::rc::Rc::clone(token),
                    insertion_order,
                });
                insertion_order += 1;
            }
        }
        agenda
    }

    /// Runs the recognize-act cycle: build agenda, select, execute, repeat,
    /// until the agenda empties or `max_cycles` is reached. `max_cycles =
    /// None` falls back to `self.config.max_cycles`, then to unbounded.
    #[instrument(skip(self))]
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<u64, EngineError> {
        let limit = max_cycles.or(self.config.max_cycles);
        let mut cycles = 0u64;
        loop {
            let agenda = self.build_conflict_set();
            debug!(agenda_size = agenda.len(), cycle = cycles, "recognize-act cycle");
            if agenda.is_empty() {
                break;
            }
            let Some(chosen) = self.strategy.select(&agenda) else { break };
            let entry = agenda[chosen].clone();
            let production = self.production_by_id(entry.production_id);
            trace!(rule = %entry.production_name, depth = entry.token.depth, "firing");
            let key = Self::instantiation_key(entry.production_id, &entry.token);
            production.execute(&entry.token, self).map_err(|source| EngineError::ActionFailed {
                rule: entry.production_name.clone(),
                source,
            })?;
            self.fired.insert(key);
            cycles += 1;
            self.cycles_executed += 1;
            if Some(cycles) == limit {
                break;
            }
        }
        info!(cycles, "run complete");
        Ok(cycles)
    }

    /// Clones the [`Production`] (cheaply — its conditions and actions are
    /// `Rc`-shared) out of its node. The borrow is released before the
    /// caller invokes `execute`, so an action that re-entrantly asserts a
    /// WME matching this very rule can freely re-borrow the node.
    fn production_by_id(&self, id: u64) -> Production {
        for node in self.network.production_nodes() {
            let node = node.borrow();
            let prod = node.as_production().expect("production_nodes() only holds production nodes");
            if prod.production.id == id {
                return prod.production.clone();
            }
        }
        unreachable!("agenda entry referenced a production id not present in the network")
    }

    /// Number of recognize-act cycles executed across every `run` call on
    /// this engine.
    pub fn cycles_executed(&self) -> u64 {
        self.cycles_executed
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn working_memory(&self) -> &[WmeRef] {
        self.network.working_memory()
    }

    pub fn alpha_memory_count(&self) -> usize {
        self.network.alpha_memory_count()
    }

    /// Number of distinct join nodes at join depth `<= max_depth` (the root
    /// join of a rule is depth 1). Exposed so callers can check the
    /// structural-sharing property (section 8 scenario 3) without reaching
    /// into network internals.
    pub fn join_node_count_up_to_depth(&self, max_depth: usize) -> usize {
        self.network.join_node_count_up_to_depth(max_depth)
    }

    /// Snapshot of the current agenda as `(production name, bindings)` pairs,
    /// without selecting or firing anything. Exposed for embedders that want
    /// to inspect pending matches (and for property tests that check the
    /// agenda is independent of assertion order).
    pub fn agenda(&self) -> Vec<(String, crate::types::Bindings)> {
        self.build_conflict_set()
            .into_iter()
            .map(|entry| {
                let production = self.production_by_id(entry.production_id);
                let bindings = production.get_variable_bindings(&entry.token);
                (entry.production_name, bindings)
            })
            .collect()
    }

    /// Debug-only textual dump of working memory, alpha memories, beta
    /// memories, production items, and the current agenda (section 6). Not
    /// a wire format; shape may change between versions.
    pub fn dump_state(&self) -> String {
        let mut out = self.network.dump_state();
        out.push_str("== agenda ==\n");
        for entry in self.build_conflict_set() {
            out.push_str(&format!(
                "  {} (depth={}, order={})\n",
                entry.production_name, entry.token.depth, entry.insertion_order
            ));
        }
        out
    }
}

/// Convenience constructor for [`StrategyKind`]-driven strategy swaps
/// without reaching into `conflict_resolution` directly.
pub fn strategy_for(kind: StrategyKind, config: &EngineConfig) -> Box<dyn ConflictResolutionStrategy> {
    build_strategy(kind, config.initial_weight, config.learning_rate, config.epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict_resolution::{GbbStrategy, LexStrategy};
    use crate::types::{Bindings, Field};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn var(name: &str) -> Field {
        Field::Variable(name.to_string())
    }

    fn sym(name: &str) -> Field {
        Field::Constant(WmeValue::Symbol(name.to_string()))
    }

    fn cond(id: Field, attr: Field, val: Field) -> Condition {
        Condition::new(id, attr, val)
    }

    /// Scenario 1 (section 8): age check fires once and records `(name, ok)`.
    #[test]
    fn age_check_fires_once_and_records_binding() {
        let mut engine = InferenceEngine::new();
        let recorded: Rc<RefCell<Vec<(String, bool)>>> = Rc::new(RefCell::new(Vec::new()));
        let recorded_clone = Rc::clone(&recorded);

        let action: Action = Box::new(move |bindings: &Bindings, _engine: &mut InferenceEngine| {
            let name = bindings.get("?n").unwrap().to_string();
            let age = match bindings.get("?a").unwrap() {
                WmeValue::Int(a) => *a,
                _ => panic!("expected int age"),
            };
            let min_age = match bindings.get("?m").unwrap() {
                WmeValue::Int(m) => *m,
                _ => panic!("expected int min-age"),
            };
            recorded_clone.borrow_mut().push((name, age >= min_age));
            Ok(())
        });

        engine
            .add_production(
                "check-age",
                vec![
                    cond(var("?p"), sym("name"), var("?n")),
                    cond(var("?p"), sym("age"), var("?a")),
                    cond(sym("legal"), sym("min-age"), var("?m")),
                ],
                vec![action],
            )
            .unwrap();

        engine.add_wme("person1", "name", "Alice");
        engine.add_wme("person1", "age", 25i64);
        engine.add_wme("legal", "min-age", 18i64);

        let cycles = engine.run(None).unwrap();
        assert_eq!(cycles, 1);
        assert_eq!(recorded.borrow().as_slice(), &[("Alice".to_string(), true)]);
    }

    /// Scenario 2: a partial match never fires.
    #[test]
    fn partial_match_does_not_fire() {
        let mut engine = InferenceEngine::new();
        let fired = Rc::new(RefCell::new(false));
        let fired_clone = Rc::clone(&fired);
        let action: Action = Box::new(move |_, _| {
            *fired_clone.borrow_mut() = true;
            Ok(())
        });
        engine
            .add_production(
                "check-age",
                vec![
                    cond(var("?p"), sym("name"), var("?n")),
                    cond(var("?p"), sym("age"), var("?a")),
                    cond(sym("legal"), sym("min-age"), var("?m")),
                ],
                vec![action],
            )
            .unwrap();
        engine.add_wme("person1", "name", "Alice");

        let cycles = engine.run(None).unwrap();
        assert_eq!(cycles, 0);
        assert!(!*fired.borrow());
    }

    /// Scenario 6: retract then re-assert reproduces the original firing.
    #[test]
    fn retraction_then_reassertion_reproduces_original_behavior() {
        let mut engine = InferenceEngine::new();
        let count = Rc::new(RefCell::new(0u32));
        let count_clone = Rc::clone(&count);
        let action: Action = Box::new(move |_, _| {
            *count_clone.borrow_mut() += 1;
            Ok(())
        });
        engine
            .add_production(
                "check-age",
                vec![cond(var("?p"), sym("name"), var("?n")), cond(var("?p"), sym("age"), var("?a"))],
                vec![action],
            )
            .unwrap();
        engine.add_wme("person1", "name", "Alice");
        let age_wme = engine.add_wme("person1", "age", 25i64);

        assert_eq!(engine.run(None).unwrap(), 1);
        engine.remove_wme(&age_wme);
        assert!(engine.dump_state().contains("check-age (#"));

        engine.add_wme("person1", "age", 25i64);
        assert_eq!(engine.run(None).unwrap(), 1);
        assert_eq!(*count.borrow(), 2);
    }

    /// An action that re-entrantly asserts a WME must not panic on the
    /// `RefCell` it was extracted from (section 5).
    #[test]
    fn action_may_assert_wmes_reentrantly() {
        let mut engine = InferenceEngine::new();
        let action: Action = Box::new(|bindings: &Bindings, engine: &mut InferenceEngine| {
            let name = bindings.get("?n").cloned().unwrap();
            engine.add_wme("system", "greeted", name);
            Ok(())
        });
        engine.add_production("greet", vec![cond(var("?p"), sym("name"), var("?n"))], vec![action]).unwrap();
        engine.add_wme("person1", "name", "Alice");

        let cycles = engine.run(Some(5)).unwrap();
        assert_eq!(cycles, 1);
        assert!(engine
            .working_memory()
            .iter()
            .any(|w| w.attribute == WmeValue::Symbol("greeted".into())));
    }

    #[test]
    fn action_error_propagates_out_of_run() {
        let mut engine = InferenceEngine::new();
        let action: Action = Box::new(|_, _| Err(anyhow::anyhow!("boom")));
        engine.add_production("r", vec![cond(var("?p"), sym("name"), var("?n"))], vec![action]).unwrap();
        engine.add_wme("person1", "name", "Alice");

        let err = engine.run(None).unwrap_err();
        assert!(matches!(err, EngineError::ActionFailed { .. }));
    }

    #[test]
    fn swapping_strategy_changes_selection_policy() {
        let mut engine = InferenceEngine::new();
        engine.set_conflict_resolution_strategy(Box::new(LexStrategy));
        assert_eq!(engine.config().default_strategy, StrategyKind::Default);
    }

    #[test]
    fn provide_feedback_reaches_gbb_strategy() {
        let mut engine = InferenceEngine::with_config(EngineConfig::default().with_strategy(StrategyKind::Gbb));
        engine.set_conflict_resolution_strategy(Box::new(GbbStrategy::with_seed(1.0, 0.5, 1e-3, 11)));
        engine.provide_feedback("r1", 1.0);
    }
}
