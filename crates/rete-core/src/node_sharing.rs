//! [`ReteNetwork`]: builds and shares the alpha/beta discrimination network
//! and routes WME assertion and retraction through it (section 4.5).

use crate::alpha_memory::{activate_alpha_memory, deactivate_alpha_memory, AlphaMemoryNode, AlphaMemoryRef, ConstantTest};
use crate::beta_network::Token;
use crate::error::EngineError;
use crate::rete_nodes::{
    beta_memory_left_activation, perform_join_tests, production_node_left_activation,
    BetaMemoryNode, JoinNode, JoinTest, Node, NodeRef, ProductionNode,
};
use crate::types::{Action, Condition, Field, Production, Wme, WmeRef};
use rete_types::WmeValue;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

fn constant_test_from_condition(cond: &Condition) -> ConstantTest {
    ConstantTest {
        identifier: cond.identifier.as_constant().cloned(),
        attribute: cond.attribute.as_constant().cloned(),
        value: cond.value.as_constant().cloned(),
    }
}

/// For condition `n`, scans earlier conditions (nearest ancestor first) for
/// each variable occurring in condition `n` and emits one join test per
/// variable, bound to its nearest prior occurrence (section 4.5).
pub fn get_join_tests_from_condition(conditions: &[Condition], n: usize) -> Vec<JoinTest> {
    let mut tests = Vec::new();
    let current = &conditions[n];
    for (new_kind, new_field) in current.fields() {
        let Field::Variable(var_name) = new_field else { continue };
        for i in (0..n).rev() {
            let ancestor_depth = n - 1 - i;
            let found = conditions[i].fields().into_iter().find_map(|(anc_kind, anc_field)| {
                match anc_field {
                    Field::Variable(anc_var) if anc_var == var_name => Some(anc_kind),
                    _ => None,
                }
            });
            if let Some(anc_kind) = found {
                tests.push(JoinTest {
                    field_of_new_wme: new_kind,
                    ancestor_depth,
                    field_of_ancestor_wme: anc_kind,
                });
                break;
            }
        }
    }
    tests
}

/// Owns every alpha memory, join node, beta memory and production node, and
/// routes assertion/retraction through them. WMEs are owned by its working
/// memory; memories hold non-owning `Rc` clones (section 5).
pub struct ReteNetwork {
    pub beta_root: NodeRef,
    alpha_memories: HashMap<ConstantTest, AlphaMemoryRef>,
    production_nodes: Vec<NodeRef>,
    all_nodes: Vec<NodeRef>,
    working_memory: Vec<WmeRef>,
    next_id: u64,
    next_wme_timestamp: u64,
}

impl Default for ReteNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl ReteNetwork {
    pub fn new() -> Self {
        let beta_root = Rc::new(RefCell::new(Node::Beta(BetaMemoryNode {
            id: 0,
            items: vec![Token::dummy()],
            children: Vec::new(),
            produced_by: None,
        })));
        Self {
            beta_root,
            alpha_memories: HashMap::new(),
            production_nodes: Vec::new(),
            all_nodes: Vec::new(),
            working_memory: Vec::new(),
            next_id: 1,
            next_wme_timestamp: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn production_nodes(&self) -> &[NodeRef] {
        &self.production_nodes
    }

    pub fn working_memory(&self) -> &[WmeRef] {
        &self.working_memory
    }

    pub fn alpha_memory_count(&self) -> usize {
        self.alpha_memories.len()
    }

    /// Depth of a join node: how many joins lie between it and `beta_root`,
    /// inclusive of itself. Used by the sharing test in section 8 scenario 3.
    pub fn join_depth(&self, join: &NodeRef) -> usize {
        let mut depth = 0;
        let mut current = Rc::clone(join);
        loop {
            let parent_beta = {
                let node = current.borrow();
                let Some(j) = node.as_join() else { break };
                depth += 1;
                Rc::clone(&j.parent)
            };
            let produced_by = {
                let beta_node = parent_beta.borrow();
                beta_node.as_beta().and_then(|b| b.produced_by.clone())
            };
            match produced_by {
                Some(producing_join) => current = producing_join,
                None => break,
            }
        }
        depth
    }

    /// Counts distinct join nodes at depth `<= max_depth`.
    pub fn join_node_count_up_to_depth(&self, max_depth: usize) -> usize {
        self.all_nodes
            .iter()
            .filter(|n| n.borrow().as_join().is_some())
            .filter(|n| self.join_depth(n) <= max_depth)
            .count()
    }

    pub fn build_or_share_alpha_memory_node(&mut self, test: ConstantTest) -> AlphaMemoryRef {
        if let Some(existing) = self.alpha_memories.get(&test) {
            return Rc::clone(existing);
        }
        let id = self.next_id();
        let amem = AlphaMemoryNode::new(id, test.clone());
        for wme in self.working_memory.clone() {
            if test.matches(&wme) {
                activate_alpha_memory(&amem, &wme);
            }
        }
        self.alpha_memories.insert(test, Rc::clone(&amem));
        amem
    }

    pub fn build_or_share_join_node(
        &mut self,
        parent: &NodeRef,
        amem: &AlphaMemoryRef,
        tests: &[JoinTest],
    ) -> NodeRef {
        {
            let parent_borrow = parent.borrow();
            for child in parent_borrow.children() {
                let child_borrow = child.borrow();
                if let Some(j) = child_borrow.as_join() {
                    if Rc::ptr_eq(&j.alpha_memory, amem) && j.tests == tests {
                        drop(child_borrow);
                        return Rc::clone(child);
                    }
                }
            }
        }
        let id = self.next_id();
        let join = Rc::new(RefCell::new(Node::Join(JoinNode {
            id,
            parent: Rc::clone(parent),
            alpha_memory: Rc::clone(amem),
            tests: tests.to_vec(),
            children: Vec::new(),
        })));
        parent.borrow_mut().add_child(Rc::clone(&join));
        amem.borrow_mut().successors.push(Rc::clone(&join));
        self.all_nodes.push(Rc::clone(&join));
        join
    }

    pub fn build_or_share_beta_memory_node(&mut self, join: &NodeRef) -> NodeRef {
        {
            let join_borrow = join.borrow();
            let j = join_borrow.as_join().expect("build_or_share_beta_memory_node expects a join parent");
            if let Some(existing) = j.children.first() {
                return Rc::clone(existing);
            }
        }
        let id = self.next_id();
        let beta = Rc::new(RefCell::new(Node::Beta(BetaMemoryNode {
            id,
            items: Vec::new(),
            children: Vec::new(),
            produced_by: Some(Rc::clone(join)),
        })));
        join.borrow_mut().add_child(Rc::clone(&beta));
        self.all_nodes.push(Rc::clone(&beta));
        self.update_new_node_with_matches_from_above(&beta, join);
        beta
    }

    /// Backfills a freshly created beta memory with every match already
    /// implied by its parent join, so a rule added after facts already
    /// exist still sees them (section 4.5).
    fn update_new_node_with_matches_from_above(&self, beta: &NodeRef, join: &NodeRef) {
        let (parent_items, alpha_items, tests) = {
            let join_borrow = join.borrow();
            let j = join_borrow.as_join().expect("update_new_node_with_matches_from_above expects a join");
            let parent_items = j.parent.borrow().as_beta().expect("join parent must be a beta memory").items.clone();
            let alpha_items = j.alpha_memory.borrow().items.clone();
            (parent_items, alpha_items, j.tests.clone())
        };
        for token in &parent_items {
            for wme in &alpha_items {
                if perform_join_tests(token, wme, &tests) {
                    beta_memory_left_activation(beta, token, wme);
                }
            }
        }
    }

    pub fn build_or_share_network_for_conditions(&mut self, conditions: &[Condition]) -> NodeRef {
        let mut current_beta = Rc::clone(&self.beta_root);
        for n in 0..conditions.len() {
            let test = constant_test_from_condition(&conditions[n]);
            let amem = self.build_or_share_alpha_memory_node(test);
            let tests = get_join_tests_from_condition(conditions, n);
            let join = self.build_or_share_join_node(&current_beta, &amem, &tests);
            current_beta = self.build_or_share_beta_memory_node(&join);
        }
        current_beta
    }

    /// Builds the network for `conditions`, wraps the terminal beta memory's
    /// items in a fresh [`ProductionNode`], and backfills it with any
    /// matches the (possibly shared) network already contains.
    pub fn add_production(&mut self, name: String, conditions: Vec<Condition>, actions: Vec<Action>) -> u64 {
        let id = self.next_id();
        let production =
            Production { id, name, conditions: Rc::new(conditions.clone()), actions: Rc::new(actions) };
        for variable in production.find_unbound_variables() {
            let warning = EngineError::MalformedRule {
                rule: production.name.clone(),
                variable,
                detail: "condition references a variable with no other occurrence; treated as universally matching"
                    .to_string(),
            };
            tracing::warn!(rule = %production.name, "{warning}");
        }
        let final_beta = self.build_or_share_network_for_conditions(&conditions);
        let existing_items = final_beta.borrow().as_beta().expect("terminal node must be a beta memory").items.clone();
        let prod_node = Rc::new(RefCell::new(Node::Production(ProductionNode {
            id,
            production,
            items: Vec::new(),
        })));
        final_beta.borrow_mut().add_child(Rc::clone(&prod_node));
        self.all_nodes.push(Rc::clone(&prod_node));
        self.production_nodes.push(Rc::clone(&prod_node));
        for token in &existing_items {
            production_node_left_activation(&prod_node, token);
        }
        id
    }

    /// Duplicate assertion of an equal WME is a silent no-op (section 7).
    pub fn add_wme(&mut self, identifier: WmeValue, attribute: WmeValue, value: WmeValue) -> WmeRef {
        if let Some(existing) = self.working_memory.iter().find(|w| {
            w.identifier == identifier && w.attribute == attribute && w.value == value
        }) {
            return Rc::clone(existing);
        }
        let timestamp = self.next_wme_timestamp;
        self.next_wme_timestamp += 1;
        let wme = Rc::new(Wme::new(timestamp, identifier, attribute, value, timestamp));
        self.working_memory.push(Rc::clone(&wme));

        let matching: Vec<AlphaMemoryRef> = self
            .alpha_memories
            .iter()
            .filter(|(test, _)| test.matches(&wme))
            .map(|(_, amem)| Rc::clone(amem))
            .collect();
        for amem in &matching {
            activate_alpha_memory(amem, &wme);
        }
        wme
    }

    /// Removes `wme` from working memory, every alpha memory it was stored
    /// in, and every token built directly or transitively on it, driven
    /// entirely by `wme`'s own back-reference lists so the cost is
    /// proportional to the affected matches rather than the whole network
    /// (section 4.5/9).
    pub fn remove_wme(&mut self, wme: &WmeRef) {
        let before = self.working_memory.len();
        self.working_memory.retain(|w| w.as_ref() != wme.as_ref());
        if self.working_memory.len() == before {
            return;
        }
        for amem in wme.alpha_memory_refs() {
            if let Some(amem) = amem.upgrade() {
                deactivate_alpha_memory(&amem, wme);
            }
        }
        for token in wme.token_refs() {
            if let Some(token) = token.upgrade() {
                remove_token_cascade(&token);
            }
        }
    }

    /// Debug-only textual dump of working memory, alpha/beta memories and
    /// production item counts (section 6).
    pub fn dump_state(&self) -> String {
        let mut out = String::new();
        out.push_str("== working memory ==\n");
        for wme in &self.working_memory {
            out.push_str(&format!("  #{} {}\n", wme.timestamp, wme));
        }
        out.push_str("== alpha memories ==\n");
        for amem in self.alpha_memories.values() {
            let mem = amem.borrow();
            out.push_str(&format!("  alpha#{} items={}\n", mem.id, mem.items.len()));
        }
        out.push_str("== beta memories ==\n");
        for node in &self.all_nodes {
            if let Some(beta) = node.borrow().as_beta() {
                out.push_str(&format!("  beta#{} tokens={}\n", beta.id, beta.items.len()));
            }
        }
        out.push_str("== productions ==\n");
        for node in &self.production_nodes {
            let n = node.borrow();
            let p = n.as_production().expect("registered production node");
            out.push_str(&format!(
                "  {} (#{}) matches={}\n",
                p.production.name,
                p.id,
                p.items.len()
            ));
        }
        out
    }
}

/// Splices `token` out of every node that still lists it, then recurses
/// child-first into every token extended from it: once `token` is gone, any
/// token built on top of it is no longer a valid match either.
fn remove_token_cascade(token: &Rc<Token>) {
    for child in token.children() {
        if let Some(child) = child.upgrade() {
            remove_token_cascade(&child);
        }
    }
    for owner in token.owners() {
        let Some(owner) = owner.upgrade() else { continue };
        let mut node = owner.borrow_mut();
        match &mut *node {
            Node::Beta(b) => b.items.retain(|t| !Rc::ptr_eq(t, token)),
            Node::Production(p) => p.items.retain(|t| !Rc::ptr_eq(t, token)),
            Node::Join(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;

    fn cond(id: Field, attr: Field, val: Field) -> Condition {
        Condition::new(id, attr, val)
    }

    fn var(name: &str) -> Field {
        Field::Variable(name.to_string())
    }

    fn sym(name: &str) -> Field {
        Field::Constant(WmeValue::Symbol(name.to_string()))
    }

    #[test]
    fn build_or_share_alpha_memory_node_shares_identical_test() {
        let mut net = ReteNetwork::new();
        let test = ConstantTest {
            identifier: None,
            attribute: Some(WmeValue::Symbol("age".into())),
            value: None,
        };
        let a = net.build_or_share_alpha_memory_node(test.clone());
        let b = net.build_or_share_alpha_memory_node(test);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(net.alpha_memory_count(), 1);
    }

    #[test]
    fn two_rules_sharing_a_prefix_share_join_nodes() {
        let mut net = ReteNetwork::new();
        let shared_conditions =
            vec![cond(var("?p"), sym("name"), var("?n")), cond(var("?p"), sym("age"), var("?a"))];
        let mut conditions_a = shared_conditions.clone();
        conditions_a.push(cond(sym("legal"), sym("min-age"), var("?m")));
        let mut conditions_b = shared_conditions;
        conditions_b.push(cond(sym("legal"), sym("max-age"), var("?x")));

        net.add_production("rule-a".into(), conditions_a, Vec::new());
        net.add_production("rule-b".into(), conditions_b, Vec::new());

        assert_eq!(net.join_node_count_up_to_depth(2), 2);
    }

    #[test]
    fn get_join_tests_binds_to_nearest_ancestor() {
        let conditions = vec![
            cond(var("?p"), sym("name"), var("?n")),
            cond(var("?p"), sym("age"), var("?a")),
            cond(var("?p"), sym("active"), var("?flag")),
        ];
        let tests = get_join_tests_from_condition(&conditions, 2);
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].ancestor_depth, 0); // nearest ancestor (condition 1)
    }
}
