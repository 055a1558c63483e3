//! Beta-network node kinds and the activation protocol between them.
//!
//! [`Node`] is the tagged variant the design notes call for: beta memories,
//! join nodes, and production nodes all live behind one `Rc<RefCell<Node>>`
//! handle so a join node's children list can mix beta memories with the
//! occasional production node without a trait object.

use crate::alpha_memory::AlphaMemoryRef;
use crate::beta_network::Token;
use crate::types::{FieldKind, Production, WmeRef};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared, mutable handle to a network node. The [`crate::node_sharing`]
/// network owns every `NodeRef` it creates; parents hold clones to reach
/// their children.
pub type NodeRef = Rc<RefCell<Node>>;

/// `(field_of_new_wme, k, field_of_kth_ancestor_wme)`: requires the named
/// field of a candidate WME to equal the named field of the WME contributed
/// by the `k`-th predecessor in the token chain (section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinTest {
    pub field_of_new_wme: FieldKind,
    pub ancestor_depth: usize,
    pub field_of_ancestor_wme: FieldKind,
}

/// Holds tokens (partial matches) and notifies its children on arrival.
#[derive(Debug, Default)]
pub struct BetaMemoryNode {
    pub id: u64,
    pub items: Vec<Rc<Token>>,
    pub children: Vec<NodeRef>,
    /// The join node this beta memory was built to receive output from;
    /// `None` for `beta_root`. Lets the network walk join depth without a
    /// separate registry (used by sharing diagnostics).
    pub produced_by: Option<NodeRef>,
}

/// Tests variable consistency between a beta memory and an alpha memory.
#[derive(Debug)]
pub struct JoinNode {
    pub id: u64,
    pub parent: NodeRef,
    pub alpha_memory: AlphaMemoryRef,
    pub tests: Vec<JoinTest>,
    /// Exactly one beta memory, built or shared by
    /// [`crate::node_sharing`] (possibly carrying its own production-node
    /// children if this is a terminal level for some rule).
    pub children: Vec<NodeRef>,
}

/// Terminal node: accumulates the complete match set for one production.
#[derive(Debug)]
pub struct ProductionNode {
    pub id: u64,
    pub production: Production,
    pub items: Vec<Rc<Token>>,
}

/// The tagged variant uniting the three node kinds behind one owning cell.
#[derive(Debug)]
pub enum Node {
    Beta(BetaMemoryNode),
    Join(JoinNode),
    Production(ProductionNode),
}

impl Node {
    pub fn id(&self) -> u64 {
        match self {
            Node::Beta(b) => b.id,
            Node::Join(j) => j.id,
            Node::Production(p) => p.id,
        }
    }

    pub fn as_beta(&self) -> Option<&BetaMemoryNode> {
        match self {
            Node::Beta(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_join(&self) -> Option<&JoinNode> {
        match self {
            Node::Join(j) => Some(j),
            _ => None,
        }
    }

    pub fn as_production(&self) -> Option<&ProductionNode> {
        match self {
            Node::Production(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_production_mut(&mut self) -> Option<&mut ProductionNode> {
        match self {
            Node::Production(p) => Some(p),
            _ => None,
        }
    }

    /// Children of a beta memory or join node; empty for a production node,
    /// which is always a leaf.
    pub fn children(&self) -> &[NodeRef] {
        match self {
            Node::Beta(b) => &b.children,
            Node::Join(j) => &j.children,
            Node::Production(_) => &[],
        }
    }

    pub fn add_child(&mut self, child: NodeRef) {
        match self {
            Node::Beta(b) => b.children.push(child),
            Node::Join(j) => j.children.push(child),
            Node::Production(_) => panic!("production nodes never have children"),
        }
    }
}

/// Each test reads `new_field` of `wme` and `anc_field` of the `k`-th
/// ancestor WME of `token`; all tests must pass (section 4.2).
pub fn perform_join_tests(token: &Token, wme: &WmeRef, tests: &[JoinTest]) -> bool {
    tests.iter().all(|test| match token.nth_ancestor_wme(test.ancestor_depth) {
        Some(ancestor) => {
            wme.field(test.field_of_new_wme) == ancestor.field(test.field_of_ancestor_wme)
        }
        None => false,
    })
}

/// `BetaMemory.left_activation`: build `Token{parent, wme}`, append if new,
/// then fan out to children (section 4.3).
pub fn beta_memory_left_activation(beta: &NodeRef, parent_token: &Rc<Token>, wme: &WmeRef) {
    let (token, children) = {
        let mut node = beta.borrow_mut();
        let mem = match &mut *node {
            Node::Beta(b) => b,
            _ => panic!("beta_memory_left_activation called on a non-beta node"),
        };
        let token = Token::extend(parent_token, Rc::clone(wme));
        if mem.items.iter().any(|t| **t == *token) {
            return;
        }
        mem.items.push(Rc::clone(&token));
        (token, mem.children.clone())
    };
    token.link(beta);
    for child in &children {
        let is_join = child.borrow().as_join().is_some();
        if is_join {
            join_node_left_activation(child, &token);
        } else {
            production_node_left_activation(child, &token);
        }
    }
}

/// `JoinNode.left_activation`: a new token arrived at the parent beta
/// memory; scan the alpha memory and forward every WME that passes the join
/// tests (section 4.2).
pub fn join_node_left_activation(join: &NodeRef, token: &Rc<Token>) {
    let (alpha_items, tests, beta_child) = {
        let node = join.borrow();
        let j = node.as_join().expect("join_node_left_activation called on a non-join node");
        (j.alpha_memory.borrow().items.clone(), j.tests.clone(), j.children.first().cloned())
    };
    let Some(beta_child) = beta_child else { return };
    for wme in &alpha_items {
        if perform_join_tests(token, wme, &tests) {
            beta_memory_left_activation(&beta_child, token, wme);
        }
    }
}

/// `JoinNode.right_activation`: a new WME arrived at the alpha memory; join
/// it against every token currently in the parent beta memory, in insertion
/// order (section 4.2).
pub fn right_activation(join: &NodeRef, wme: &WmeRef) {
    let (parent_items, tests, beta_child) = {
        let node = join.borrow();
        let j = node.as_join().expect("right_activation called on a non-join node");
        let parent_items = j.parent.borrow().as_beta().expect("join parent must be a beta memory").items.clone();
        (parent_items, j.tests.clone(), j.children.first().cloned())
    };
    let Some(beta_child) = beta_child else { return };
    for token in &parent_items {
        if perform_join_tests(token, wme, &tests) {
            beta_memory_left_activation(&beta_child, token, wme);
        }
    }
}

/// `ProductionNode.left_activation`: append the completed token if absent
/// (section 4.4). That items list IS the per-rule match set.
pub fn production_node_left_activation(prod: &NodeRef, token: &Rc<Token>) {
    {
        let mut node = prod.borrow_mut();
        let p = node.as_production_mut().expect("production_node_left_activation called on a non-production node");
        if p.items.iter().any(|t| **t == **token) {
            return;
        }
        p.items.push(Rc::clone(token));
    }
    token.link(prod);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Wme;
    use rete_types::WmeValue;

    fn wme(id: u64, ident: &str, attr: &str, val: i64) -> WmeRef {
        Rc::new(Wme::new(
            id,
            WmeValue::Symbol(ident.to_string()),
            WmeValue::Symbol(attr.to_string()),
            WmeValue::Int(val),
            id,
        ))
    }

    #[test]
    fn perform_join_tests_empty_always_passes() {
        let token = Token::dummy();
        let w = wme(1, "p1", "age", 25);
        assert!(perform_join_tests(&token, &w, &[]));
    }

    #[test]
    fn perform_join_tests_checks_ancestor_field_equality() {
        let root = Token::dummy();
        let t1 = Token::extend(&root, wme(1, "p1", "name", 0));
        let tests = vec![JoinTest {
            field_of_new_wme: FieldKind::Identifier,
            ancestor_depth: 0,
            field_of_ancestor_wme: FieldKind::Identifier,
        }];
        let matching = wme(2, "p1", "age", 25);
        let mismatched = wme(3, "p2", "age", 25);
        assert!(perform_join_tests(&t1, &matching, &tests));
        assert!(!perform_join_tests(&t1, &mismatched, &tests));
    }
}
