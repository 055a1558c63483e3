//! Alpha memories: the leaves of the constant-test discrimination network.
//!
//! An [`AlphaMemoryNode`] holds every WME currently satisfying one
//! condition's constant tests, plus the list of join nodes that should be
//! notified of new arrivals (section 4.1).

use crate::rete_nodes::{self, NodeRef};
use crate::types::{FieldKind, Wme, WmeRef};
use rete_types::WmeValue;
use std::cell::RefCell;
use std::rc::Rc;

/// The constant tests a condition contributes to the alpha trie: one
/// optional literal per field, `None` meaning the field is a variable (and
/// therefore always-true). Two conditions with identical `ConstantTest`
/// share the same [`AlphaMemoryNode`] (invariant 5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstantTest {
    pub identifier: Option<WmeValue>,
    pub attribute: Option<WmeValue>,
    pub value: Option<WmeValue>,
}

impl ConstantTest {
    /// Whether `wme` passes every non-`None` test.
    pub fn matches(&self, wme: &Wme) -> bool {
        Self::field_matches(&self.identifier, wme.field(FieldKind::Identifier))
            && Self::field_matches(&self.attribute, wme.field(FieldKind::Attribute))
            && Self::field_matches(&self.value, wme.field(FieldKind::Value))
    }

    fn field_matches(test: &Option<WmeValue>, actual: &WmeValue) -> bool {
        match test {
            Some(expected) => expected == actual,
            None => true,
        }
    }
}

/// Holds every WME passing one condition's constant tests, in insertion
/// order, plus its successor join nodes.
#[derive(Debug)]
pub struct AlphaMemoryNode {
    pub id: u64,
    pub test: ConstantTest,
    pub items: Vec<WmeRef>,
    pub successors: Vec<NodeRef>,
}

/// Shared handle to an [`AlphaMemoryNode`]; the network owns the map these
/// live in, join nodes hold a clone of the `Rc`.
pub type AlphaMemoryRef = Rc<RefCell<AlphaMemoryNode>>;

impl AlphaMemoryNode {
    pub fn new(id: u64, test: ConstantTest) -> AlphaMemoryRef {
        Rc::new(RefCell::new(AlphaMemoryNode { id, test, items: Vec::new(), successors: Vec::new() }))
    }

    fn contains(&self, wme: &Wme) -> bool {
        self.items.iter().any(|w| w.as_ref() == wme)
    }
}

/// `activate_with`: if `wme` is not already present (by triple equality),
/// append it and right-activate every successor join node in registration
/// order (section 4.1). Separated from `AlphaMemoryNode` itself so the
/// mutable borrow needed to push the item is dropped before we recurse into
/// successors, which may themselves need to read this memory.
pub fn activate_alpha_memory(amem: &AlphaMemoryRef, wme: &WmeRef) {
    let successors = {
        let mut mem = amem.borrow_mut();
        if mem.contains(wme) {
            return;
        }
        mem.items.push(Rc::clone(wme));
        mem.successors.clone()
    };
    wme.register_alpha_memory(amem);
    for succ in &successors {
        rete_nodes::right_activation(succ, wme);
    }
}

/// Removes `wme` from `amem`, if present. Returns whether it was removed.
pub fn deactivate_alpha_memory(amem: &AlphaMemoryRef, wme: &Wme) -> bool {
    let mut mem = amem.borrow_mut();
    let before = mem.items.len();
    mem.items.retain(|w| w.as_ref() != wme);
    mem.items.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wme(id: u64, ident: &str, attr: &str, value: i64) -> WmeRef {
        Rc::new(Wme::new(
            id,
            WmeValue::Symbol(ident.to_string()),
            WmeValue::Symbol(attr.to_string()),
            WmeValue::Int(value),
            id,
        ))
    }

    #[test]
    fn constant_test_with_all_variables_matches_everything() {
        let test = ConstantTest { identifier: None, attribute: None, value: None };
        assert!(test.matches(&wme(1, "p1", "age", 25)));
    }

    #[test]
    fn constant_test_rejects_mismatched_field() {
        let test = ConstantTest {
            identifier: None,
            attribute: Some(WmeValue::Symbol("age".into())),
            value: None,
        };
        assert!(test.matches(&wme(1, "p1", "age", 25)));
        assert!(!test.matches(&wme(2, "p1", "name", 0)));
    }

    #[test]
    fn activate_alpha_memory_deduplicates_by_triple() {
        let amem = AlphaMemoryNode::new(1, ConstantTest { identifier: None, attribute: None, value: None });
        let w1 = wme(1, "p1", "age", 25);
        let w2 = wme(2, "p1", "age", 25); // different id, same triple
        activate_alpha_memory(&amem, &w1);
        activate_alpha_memory(&amem, &w2);
        assert_eq!(amem.borrow().items.len(), 1);
    }

    #[test]
    fn deactivate_alpha_memory_removes_matching_triple() {
        let amem = AlphaMemoryNode::new(1, ConstantTest { identifier: None, attribute: None, value: None });
        let w1 = wme(1, "p1", "age", 25);
        activate_alpha_memory(&amem, &w1);
        assert!(deactivate_alpha_memory(&amem, &w1));
        assert!(amem.borrow().items.is_empty());
    }
}
