//! The [`Token`]: a singly-parented chain node representing a partial match.

use crate::rete_nodes::Node;
use crate::types::{FieldKind, WmeRef};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A node in a singly-parented chain. A token of depth `k` represents a
/// consistent assignment to the first `k` conditions of some rule; walking
/// `parent` yields the `k` contributing WMEs in condition order.
///
/// The dummy top token (`parent: None, wme: None, depth: 0`) seeds every
/// rule's first join and is the sole item of `beta_root`.
///
/// `children` and `owners` are non-owning back-pointers (section 5/9): the
/// former lets retraction cascade to every token built on top of this one
/// without walking the whole network, the latter names every node
/// (`BetaMemoryNode` or `ProductionNode`) whose `items` list currently holds
/// this exact token so it can be spliced out directly.
#[derive(Debug)]
pub struct Token {
    pub parent: Option<Rc<Token>>,
    pub wme: Option<WmeRef>,
    pub depth: usize,
    children: RefCell<Vec<Weak<Token>>>,
    owners: RefCell<Vec<Weak<RefCell<Node>>>>,
}

impl Token {
    /// The dummy top token.
    pub fn dummy() -> Rc<Self> {
        Rc::new(Token {
            parent: None,
            wme: None,
            depth: 0,
            children: RefCell::new(Vec::new()),
            owners: RefCell::new(Vec::new()),
        })
    }

    /// Builds a new token one level deeper than `parent`, contributing `wme`.
    /// Not yet linked into any back-reference chain — call [`Token::link`]
    /// once a node actually decides to keep it (a content-duplicate that
    /// gets discarded should never be linked).
    pub fn extend(parent: &Rc<Token>, wme: WmeRef) -> Rc<Self> {
        Rc::new(Token {
            parent: Some(Rc::clone(parent)),
            wme: Some(wme),
            depth: parent.depth + 1,
            children: RefCell::new(Vec::new()),
            owners: RefCell::new(Vec::new()),
        })
    }

    /// Registers this token as a back-referenced child of its parent, as a
    /// back-reference of the WME it directly contributes, and records
    /// `owner` as a node whose `items` list now holds it. Idempotent-ish in
    /// practice: call once per node that actually stores this token (a
    /// token can be stored by more than one node, e.g. a beta memory and
    /// the production node it terminates at).
    pub fn link(self: &Rc<Self>, owner: &Rc<RefCell<Node>>) {
        if let Some(parent) = &self.parent {
            parent.children.borrow_mut().push(Rc::downgrade(self));
        }
        if let Some(wme) = &self.wme {
            wme.register_token(self);
        }
        self.owners.borrow_mut().push(Rc::downgrade(owner));
    }

    /// Tokens directly extending this one (not grandchildren), as of the
    /// last registration; some entries may have already expired.
    pub(crate) fn children(&self) -> Vec<Weak<Token>> {
        self.children.borrow().clone()
    }

    /// Nodes whose `items` list currently holds this exact token.
    pub(crate) fn owners(&self) -> Vec<Weak<RefCell<Node>>> {
        self.owners.borrow().clone()
    }

    /// The WME contributed by the `k`-th ancestor, where `k = 0` is this
    /// token's own `wme`, `k = 1` is the parent's, and so on (section 4.2).
    pub fn nth_ancestor_wme(&self, k: usize) -> Option<&WmeRef> {
        let mut current = self;
        let mut remaining = k;
        loop {
            if remaining == 0 {
                return current.wme.as_ref();
            }
            current = current.parent.as_deref()?;
            remaining -= 1;
        }
    }

    /// The field named by `kind` on the `k`-th ancestor WME.
    pub fn nth_ancestor_field(&self, k: usize, kind: FieldKind) -> Option<rete_types::WmeValue> {
        self.nth_ancestor_wme(k).map(|wme| wme.field(kind).clone())
    }

    /// Collects the contributing WMEs in condition order (oldest first),
    /// i.e. the reverse of the parent-chain walk from this token to the
    /// dummy top.
    pub fn wmes_in_condition_order(&self) -> Vec<WmeRef> {
        let mut reversed = Vec::with_capacity(self.depth);
        let mut current = self;
        while let Some(wme) = &current.wme {
            reversed.push(Rc::clone(wme));
            match &current.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        reversed.reverse();
        reversed
    }

    /// Assertion-index sequence of the contributing WMEs, sorted descending
    /// (newest first) — the comparison key for the LEX strategy.
    pub fn recency_sequence(&self) -> Vec<u64> {
        let mut timestamps: Vec<u64> =
            self.wmes_in_condition_order().iter().map(|w| w.timestamp).collect();
        timestamps.sort_unstable_by(|a, b| b.cmp(a));
        timestamps
    }

}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        // Chain-equality: same depth and every contributing WME equal
        // pairwise, which is exactly what invariant 4's dedup needs.
        self.depth == other.depth && self.wmes_in_condition_order() == other.wmes_in_condition_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Wme;
    use rete_types::WmeValue;

    fn wme(id: u64, ident: &str, attr: &str, val: i64, ts: u64) -> WmeRef {
        Rc::new(Wme::new(
            id,
            WmeValue::Symbol(ident.to_string()),
            WmeValue::Symbol(attr.to_string()),
            WmeValue::Int(val),
            ts,
        ))
    }

    #[test]
    fn dummy_has_depth_zero() {
        assert_eq!(Token::dummy().depth, 0);
    }

    #[test]
    fn extend_increments_depth_and_preserves_order() {
        let root = Token::dummy();
        let t1 = Token::extend(&root, wme(1, "p1", "name", 0, 1));
        let t2 = Token::extend(&t1, wme(2, "p1", "age", 25, 2));
        assert_eq!(t2.depth, 2);
        let ordered = t2.wmes_in_condition_order();
        assert_eq!(ordered[0].attribute, WmeValue::Symbol("name".into()));
        assert_eq!(ordered[1].attribute, WmeValue::Symbol("age".into()));
    }

    #[test]
    fn nth_ancestor_wme_counts_from_newest() {
        let root = Token::dummy();
        let t1 = Token::extend(&root, wme(1, "p1", "name", 0, 1));
        let t2 = Token::extend(&t1, wme(2, "p1", "age", 25, 2));
        assert_eq!(t2.nth_ancestor_wme(0).unwrap().attribute, WmeValue::Symbol("age".into()));
        assert_eq!(t2.nth_ancestor_wme(1).unwrap().attribute, WmeValue::Symbol("name".into()));
        assert!(t2.nth_ancestor_wme(2).is_none());
    }

    #[test]
    fn recency_sequence_is_sorted_descending() {
        let root = Token::dummy();
        let t1 = Token::extend(&root, wme(1, "p1", "name", 0, 5));
        let t2 = Token::extend(&t1, wme(2, "p1", "age", 25, 2));
        assert_eq!(t2.recency_sequence(), vec![5, 2]);
    }
}
