//! Syntactic rule representation and the working-memory element triple.

use crate::alpha_memory::AlphaMemoryRef;
use crate::beta_network::Token;
use crate::error::EngineError;
use rete_types::WmeValue;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// A working-memory element: an immutable `(identifier, attribute, value)`
/// triple. Identifier and attribute are symbols; value is any
/// equality-comparable datum (see [`WmeValue`]).
///
/// `id` is an engine-internal sequence number used only for back-reference
/// bookkeeping and `dump_state`; it plays no role in matching. Equality and
/// hashing are by triple contents only, per the data model's invariant 2.
///
/// Carries non-owning back-references to every alpha memory it has been
/// stored in and every token that directly contributes it (section 3/9):
/// `remove_wme` walks these instead of scanning the network, so retraction
/// is O(affected matches) rather than O(network size).
#[derive(Debug)]
pub struct Wme {
    pub id: u64,
    pub identifier: WmeValue,
    pub attribute: WmeValue,
    pub value: WmeValue,
    /// Monotonic counter assigned at `add_wme`; the recency ordering LEX/MEA
    /// compare on.
    pub timestamp: u64,
    /// Alpha memories this WME currently sits in. Populated by
    /// [`crate::alpha_memory::activate_alpha_memory`].
    alpha_memories: RefCell<Vec<Weak<RefCell<crate::alpha_memory::AlphaMemoryNode>>>>,
    /// Tokens whose own `wme` field (not an ancestor's) is this WME.
    /// Populated by [`Token::link`].
    tokens: RefCell<Vec<Weak<Token>>>,
}

impl Clone for Wme {
    /// Back-reference lists are bookkeeping for the *original* WME object;
    /// a clone (e.g. for `dump_state` or test fixtures) starts with empty
    /// lists rather than aliasing them, since back-references are populated
    /// by the network as a side effect of insertion, not carried by value.
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            identifier: self.identifier.clone(),
            attribute: self.attribute.clone(),
            value: self.value.clone(),
            timestamp: self.timestamp,
            alpha_memories: RefCell::new(Vec::new()),
            tokens: RefCell::new(Vec::new()),
        }
    }
}

impl Wme {
    /// Builds a fresh WME with empty back-reference lists.
    pub fn new(id: u64, identifier: WmeValue, attribute: WmeValue, value: WmeValue, timestamp: u64) -> Self {
        Self {
            id,
            identifier,
            attribute,
            value,
            timestamp,
            alpha_memories: RefCell::new(Vec::new()),
            tokens: RefCell::new(Vec::new()),
        }
    }

    /// Reads the field named by `kind`.
    pub fn field(&self, kind: FieldKind) -> &WmeValue {
        match kind {
            FieldKind::Identifier => &self.identifier,
            FieldKind::Attribute => &self.attribute,
            FieldKind::Value => &self.value,
        }
    }

    /// Records that `amem` now holds this WME. Non-owning: dropped
    /// automatically once the alpha memory itself is gone.
    pub(crate) fn register_alpha_memory(&self, amem: &AlphaMemoryRef) {
        self.alpha_memories.borrow_mut().push(Rc::downgrade(amem));
    }

    /// Every alpha memory this WME has been stored in, as of the last
    /// registration (some entries may have already expired).
    pub(crate) fn alpha_memory_refs(&self) -> Vec<Weak<RefCell<crate::alpha_memory::AlphaMemoryNode>>> {
        self.alpha_memories.borrow().clone()
    }

    /// Records that `token`'s own contribution (not an ancestor's) is this
    /// WME. Called once by [`Token::link`] when a node actually keeps a
    /// freshly built token.
    pub(crate) fn register_token(&self, token: &Rc<Token>) {
        self.tokens.borrow_mut().push(Rc::downgrade(token));
    }

    /// Every token directly built on this WME, as of the last registration.
    pub(crate) fn token_refs(&self) -> Vec<Weak<Token>> {
        self.tokens.borrow().clone()
    }
}

impl PartialEq for Wme {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
            && self.attribute == other.attribute
            && self.value == other.value
    }
}

impl Eq for Wme {}

impl std::hash::Hash for Wme {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
        self.attribute.hash(state);
        self.value.hash(state);
    }
}

impl fmt::Display for Wme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.identifier, self.attribute, self.value)
    }
}

/// Which slot of a WME or [`Condition`] a field occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Identifier,
    Attribute,
    Value,
}

/// A single field of a [`Condition`]: either a literal value to test for
/// equality, or a variable that is bound on first occurrence and tested for
/// consistency on every later occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Constant(WmeValue),
    Variable(String),
}

impl Field {
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Field::Variable(name) => Some(name),
            Field::Constant(_) => None,
        }
    }

    pub fn as_constant(&self) -> Option<&WmeValue> {
        match self {
            Field::Constant(v) => Some(v),
            Field::Variable(_) => None,
        }
    }
}

/// One pattern in a rule's left-hand side: `(id-field, attr-field,
/// value-field)`, each a constant or a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    pub identifier: Field,
    pub attribute: Field,
    pub value: Field,
}

impl Condition {
    pub fn new(identifier: Field, attribute: Field, value: Field) -> Self {
        Self { identifier, attribute, value }
    }

    /// Iterates the condition's three fields paired with their [`FieldKind`].
    pub fn fields(&self) -> [(FieldKind, &Field); 3] {
        [
            (FieldKind::Identifier, &self.identifier),
            (FieldKind::Attribute, &self.attribute),
            (FieldKind::Value, &self.value),
        ]
    }
}

/// Variable name -> bound value, extracted from a completed token.
pub type Bindings = HashMap<String, WmeValue>;

/// An action callable, invoked once per firing with the bindings extracted
/// from the token and a handle back to the engine so it may assert or
/// retract working-memory elements.
pub type Action = Box<dyn Fn(&Bindings, &mut crate::engine::InferenceEngine) -> anyhow::Result<()>>;

/// A named rule: an ordered list of conditions (fixing join order) and an
/// ordered list of actions run in sequence on firing.
///
/// Conditions and actions are held behind `Rc` so a production can be cloned
/// cheaply out of its owning [`crate::rete_nodes::ProductionNode`] before
/// `execute` runs — actions are allowed to re-entrantly assert or retract
/// WMEs (section 5), which must not happen while the node's `RefCell` is
/// still borrowed.
pub struct Production {
    pub id: u64,
    pub name: String,
    pub conditions: Rc<Vec<Condition>>,
    pub actions: Rc<Vec<Action>>,
}

impl Clone for Production {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            conditions: Rc::clone(&self.conditions),
            actions: Rc::clone(&self.actions),
        }
    }
}

impl fmt::Debug for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Production")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("conditions", &self.conditions)
            .field("actions", &format!("<{} actions>", self.actions.len()))
            .finish()
    }
}

impl Production {
    /// Every variable occurring in the first field of some earlier condition
    /// that the named variable never otherwise touches is still fine: this
    /// just reports variables that appear in exactly one condition and
    /// nowhere else, which section 7a treats as a warning, not a hard error.
    pub fn find_unbound_variables(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for cond in &self.conditions {
            for (_, field) in cond.fields() {
                if let Some(name) = field.as_variable() {
                    *counts.entry(name).or_insert(0) += 1;
                }
            }
        }
        counts.into_iter().filter(|(_, c)| *c == 1).map(|(name, _)| name.to_string()).collect()
    }

    /// Walks the token chain (ancestor -> leaf) pairing each condition's
    /// fields against the WME it matched, binding variables as it goes.
    /// Later occurrences silently overwrite earlier ones: joins already
    /// guarantee the values agree, so this is idempotent (section 4.6).
    pub fn get_variable_bindings(&self, token: &crate::beta_network::Token) -> Bindings {
        let mut bindings = Bindings::new();
        let wmes = token.wmes_in_condition_order();
        for (condition, wme) in self.conditions.iter().zip(wmes.iter()) {
            for (kind, field) in condition.fields() {
                if let Field::Variable(name) = field {
                    bindings.insert(name.clone(), wme.field(kind).clone());
                }
            }
        }
        bindings
    }

    /// Runs every action in order against the token's bindings.
    pub fn execute(
        &self,
        token: &crate::beta_network::Token,
        engine: &mut crate::engine::InferenceEngine,
    ) -> Result<(), EngineError> {
        let bindings = self.get_variable_bindings(token);
        for action in &self.actions {
            action(&bindings, engine)
                .map_err(|source| EngineError::ActionFailed { rule: self.name.clone(), source })?;
        }
        Ok(())
    }
}

/// Shared handle to a WME, as held by alpha memories and tokens.
pub type WmeRef = Rc<Wme>;

#[cfg(test)]
mod tests {
    use super::*;

    fn wme(id: u64, ident: &str, attr: &str, val: WmeValue, ts: u64) -> Wme {
        Wme::new(id, WmeValue::Symbol(ident.to_string()), WmeValue::Symbol(attr.to_string()), val, ts)
    }

    #[test]
    fn wme_equality_ignores_id_and_timestamp() {
        let a = wme(1, "p1", "age", WmeValue::Int(25), 3);
        let b = wme(2, "p1", "age", WmeValue::Int(25), 9);
        assert_eq!(a, b);
    }

    #[test]
    fn find_unbound_variables_flags_single_occurrence() {
        let prod = Production {
            id: 1,
            name: "r".into(),
            conditions: Rc::new(vec![Condition::new(
                Field::Variable("?p".into()),
                Field::Constant(WmeValue::Symbol("name".into())),
                Field::Variable("?n".into()),
            )]),
            actions: Rc::new(vec![]),
        };
        let mut unbound = prod.find_unbound_variables();
        unbound.sort();
        assert_eq!(unbound, vec!["?n".to_string(), "?p".to_string()]);
    }
}
