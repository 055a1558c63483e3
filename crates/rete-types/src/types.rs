use serde::{Deserialize, Serialize};
use std::fmt;

/// A value held by a WME field. Values are "any equality-comparable datum"; this
/// crate represents that as a small closed sum type rather than an opaque
/// embedder-supplied comparable, so the engine can hash and compare them directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WmeValue {
    /// A string literal.
    String(String),
    /// A signed integer.
    Int(i64),
    /// A floating point number. Compared and hashed via its bit pattern so
    /// `WmeValue` can implement `Eq`/`Hash` without surprising NaN semantics
    /// beyond what `f64::to_bits` gives (NaN only equals bit-identical NaN).
    Float(OrderedFloat),
    /// A boolean.
    Bool(bool),
    /// An opaque interned-style symbol, distinct from `String` so that rule
    /// authors can distinguish "this is an identifier" from "this is text".
    Symbol(String),
}

/// Wrapper giving `f64` total `Eq`/`Hash` via its bit representation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedFloat {}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for OrderedFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::hash::Hash for WmeValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            WmeValue::String(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            WmeValue::Int(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            WmeValue::Float(fl) => {
                2u8.hash(state);
                fl.hash(state);
            }
            WmeValue::Bool(b) => {
                3u8.hash(state);
                b.hash(state);
            }
            WmeValue::Symbol(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for WmeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WmeValue::String(s) => write!(f, "{s:?}"),
            WmeValue::Int(i) => write!(f, "{i}"),
            WmeValue::Float(fl) => write!(f, "{fl}"),
            WmeValue::Bool(b) => write!(f, "{b}"),
            WmeValue::Symbol(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for WmeValue {
    fn from(s: &str) -> Self {
        WmeValue::Symbol(s.to_string())
    }
}

impl From<String> for WmeValue {
    fn from(s: String) -> Self {
        WmeValue::Symbol(s)
    }
}

impl From<i64> for WmeValue {
    fn from(i: i64) -> Self {
        WmeValue::Int(i)
    }
}

impl From<f64> for WmeValue {
    fn from(f: f64) -> Self {
        WmeValue::Float(OrderedFloat(f))
    }
}

impl From<bool> for WmeValue {
    fn from(b: bool) -> Self {
        WmeValue::Bool(b)
    }
}

impl TryFrom<&serde_json::Value> for WmeValue {
    type Error = serde_json::Error;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match value {
            serde_json::Value::String(s) => WmeValue::String(s.clone()),
            serde_json::Value::Bool(b) => WmeValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    WmeValue::Int(i)
                } else {
                    WmeValue::Float(OrderedFloat(n.as_f64().unwrap_or_default()))
                }
            }
            other => WmeValue::String(other.to_string()),
        })
    }
}

impl From<WmeValue> for serde_json::Value {
    fn from(value: WmeValue) -> Self {
        match value {
            WmeValue::String(s) => Self::String(s),
            WmeValue::Symbol(s) => Self::String(s),
            WmeValue::Int(i) => Self::Number(serde_json::Number::from(i)),
            WmeValue::Float(fl) => {
                serde_json::Number::from_f64(fl.0).map_or(Self::Null, Self::Number)
            }
            WmeValue::Bool(b) => Self::Bool(b),
        }
    }
}
