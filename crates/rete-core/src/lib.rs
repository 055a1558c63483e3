#![deny(warnings)]
//! # rete-core
//!
//! A forward-chaining production-rule inference engine built around a Rete
//! discrimination network: a shared alpha/beta graph, incremental token
//! propagation, and a recognize-act cycle with pluggable conflict
//! resolution (including a reinforcement-learning selector).
//!
//! ## Quick start
//!
//! ```rust
//! use rete_core::engine::InferenceEngine;
//! use rete_core::types::{Condition, Field};
//! use rete_types::WmeValue;
//!
//! let mut engine = InferenceEngine::new();
//! engine.add_production(
//!     "check-age",
//!     vec![
//!         Condition::new(Field::Variable("?p".into()), Field::Constant(WmeValue::Symbol("name".into())), Field::Variable("?n".into())),
//!         Condition::new(Field::Variable("?p".into()), Field::Constant(WmeValue::Symbol("age".into())), Field::Variable("?a".into())),
//!     ],
//!     vec![Box::new(|bindings, _engine| {
//!         println!("matched: {:?}", bindings.get("?n"));
//!         Ok(())
//!     })],
//! ).unwrap();
//!
//! engine.add_wme("person1", "name", "Alice");
//! engine.add_wme("person1", "age", 25i64);
//! let cycles = engine.run(None).unwrap();
//! assert_eq!(cycles, 1);
//! ```
//!
//! ## Module organization
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | WME, Condition, Production, and the binding-extraction logic |
//! | [`alpha_memory`] | Constant-test discrimination; the alpha network's leaves |
//! | [`rete_nodes`] | Beta-network node kinds (join / beta memory / production) and their activation protocol |
//! | [`beta_network`] | The `Token` parent-chain |
//! | [`node_sharing`] | `ReteNetwork`: builds and shares the discrimination graph, routes assertion/retraction |
//! | [`conflict_resolution`] | The four selection strategies (Default, LEX, MEA, GBB) |
//! | [`engine`] | `InferenceEngine`: working memory, agenda, the recognize-act loop |
//! | [`config`] | `EngineConfig`, the ambient configuration surface |
//! | [`error`] | `EngineError`, the structured error type |
//!
//! Out of scope (left to embedders): CLI front-ends, pretty-printers,
//! packaging, and action procedures themselves, which are opaque callables
//! supplied by the caller.

pub mod alpha_memory;
pub mod beta_network;
pub mod conflict_resolution;
pub mod config;
pub mod engine;
pub mod error;
pub mod node_sharing;
pub mod rete_nodes;
pub mod types;

pub use config::EngineConfig;
pub use conflict_resolution::{
    AgendaEntry, ConflictResolutionStrategy, DefaultStrategy, GbbStrategy, LexStrategy,
    MeaStrategy, StrategyKind,
};
pub use engine::{InferenceEngine, ProductionId};
pub use error::{EngineError, ErrorSeverity, Result};
pub use node_sharing::ReteNetwork;
pub use types::{Action, Bindings, Condition, Field, FieldKind, Production, Wme, WmeRef};
