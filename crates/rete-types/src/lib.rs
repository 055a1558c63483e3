//! Rete Types
//!
//! Shared value vocabulary for the rete inference engine workspace. Kept as a
//! separate leaf crate so that `rete-core` and any future embedding layer can
//! depend on the same `WmeValue` type without a circular dependency.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]

mod types;

pub use types::{OrderedFloat, WmeValue};
