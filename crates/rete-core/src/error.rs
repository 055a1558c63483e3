//! Structured error type for the rete engine.
//!
//! Mirrors the shape of a typical production error enum: one `thiserror`
//! variant per failure category, each carrying enough structured context to
//! act on without re-parsing a message string, plus a handful of severity /
//! recoverability helpers so callers can decide whether to log-and-continue
//! or abort.

use thiserror::Error;

/// Severity associated with an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational; the engine already recovered on its own.
    Low,
    /// Worth surfacing to an operator but not fatal to the running cycle.
    Medium,
    /// The current `run` cannot continue meaningfully.
    High,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
        };
        write!(f, "{s}")
    }
}

/// All errors the engine can report.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A condition references a variable that is never bound by any other
    /// condition in the same rule. The rule is still accepted (section 7a);
    /// this variant exists so callers can choose to treat it as fatal.
    #[error("rule '{rule}' has an unbound variable '{variable}': {detail}")]
    MalformedRule { rule: String, variable: String, detail: String },

    /// An action callable returned an error. Propagated out of `run`
    /// unmodified; all working-memory mutations made before the failing
    /// action already took effect.
    #[error("action for rule '{rule}' failed: {source}")]
    ActionFailed { rule: String, #[source] source: anyhow::Error },

    /// `dump_state` or `EngineConfig` (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading an `EngineConfig` from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Coarse category name, stable across message-text changes.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::MalformedRule { .. } => "malformed_rule",
            EngineError::ActionFailed { .. } => "action_failed",
            EngineError::Serialization(_) => "serialization",
            EngineError::Io(_) => "io",
        }
    }

    /// How severe this error is for the caller's purposes.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EngineError::MalformedRule { .. } => ErrorSeverity::Low,
            EngineError::ActionFailed { .. } => ErrorSeverity::High,
            EngineError::Serialization(_) | EngineError::Io(_) => ErrorSeverity::Medium,
        }
    }

    /// Whether the engine can keep running after this error is reported.
    ///
    /// `MalformedRule` is a warning by definition (section 7a); everything
    /// else aborts the `run` that produced it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::MalformedRule { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
