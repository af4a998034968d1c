//! Error types for the rules engine.
//!
//! Every fallible operation returns [`Result`]. Illegal player actions are
//! rejected with [`EngineError::IllegalAction`] before any state is mutated;
//! a spell whose targets have become illegal is not an error (it fizzles and
//! is logged instead).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Entity lookup failed (card or player id not present in the store).
    #[error("Entity not found: {0}")]
    EntityNotFound(u32),

    /// Named card has no definition in the injected catalog.
    #[error("Unknown card: {0}")]
    UnknownCard(String),

    /// A player attempted something the rules forbid. State is unchanged.
    #[error("Illegal action: {0}")]
    IllegalAction(String),

    /// A decision provider returned an answer outside the offered options.
    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    /// Mana cost string could not be parsed.
    #[error("Invalid mana cost: {0}")]
    InvalidManaCost(String),

    /// Internal invariant violated (e.g. the state-based action loop failed
    /// to reach a fixpoint). Indicates a bug, not a rules violation.
    #[error("State inconsistency: {0}")]
    StateInconsistency(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
