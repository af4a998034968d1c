//! manastack - a two-player rules engine for a Magic-style card game
//!
//! The engine is a library first: `GameState` plus a pair of
//! [`game::DecisionProvider`]s is everything a driver needs. All card
//! behavior is data in an injected [`catalog::CardCatalog`]; all player
//! interaction goes through the synchronous decision boundary.

pub mod catalog;
pub mod core;
pub mod error;
pub mod game;
pub mod undo;
pub mod zones;

pub use error::{EngineError, Result};
