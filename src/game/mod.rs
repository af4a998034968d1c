//! Game state, the turn loop, and the rules engine components

pub mod actions;
pub mod combat;
pub mod decision;
pub mod game_loop;
pub mod layers;
pub mod logger;
pub mod phase;
pub mod sba;
pub mod scripted;
pub mod stack;
pub mod state;
pub mod triggers;

pub use combat::{AttackTarget, CombatState};
pub use decision::{DecisionProvider, GameStateView, PlayerAction, ProviderPair};
pub use game_loop::{GameEndReason, GameLoop, GameResult};
pub use logger::{GameLogger, LogCategory, VerbosityLevel};
pub use phase::{Phase, Step, TurnStructure};
pub use scripted::ScriptedProvider;
pub use state::GameState;
pub use triggers::{DelayedTrigger, DelayedWhen, GameEvent};
