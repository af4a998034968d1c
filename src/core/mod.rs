//! Core game types and entities

pub mod card;
pub mod effects;
pub mod entity;
pub mod mana;
pub mod player;
pub mod types;

pub use card::{Card, CardType};
pub use effects::{
    BoardScope, ContinuousEffect, ControllerScope, Duration, Effect, EffectScope, Keyword,
    LayerKind, TargetFilter, TargetRef,
};
pub use entity::{CardId, EntityStore, PlayerId};
pub use mana::{Color, GenericPayment, ManaCost, ManaPool, COLORS};
pub use player::{LossReason, Player};
pub use types::{CardName, CounterType, PlayerName, Subtype};
