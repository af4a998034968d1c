//! Effects, keywords, targeting, and continuous-effect values
//!
//! [`Effect`] is the opaque unit of work a resolving spell or ability
//! performs. Effects that target something consume the stack object's chosen
//! targets in declaration order; [`Effect::requires_target`] tells the caster
//! how many targets to collect.
//!
//! [`ContinuousEffect`] is the passive value consumed by the layer recompute
//! pass (see `game::layers`). It lives here because card definitions, spells,
//! and emblems all produce these values.

use crate::core::card::CardType;
use crate::core::types::{CardName, CounterType, Subtype};
use crate::core::{CardId, Color, ManaCost, PlayerId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Target reference for spells and abilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRef {
    /// Target a player
    Player(PlayerId),
    /// Target a permanent on the battlefield
    Permanent(CardId),
}

/// What a target is allowed to be. Checked when targets are chosen and again
/// when the spell or ability resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetFilter {
    /// "Any target": a creature, planeswalker, or player
    AnyDamageable,
    Creature,
    Permanent,
    Player,
}

/// Keyword abilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Flying,
    FirstStrike,
    DoubleStrike,
    Deathtouch,
    Defender,
    Flash,
    Haste,
    Hexproof,
    Indestructible,
    Lifelink,
    Menace,
    Reach,
    Shroud,
    Trample,
    Vigilance,
    Protection(Color),
}

/// Units of work performed by resolving spells and abilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Deal damage to the next chosen target.
    /// "Lightning Bolt deals 3 damage to any target"
    DealDamage { amount: i32 },

    /// Destroy the next chosen permanent target.
    DestroyPermanent,

    /// Tap the next chosen permanent target.
    TapPermanent,

    /// Untap the next chosen permanent target.
    UntapPermanent,

    /// The next chosen creature target gets +P/+T until end of turn.
    PumpTarget { power: i32, toughness: i32 },

    /// The next chosen creature target gains a keyword until end of turn.
    GrantKeywordTarget { keyword: Keyword },

    /// Put counters on the next chosen creature target.
    PutCounters { counter: CounterType, count: i32 },

    /// The next chosen player puts cards from the top of their library into
    /// their graveyard.
    Mill { count: u8 },

    /// Controller draws cards.
    DrawCards { count: u8 },

    /// Controller gains life.
    GainLife { amount: i32 },

    /// Create a token under the controller's control. The name must resolve
    /// in the catalog.
    CreateToken { name: CardName },

    /// Prevent all combat damage that would be dealt to the controller this
    /// turn. Prevention is not healing: the damage simply never happens.
    PreventCombatDamageToYou,

    /// Register a board-wide continuous effect with no physical source
    /// (an emblem).
    CreateEmblem {
        kind: LayerKind,
        scope: BoardScope,
    },

    /// Schedule effects to run at the beginning of the next end step
    /// (a delayed trigger; fires exactly once).
    ScheduleAtNextEndStep { effects: Vec<Effect> },

    /// Sacrifice the source unless its controller pays the cost (echo).
    SacrificeSourceUnlessPaid { cost: ManaCost },

    /// Transform the source into its back face.
    TransformSource,
}

impl Effect {
    /// Whether this effect consumes one of the stack object's targets.
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            Effect::DealDamage { .. }
                | Effect::DestroyPermanent
                | Effect::TapPermanent
                | Effect::UntapPermanent
                | Effect::PumpTarget { .. }
                | Effect::GrantKeywordTarget { .. }
                | Effect::PutCounters { .. }
                | Effect::Mill { .. }
        )
    }

    /// Default legality filter for this effect's target.
    pub fn default_target_filter(&self) -> TargetFilter {
        match self {
            Effect::DealDamage { .. } => TargetFilter::AnyDamageable,
            Effect::DestroyPermanent | Effect::TapPermanent | Effect::UntapPermanent => {
                TargetFilter::Permanent
            }
            Effect::PumpTarget { .. }
            | Effect::GrantKeywordTarget { .. }
            | Effect::PutCounters { .. } => TargetFilter::Creature,
            Effect::Mill { .. } => TargetFilter::Player,
            _ => TargetFilter::Permanent,
        }
    }
}

/// Which player's permanents a board-wide effect reaches, relative to the
/// effect's controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerScope {
    Any,
    ControllerOnly,
    OpponentsOnly,
}

/// Filter selecting which battlefield permanents a continuous effect applies
/// to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardScope {
    pub creatures_only: bool,
    pub subtype: Option<Subtype>,
    pub controller: ControllerScope,
    /// "Other creatures you control get..." excludes the source itself.
    pub exclude_source: bool,
}

impl BoardScope {
    /// "Creatures you control"
    pub fn own_creatures() -> Self {
        BoardScope {
            creatures_only: true,
            subtype: None,
            controller: ControllerScope::ControllerOnly,
            exclude_source: false,
        }
    }

    /// All creatures on the battlefield
    pub fn all_creatures() -> Self {
        BoardScope {
            creatures_only: true,
            subtype: None,
            controller: ControllerScope::Any,
            exclude_source: false,
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<Subtype>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn excluding_source(mut self) -> Self {
        self.exclude_source = true;
        self
    }
}

/// What a continuous effect applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectScope {
    /// A single object, locked in when the effect was created.
    Single(CardId),
    /// Every battlefield permanent matching the filter, re-evaluated on each
    /// recompute pass.
    Board(BoardScope),
}

/// How long a continuous effect lasts. Expired effects are dropped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Duration {
    Permanent,
    EndOfTurn,
    /// Lasts until the start of the given turn number.
    UntilTurn(u32),
}

/// The modification a continuous effect performs, tagged by layer.
///
/// Layer order is 4 (types) then 6 (abilities) then 7a (P/T set) then
/// 7c (P/T modify), per CR 613. `CostModify` is not a layer at all: it is
/// consulted on demand when a cost is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerKind {
    /// Layer 4: add or remove card types.
    TypeChange {
        add: SmallVec<[CardType; 1]>,
        remove: SmallVec<[CardType; 1]>,
    },
    /// Layer 6: grant or remove keyword abilities.
    AbilityGrant {
        add: SmallVec<[Keyword; 2]>,
        remove: SmallVec<[Keyword; 2]>,
    },
    /// Layer 7a: set power/toughness to fixed values.
    PtSet { power: i32, toughness: i32 },
    /// Layer 7c: add to power/toughness.
    PtModify { power: i32, toughness: i32 },
    /// Shift the generic portion of matching cards' costs. Negative deltas
    /// floor at zero; colored pips are never modified.
    CostModify { delta: i32 },
}

impl LayerKind {
    /// Position in the layer pipeline; lower applies first.
    pub fn layer(&self) -> u8 {
        match self {
            LayerKind::TypeChange { .. } => 4,
            LayerKind::AbilityGrant { .. } => 6,
            LayerKind::PtSet { .. } => 7,
            LayerKind::PtModify { .. } => 8,
            LayerKind::CostModify { .. } => u8::MAX,
        }
    }
}

/// A live continuous effect: either registered by a resolved spell/ability or
/// regenerated each pass from a permanent's static ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousEffect {
    /// Generating permanent; `None` for emblems.
    pub source: Option<CardId>,
    pub controller: PlayerId,
    pub kind: LayerKind,
    pub scope: EffectScope,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targeted_effects_declare_it() {
        assert!(Effect::DealDamage { amount: 3 }.requires_target());
        assert!(Effect::DestroyPermanent.requires_target());
        assert!(!Effect::DrawCards { count: 1 }.requires_target());
        assert!(!Effect::GainLife { amount: 3 }.requires_target());
    }

    #[test]
    fn test_layer_ordering() {
        let types = LayerKind::TypeChange {
            add: SmallVec::new(),
            remove: SmallVec::new(),
        };
        let grant = LayerKind::AbilityGrant {
            add: SmallVec::new(),
            remove: SmallVec::new(),
        };
        let set = LayerKind::PtSet {
            power: 0,
            toughness: 2,
        };
        let modify = LayerKind::PtModify {
            power: 1,
            toughness: 1,
        };
        assert!(types.layer() < grant.layer());
        assert!(grant.layer() < set.layer());
        assert!(set.layer() < modify.layer());
    }
}
