//! Card definitions and the injected catalog
//!
//! A [`CardDefinition`] is the immutable template a card instance is stamped
//! from: printed characteristics plus its rules content (spell effects,
//! triggered/activated/static abilities). Definitions live in a
//! [`CardCatalog`] that is built up front and handed to `GameState::new` -
//! there is no process-global registry, so two games can run with different
//! catalogs side by side.

use crate::core::{
    BoardScope, CardName, CardType, Color, Effect, Keyword, LayerKind, ManaCost, Subtype,
    TargetFilter,
};
use crate::{EngineError, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// When a permanent's ability triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerCondition {
    /// "When ~ enters the battlefield"
    SelfEntersBattlefield,
    /// "Whenever a creature enters the battlefield (under your control)"
    CreatureEnters { yours_only: bool },
    /// "When ~ dies"
    SelfDies,
    /// "Whenever a creature dies"
    AnyCreatureDies,
    /// "Whenever ~ attacks"
    SelfAttacks,
    /// "At the beginning of your upkeep"
    BeginningOfYourUpkeep,
}

/// A triggered ability printed on a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredAbility {
    pub condition: TriggerCondition,
    pub effects: Vec<Effect>,
    /// Overrides the per-effect default when the ability targets.
    pub target_filter: Option<TargetFilter>,
    /// Abilities like persist-style recursion that work while the card is in
    /// the graveyard (checked for `SelfDies`).
    pub functions_from_graveyard: bool,
    pub description: String,
}

impl TriggeredAbility {
    pub fn new(condition: TriggerCondition, effects: Vec<Effect>, description: &str) -> Self {
        TriggeredAbility {
            condition,
            effects,
            target_filter: None,
            functions_from_graveyard: false,
            description: description.to_string(),
        }
    }
}

/// Cost of an activated ability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityCost {
    pub tap: bool,
    pub mana: Option<ManaCost>,
    /// Loyalty delta for planeswalker abilities (positive adds counters).
    pub loyalty: Option<i32>,
}

/// An activated ability printed on a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivatedAbility {
    pub cost: AbilityCost,
    pub effects: Vec<Effect>,
    pub target_filter: Option<TargetFilter>,
    pub description: String,
}

impl ActivatedAbility {
    pub fn new(cost: AbilityCost, effects: Vec<Effect>, description: &str) -> Self {
        ActivatedAbility {
            cost,
            effects,
            target_filter: None,
            description: description.to_string(),
        }
    }

    /// Loyalty abilities follow planeswalker timing: sorcery speed, once per
    /// turn per permanent.
    pub fn is_loyalty(&self) -> bool {
        self.cost.loyalty.is_some()
    }
}

/// Board-state condition gating a static ability. Re-evaluated on every
/// recompute pass, so the derived continuous effect appears and disappears
/// with the condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StaticCondition {
    /// "As long as you control another <subtype>"
    ControlsAnother(Subtype),
}

/// A static ability: a template that regenerates a continuous effect on each
/// recompute pass while its permanent is on the battlefield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticAbility {
    pub kind: LayerKind,
    pub scope: BoardScope,
    pub condition: Option<StaticCondition>,
    pub description: String,
}

impl StaticAbility {
    pub fn new(kind: LayerKind, scope: BoardScope, description: &str) -> Self {
        StaticAbility {
            kind,
            scope,
            condition: None,
            description: description.to_string(),
        }
    }

    pub fn when(mut self, condition: StaticCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Immutable template for a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDefinition {
    pub name: CardName,
    pub mana_cost: ManaCost,
    pub types: SmallVec<[CardType; 2]>,
    pub subtypes: SmallVec<[Subtype; 2]>,
    pub legendary: bool,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    /// Starting loyalty for planeswalkers.
    pub loyalty: Option<i32>,
    pub keywords: SmallVec<[Keyword; 4]>,

    /// What an instant/sorcery does on resolution.
    pub spell_effects: Vec<Effect>,
    /// Overrides the per-effect default target filters of `spell_effects`.
    pub target_filter: Option<TargetFilter>,

    pub triggered: Vec<TriggeredAbility>,
    pub activated: Vec<ActivatedAbility>,
    pub statics: Vec<StaticAbility>,

    /// Color this land taps for.
    pub mana_color: Option<Color>,
    /// Echo: on the controller's next upkeep, sacrifice unless the cost is
    /// paid (registered as a delayed trigger when the permanent enters).
    pub echo_cost: Option<ManaCost>,
    pub enters_tapped: bool,
    /// For auras: what this can legally enchant.
    pub enchant: Option<TargetFilter>,
    pub is_token: bool,
    pub back_face: Option<CardName>,
}

impl CardDefinition {
    fn blank(name: impl Into<CardName>) -> Self {
        CardDefinition {
            name: name.into(),
            mana_cost: ManaCost::new(),
            types: SmallVec::new(),
            subtypes: SmallVec::new(),
            legendary: false,
            power: None,
            toughness: None,
            loyalty: None,
            keywords: SmallVec::new(),
            spell_effects: Vec::new(),
            target_filter: None,
            triggered: Vec::new(),
            activated: Vec::new(),
            statics: Vec::new(),
            mana_color: None,
            echo_cost: None,
            enters_tapped: false,
            enchant: None,
            is_token: false,
            back_face: None,
        }
    }

    /// A basic-style land tapping for one color.
    pub fn land(name: impl Into<CardName>, color: Color) -> Self {
        let mut def = Self::blank(name);
        def.types.push(CardType::Land);
        def.mana_color = Some(color);
        def
    }

    pub fn creature(name: impl Into<CardName>, cost: &str, power: i32, toughness: i32) -> Result<Self> {
        let mut def = Self::blank(name);
        def.mana_cost = ManaCost::from_string(cost)?;
        def.types.push(CardType::Creature);
        def.power = Some(power);
        def.toughness = Some(toughness);
        Ok(def)
    }

    pub fn instant(name: impl Into<CardName>, cost: &str, effects: Vec<Effect>) -> Result<Self> {
        let mut def = Self::blank(name);
        def.mana_cost = ManaCost::from_string(cost)?;
        def.types.push(CardType::Instant);
        def.spell_effects = effects;
        Ok(def)
    }

    pub fn sorcery(name: impl Into<CardName>, cost: &str, effects: Vec<Effect>) -> Result<Self> {
        let mut def = Self::blank(name);
        def.mana_cost = ManaCost::from_string(cost)?;
        def.types.push(CardType::Sorcery);
        def.spell_effects = effects;
        Ok(def)
    }

    pub fn enchantment(name: impl Into<CardName>, cost: &str) -> Result<Self> {
        let mut def = Self::blank(name);
        def.mana_cost = ManaCost::from_string(cost)?;
        def.types.push(CardType::Enchantment);
        Ok(def)
    }

    pub fn aura(name: impl Into<CardName>, cost: &str, enchant: TargetFilter) -> Result<Self> {
        let mut def = Self::enchantment(name, cost)?;
        def.subtypes.push(Subtype::new("Aura"));
        def.enchant = Some(enchant);
        def
            .target_filter
            .get_or_insert(enchant);
        Ok(def)
    }

    pub fn planeswalker(name: impl Into<CardName>, cost: &str, loyalty: i32) -> Result<Self> {
        let mut def = Self::blank(name);
        def.mana_cost = ManaCost::from_string(cost)?;
        def.types.push(CardType::Planeswalker);
        def.loyalty = Some(loyalty);
        Ok(def)
    }

    /// A creature token (no mana cost; ceases to exist off the battlefield).
    pub fn token(name: impl Into<CardName>, power: i32, toughness: i32) -> Self {
        let mut def = Self::blank(name);
        def.types.push(CardType::Creature);
        def.power = Some(power);
        def.toughness = Some(toughness);
        def.is_token = true;
        def
    }

    pub fn with_keyword(mut self, keyword: Keyword) -> Self {
        self.keywords.push(keyword);
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<Subtype>) -> Self {
        self.subtypes.push(subtype.into());
        self
    }

    pub fn with_target_filter(mut self, filter: TargetFilter) -> Self {
        self.target_filter = Some(filter);
        self
    }

    pub fn with_triggered(mut self, ability: TriggeredAbility) -> Self {
        self.triggered.push(ability);
        self
    }

    pub fn with_activated(mut self, ability: ActivatedAbility) -> Self {
        self.activated.push(ability);
        self
    }

    pub fn with_static(mut self, ability: StaticAbility) -> Self {
        self.statics.push(ability);
        self
    }

    pub fn with_echo(mut self, cost: &str) -> Result<Self> {
        self.echo_cost = Some(ManaCost::from_string(cost)?);
        Ok(self)
    }

    pub fn with_back_face(mut self, name: impl Into<CardName>) -> Self {
        self.back_face = Some(name.into());
        self
    }

    pub fn as_legendary(mut self) -> Self {
        self.legendary = true;
        self
    }

    /// Number of targets this definition's spell effects require.
    pub fn spell_target_count(&self) -> usize {
        self.spell_effects
            .iter()
            .filter(|e| e.requires_target())
            .count()
    }
}

/// Name-keyed registry of card definitions, injected into each game.
#[derive(Debug, Clone, Default)]
pub struct CardCatalog {
    defs: FxHashMap<CardName, CardDefinition>,
}

impl CardCatalog {
    pub fn new() -> Self {
        CardCatalog::default()
    }

    /// A catalog pre-seeded with the five basic lands.
    pub fn with_basic_lands() -> Self {
        let mut catalog = CardCatalog::new();
        for (name, color) in [
            ("Plains", Color::White),
            ("Island", Color::Blue),
            ("Swamp", Color::Black),
            ("Mountain", Color::Red),
            ("Forest", Color::Green),
        ] {
            catalog.register(CardDefinition::land(name, color));
        }
        catalog
    }

    /// Register a definition, replacing an existing one of the same name.
    pub fn register(&mut self, def: CardDefinition) {
        self.defs.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &CardName) -> Result<&CardDefinition> {
        self.defs
            .get(name)
            .ok_or_else(|| EngineError::UnknownCard(name.to_string()))
    }

    pub fn contains(&self, name: &CardName) -> bool {
        self.defs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_an_injected_registry() {
        let mut a = CardCatalog::new();
        let b = CardCatalog::with_basic_lands();

        a.register(CardDefinition::creature("Grizzly Bears", "1G", 2, 2).unwrap());
        // Two catalogs are independent
        assert!(a.contains(&"Grizzly Bears".into()));
        assert!(!b.contains(&"Grizzly Bears".into()));
        assert!(b.contains(&"Forest".into()));
        assert!(a.get(&"Forest".into()).is_err());
    }

    #[test]
    fn test_builder_shapes() {
        let bolt = CardDefinition::instant(
            "Lightning Bolt",
            "R",
            vec![Effect::DealDamage { amount: 3 }],
        )
        .unwrap();
        assert_eq!(bolt.mana_cost.red, 1);
        assert_eq!(bolt.spell_target_count(), 1);

        let walker = CardDefinition::planeswalker("Test Walker", "2WW", 4).unwrap();
        assert_eq!(walker.loyalty, Some(4));

        let token = CardDefinition::token("Soldier", 1, 1);
        assert!(token.is_token);
        assert_eq!(token.mana_cost.cmc(), 0);
    }

    #[test]
    fn test_bad_cost_is_rejected() {
        assert!(CardDefinition::creature("Broken", "1X%", 1, 1).is_err());
    }
}
