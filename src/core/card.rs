//! Card instances with base and effective characteristics
//!
//! A [`Card`] carries two sets of characteristics. The *base* set comes from
//! its catalog definition (plus transform). The *effective* set is what the
//! rest of the engine reads and is owned entirely by the continuous-effect
//! recompute pass: every pass clears it back to base and rebuilds it layer by
//! layer. Nothing else may write the effective fields - partial staleness is
//! a bug.

use crate::core::effects::Keyword;
use crate::core::types::{CardName, CounterType, Subtype};
use crate::core::{CardId, ManaCost, PlayerId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Card types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Creature,
    Instant,
    Sorcery,
    Enchantment,
    Artifact,
    Land,
    Planeswalker,
}

impl CardType {
    /// Spell types that go to the graveyard on resolution instead of the
    /// battlefield.
    pub fn is_spell_only(&self) -> bool {
        matches!(self, CardType::Instant | CardType::Sorcery)
    }
}

/// A card instance during a game
///
/// Many instances can share one catalog definition; this struct is the live
/// object with zone-dependent status (tapped, damage, counters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub name: CardName,
    pub owner: PlayerId,
    pub controller: PlayerId,
    pub mana_cost: ManaCost,

    // Base characteristics (printed values, swapped wholesale on transform)
    pub base_types: SmallVec<[CardType; 2]>,
    pub base_subtypes: SmallVec<[Subtype; 2]>,
    pub base_power: Option<i32>,
    pub base_toughness: Option<i32>,
    /// Printed starting loyalty; materialized as loyalty counters on entry.
    pub base_loyalty: Option<i32>,
    pub base_keywords: SmallVec<[Keyword; 4]>,
    pub legendary: bool,

    // Effective characteristics, rebuilt from scratch by each layer pass
    pub eff_types: SmallVec<[CardType; 2]>,
    pub eff_power: Option<i32>,
    pub eff_toughness: Option<i32>,
    pub eff_keywords: SmallVec<[Keyword; 4]>,

    // Status
    pub tapped: bool,
    pub damage_marked: i32,
    /// Damage this turn included a deathtouch source.
    pub deathtouched: bool,
    pub counters: SmallVec<[(CounterType, i32); 2]>,
    /// Turn number this card arrived on the battlefield (summoning sickness).
    pub turn_entered_battlefield: Option<u32>,
    /// One loyalty ability per turn for planeswalkers.
    pub activated_this_turn: bool,
    /// For auras: the permanent this is attached to.
    pub attached_to: Option<CardId>,
    /// Tokens cease to exist when they leave the battlefield.
    pub is_token: bool,
    /// Name of the back face, if this card can transform.
    pub back_face: Option<CardName>,
}

impl Card {
    pub fn new(id: CardId, name: impl Into<CardName>, owner: PlayerId) -> Self {
        Card {
            id,
            name: name.into(),
            owner,
            controller: owner,
            mana_cost: ManaCost::new(),
            base_types: SmallVec::new(),
            base_subtypes: SmallVec::new(),
            base_power: None,
            base_toughness: None,
            base_loyalty: None,
            base_keywords: SmallVec::new(),
            legendary: false,
            eff_types: SmallVec::new(),
            eff_power: None,
            eff_toughness: None,
            eff_keywords: SmallVec::new(),
            tapped: false,
            damage_marked: 0,
            deathtouched: false,
            counters: SmallVec::new(),
            turn_entered_battlefield: None,
            activated_this_turn: false,
            attached_to: None,
            is_token: false,
            back_face: None,
        }
    }

    /// Reset effective characteristics to base. First step of every layer
    /// pass.
    pub fn reset_to_base(&mut self) {
        self.eff_types = self.base_types.clone();
        self.eff_power = self.base_power;
        self.eff_toughness = self.base_toughness;
        self.eff_keywords = self.base_keywords.clone();
    }

    pub fn has_type(&self, card_type: CardType) -> bool {
        self.eff_types.contains(&card_type)
    }

    pub fn has_subtype(&self, subtype: &Subtype) -> bool {
        self.base_subtypes.contains(subtype)
    }

    pub fn is_creature(&self) -> bool {
        self.has_type(CardType::Creature)
    }

    pub fn is_land(&self) -> bool {
        self.has_type(CardType::Land)
    }

    pub fn is_planeswalker(&self) -> bool {
        self.has_type(CardType::Planeswalker)
    }

    pub fn is_aura(&self) -> bool {
        self.has_type(CardType::Enchantment) && self.has_subtype(&Subtype::new("Aura"))
    }

    pub fn has_keyword(&self, keyword: Keyword) -> bool {
        self.eff_keywords.contains(&keyword)
    }

    /// Effective power, including +1/+1 and -1/-1 counters.
    pub fn power(&self) -> i32 {
        self.eff_power.unwrap_or(0) + self.counter_pt_delta()
    }

    /// Effective toughness, including +1/+1 and -1/-1 counters.
    pub fn toughness(&self) -> i32 {
        self.eff_toughness.unwrap_or(0) + self.counter_pt_delta()
    }

    fn counter_pt_delta(&self) -> i32 {
        self.get_counter(&CounterType::plus_one_plus_one())
            - self.get_counter(&CounterType::minus_one_minus_one())
    }

    /// Loyalty of a planeswalker is carried entirely by loyalty counters.
    pub fn loyalty(&self) -> i32 {
        self.get_counter(&CounterType::loyalty())
    }

    pub fn tap(&mut self) {
        self.tapped = true;
    }

    pub fn untap(&mut self) {
        self.tapped = false;
    }

    pub fn add_counters(&mut self, counter: CounterType, amount: i32) {
        if let Some((_, count)) = self.counters.iter_mut().find(|(t, _)| *t == counter) {
            *count += amount;
        } else {
            self.counters.push((counter, amount));
        }
        self.counters.retain(|(_, count)| *count != 0);
    }

    pub fn get_counter(&self, counter: &CounterType) -> i32 {
        self.counters
            .iter()
            .find(|(t, _)| t == counter)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Whether combat damage from this card is lethal regardless of amount.
    pub fn has_deathtouch(&self) -> bool {
        self.has_keyword(Keyword::Deathtouch)
    }

    /// A creature can attack the turn it arrives only with haste.
    pub fn summoning_sick(&self, current_turn: u32) -> bool {
        !self.has_keyword(Keyword::Haste)
            && self.turn_entered_battlefield == Some(current_turn)
    }

    /// New-turn housekeeping: marked damage and per-turn flags clear.
    pub fn clear_turn_status(&mut self) {
        self.damage_marked = 0;
        self.deathtouched = false;
        self.activated_this_turn = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bear() -> Card {
        let mut card = Card::new(CardId::new(1), "Grizzly Bears", PlayerId::new(0));
        card.base_types.push(CardType::Creature);
        card.base_power = Some(2);
        card.base_toughness = Some(2);
        card.reset_to_base();
        card
    }

    #[test]
    fn test_counters_affect_effective_pt() {
        let mut card = bear();
        assert_eq!(card.power(), 2);
        assert_eq!(card.toughness(), 2);

        card.add_counters(CounterType::plus_one_plus_one(), 2);
        assert_eq!(card.power(), 4);
        assert_eq!(card.toughness(), 4);

        card.add_counters(CounterType::minus_one_minus_one(), 1);
        assert_eq!(card.power(), 3);
        assert_eq!(card.toughness(), 3);
    }

    #[test]
    fn test_reset_to_base_clears_grants() {
        let mut card = bear();
        card.eff_keywords.push(Keyword::Flying);
        card.eff_power = Some(5);
        assert!(card.has_keyword(Keyword::Flying));

        card.reset_to_base();
        assert!(!card.has_keyword(Keyword::Flying));
        assert_eq!(card.power(), 2);
    }

    #[test]
    fn test_summoning_sickness() {
        let mut card = bear();
        card.turn_entered_battlefield = Some(3);
        assert!(card.summoning_sick(3));
        assert!(!card.summoning_sick(4));

        card.base_keywords.push(Keyword::Haste);
        card.reset_to_base();
        assert!(!card.summoning_sick(3));
    }

    #[test]
    fn test_loyalty_counters() {
        let mut pw = Card::new(CardId::new(2), "Test Walker", PlayerId::new(0));
        pw.base_types.push(CardType::Planeswalker);
        pw.reset_to_base();
        pw.add_counters(CounterType::loyalty(), 4);
        assert_eq!(pw.loyalty(), 4);
        pw.add_counters(CounterType::loyalty(), -4);
        assert_eq!(pw.loyalty(), 0);
    }
}
