//! Game zones (library, hand, battlefield, graveyard, exile, stack)
//!
//! The battlefield is a single shared [`CardZone`]; the per-player zones live
//! in [`PlayerZones`]. The stack is not a `CardZone` - spells on the stack are
//! held by their `StackObject` (see `game::stack`) - but [`Zone::Stack`] still
//! names the location for zone-change events and logging.

use crate::core::CardId;
use serde::{Deserialize, Serialize};

/// The places a card can be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Library,
    Hand,
    Battlefield,
    Graveyard,
    Exile,
    Stack,
}

/// An ordered list of cards in one zone
///
/// Order is meaningful for libraries and graveyards; the other zones keep
/// insertion order anyway so iteration stays deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardZone {
    cards: Vec<CardId>,
}

impl CardZone {
    pub fn new() -> Self {
        CardZone::default()
    }

    pub fn add(&mut self, card_id: CardId) {
        self.cards.push(card_id);
    }

    /// Removes by position, not swap_remove: relative order of the remaining
    /// cards must not change or determinism tests break.
    pub fn remove(&mut self, card_id: CardId) -> bool {
        match self.cards.iter().position(|&id| id == card_id) {
            Some(pos) => {
                self.cards.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, card_id: CardId) -> bool {
        self.cards.contains(&card_id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CardId> + '_ {
        self.cards.iter().copied()
    }

    /// Cards as a slice, bottom first / top last.
    pub fn as_slice(&self) -> &[CardId] {
        &self.cards
    }

    /// Take the top card (libraries draw from here).
    pub fn take_top(&mut self) -> Option<CardId> {
        self.cards.pop()
    }

    pub fn peek_top(&self) -> Option<CardId> {
        self.cards.last().copied()
    }

    /// Put a card on the bottom (mulligan bottoming).
    pub fn add_to_bottom(&mut self, card_id: CardId) {
        self.cards.insert(0, card_id);
    }

    pub fn shuffle(&mut self, rng: &mut impl rand::Rng) {
        use rand::seq::SliceRandom;
        self.cards.shuffle(rng);
    }
}

/// The zones each player owns individually
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerZones {
    pub library: CardZone,
    pub hand: CardZone,
    pub graveyard: CardZone,
    pub exile: CardZone,
}

impl PlayerZones {
    pub fn new() -> Self {
        PlayerZones::default()
    }

    pub fn zone(&self, zone: Zone) -> Option<&CardZone> {
        match zone {
            Zone::Library => Some(&self.library),
            Zone::Hand => Some(&self.hand),
            Zone::Graveyard => Some(&self.graveyard),
            Zone::Exile => Some(&self.exile),
            Zone::Battlefield | Zone::Stack => None,
        }
    }

    pub fn zone_mut(&mut self, zone: Zone) -> Option<&mut CardZone> {
        match zone {
            Zone::Library => Some(&mut self.library),
            Zone::Hand => Some(&mut self.hand),
            Zone::Graveyard => Some(&mut self.graveyard),
            Zone::Exile => Some(&mut self.exile),
            Zone::Battlefield | Zone::Stack => None,
        }
    }
}
