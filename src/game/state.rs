//! The single mutable root of a game
//!
//! Everything a game knows lives here: cards, players, zones, the stack, the
//! active continuous effects, delayed triggers, and the pending event queue.
//! Component operations (casting, layers, state-based actions, triggers,
//! combat) are `impl GameState` blocks in their own modules; this file owns
//! construction, zone movement, and the small shared mutators.

use crate::catalog::CardCatalog;
use crate::core::{
    Card, CardId, CardName, CounterType, EntityStore, Player, PlayerId,
};
use crate::game::combat::CombatState;
use crate::game::layers::PreventionShield;
use crate::game::logger::{GameLogger, LogCategory, VerbosityLevel};
use crate::game::phase::TurnStructure;
use crate::game::stack::StackObject;
use crate::game::triggers::{DelayedTrigger, GameEvent};
use crate::undo::{UndoEntry, UndoOutcome};
use crate::zones::{CardZone, PlayerZones, Zone};
use crate::{EngineError, Result};
use crate::core::ContinuousEffect;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::cell::RefCell;
use std::sync::Arc;

/// Complete game state for a two-player duel.
#[derive(Debug)]
pub struct GameState {
    /// Injected card definitions; shared, read-only.
    pub catalog: Arc<CardCatalog>,

    /// All card instances ever created this game.
    pub cards: EntityStore<Card>,

    /// The two players, indexed by `PlayerId`.
    pub players: Vec<Player>,

    /// Per-player zones, indexed by `PlayerId`.
    pub zones: Vec<PlayerZones>,

    /// Shared battlefield.
    pub battlefield: CardZone,

    /// The stack; last element is the top.
    pub stack: Vec<StackObject>,
    next_seq: u64,

    pub turn: TurnStructure,
    pub combat: CombatState,

    /// Registered continuous effects (spell-created and emblems). Effects
    /// derived from static abilities are regenerated each recompute pass and
    /// never stored here.
    pub active_effects: Vec<ContinuousEffect>,

    /// Active damage-prevention shields.
    pub preventions: Vec<PreventionShield>,

    /// Delayed one-shot triggers waiting for their moment.
    pub delayed_triggers: Vec<DelayedTrigger>,

    /// Events since the last trigger collection pass.
    pub pending_events: Vec<GameEvent>,

    /// Seeded RNG for shuffling. RefCell so read-only views can draw
    /// randomness without a mutable borrow of the whole state.
    pub rng: RefCell<ChaCha12Rng>,

    pub logger: GameLogger,
}

impl GameState {
    pub fn new(
        catalog: Arc<CardCatalog>,
        player1_name: &str,
        player2_name: &str,
        seed: u64,
    ) -> Self {
        let p0 = PlayerId::new(0);
        let p1 = PlayerId::new(1);
        GameState {
            catalog,
            cards: EntityStore::new(),
            players: vec![
                Player::new(p0, player1_name, 20),
                Player::new(p1, player2_name, 20),
            ],
            zones: vec![PlayerZones::new(), PlayerZones::new()],
            battlefield: CardZone::new(),
            stack: Vec::new(),
            next_seq: 0,
            turn: TurnStructure::new(p0),
            combat: CombatState::new(),
            active_effects: Vec::new(),
            preventions: Vec::new(),
            delayed_triggers: Vec::new(),
            pending_events: Vec::new(),
            rng: RefCell::new(ChaCha12Rng::seed_from_u64(seed)),
            logger: GameLogger::new(),
        }
    }

    /// Two players, fixed seed, log captured in memory. Test constructor.
    pub fn new_test(catalog: CardCatalog) -> Self {
        let mut game = GameState::new(Arc::new(catalog), "Alice", "Bob", 42);
        game.logger = GameLogger::captured(VerbosityLevel::Normal);
        game
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player> {
        self.players
            .get(id.as_index())
            .ok_or(EngineError::EntityNotFound(id.as_u32()))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player> {
        self.players
            .get_mut(id.as_index())
            .ok_or(EngineError::EntityNotFound(id.as_u32()))
    }

    pub fn player_zones(&self, id: PlayerId) -> &PlayerZones {
        &self.zones[id.as_index()]
    }

    pub fn player_zones_mut(&mut self, id: PlayerId) -> &mut PlayerZones {
        &mut self.zones[id.as_index()]
    }

    /// Both player ids in APNAP order: active player first.
    pub fn apnap_order(&self) -> [PlayerId; 2] {
        let active = self.turn.active_player;
        [active, active.opponent()]
    }

    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    // ------------------------------------------------------------------
    // Card instantiation

    /// Stamp a new card instance from its catalog definition.
    pub fn instantiate_card(&mut self, name: &CardName, owner: PlayerId) -> Result<CardId> {
        let def = self.catalog.get(name)?.clone();
        let id = self.cards.next_id();
        let mut card = Card::new(id, def.name.clone(), owner);
        card.mana_cost = def.mana_cost;
        card.base_types = def.types.clone();
        card.base_subtypes = def.subtypes.clone();
        card.base_power = def.power;
        card.base_toughness = def.toughness;
        card.base_loyalty = def.loyalty;
        card.base_keywords = def.keywords.clone();
        card.legendary = def.legendary;
        card.is_token = def.is_token;
        card.back_face = def.back_face.clone();
        card.reset_to_base();
        self.cards.insert(id, card);
        Ok(id)
    }

    /// Swap a card's base characteristics for its back face. Counters,
    /// damage, and attachments stay.
    pub fn transform(&mut self, card_id: CardId) -> Result<()> {
        let back_name = self
            .cards
            .get(card_id)?
            .back_face
            .clone()
            .ok_or_else(|| EngineError::IllegalAction(format!("{card_id} cannot transform")))?;
        let def = self.catalog.get(&back_name)?.clone();
        let card = self.cards.get_mut(card_id)?;
        card.name = def.name.clone();
        card.mana_cost = def.mana_cost;
        card.base_types = def.types.clone();
        card.base_subtypes = def.subtypes.clone();
        card.base_power = def.power;
        card.base_toughness = def.toughness;
        card.base_keywords = def.keywords.clone();
        card.back_face = def.back_face.clone();
        card.reset_to_base();
        let name = card.name.clone();
        self.logger
            .event(LogCategory::Effect, format!("{name} transforms"));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Zone movement

    /// Where a card currently is. Cards held by a stack object report
    /// `Zone::Stack`.
    pub fn find_zone(&self, card_id: CardId) -> Option<Zone> {
        if self.battlefield.contains(card_id) {
            return Some(Zone::Battlefield);
        }
        for zones in &self.zones {
            for zone in [Zone::Library, Zone::Hand, Zone::Graveyard, Zone::Exile] {
                if zones.zone(zone).is_some_and(|z| z.contains(card_id)) {
                    return Some(zone);
                }
            }
        }
        if self
            .stack
            .iter()
            .any(|obj| obj.is_spell() && obj.source == card_id)
        {
            return Some(Zone::Stack);
        }
        None
    }

    /// Move a card to a zone, queuing the zone-change events the trigger
    /// collector cares about and performing enter/leave bookkeeping.
    pub fn move_card(&mut self, card_id: CardId, to: Zone) -> Result<()> {
        let from = self.find_zone(card_id);
        let (owner, was_creature, controller) = {
            let card = self.cards.get(card_id)?;
            (card.owner, card.is_creature(), card.controller)
        };

        // Detach from the old zone.
        match from {
            Some(Zone::Battlefield) => {
                self.battlefield.remove(card_id);
            }
            Some(Zone::Stack) | None => {}
            Some(zone) => {
                self.player_zones_mut(owner)
                    .zone_mut(zone)
                    .map(|z| z.remove(card_id));
            }
        }

        // Attach to the new one.
        match to {
            Zone::Battlefield => {
                self.battlefield.add(card_id);
                self.enter_battlefield(card_id)?;
            }
            Zone::Stack => {
                // The stack object carries the card; nothing to add here.
            }
            zone => {
                if let Some(z) = self.player_zones_mut(owner).zone_mut(zone) {
                    z.add(card_id);
                }
            }
        }

        // Leaving the battlefield has its own bookkeeping and events.
        if from == Some(Zone::Battlefield) && to != Zone::Battlefield {
            self.leave_battlefield(card_id)?;
            if to == Zone::Graveyard {
                self.queue_event(GameEvent::Died {
                    card: card_id,
                    controller,
                    was_creature,
                });
            }
            self.queue_event(GameEvent::LeftBattlefield { card: card_id });
        }

        Ok(())
    }

    fn enter_battlefield(&mut self, card_id: CardId) -> Result<()> {
        let turn = self.turn.turn_number;
        let (controller, echo, enters_tapped, loyalty, name) = {
            let card = self.cards.get(card_id)?;
            let def = self.catalog.get(&card.name)?;
            (
                card.controller,
                def.echo_cost,
                def.enters_tapped,
                card.base_loyalty,
                card.name.clone(),
            )
        };
        {
            let card = self.cards.get_mut(card_id)?;
            card.turn_entered_battlefield = Some(turn);
            card.damage_marked = 0;
            card.deathtouched = false;
            if enters_tapped {
                card.tapped = true;
            }
            if let Some(loyalty) = loyalty {
                card.add_counters(CounterType::loyalty(), loyalty);
            }
        }
        if let Some(cost) = echo {
            self.delayed_triggers.push(DelayedTrigger::echo(
                card_id, controller, cost,
            ));
            self.logger.event(
                LogCategory::Effect,
                format!("{name} will owe echo {cost} next upkeep"),
            );
        }
        self.queue_event(GameEvent::EnteredBattlefield {
            card: card_id,
            controller,
        });
        Ok(())
    }

    fn leave_battlefield(&mut self, card_id: CardId) -> Result<()> {
        {
            let card = self.cards.get_mut(card_id)?;
            card.turn_entered_battlefield = None;
            card.damage_marked = 0;
            card.deathtouched = false;
            card.tapped = false;
            card.attached_to = None;
            card.counters.clear();
        }
        // Pending echoes and other delayed triggers from this source die
        // with it.
        self.delayed_triggers.retain(|dt| dt.source != Some(card_id));
        self.combat.attackers.remove(&card_id);
        self.combat.blockers.remove(&card_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Library and hand

    pub fn shuffle_library(&mut self, player_id: PlayerId) {
        let rng = &mut *self.rng.borrow_mut();
        self.zones[player_id.as_index()].library.shuffle(rng);
    }

    /// Draw one card. An empty library trips the decking flag; the loss
    /// itself is a state-based action.
    pub fn draw_card(&mut self, player_id: PlayerId) -> Result<Option<CardId>> {
        match self.player_zones_mut(player_id).library.take_top() {
            Some(card_id) => {
                self.player_zones_mut(player_id).hand.add(card_id);
                self.logger.detail(LogCategory::Effect, || {
                    format!("{player_id} draws {card_id}")
                });
                Ok(Some(card_id))
            }
            None => {
                self.player_mut(player_id)?.drew_from_empty_library = true;
                self.logger.event(
                    LogCategory::Sba,
                    format!("{player_id} tries to draw from an empty library"),
                );
                Ok(None)
            }
        }
    }

    pub fn draw_cards(&mut self, player_id: PlayerId, count: usize) -> Result<()> {
        for _ in 0..count {
            self.draw_card(player_id)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Events, loyalty, prevention

    pub fn queue_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    pub fn add_loyalty(&mut self, card_id: CardId, amount: i32) -> Result<()> {
        self.cards
            .get_mut(card_id)?
            .add_counters(CounterType::loyalty(), amount);
        Ok(())
    }

    pub fn remove_loyalty(&mut self, card_id: CardId, amount: i32) -> Result<()> {
        self.add_loyalty(card_id, -amount)
    }

    pub fn damage_to_player_prevented(&self, player_id: PlayerId) -> bool {
        self.preventions.iter().any(|shield| shield.player == player_id)
    }

    // ------------------------------------------------------------------
    // Undo

    /// Take back the player's most recent reversible action.
    ///
    /// The inverse is validated against the current state before anything is
    /// consumed: if the state no longer matches (the land is somehow
    /// untapped, the mana already spent), the entry stays put and
    /// `UndoOutcome::Inconsistent` reports why.
    pub fn undo_last(&mut self, player_id: PlayerId) -> Result<UndoOutcome> {
        let entry = match self.player(player_id)?.undo_history.peek() {
            Some(entry) => entry.clone(),
            None => return Ok(UndoOutcome::Empty),
        };

        match entry {
            UndoEntry::TapForMana { card, color } => {
                let tapped = self.cards.get(card)?.tapped;
                if !tapped {
                    return Ok(UndoOutcome::Inconsistent(format!(
                        "{card} is no longer tapped"
                    )));
                }
                if self.player(player_id)?.mana_pool.amount(color) == 0 {
                    return Ok(UndoOutcome::Inconsistent(format!(
                        "the {color} mana has already been spent"
                    )));
                }
                self.cards.get_mut(card)?.untap();
                let player = self.player_mut(player_id)?;
                player.mana_pool.remove(color);
                player.undo_history.pop();
            }
            UndoEntry::PlayLand { card } => {
                if !self.battlefield.contains(card) {
                    return Ok(UndoOutcome::Inconsistent(format!(
                        "{card} is no longer on the battlefield"
                    )));
                }
                if self.cards.get(card)?.tapped {
                    return Ok(UndoOutcome::Inconsistent(format!(
                        "{card} has been tapped since it was played"
                    )));
                }
                // Reverse the move directly; an undone action never
                // generates zone-change events.
                self.battlefield.remove(card);
                let owner = self.cards.get(card)?.owner;
                self.player_zones_mut(owner).hand.add(card);
                self.cards.get_mut(card)?.turn_entered_battlefield = None;
                let player = self.player_mut(player_id)?;
                player.lands_played_this_turn = player.lands_played_this_turn.saturating_sub(1);
                player.undo_history.pop();
            }
        }

        self.logger
            .event(LogCategory::Priority, format!("{player_id} undoes {entry:?}"));
        Ok(UndoOutcome::Undone(entry))
    }

    /// Commit point: passing priority or paying an irreversible cost wipes
    /// the undo history.
    pub fn clear_undo(&mut self, player_id: PlayerId) {
        if let Ok(player) = self.player_mut(player_id) {
            player.undo_history.clear();
        }
    }

    // ------------------------------------------------------------------
    // Setup helpers (tests, demos, and game initialization)

    pub fn add_to_hand(&mut self, player_id: PlayerId, name: &str) -> Result<CardId> {
        let id = self.instantiate_card(&CardName::new(name), player_id)?;
        self.player_zones_mut(player_id).hand.add(id);
        Ok(id)
    }

    pub fn add_to_library(&mut self, player_id: PlayerId, name: &str) -> Result<CardId> {
        let id = self.instantiate_card(&CardName::new(name), player_id)?;
        self.player_zones_mut(player_id).library.add(id);
        Ok(id)
    }

    /// Put a freshly stamped card straight onto the battlefield (through the
    /// normal enter-the-battlefield path, so events are queued).
    pub fn put_on_battlefield(&mut self, player_id: PlayerId, name: &str) -> Result<CardId> {
        let id = self.instantiate_card(&CardName::new(name), player_id)?;
        self.move_card(id, Zone::Battlefield)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CardDefinition;
    use crate::core::Color;

    fn catalog() -> CardCatalog {
        let mut catalog = CardCatalog::with_basic_lands();
        catalog.register(CardDefinition::creature("Grizzly Bears", "1G", 2, 2).unwrap());
        catalog
    }

    #[test]
    fn test_move_card_queues_events() {
        let mut game = GameState::new_test(catalog());
        let p0 = PlayerId::new(0);
        let bear = game.put_on_battlefield(p0, "Grizzly Bears").unwrap();
        assert!(matches!(
            game.pending_events.as_slice(),
            [GameEvent::EnteredBattlefield { .. }]
        ));
        game.pending_events.clear();

        game.move_card(bear, Zone::Graveyard).unwrap();
        assert!(game
            .pending_events
            .iter()
            .any(|e| matches!(e, GameEvent::Died { card, .. } if *card == bear)));
        assert!(game.player_zones(p0).graveyard.contains(bear));
        assert_eq!(game.find_zone(bear), Some(Zone::Graveyard));
    }

    #[test]
    fn test_draw_from_empty_library_flags_decking() {
        let mut game = GameState::new_test(catalog());
        let p0 = PlayerId::new(0);
        assert_eq!(game.draw_card(p0).unwrap(), None);
        assert!(game.player(p0).unwrap().drew_from_empty_library);
    }

    #[test]
    fn test_undo_tap_for_mana_round_trip() {
        let mut game = GameState::new_test(catalog());
        let p0 = PlayerId::new(0);
        let forest = game.put_on_battlefield(p0, "Forest").unwrap();

        // Simulate the tap-for-mana action's bookkeeping
        game.cards.get_mut(forest).unwrap().tap();
        game.player_mut(p0).unwrap().mana_pool.add(Color::Green);
        game.player_mut(p0)
            .unwrap()
            .undo_history
            .push(UndoEntry::TapForMana {
                card: forest,
                color: Color::Green,
            });

        let outcome = game.undo_last(p0).unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone(_)));
        assert!(!game.cards.get(forest).unwrap().tapped);
        assert_eq!(game.player(p0).unwrap().mana_pool.total(), 0);
        assert!(game.player(p0).unwrap().undo_history.is_empty());
    }

    #[test]
    fn test_undo_guard_rejects_drifted_state() {
        let mut game = GameState::new_test(catalog());
        let p0 = PlayerId::new(0);
        let forest = game.put_on_battlefield(p0, "Forest").unwrap();

        game.cards.get_mut(forest).unwrap().tap();
        game.player_mut(p0).unwrap().mana_pool.add(Color::Green);
        game.player_mut(p0)
            .unwrap()
            .undo_history
            .push(UndoEntry::TapForMana {
                card: forest,
                color: Color::Green,
            });

        // The mana has been spent in the meantime
        game.player_mut(p0).unwrap().mana_pool.clear();

        let outcome = game.undo_last(p0).unwrap();
        assert!(matches!(outcome, UndoOutcome::Inconsistent(_)));
        // Entry not consumed, land still tapped
        assert_eq!(game.player(p0).unwrap().undo_history.len(), 1);
        assert!(game.cards.get(forest).unwrap().tapped);
    }

    #[test]
    fn test_transform_swaps_base_characteristics() {
        let mut catalog = catalog();
        catalog.register(
            CardDefinition::creature("Hermit", "G", 1, 1)
                .unwrap()
                .with_back_face("Werewolf Hermit"),
        );
        catalog.register(CardDefinition::creature("Werewolf Hermit", "", 3, 3).unwrap());

        let mut game = GameState::new_test(catalog);
        let hermit = game.put_on_battlefield(PlayerId::new(0), "Hermit").unwrap();
        game.cards
            .get_mut(hermit)
            .unwrap()
            .add_counters(CounterType::plus_one_plus_one(), 1);

        game.transform(hermit).unwrap();
        let card = game.cards.get(hermit).unwrap();
        assert_eq!(card.name.as_str(), "Werewolf Hermit");
        // Counters survive the transform
        assert_eq!(card.power(), 4);
        assert!(game.transform(hermit).is_err());
    }
}
