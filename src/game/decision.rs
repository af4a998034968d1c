//! The decision boundary
//!
//! All player agency flows through [`DecisionProvider`]: the engine calls a
//! strongly-typed method with a read-only [`GameStateView`] and a
//! pre-validated set of options, and blocks until the provider answers.
//! Answers are validated again by the engine before anything mutates, so a
//! misbehaving provider can stall a game but never corrupt one. Because every
//! call happens on the engine's own call stack there is never more than one
//! outstanding request per player.

use crate::core::{Card, CardId, GenericPayment, Player, PlayerId, TargetRef};
use crate::game::combat::AttackTarget;
use crate::game::logger::GameLogger;
use crate::game::phase::Step;
use crate::game::stack::StackObject;
use crate::game::state::GameState;
use crate::Result;
use smallvec::SmallVec;

/// An action a player may take while holding priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    PlayLand(CardId),
    CastSpell(CardId),
    ActivateAbility { card: CardId, index: usize },
    /// Tap a land for mana (reversible; recorded in the undo history).
    TapForMana(CardId),
    /// Take back the most recent reversible action.
    Undo,
}

/// Read-only window onto the game for one player's decisions.
pub struct GameStateView<'a> {
    game: &'a GameState,
    pub player: PlayerId,
}

impl<'a> GameStateView<'a> {
    pub fn new(game: &'a GameState, player: PlayerId) -> Self {
        GameStateView { game, player }
    }

    pub fn card(&self, id: CardId) -> Result<&Card> {
        self.game.cards.get(id)
    }

    pub fn player_state(&self, id: PlayerId) -> Result<&Player> {
        self.game.player(id)
    }

    pub fn my_hand(&self) -> &[CardId] {
        self.game.zones[self.player.as_index()].hand.as_slice()
    }

    pub fn battlefield(&self) -> impl Iterator<Item = CardId> + '_ {
        self.game.battlefield.iter()
    }

    pub fn stack(&self) -> &[StackObject] {
        &self.game.stack
    }

    pub fn turn_number(&self) -> u32 {
        self.game.turn.turn_number
    }

    pub fn step(&self) -> Step {
        self.game.turn.current_step
    }

    pub fn active_player(&self) -> PlayerId {
        self.game.turn.active_player
    }

    pub fn priority_holder(&self) -> Option<PlayerId> {
        self.game.turn.priority_player
    }

    pub fn logger(&self) -> &GameLogger {
        &self.game.logger
    }
}

/// The request/response protocol between the engine and a player agent.
///
/// Every method receives only legal options. Returning something outside the
/// offered set is answered with `EngineError::InvalidDecision` by the engine,
/// not with a panic.
pub trait DecisionProvider {
    /// Priority window: act or pass (`None`).
    fn choose_action(
        &mut self,
        view: &GameStateView<'_>,
        options: &[PlayerAction],
    ) -> Option<PlayerAction>;

    /// Pick `count` targets from `valid` for a spell or ability.
    fn choose_targets(
        &mut self,
        view: &GameStateView<'_>,
        source: CardId,
        valid: &[TargetRef],
        count: usize,
    ) -> SmallVec<[TargetRef; 2]>;

    /// Disambiguate a generic mana payment. Called only when `options` has
    /// more than one entry; returns an index into it.
    fn choose_generic_payment(
        &mut self,
        view: &GameStateView<'_>,
        options: &[GenericPayment],
    ) -> usize;

    /// Optional ("you may...") effects.
    fn confirm(&mut self, view: &GameStateView<'_>, prompt: &str) -> bool;

    /// Pick one card (legendary-rule survivor, discard, and similar).
    fn choose_card(
        &mut self,
        view: &GameStateView<'_>,
        prompt: &str,
        options: &[CardId],
    ) -> CardId;

    /// Declare attackers: pair each chosen creature with an attack target.
    fn choose_attackers(
        &mut self,
        view: &GameStateView<'_>,
        eligible: &[CardId],
        targets: &[AttackTarget],
    ) -> SmallVec<[(CardId, AttackTarget); 4]>;

    /// Declare blockers: pair each chosen creature with the attacker it
    /// blocks.
    fn choose_blockers(
        &mut self,
        view: &GameStateView<'_>,
        eligible: &[CardId],
        attackers: &[CardId],
    ) -> SmallVec<[(CardId, CardId); 4]>;

    /// Order a multi-blocked attacker's damage assignment.
    fn choose_damage_order(
        &mut self,
        view: &GameStateView<'_>,
        attacker: CardId,
        blockers: &[CardId],
    ) -> SmallVec<[CardId; 4]>;

    /// Opening hand: true to mulligan again.
    fn mulligan(&mut self, view: &GameStateView<'_>, hand: &[CardId], taken: u8) -> bool;

    /// After keeping a mulliganed hand, put `count` cards on the bottom.
    fn choose_cards_to_bottom(
        &mut self,
        view: &GameStateView<'_>,
        hand: &[CardId],
        count: usize,
    ) -> SmallVec<[CardId; 4]>;
}

/// The two players' providers, addressable by id.
pub struct ProviderPair<'a> {
    providers: [&'a mut dyn DecisionProvider; 2],
}

impl<'a> ProviderPair<'a> {
    pub fn new(
        first: &'a mut dyn DecisionProvider,
        second: &'a mut dyn DecisionProvider,
    ) -> Self {
        ProviderPair {
            providers: [first, second],
        }
    }

    pub fn for_player(&mut self, id: PlayerId) -> &mut dyn DecisionProvider {
        &mut *self.providers[id.as_index()]
    }
}
