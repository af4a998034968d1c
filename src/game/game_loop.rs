//! The turn loop: step execution, the priority protocol, and game end
//!
//! After every batch of mutations the engine runs the same cycle: recompute
//! continuous effects, run state-based actions to a fixpoint, collect and
//! push triggers for queued events, then hand priority back to the active
//! player. Two consecutive passes resolve the top of the stack (or, with an
//! empty stack, end the step).

use crate::core::{CardId, Keyword, LossReason, PlayerId};
use crate::game::combat::AttackTarget;
use crate::game::decision::{GameStateView, PlayerAction, ProviderPair};
use crate::game::logger::LogCategory;
use crate::game::phase::Step;
use crate::game::state::GameState;
use crate::game::triggers::GameEvent;
use crate::undo::UndoOutcome;
use crate::zones::Zone;
use crate::{EngineError, Result};
use smallvec::SmallVec;

/// Turn cap guarding against two players who never interact.
pub const DEFAULT_TURN_LIMIT: u32 = 100;

const OPENING_HAND_SIZE: usize = 7;

/// Why the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEndReason {
    LifeLoss,
    Decking,
    TurnLimit,
}

impl From<LossReason> for GameEndReason {
    fn from(reason: LossReason) -> Self {
        match reason {
            LossReason::LifeLoss => GameEndReason::LifeLoss,
            LossReason::Decking => GameEndReason::Decking,
        }
    }
}

/// Outcome of a completed game. `winner` is `None` on a draw (both players
/// lost simultaneously, or the turn limit was reached).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    pub winner: Option<PlayerId>,
    pub turns: u32,
    pub reason: GameEndReason,
}

/// Drives a game to completion against a pair of decision providers.
pub struct GameLoop<'a> {
    game: &'a mut GameState,
    providers: ProviderPair<'a>,
    max_turns: u32,
}

impl<'a> GameLoop<'a> {
    pub fn new(game: &'a mut GameState, providers: ProviderPair<'a>) -> Self {
        GameLoop {
            game,
            providers,
            max_turns: DEFAULT_TURN_LIMIT,
        }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Play from opening hands to a result.
    pub fn run(&mut self) -> Result<GameResult> {
        self.opening_hands()?;
        self.cycle()?;
        if let Some(result) = self.finished()? {
            return Ok(self.announce(result));
        }
        loop {
            if self.game.turn.turn_number > self.max_turns {
                let result = GameResult {
                    winner: None,
                    turns: self.max_turns,
                    reason: GameEndReason::TurnLimit,
                };
                return Ok(self.announce(result));
            }
            if let Some(result) = self.run_turn()? {
                return Ok(self.announce(result));
            }
            self.game.turn.next_turn();
        }
    }

    fn announce(&self, result: GameResult) -> GameResult {
        let message = match result.winner {
            Some(winner) => match self.game.player(winner) {
                Ok(player) => format!(
                    "{} wins on turn {} ({:?})",
                    player.name.as_str(),
                    result.turns,
                    result.reason
                ),
                Err(_) => format!("{winner} wins on turn {}", result.turns),
            },
            None => format!("draw after {} turns ({:?})", result.turns, result.reason),
        };
        self.game.logger.headline(LogCategory::Turn, message);
        result
    }

    // ------------------------------------------------------------------
    // Opening hands

    /// Shuffle, draw seven, and run the mulligan loop for each player.
    /// Keeping after n mulligans bottoms n cards.
    fn opening_hands(&mut self) -> Result<()> {
        let order = self.game.apnap_order();
        for player in order {
            self.game.shuffle_library(player);
            self.game.draw_cards(player, OPENING_HAND_SIZE)?;
        }
        for player in order {
            let mut taken: u8 = 0;
            loop {
                let hand: Vec<CardId> = self.game.player_zones(player).hand.as_slice().to_vec();
                let again = (taken as usize) < OPENING_HAND_SIZE && {
                    let view = GameStateView::new(self.game, player);
                    self.providers.for_player(player).mulligan(&view, &hand, taken)
                };
                if !again {
                    break;
                }
                for card in hand {
                    self.game.move_card(card, Zone::Library)?;
                }
                self.game.shuffle_library(player);
                self.game.draw_cards(player, OPENING_HAND_SIZE)?;
                taken += 1;
                self.game.logger.event(
                    LogCategory::Turn,
                    format!("{player} mulligans to {}", OPENING_HAND_SIZE - taken as usize),
                );
            }
            if taken > 0 {
                self.bottom_cards(player, taken as usize)?;
            }
        }
        Ok(())
    }

    fn bottom_cards(&mut self, player: PlayerId, count: usize) -> Result<()> {
        let hand: Vec<CardId> = self.game.player_zones(player).hand.as_slice().to_vec();
        let chosen = {
            let view = GameStateView::new(self.game, player);
            self.providers
                .for_player(player)
                .choose_cards_to_bottom(&view, &hand, count)
        };
        if chosen.len() != count {
            return Err(EngineError::InvalidDecision(format!(
                "{count} cards to bottom, {} chosen",
                chosen.len()
            )));
        }
        for card in chosen {
            let zones = self.game.player_zones_mut(player);
            if !zones.hand.remove(card) {
                return Err(EngineError::InvalidDecision(format!(
                    "{card} is not in hand to put on the bottom"
                )));
            }
            // Hand-to-library moves raise no zone-change events, so the
            // zones are adjusted directly to hit the bottom.
            zones.library.add_to_bottom(card);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Turns and steps

    fn run_turn(&mut self) -> Result<Option<GameResult>> {
        let active = self.game.turn.active_player;
        let name = self.game.player(active)?.name.clone();
        self.game.logger.headline(
            LogCategory::Turn,
            format!(
                "=== turn {}: {} ===",
                self.game.turn.turn_number,
                name.as_str()
            ),
        );
        loop {
            if let Some(result) = self.run_step()? {
                return Ok(Some(result));
            }
            if !self.game.turn.advance_step() {
                return Ok(None);
            }
        }
    }

    fn run_step(&mut self) -> Result<Option<GameResult>> {
        let step = self.game.turn.current_step;
        let active = self.game.turn.active_player;
        self.game
            .logger
            .detail(LogCategory::Turn, || format!("{step} step"));

        match step {
            Step::Untap => self.untap_step(active)?,
            Step::Upkeep => {
                self.game
                    .queue_event(GameEvent::BeginningOfUpkeep { player: active });
            }
            Step::Draw => {
                // The starting player skips the game's first draw.
                if self.game.turn.turn_number > 1 {
                    self.game.draw_card(active)?;
                }
            }
            Step::DeclareAttackers => self.declare_attackers(active)?,
            Step::DeclareBlockers => self.declare_blockers(active)?,
            Step::CombatDamage => self.combat_damage()?,
            Step::EndCombat => self.game.combat.clear(),
            Step::End => {
                self.game
                    .queue_event(GameEvent::BeginningOfEndStep { player: active });
            }
            Step::Cleanup => self.cleanup_step(active)?,
            Step::Main1 | Step::Main2 | Step::BeginCombat => {}
        }

        if step.has_priority_window() {
            self.cycle()?;
            if let Some(result) = self.finished()? {
                return Ok(Some(result));
            }
            self.priority_rounds()?;
            if let Some(result) = self.finished()? {
                return Ok(Some(result));
            }
        } else {
            self.game.recompute_effects()?;
        }
        Ok(None)
    }

    fn untap_step(&mut self, active: PlayerId) -> Result<()> {
        self.game.player_mut(active)?.reset_lands_played();
        let permanents: Vec<CardId> = self.game.battlefield.iter().collect();
        for id in permanents {
            let card = self.game.cards.get_mut(id)?;
            if card.controller == active {
                card.untap();
                card.clear_turn_status();
            }
        }
        Ok(())
    }

    fn cleanup_step(&mut self, active: PlayerId) -> Result<()> {
        // Discard to maximum hand size, one card at a time.
        loop {
            let hand: Vec<CardId> = self.game.player_zones(active).hand.as_slice().to_vec();
            if hand.len() <= self.game.player(active)?.max_hand_size {
                break;
            }
            let chosen = {
                let view = GameStateView::new(self.game, active);
                self.providers
                    .for_player(active)
                    .choose_card(&view, "discard down to maximum hand size", &hand)
            };
            if !hand.contains(&chosen) {
                return Err(EngineError::InvalidDecision(format!(
                    "{chosen} is not in hand to discard"
                )));
            }
            self.game.move_card(chosen, Zone::Graveyard)?;
            self.game
                .logger
                .event(LogCategory::Turn, format!("{active} discards {chosen}"));
        }

        // Damage wears off, "until end of turn" ends, pools empty.
        let permanents: Vec<CardId> = self.game.battlefield.iter().collect();
        for id in permanents {
            let card = self.game.cards.get_mut(id)?;
            card.damage_marked = 0;
            card.deathtouched = false;
        }
        self.game.expire_end_of_turn_effects();
        for player in &mut self.game.players {
            player.empty_mana_pool();
        }
        self.game.recompute_effects()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Priority

    /// Run priority windows until both players pass over an empty stack.
    /// Each resolution hands priority back to the active player.
    fn priority_rounds(&mut self) -> Result<()> {
        loop {
            let mut holder = self.game.turn.active_player;
            let mut passes = 0;
            while passes < 2 {
                if self.someone_lost() {
                    self.game.turn.priority_player = None;
                    return Ok(());
                }
                self.game.turn.priority_player = Some(holder);
                let options = self.game.available_actions(holder)?;
                let choice = {
                    let view = GameStateView::new(self.game, holder);
                    self.providers.for_player(holder).choose_action(&view, &options)
                };
                match choice {
                    Some(action) => {
                        if !options.contains(&action) {
                            return Err(EngineError::InvalidDecision(format!(
                                "{action:?} is not among the available actions"
                            )));
                        }
                        self.apply_action(holder, action)?;
                        self.cycle()?;
                        // The actor keeps priority after acting.
                        passes = 0;
                    }
                    None => {
                        // Passing priority is a commit point.
                        self.game.clear_undo(holder);
                        passes += 1;
                        holder = holder.opponent();
                    }
                }
            }
            self.game.turn.priority_player = None;
            if self.game.stack.is_empty() {
                return Ok(());
            }
            self.game.resolve_top(&mut self.providers)?;
            self.cycle()?;
            if self.someone_lost() {
                return Ok(());
            }
        }
    }

    fn apply_action(&mut self, player: PlayerId, action: PlayerAction) -> Result<()> {
        match action {
            PlayerAction::PlayLand(card) => self.game.play_land(player, card),
            PlayerAction::CastSpell(card) => {
                self.game.cast_spell(player, card, &mut self.providers)
            }
            PlayerAction::ActivateAbility { card, index } => {
                self.game
                    .activate_ability(player, card, index, &mut self.providers)
            }
            PlayerAction::TapForMana(card) => self.game.tap_for_mana(player, card),
            PlayerAction::Undo => {
                if let UndoOutcome::Inconsistent(reason) = self.game.undo_last(player)? {
                    self.game
                        .logger
                        .event(LogCategory::Priority, format!("undo refused: {reason}"));
                }
                Ok(())
            }
        }
    }

    /// The cycle run after every mutation batch: recompute continuous
    /// effects, state-based actions to a fixpoint, then trigger collection
    /// for the events the batch queued.
    fn cycle(&mut self) -> Result<()> {
        self.game.recompute_effects()?;
        self.game.check_state_based_actions(&mut self.providers)?;
        self.game.collect_triggers(&mut self.providers)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Combat

    fn declare_attackers(&mut self, active: PlayerId) -> Result<()> {
        let defender = active.opponent();
        let mut eligible: Vec<CardId> = Vec::new();
        let mut targets: Vec<AttackTarget> = vec![AttackTarget::Player(defender)];
        for id in self.game.battlefield.iter() {
            let card = self.game.cards.get(id)?;
            if card.controller == active
                && card.is_creature()
                && !card.tapped
                && !card.has_keyword(Keyword::Defender)
                && (!card.summoning_sick(self.game.turn.turn_number)
                    || card.has_keyword(Keyword::Haste))
            {
                eligible.push(id);
            }
            if card.controller == defender && card.is_planeswalker() {
                targets.push(AttackTarget::Planeswalker(id));
            }
        }
        if eligible.is_empty() {
            return Ok(());
        }

        let declared = {
            let view = GameStateView::new(self.game, active);
            self.providers
                .for_player(active)
                .choose_attackers(&view, &eligible, &targets)
        };
        for (attacker, target) in declared {
            if !eligible.contains(&attacker) || !targets.contains(&target) {
                return Err(EngineError::InvalidDecision(format!(
                    "{attacker} cannot attack {target:?}"
                )));
            }
            self.game.combat.declare_attacker(attacker, target);
            if !self.game.cards.get(attacker)?.has_keyword(Keyword::Vigilance) {
                self.game.cards.get_mut(attacker)?.tap();
            }
            self.game.queue_event(GameEvent::AttackDeclared { attacker });
            let name = self.game.cards.get(attacker)?.name.clone();
            self.game
                .logger
                .event(LogCategory::Combat, format!("{name} attacks {target:?}"));
        }
        Ok(())
    }

    fn declare_blockers(&mut self, active: PlayerId) -> Result<()> {
        let attackers = self.game.combat.attacker_list();
        if attackers.is_empty() {
            return Ok(());
        }
        let defender = active.opponent();
        let mut eligible: Vec<CardId> = Vec::new();
        for id in self.game.battlefield.iter() {
            let card = self.game.cards.get(id)?;
            if card.controller == defender && card.is_creature() && !card.tapped {
                eligible.push(id);
            }
        }

        if !eligible.is_empty() {
            let declared = {
                let view = GameStateView::new(self.game, defender);
                self.providers
                    .for_player(defender)
                    .choose_blockers(&view, &eligible, &attackers)
            };
            for (blocker, attacker) in declared {
                if !eligible.contains(&blocker)
                    || !attackers.contains(&attacker)
                    || !self.block_is_legal(blocker, attacker)?
                {
                    return Err(EngineError::InvalidDecision(format!(
                        "{blocker} cannot block {attacker}"
                    )));
                }
                self.game.combat.declare_blocker(blocker, attacker);
                let name = self.game.cards.get(blocker)?.name.clone();
                self.game
                    .logger
                    .event(LogCategory::Combat, format!("{name} blocks {attacker}"));
            }
        }

        for attacker in &attackers {
            let blockers = self.game.combat.blockers_of(*attacker);
            if blockers.len() == 1 && self.game.cards.get(*attacker)?.has_keyword(Keyword::Menace)
            {
                return Err(EngineError::InvalidDecision(format!(
                    "{attacker} has menace and must be blocked by two or more creatures"
                )));
            }
            if blockers.len() > 1 {
                let order = {
                    let view = GameStateView::new(self.game, active);
                    self.providers.for_player(active).choose_damage_order(
                        &view,
                        *attacker,
                        &blockers,
                    )
                };
                if order.len() != blockers.len() || !order.iter().all(|b| blockers.contains(b)) {
                    return Err(EngineError::InvalidDecision(format!(
                        "damage order for {attacker} is not a permutation of its blockers"
                    )));
                }
                self.game.combat.set_damage_order(*attacker, order);
            }
        }
        Ok(())
    }

    /// Flying is blocked only by flying or reach.
    fn block_is_legal(&self, blocker: CardId, attacker: CardId) -> Result<bool> {
        let a = self.game.cards.get(attacker)?;
        let b = self.game.cards.get(blocker)?;
        if a.has_keyword(Keyword::Flying)
            && !b.has_keyword(Keyword::Flying)
            && !b.has_keyword(Keyword::Reach)
        {
            return Ok(false);
        }
        Ok(true)
    }

    fn combat_damage(&mut self) -> Result<()> {
        if self.game.combat.attackers.is_empty() {
            return Ok(());
        }
        if self.game.combat_has_first_strikers() {
            self.game.resolve_combat_damage(true)?;
            // First-strike casualties leave before normal damage.
            self.cycle()?;
            if self.someone_lost() {
                return Ok(());
            }
        }
        self.game.resolve_combat_damage(false)
    }

    // ------------------------------------------------------------------
    // Game end

    fn someone_lost(&self) -> bool {
        self.game.players.iter().any(|p| p.has_lost())
    }

    fn finished(&self) -> Result<Option<GameResult>> {
        let turns = self.game.turn.turn_number;
        let first = &self.game.players[0];
        let second = &self.game.players[1];
        Ok(match (first.lost, second.lost) {
            (None, None) => None,
            (Some(reason), None) => Some(GameResult {
                winner: Some(second.id),
                turns,
                reason: reason.into(),
            }),
            (None, Some(reason)) => Some(GameResult {
                winner: Some(first.id),
                turns,
                reason: reason.into(),
            }),
            (Some(reason), Some(_)) => Some(GameResult {
                winner: None,
                turns,
                reason: reason.into(),
            }),
        })
    }
}

/// Build a library of `count` copies of each named card, in order.
/// Convenience for tests and the demo binary.
pub fn stock_library(
    game: &mut GameState,
    player: PlayerId,
    cards: &[(&str, usize)],
) -> Result<SmallVec<[CardId; 8]>> {
    let mut ids = SmallVec::new();
    for &(name, count) in cards {
        for _ in 0..count {
            ids.push(game.add_to_library(player, name)?);
        }
    }
    Ok(ids)
}
