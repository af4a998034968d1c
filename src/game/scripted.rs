//! Scripted decision provider for deterministic testing
//!
//! Follows a predetermined sequence of choice indices; when the script is
//! exhausted it falls back to the most passive answer (pass priority, decline
//! options, keep the hand, declaration order). Tests build a script, run a
//! scenario, and assert on the resulting state and log.

use crate::core::{CardId, GenericPayment, PlayerId, TargetRef};
use crate::game::combat::AttackTarget;
use crate::game::decision::{DecisionProvider, GameStateView, PlayerAction};
use smallvec::SmallVec;

/// Index-script provider.
///
/// Conventions, chosen so an empty script is always safe:
/// - `choose_action`: 0 = pass, n = take `options[n-1]`
/// - `choose_attackers` / `choose_blockers`: one entry per eligible creature,
///   0 = sit out, n = use `targets[n-1]` / `attackers[n-1]`
/// - `choose_targets`, `choose_card`, `choose_cards_to_bottom`,
///   `choose_damage_order`: index into the remaining options
/// - `confirm` / `mulligan`: nonzero = yes
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    player: PlayerId,
    script: Vec<usize>,
    position: usize,
}

impl ScriptedProvider {
    pub fn new(player: PlayerId, script: Vec<usize>) -> Self {
        ScriptedProvider {
            player,
            script,
            position: 0,
        }
    }

    /// An empty script: passes priority forever, never attacks.
    pub fn passive(player: PlayerId) -> Self {
        Self::new(player, Vec::new())
    }

    fn next(&mut self) -> usize {
        if self.position < self.script.len() {
            let choice = self.script[self.position];
            self.position += 1;
            choice
        } else {
            0
        }
    }

    fn tag(&self) -> String {
        format!("script {}", self.player)
    }
}

impl DecisionProvider for ScriptedProvider {
    fn choose_action(
        &mut self,
        view: &GameStateView<'_>,
        options: &[PlayerAction],
    ) -> Option<PlayerAction> {
        let choice = self.next();
        if choice == 0 {
            return None;
        }
        let action = options.get(choice - 1).copied();
        if let Some(action) = action {
            view.logger().choice(&self.tag(), format!("{action:?}"));
        }
        action
    }

    fn choose_targets(
        &mut self,
        view: &GameStateView<'_>,
        _source: CardId,
        valid: &[TargetRef],
        count: usize,
    ) -> SmallVec<[TargetRef; 2]> {
        let mut chosen = SmallVec::new();
        for _ in 0..count {
            if valid.is_empty() {
                break;
            }
            let idx = self.next() % valid.len();
            chosen.push(valid[idx]);
            view.logger()
                .choice(&self.tag(), format!("target {:?}", valid[idx]));
        }
        chosen
    }

    fn choose_generic_payment(
        &mut self,
        _view: &GameStateView<'_>,
        options: &[GenericPayment],
    ) -> usize {
        self.next() % options.len().max(1)
    }

    fn confirm(&mut self, view: &GameStateView<'_>, prompt: &str) -> bool {
        let yes = self.next() != 0;
        view.logger()
            .choice(&self.tag(), format!("{prompt}: {}", if yes { "yes" } else { "no" }));
        yes
    }

    fn choose_card(
        &mut self,
        view: &GameStateView<'_>,
        prompt: &str,
        options: &[CardId],
    ) -> CardId {
        // The engine never offers an empty option list.
        let idx = self.next() % options.len();
        let card = options[idx];
        view.logger().choice(&self.tag(), format!("{prompt}: {card}"));
        card
    }

    fn choose_attackers(
        &mut self,
        _view: &GameStateView<'_>,
        eligible: &[CardId],
        targets: &[AttackTarget],
    ) -> SmallVec<[(CardId, AttackTarget); 4]> {
        let mut attacks = SmallVec::new();
        for &creature in eligible {
            let choice = self.next();
            if choice == 0 {
                continue;
            }
            if let Some(&target) = targets.get(choice - 1) {
                attacks.push((creature, target));
            }
        }
        attacks
    }

    fn choose_blockers(
        &mut self,
        _view: &GameStateView<'_>,
        eligible: &[CardId],
        attackers: &[CardId],
    ) -> SmallVec<[(CardId, CardId); 4]> {
        let mut blocks = SmallVec::new();
        for &creature in eligible {
            let choice = self.next();
            if choice == 0 {
                continue;
            }
            if let Some(&attacker) = attackers.get(choice - 1) {
                blocks.push((creature, attacker));
            }
        }
        blocks
    }

    fn choose_damage_order(
        &mut self,
        _view: &GameStateView<'_>,
        _attacker: CardId,
        blockers: &[CardId],
    ) -> SmallVec<[CardId; 4]> {
        let mut remaining: Vec<CardId> = blockers.to_vec();
        let mut order = SmallVec::new();
        while !remaining.is_empty() {
            let idx = self.next() % remaining.len();
            order.push(remaining.remove(idx));
        }
        order
    }

    fn mulligan(&mut self, _view: &GameStateView<'_>, _hand: &[CardId], _taken: u8) -> bool {
        self.next() != 0
    }

    fn choose_cards_to_bottom(
        &mut self,
        _view: &GameStateView<'_>,
        hand: &[CardId],
        count: usize,
    ) -> SmallVec<[CardId; 4]> {
        let mut remaining: Vec<CardId> = hand.to_vec();
        let mut bottomed = SmallVec::new();
        for _ in 0..count.min(remaining.len()) {
            let idx = self.next() % remaining.len();
            bottomed.push(remaining.remove(idx));
        }
        bottomed
    }
}
