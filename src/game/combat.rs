//! Combat: declarations and the damage batch
//!
//! [`CombatState`] tracks declarations for the current combat. Damage follows
//! CR 510: the attacking player's chosen order per attacker, lethal damage
//! to each blocker in sequence, and one simultaneous application per damage
//! sub-step. First strike and double strike split the damage step in two.
//!
//! BTreeMaps keep iteration deterministic.

use crate::core::{CardId, Keyword, PlayerId};
use crate::game::logger::LogCategory;
use crate::game::state::GameState;
use crate::game::triggers::GameEvent;
use crate::Result;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// What an attacker was declared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackTarget {
    Player(PlayerId),
    Planeswalker(CardId),
}

/// Declarations for the current combat phase. Reset at end of combat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatState {
    /// Attacker -> what it attacks
    pub attackers: BTreeMap<CardId, AttackTarget>,

    /// Blocker -> the attacker it blocks
    pub blockers: BTreeMap<CardId, CardId>,

    /// Attacker -> its blockers in damage assignment order. Starts in
    /// declaration order; the attacking player may reorder before damage.
    pub damage_order: BTreeMap<CardId, SmallVec<[CardId; 4]>>,

    pub active: bool,
}

impl CombatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_attacker(&mut self, attacker: CardId, target: AttackTarget) {
        self.attackers.insert(attacker, target);
        self.active = true;
    }

    pub fn declare_blocker(&mut self, blocker: CardId, attacker: CardId) {
        self.blockers.insert(blocker, attacker);
        self.damage_order.entry(attacker).or_default().push(blocker);
    }

    /// Replace the damage order for an attacker. The caller must have
    /// validated that `order` is a permutation of the declared blockers.
    pub fn set_damage_order(&mut self, attacker: CardId, order: SmallVec<[CardId; 4]>) {
        self.damage_order.insert(attacker, order);
    }

    pub fn is_attacking(&self, card_id: CardId) -> bool {
        self.attackers.contains_key(&card_id)
    }

    pub fn is_blocking(&self, card_id: CardId) -> bool {
        self.blockers.contains_key(&card_id)
    }

    /// Blocked means "was blocked at any point": an attacker whose blockers
    /// all died still deals no combat damage (barring trample).
    pub fn is_blocked(&self, attacker: CardId) -> bool {
        self.damage_order
            .get(&attacker)
            .is_some_and(|blockers| !blockers.is_empty())
    }

    pub fn blockers_of(&self, attacker: CardId) -> SmallVec<[CardId; 4]> {
        self.damage_order
            .get(&attacker)
            .cloned()
            .unwrap_or_default()
    }

    pub fn attack_target(&self, attacker: CardId) -> Option<AttackTarget> {
        self.attackers.get(&attacker).copied()
    }

    pub fn attacker_list(&self) -> Vec<CardId> {
        self.attackers.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.attackers.clear();
        self.blockers.clear();
        self.damage_order.clear();
        self.active = false;
    }
}

/// One computed damage batch, applied all at once.
#[derive(Debug, Default)]
struct DamageBatch {
    to_creatures: BTreeMap<CardId, i32>,
    deathtouch_hits: Vec<CardId>,
    to_players: BTreeMap<PlayerId, i32>,
    to_planeswalkers: BTreeMap<CardId, i32>,
    lifelink: BTreeMap<PlayerId, i32>,
}

impl DamageBatch {
    fn creature_hit(&mut self, target: CardId, amount: i32, source_deathtouch: bool) {
        if amount <= 0 {
            return;
        }
        *self.to_creatures.entry(target).or_default() += amount;
        if source_deathtouch {
            self.deathtouch_hits.push(target);
        }
    }
}

impl GameState {
    /// Whether any combat participant has first or double strike, i.e.
    /// whether the damage step runs in two sub-steps.
    pub fn combat_has_first_strikers(&self) -> bool {
        let participants = self
            .combat
            .attackers
            .keys()
            .chain(self.combat.blockers.keys());
        for &id in participants {
            if let Ok(card) = self.cards.get(id) {
                if card.has_keyword(Keyword::FirstStrike)
                    || card.has_keyword(Keyword::DoubleStrike)
                {
                    return true;
                }
            }
        }
        false
    }

    fn deals_damage_in_substep(&self, id: CardId, first_strike: bool) -> bool {
        let Ok(card) = self.cards.get(id) else {
            return false;
        };
        if !self.battlefield.contains(id) {
            return false;
        }
        if card.has_keyword(Keyword::DoubleStrike) {
            return true;
        }
        if first_strike {
            card.has_keyword(Keyword::FirstStrike)
        } else {
            !card.has_keyword(Keyword::FirstStrike)
        }
    }

    /// Compute and apply one combat damage sub-step as a single batch.
    ///
    /// All damage is computed against the pre-application state, then applied
    /// simultaneously: two creatures in a mutual fight both take their
    /// damage, even if both end up dead.
    pub fn resolve_combat_damage(&mut self, first_strike: bool) -> Result<()> {
        let mut batch = DamageBatch::default();

        let attackers: Vec<CardId> = self.combat.attacker_list();
        for attacker in attackers {
            if !self.deals_damage_in_substep(attacker, first_strike) {
                continue;
            }
            self.assign_attacker_damage(attacker, &mut batch)?;
        }

        let blockers: Vec<(CardId, CardId)> = self
            .combat
            .blockers
            .iter()
            .map(|(&b, &a)| (b, a))
            .collect();
        for (blocker, attacker) in blockers {
            if !self.deals_damage_in_substep(blocker, first_strike) {
                continue;
            }
            // A blocker keeps fighting a dead attacker's ghost not at all:
            // damage only lands if the attacker is still on the battlefield.
            if !self.battlefield.contains(attacker) {
                continue;
            }
            let card = self.cards.get(blocker)?;
            let power = card.power();
            let deathtouch = card.has_deathtouch();
            let lifelink = card.has_keyword(Keyword::Lifelink);
            let controller = card.controller;
            batch.creature_hit(attacker, power, deathtouch);
            if lifelink && power > 0 {
                *batch.lifelink.entry(controller).or_default() += power;
            }
        }

        self.apply_damage_batch(batch)
    }

    /// Assign one attacker's combat damage into the batch.
    fn assign_attacker_damage(&mut self, attacker: CardId, batch: &mut DamageBatch) -> Result<()> {
        let card = self.cards.get(attacker)?;
        let mut remaining = card.power();
        let deathtouch = card.has_deathtouch();
        let trample = card.has_keyword(Keyword::Trample);
        let lifelink = card.has_keyword(Keyword::Lifelink);
        let controller = card.controller;
        let target = match self.combat.attack_target(attacker) {
            Some(target) => target,
            None => return Ok(()),
        };
        if remaining <= 0 {
            return Ok(());
        }

        let mut dealt = 0;
        let blocked = self.combat.is_blocked(attacker);
        if blocked {
            // Lethal damage to each blocker in the chosen order; the
            // remainder is discarded unless the attacker has trample.
            for blocker in self.combat.blockers_of(attacker) {
                if remaining == 0 {
                    break;
                }
                if !self.battlefield.contains(blocker) {
                    continue;
                }
                let victim = self.cards.get(blocker)?;
                let lethal = if deathtouch {
                    1
                } else {
                    (victim.toughness() - victim.damage_marked).max(1)
                };
                let assigned = lethal.min(remaining);
                batch.creature_hit(blocker, assigned, deathtouch);
                remaining -= assigned;
                dealt += assigned;
            }
            if trample && remaining > 0 {
                dealt += self.assign_to_attack_target(target, remaining, batch);
            }
        } else {
            dealt += self.assign_to_attack_target(target, remaining, batch);
        }

        if lifelink && dealt > 0 {
            *batch.lifelink.entry(controller).or_default() += dealt;
        }
        Ok(())
    }

    /// Returns the amount that will actually be dealt (prevented player
    /// damage counts as zero for lifelink purposes, but is still recorded so
    /// the prevention can be logged at application time).
    fn assign_to_attack_target(
        &self,
        target: AttackTarget,
        amount: i32,
        batch: &mut DamageBatch,
    ) -> i32 {
        match target {
            AttackTarget::Player(player) => {
                *batch.to_players.entry(player).or_default() += amount;
                if self.damage_to_player_prevented(player) {
                    0
                } else {
                    amount
                }
            }
            AttackTarget::Planeswalker(walker) => {
                *batch.to_planeswalkers.entry(walker).or_default() += amount;
                amount
            }
        }
    }

    fn apply_damage_batch(&mut self, batch: DamageBatch) -> Result<()> {
        for (&creature, &amount) in &batch.to_creatures {
            let card = self.cards.get_mut(creature)?;
            card.damage_marked += amount;
            let name = card.name.clone();
            self.logger.event(
                LogCategory::Combat,
                format!("{name} takes {amount} combat damage"),
            );
        }
        for creature in batch.deathtouch_hits {
            self.cards.get_mut(creature)?.deathtouched = true;
        }

        for (&player_id, &amount) in &batch.to_players {
            if self.damage_to_player_prevented(player_id) {
                let name = self.player(player_id)?.name.clone();
                self.logger.event(
                    LogCategory::Combat,
                    format!("{amount} combat damage to {name} prevented"),
                );
                continue;
            }
            let player = self.player_mut(player_id)?;
            player.lose_life(amount);
            let name = player.name.clone();
            self.logger.event(
                LogCategory::Combat,
                format!("{name} takes {amount} combat damage"),
            );
            self.queue_event(GameEvent::DamageDealtToPlayer {
                player: player_id,
                amount,
            });
        }

        for (&walker, &amount) in &batch.to_planeswalkers {
            self.remove_loyalty(walker, amount)?;
            let name = self.cards.get(walker)?.name.clone();
            self.logger.event(
                LogCategory::Combat,
                format!("{name} loses {amount} loyalty to combat damage"),
            );
        }

        for (&player_id, &gain) in &batch.lifelink {
            let player = self.player_mut(player_id)?;
            player.gain_life(gain);
            let name = player.name.clone();
            self.logger.event(
                LogCategory::Combat,
                format!("{name} gains {gain} life from lifelink"),
            );
        }

        Ok(())
    }
}
