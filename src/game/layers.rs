//! Continuous effects engine
//!
//! Effective card characteristics are never patched in place. Each recompute
//! pass resets every battlefield card to its printed characteristics, gathers
//! all live continuous effects (registered ones plus those regenerated from
//! static abilities of battlefield permanents), and replays them in layer
//! order: type changes, then ability grants, then P/T setting, then P/T
//! modification (CR 613). +1/+1 and -1/-1 counters are not an effect; they
//! are folded in by `Card::power`/`Card::toughness` on read.
//!
//! The pass is pure with respect to game state other than the effective
//! fields, so running it twice in a row is a no-op the second time.

use crate::core::{
    Card, CardId, ContinuousEffect, ControllerScope, Duration, EffectScope, LayerKind, ManaCost,
    PlayerId,
};
use crate::catalog::StaticCondition;
use crate::game::logger::LogCategory;
use crate::game::state::GameState;
use crate::Result;
use serde::{Deserialize, Serialize};

/// A damage-prevention shield on a player. Prevention is not healing: shielded
/// combat damage is never dealt at all (and lifelink sees none of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreventionShield {
    pub player: PlayerId,
    pub duration: Duration,
}

impl GameState {
    /// Register a continuous effect produced by a resolved spell or ability.
    pub fn register_effect(&mut self, effect: ContinuousEffect) {
        self.active_effects.push(effect);
    }

    pub fn register_prevention(&mut self, shield: PreventionShield) {
        self.preventions.push(shield);
    }

    /// Drop effects and shields that last "until end of turn". Runs during
    /// cleanup; expired effects never come back.
    pub fn expire_end_of_turn_effects(&mut self) {
        self.active_effects
            .retain(|e| e.duration != Duration::EndOfTurn);
        self.preventions
            .retain(|s| s.duration != Duration::EndOfTurn);
    }

    /// Full clear-and-rebuild pass over the battlefield.
    pub fn recompute_effects(&mut self) -> Result<()> {
        // Turn-bounded durations expire when their turn arrives.
        let turn = self.turn.turn_number;
        self.active_effects
            .retain(|e| !matches!(e.duration, Duration::UntilTurn(n) if turn >= n));
        self.preventions
            .retain(|s| !matches!(s.duration, Duration::UntilTurn(n) if turn >= n));

        let battlefield: Vec<CardId> = self.battlefield.iter().collect();
        for &id in &battlefield {
            self.cards.get_mut(id)?.reset_to_base();
        }

        // Static abilities regenerate in battlefield order, then registered
        // effects in registration order. Stable sort keeps that ordering
        // within each layer.
        let mut effects: Vec<ContinuousEffect> = Vec::new();
        for &id in &battlefield {
            let card = self.cards.get(id)?;
            let Ok(def) = self.catalog.get(&card.name) else {
                continue;
            };
            for ability in &def.statics {
                if let Some(condition) = &ability.condition {
                    if !self.static_condition_holds(condition, id, card.controller)? {
                        continue;
                    }
                }
                // An aura's static ability reaches only the permanent it is
                // attached to.
                let scope = if card.is_aura() {
                    match card.attached_to {
                        Some(host) => EffectScope::Single(host),
                        None => continue,
                    }
                } else {
                    EffectScope::Board(ability.scope.clone())
                };
                effects.push(ContinuousEffect {
                    source: Some(id),
                    controller: card.controller,
                    kind: ability.kind.clone(),
                    scope,
                    duration: Duration::Permanent,
                });
            }
        }
        effects.extend(self.active_effects.iter().cloned());
        effects.sort_by_key(|e| e.kind.layer());

        for effect in &effects {
            // Cost modification is consulted on demand, never replayed here.
            if matches!(effect.kind, LayerKind::CostModify { .. }) {
                continue;
            }
            for id in self.effect_subjects(effect, &battlefield)? {
                let card = self.cards.get_mut(id)?;
                apply_layer_kind(card, &effect.kind);
            }
        }

        self.logger.detail(LogCategory::Effect, || {
            format!(
                "recomputed {} continuous effects over {} permanents",
                effects.len(),
                battlefield.len()
            )
        });
        Ok(())
    }

    /// Which battlefield cards an effect applies to this pass.
    fn effect_subjects(
        &self,
        effect: &ContinuousEffect,
        battlefield: &[CardId],
    ) -> Result<Vec<CardId>> {
        match &effect.scope {
            EffectScope::Single(id) => {
                // A single-object effect whose subject left the battlefield
                // applies to nothing.
                if battlefield.contains(id) {
                    Ok(vec![*id])
                } else {
                    Ok(Vec::new())
                }
            }
            EffectScope::Board(scope) => {
                let mut subjects = Vec::new();
                for &id in battlefield {
                    let card = self.cards.get(id)?;
                    if scope.exclude_source && effect.source == Some(id) {
                        continue;
                    }
                    if scope.creatures_only && !card.is_creature() {
                        continue;
                    }
                    if let Some(subtype) = &scope.subtype {
                        if !card.has_subtype(subtype) {
                            continue;
                        }
                    }
                    let scope_ok = match scope.controller {
                        ControllerScope::Any => true,
                        ControllerScope::ControllerOnly => card.controller == effect.controller,
                        ControllerScope::OpponentsOnly => card.controller != effect.controller,
                    };
                    if scope_ok {
                        subjects.push(id);
                    }
                }
                Ok(subjects)
            }
        }
    }

    fn static_condition_holds(
        &self,
        condition: &StaticCondition,
        holder: CardId,
        controller: PlayerId,
    ) -> Result<bool> {
        match condition {
            StaticCondition::ControlsAnother(subtype) => {
                for id in self.battlefield.iter() {
                    if id == holder {
                        continue;
                    }
                    let card = self.cards.get(id)?;
                    if card.controller == controller && card.has_subtype(subtype) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// The cost to cast `card_name` for `caster` right now: the printed cost
    /// shifted by every live `CostModify` effect that reaches this caster.
    /// Increases apply before decreases, and each step floors the generic
    /// portion at zero. Colored pips are never modified.
    pub fn cost_to_cast(&self, caster: PlayerId, card: CardId) -> Result<ManaCost> {
        let base = self.cards.get(card)?.mana_cost;

        let mut deltas: Vec<i32> = Vec::new();
        let battlefield: Vec<CardId> = self.battlefield.iter().collect();
        for &id in &battlefield {
            let holder = self.cards.get(id)?;
            let Ok(def) = self.catalog.get(&holder.name) else {
                continue;
            };
            for ability in &def.statics {
                if let LayerKind::CostModify { delta } = ability.kind {
                    if let Some(condition) = &ability.condition {
                        if !self.static_condition_holds(condition, id, holder.controller)? {
                            continue;
                        }
                    }
                    if cost_scope_applies(ability.scope.controller, holder.controller, caster) {
                        deltas.push(delta);
                    }
                }
            }
        }
        for effect in &self.active_effects {
            if let LayerKind::CostModify { delta } = effect.kind {
                if let EffectScope::Board(scope) = &effect.scope {
                    if cost_scope_applies(scope.controller, effect.controller, caster) {
                        deltas.push(delta);
                    }
                }
            }
        }

        deltas.sort_by_key(|d| if *d > 0 { 0 } else { 1 });
        let mut cost = base;
        for delta in deltas {
            cost = cost.with_generic_delta(delta);
        }
        Ok(cost)
    }
}

/// For cost modification the board scope filters on who is casting, not on a
/// battlefield permanent.
fn cost_scope_applies(
    scope: ControllerScope,
    effect_controller: PlayerId,
    caster: PlayerId,
) -> bool {
    match scope {
        ControllerScope::Any => true,
        ControllerScope::ControllerOnly => caster == effect_controller,
        ControllerScope::OpponentsOnly => caster != effect_controller,
    }
}

fn apply_layer_kind(card: &mut Card, kind: &LayerKind) {
    match kind {
        LayerKind::TypeChange { add, remove } => {
            for t in add {
                if !card.eff_types.contains(t) {
                    card.eff_types.push(*t);
                }
            }
            card.eff_types.retain(|t| !remove.contains(t));
        }
        LayerKind::AbilityGrant { add, remove } => {
            for k in add {
                if !card.eff_keywords.contains(k) {
                    card.eff_keywords.push(*k);
                }
            }
            card.eff_keywords.retain(|k| !remove.contains(k));
        }
        LayerKind::PtSet { power, toughness } => {
            card.eff_power = Some(*power);
            card.eff_toughness = Some(*toughness);
        }
        LayerKind::PtModify { power, toughness } => {
            if let (Some(p), Some(t)) = (card.eff_power, card.eff_toughness) {
                card.eff_power = Some(p + power);
                card.eff_toughness = Some(t + toughness);
            }
        }
        LayerKind::CostModify { .. } => {}
    }
}
