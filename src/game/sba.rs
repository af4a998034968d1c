//! State-based actions
//!
//! After any batch of mutations, the engine sweeps the whole game state for
//! conditions that demand automatic cleanup (CR 704): dead creatures, spent
//! planeswalkers, orphaned auras, duplicate legends, zero-life players. Each
//! sweep applies everything it found, recomputes continuous effects, and
//! sweeps again until a pass finds nothing. The loop is capped; hitting the
//! cap means some action keeps re-creating the condition it fixes, which is
//! an engine bug, not a game state.

use crate::core::{CardId, Keyword, LossReason, PlayerId, TargetFilter};
use crate::game::decision::{GameStateView, ProviderPair};
use crate::game::logger::LogCategory;
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::{EngineError, Result};
use rustc_hash::FxHashMap;

/// Pass ceiling before the loop is declared divergent.
const SBA_ITERATION_CAP: u32 = 50;

/// One corrective action found by a sweep.
#[derive(Debug)]
enum SbaAction {
    PlayerLoses { player: PlayerId, reason: LossReason },
    ToGraveyard { card: CardId, note: &'static str },
    TokenCeases { card: CardId, zone: Zone },
}

impl GameState {
    /// Run state-based actions to fixpoint. Returns the number of individual
    /// actions applied across all passes.
    pub fn check_state_based_actions(&mut self, providers: &mut ProviderPair<'_>) -> Result<u32> {
        let mut total = 0;
        for _ in 0..SBA_ITERATION_CAP {
            let actions = self.sba_sweep(providers)?;
            if actions.is_empty() {
                return Ok(total);
            }
            total += actions.len() as u32;
            for action in actions {
                self.apply_sba(action)?;
            }
            // Corrections can change what static abilities see.
            self.recompute_effects()?;
        }
        Err(EngineError::StateInconsistency(format!(
            "state-based actions did not converge after {SBA_ITERATION_CAP} passes"
        )))
    }

    fn sba_sweep(&self, providers: &mut ProviderPair<'_>) -> Result<Vec<SbaAction>> {
        let mut actions = Vec::new();

        for player in &self.players {
            if player.lost.is_some() {
                continue;
            }
            if player.life <= 0 {
                actions.push(SbaAction::PlayerLoses {
                    player: player.id,
                    reason: LossReason::LifeLoss,
                });
            } else if player.drew_from_empty_library {
                actions.push(SbaAction::PlayerLoses {
                    player: player.id,
                    reason: LossReason::Decking,
                });
            }
        }

        for id in self.battlefield.iter() {
            let card = self.cards.get(id)?;

            if card.is_creature() {
                let toughness = card.toughness();
                if toughness <= 0 {
                    actions.push(SbaAction::ToGraveyard {
                        card: id,
                        note: "zero toughness",
                    });
                    continue;
                }
                let indestructible = card.has_keyword(Keyword::Indestructible);
                if !indestructible && card.damage_marked >= toughness {
                    actions.push(SbaAction::ToGraveyard {
                        card: id,
                        note: "lethal damage",
                    });
                    continue;
                }
                if !indestructible && card.deathtouched && card.damage_marked > 0 {
                    actions.push(SbaAction::ToGraveyard {
                        card: id,
                        note: "deathtouch",
                    });
                    continue;
                }
            }

            if card.is_planeswalker() && card.loyalty() <= 0 {
                actions.push(SbaAction::ToGraveyard {
                    card: id,
                    note: "no loyalty",
                });
                continue;
            }

            if card.is_aura() && !self.aura_attachment_legal(id)? {
                actions.push(SbaAction::ToGraveyard {
                    card: id,
                    note: "illegal attachment",
                });
            }
        }

        self.check_legend_rule(providers, &mut actions)?;

        // Tokens that ended up in any non-battlefield zone cease to exist.
        for zones in &self.zones {
            for zone in [Zone::Library, Zone::Hand, Zone::Graveyard, Zone::Exile] {
                if let Some(cards) = zones.zone(zone) {
                    for id in cards.iter() {
                        if self.cards.get(id)?.is_token {
                            actions.push(SbaAction::TokenCeases { card: id, zone });
                        }
                    }
                }
            }
        }

        Ok(actions)
    }

    /// Duplicate legendary permanents with the same name under one controller:
    /// that controller picks a survivor, the rest go to the graveyard.
    fn check_legend_rule(
        &self,
        providers: &mut ProviderPair<'_>,
        actions: &mut Vec<SbaAction>,
    ) -> Result<()> {
        let mut groups: FxHashMap<(PlayerId, &str), Vec<CardId>> = FxHashMap::default();
        for id in self.battlefield.iter() {
            let card = self.cards.get(id)?;
            if card.legendary {
                groups
                    .entry((card.controller, card.name.as_str()))
                    .or_default()
                    .push(id);
            }
        }
        let mut duplicated: Vec<((PlayerId, &str), Vec<CardId>)> = groups
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .collect();
        // Hash order is not deterministic; decision prompts must be.
        duplicated.sort_by_key(|(_, ids)| ids[0]);

        for ((controller, name), ids) in duplicated {
            let survivor = {
                let view = GameStateView::new(self, controller);
                providers
                    .for_player(controller)
                    .choose_card(&view, &format!("keep one '{name}'"), &ids)
            };
            for id in ids {
                if id != survivor {
                    actions.push(SbaAction::ToGraveyard {
                        card: id,
                        note: "legend rule",
                    });
                }
            }
        }
        Ok(())
    }

    fn aura_attachment_legal(&self, aura: CardId) -> Result<bool> {
        let card = self.cards.get(aura)?;
        let Some(host) = card.attached_to else {
            return Ok(false);
        };
        if !self.battlefield.contains(host) {
            return Ok(false);
        }
        let filter = self
            .catalog
            .get(&card.name)
            .ok()
            .and_then(|def| def.enchant)
            .unwrap_or(TargetFilter::Permanent);
        let host_card = self.cards.get(host)?;
        let legal = match filter {
            TargetFilter::Creature => host_card.is_creature(),
            TargetFilter::Permanent | TargetFilter::AnyDamageable => true,
            TargetFilter::Player => false,
        };
        Ok(legal)
    }

    fn apply_sba(&mut self, action: SbaAction) -> Result<()> {
        match action {
            SbaAction::PlayerLoses { player, reason } => {
                let name = self.player(player)?.name.clone();
                self.player_mut(player)?.lost = Some(reason);
                self.logger.headline(
                    LogCategory::Sba,
                    format!("{name} loses the game ({reason:?})"),
                );
            }
            SbaAction::ToGraveyard { card, note } => {
                let name = self.cards.get(card)?.name.clone();
                self.logger
                    .event(LogCategory::Sba, format!("{name} {card} dies: {note}"));
                self.move_card(card, Zone::Graveyard)?;
            }
            SbaAction::TokenCeases { card, zone } => {
                let owner = self.cards.get(card)?.owner;
                if let Some(cards) = self.player_zones_mut(owner).zone_mut(zone) {
                    cards.remove(card);
                }
                self.logger.detail(LogCategory::Sba, || {
                    format!("token {card} ceases to exist")
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CardCatalog, CardDefinition};
    use crate::core::CounterType;
    use crate::game::scripted::ScriptedProvider;
    
    fn test_catalog() -> CardCatalog {
        let mut catalog = CardCatalog::with_basic_lands();
        catalog.register(CardDefinition::creature("Grizzly Bears", "1G", 2, 2).unwrap());
        catalog.register(
            CardDefinition::creature("Legendary Bear", "2GG", 4, 4)
                .unwrap()
                .as_legendary(),
        );
        catalog
    }

    #[test]
    fn test_lethal_damage_destroys() {
        let mut game = GameState::new_test(test_catalog());
        let p0 = PlayerId::new(0);
        let bear = game.put_on_battlefield(p0, "Grizzly Bears").unwrap();
        game.cards.get_mut(bear).unwrap().damage_marked = 2;

        let mut a = ScriptedProvider::passive(PlayerId::new(0));
        let mut b = ScriptedProvider::passive(PlayerId::new(1));
        let mut pair = ProviderPair::new(&mut a, &mut b);
        let applied = game.check_state_based_actions(&mut pair).unwrap();
        assert!(applied >= 1);
        assert!(!game.battlefield.contains(bear));
        assert!(game.player_zones(p0).graveyard.contains(bear));
    }

    #[test]
    fn test_minus_counters_kill_without_damage() {
        let mut game = GameState::new_test(test_catalog());
        let p0 = PlayerId::new(0);
        let bear = game.put_on_battlefield(p0, "Grizzly Bears").unwrap();
        game.cards
            .get_mut(bear)
            .unwrap()
            .add_counters(CounterType::minus_one_minus_one(), 2);

        let mut a = ScriptedProvider::passive(PlayerId::new(0));
        let mut b = ScriptedProvider::passive(PlayerId::new(1));
        let mut pair = ProviderPair::new(&mut a, &mut b);
        game.check_state_based_actions(&mut pair).unwrap();
        assert!(!game.battlefield.contains(bear));
    }

    #[test]
    fn test_legend_rule_keeps_chosen_copy() {
        let mut game = GameState::new_test(test_catalog());
        let p0 = PlayerId::new(0);
        let first = game.put_on_battlefield(p0, "Legendary Bear").unwrap();
        let second = game.put_on_battlefield(p0, "Legendary Bear").unwrap();

        // Script picks index 0 of [first, second]: the older copy survives.
        let mut a = ScriptedProvider::new(PlayerId::new(0), vec![0]);
        let mut b = ScriptedProvider::passive(PlayerId::new(1));
        let mut pair = ProviderPair::new(&mut a, &mut b);
        game.check_state_based_actions(&mut pair).unwrap();
        assert!(game.battlefield.contains(first));
        assert!(!game.battlefield.contains(second));
    }

    #[test]
    fn test_second_run_finds_nothing() {
        let mut game = GameState::new_test(test_catalog());
        let p0 = PlayerId::new(0);
        let p1 = PlayerId::new(1);
        let bear = game.put_on_battlefield(p0, "Grizzly Bears").unwrap();
        game.cards.get_mut(bear).unwrap().damage_marked = 5;
        game.player_mut(p1).unwrap().life = -2;

        let mut a = ScriptedProvider::passive(p0);
        let mut b = ScriptedProvider::passive(p1);
        let mut pair = ProviderPair::new(&mut a, &mut b);
        assert!(game.check_state_based_actions(&mut pair).unwrap() >= 2);
        // The fixpoint holds: a fresh run over the corrected state is a no-op.
        assert_eq!(game.check_state_based_actions(&mut pair).unwrap(), 0);
    }

    #[test]
    fn test_life_zero_is_a_loss() {
        let mut game = GameState::new_test(test_catalog());
        let p1 = PlayerId::new(1);
        game.player_mut(p1).unwrap().life = 0;

        let mut a = ScriptedProvider::passive(PlayerId::new(0));
        let mut b = ScriptedProvider::passive(PlayerId::new(1));
        let mut pair = ProviderPair::new(&mut a, &mut b);
        game.check_state_based_actions(&mut pair).unwrap();
        assert_eq!(game.player(p1).unwrap().lost, Some(LossReason::LifeLoss));
    }
}
