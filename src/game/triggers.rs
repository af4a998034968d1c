//! Trigger collection
//!
//! Mutations queue [`GameEvent`]s; after each mutation batch the collector
//! drains the queue, scans for triggered abilities that match, and pushes
//! them onto the stack in APNAP order: the active player's triggers go on
//! first, so the non-active player's resolve first (CR 603.3b).
//!
//! A dead card's own death triggers still fire - the "narrow pass" checks
//! the event's subject directly, since it is no longer on the battlefield
//! when the scan runs.

use crate::catalog::{TriggerCondition, TriggeredAbility};
use crate::core::{CardId, Effect, ManaCost, PlayerId, TargetRef};
use crate::game::decision::ProviderPair;
use crate::game::logger::LogCategory;
use crate::game::stack::{StackObject, StackObjectKind};
use crate::game::state::GameState;
use crate::Result;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Something that happened since the last collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    EnteredBattlefield { card: CardId, controller: PlayerId },
    LeftBattlefield { card: CardId },
    Died { card: CardId, controller: PlayerId, was_creature: bool },
    SpellCast { card: CardId, caster: PlayerId },
    AttackDeclared { attacker: CardId },
    BeginningOfUpkeep { player: PlayerId },
    BeginningOfEndStep { player: PlayerId },
    DamageDealtToPlayer { player: PlayerId, amount: i32 },
}

/// What a delayed trigger waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayedWhen {
    /// The beginning of the next end step, whoever's turn it is.
    NextEndStep,
    /// The beginning of this player's next upkeep (echo).
    UpkeepOf(PlayerId),
}

/// A one-shot trigger registered by a resolved effect. Consumed exactly once
/// when its moment arrives, then gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedTrigger {
    pub when: DelayedWhen,
    pub controller: PlayerId,
    /// Source permanent, if any; the trigger dies with it.
    pub source: Option<CardId>,
    pub effects: Vec<Effect>,
    pub description: String,
}

impl DelayedTrigger {
    pub fn echo(card: CardId, controller: PlayerId, cost: ManaCost) -> Self {
        DelayedTrigger {
            when: DelayedWhen::UpkeepOf(controller),
            controller,
            source: Some(card),
            effects: vec![Effect::SacrificeSourceUnlessPaid { cost }],
            description: format!("echo {cost}"),
        }
    }

    fn fires_on(&self, event: &GameEvent) -> bool {
        match self.when {
            DelayedWhen::NextEndStep => {
                matches!(event, GameEvent::BeginningOfEndStep { .. })
            }
            DelayedWhen::UpkeepOf(player) => {
                matches!(event, GameEvent::BeginningOfUpkeep { player: p } if *p == player)
            }
        }
    }
}

/// A matched trigger waiting to be pushed.
struct PendingTrigger {
    source: CardId,
    controller: PlayerId,
    ability: TriggeredAbility,
}

impl GameState {
    /// Drain pending events and push every matching trigger onto the stack.
    /// Returns the number of objects pushed.
    pub fn collect_triggers(&mut self, providers: &mut ProviderPair<'_>) -> Result<u32> {
        let mut pushed = 0;
        // Events raised while pushing triggers (none today, but target
        // choice is provider code) are collected on the next pass.
        let events = std::mem::take(&mut self.pending_events);
        for event in events {
            pushed += self.collect_for_event(&event, providers)?;
        }
        Ok(pushed)
    }

    fn collect_for_event(
        &mut self,
        event: &GameEvent,
        providers: &mut ProviderPair<'_>,
    ) -> Result<u32> {
        let mut per_player: [Vec<PendingTrigger>; 2] = [Vec::new(), Vec::new()];

        // Battlefield scan, in battlefield order.
        for card_id in self.battlefield.iter().collect::<Vec<_>>() {
            let card = self.cards.get(card_id)?;
            let controller = card.controller;
            let Ok(def) = self.catalog.get(&card.name) else {
                continue;
            };
            for ability in &def.triggered {
                if self.condition_matches(&ability.condition, event, card_id, controller)? {
                    per_player[controller.as_index()].push(PendingTrigger {
                        source: card_id,
                        controller,
                        ability: ability.clone(),
                    });
                }
            }
        }

        // Narrow pass: the subject of a death event looks back from the
        // graveyard for its own death triggers.
        if let GameEvent::Died { card, controller, .. } = *event {
            if let Ok(dead) = self.cards.get(card) {
                if let Ok(def) = self.catalog.get(&dead.name) {
                    for ability in &def.triggered {
                        let applies = matches!(ability.condition, TriggerCondition::SelfDies)
                            || (ability.functions_from_graveyard
                                && self.condition_matches(
                                    &ability.condition,
                                    event,
                                    card,
                                    controller,
                                )?);
                        if applies {
                            per_player[controller.as_index()].push(PendingTrigger {
                                source: card,
                                controller,
                                ability: ability.clone(),
                            });
                        }
                    }
                }
            }
        }

        // Delayed triggers fire once and are removed before pushing.
        let mut fired: Vec<DelayedTrigger> = Vec::new();
        self.delayed_triggers.retain(|dt| {
            if dt.fires_on(event) {
                fired.push(dt.clone());
                false
            } else {
                true
            }
        });
        for dt in fired {
            // Every registration path records the scheduling card as source,
            // so a sourceless entry only means the source was pruned already.
            if let Some(source) = dt.source {
                per_player[dt.controller.as_index()].push(PendingTrigger {
                    source,
                    controller: dt.controller,
                    ability: TriggeredAbility::new(
                        TriggerCondition::SelfEntersBattlefield, // placeholder; never re-checked
                        dt.effects,
                        &dt.description,
                    ),
                });
            }
        }

        // APNAP: active player's triggers pushed first, resolve last.
        let mut pushed = 0;
        for player in self.apnap_order() {
            let pending = std::mem::take(&mut per_player[player.as_index()]);
            for trigger in pending {
                if self.push_trigger(trigger, providers)? {
                    pushed += 1;
                }
            }
        }
        Ok(pushed)
    }

    fn condition_matches(
        &self,
        condition: &TriggerCondition,
        event: &GameEvent,
        holder: CardId,
        holder_controller: PlayerId,
    ) -> Result<bool> {
        let matches = match (condition, event) {
            (
                TriggerCondition::SelfEntersBattlefield,
                GameEvent::EnteredBattlefield { card, .. },
            ) => *card == holder,
            (
                TriggerCondition::CreatureEnters { yours_only },
                GameEvent::EnteredBattlefield { card, controller },
            ) => {
                let entering_is_creature = self
                    .cards
                    .get(*card)
                    .map(|c| c.is_creature())
                    .unwrap_or(false);
                entering_is_creature && (!yours_only || *controller == holder_controller)
            }
            (TriggerCondition::SelfDies, GameEvent::Died { card, .. }) => *card == holder,
            (TriggerCondition::AnyCreatureDies, GameEvent::Died { was_creature, .. }) => {
                *was_creature
            }
            (TriggerCondition::SelfAttacks, GameEvent::AttackDeclared { attacker }) => {
                *attacker == holder
            }
            (
                TriggerCondition::BeginningOfYourUpkeep,
                GameEvent::BeginningOfUpkeep { player },
            ) => *player == holder_controller,
            _ => false,
        };
        Ok(matches)
    }

    /// Put one triggered ability on the stack, asking its controller for
    /// targets if it needs any. A trigger with no legal targets is dropped
    /// (it never reaches the stack).
    fn push_trigger(
        &mut self,
        trigger: PendingTrigger,
        providers: &mut ProviderPair<'_>,
    ) -> Result<bool> {
        let target_count = trigger
            .ability
            .effects
            .iter()
            .filter(|e| e.requires_target())
            .count();

        let mut targets: SmallVec<[TargetRef; 2]> = SmallVec::new();
        if target_count > 0 {
            let valid = self.legal_targets_for_effects(
                trigger.controller,
                Some(trigger.source),
                &trigger.ability.effects,
                trigger.ability.target_filter,
            )?;
            if valid.is_empty() {
                self.logger.event(
                    LogCategory::Stack,
                    format!(
                        "trigger '{}' dropped: no legal targets",
                        trigger.ability.description
                    ),
                );
                return Ok(false);
            }
            targets = self.ask_targets(
                providers,
                trigger.controller,
                trigger.source,
                &valid,
                target_count,
            )?;
        }

        let seq = self.next_seq();
        let description = trigger.ability.description.clone();
        self.stack.push(StackObject {
            seq,
            controller: trigger.controller,
            source: trigger.source,
            targets,
            kind: StackObjectKind::Triggered {
                effects: trigger.ability.effects,
                description: description.clone(),
            },
        });
        self.logger.event(
            LogCategory::Stack,
            format!("trigger '{description}' goes on the stack (seq {seq})"),
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delayed_trigger_matching() {
        let echo = DelayedTrigger::echo(
            CardId::new(3),
            PlayerId::new(0),
            ManaCost::from_string("2").unwrap(),
        );
        assert!(echo.fires_on(&GameEvent::BeginningOfUpkeep {
            player: PlayerId::new(0)
        }));
        assert!(!echo.fires_on(&GameEvent::BeginningOfUpkeep {
            player: PlayerId::new(1)
        }));
        assert!(!echo.fires_on(&GameEvent::BeginningOfEndStep {
            player: PlayerId::new(0)
        }));

        let eot = DelayedTrigger {
            when: DelayedWhen::NextEndStep,
            controller: PlayerId::new(1),
            source: Some(CardId::new(9)),
            effects: vec![Effect::GainLife { amount: 1 }],
            description: "at end of turn".to_string(),
        };
        assert!(eot.fires_on(&GameEvent::BeginningOfEndStep {
            player: PlayerId::new(0)
        }));
    }

    #[test]
    fn test_active_players_triggers_resolve_last() {
        use crate::catalog::{CardCatalog, CardDefinition};
        use crate::game::scripted::ScriptedProvider;
        use crate::zones::Zone;

        let mut catalog = CardCatalog::with_basic_lands();
        catalog.register(CardDefinition::creature("Grizzly Bears", "1G", 2, 2).unwrap());
        catalog.register(
            CardDefinition::creature("Mourner", "1W", 1, 1)
                .unwrap()
                .with_triggered(TriggeredAbility::new(
                    TriggerCondition::AnyCreatureDies,
                    vec![Effect::GainLife { amount: 1 }],
                    "whenever a creature dies, you gain 1 life",
                )),
        );
        let mut game = GameState::new_test(catalog);
        let p0 = PlayerId::new(0);
        let p1 = PlayerId::new(1);
        let mine = game.put_on_battlefield(p0, "Mourner").unwrap();
        let theirs = game.put_on_battlefield(p1, "Mourner").unwrap();
        let bear = game.put_on_battlefield(p0, "Grizzly Bears").unwrap();
        game.pending_events.clear();
        game.move_card(bear, Zone::Graveyard).unwrap();

        let mut a = ScriptedProvider::passive(p0);
        let mut b = ScriptedProvider::passive(p1);
        let mut pair = ProviderPair::new(&mut a, &mut b);
        assert_eq!(game.collect_triggers(&mut pair).unwrap(), 2);

        // The active player's trigger goes on first, so it resolves last.
        assert_eq!(game.stack[0].controller, p0);
        assert_eq!(game.stack[0].source, mine);
        assert_eq!(game.stack[1].controller, p1);
        assert_eq!(game.stack[1].source, theirs);
    }

    #[test]
    fn test_delayed_trigger_fires_once_then_gone() {
        use crate::catalog::CardCatalog;
        use crate::game::scripted::ScriptedProvider;

        let mut game = GameState::new_test(CardCatalog::with_basic_lands());
        let p0 = PlayerId::new(0);
        let forest = game.put_on_battlefield(p0, "Forest").unwrap();
        game.delayed_triggers.push(DelayedTrigger {
            when: DelayedWhen::NextEndStep,
            controller: p0,
            source: Some(forest),
            effects: vec![Effect::GainLife { amount: 2 }],
            description: "at the beginning of the next end step".to_string(),
        });

        let mut a = ScriptedProvider::passive(p0);
        let mut b = ScriptedProvider::passive(PlayerId::new(1));
        let mut pair = ProviderPair::new(&mut a, &mut b);

        game.queue_event(GameEvent::BeginningOfEndStep { player: p0 });
        assert_eq!(game.collect_triggers(&mut pair).unwrap(), 1);
        assert!(game.delayed_triggers.is_empty());
        assert_eq!(game.stack.len(), 1);

        // The next end step finds nothing left to fire.
        game.queue_event(GameEvent::BeginningOfEndStep { player: p0 });
        assert_eq!(game.collect_triggers(&mut pair).unwrap(), 0);
        assert_eq!(game.stack.len(), 1);
    }
}
