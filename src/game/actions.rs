//! Player actions and stack resolution
//!
//! Everything a priority holder can do: play a land, tap for mana, cast a
//! spell, activate an ability, or take one of those back. Casting is
//! all-or-nothing: every check runs before the first mutation, so a failed
//! cast leaves the game exactly as it was.
//!
//! Resolution re-validates targets. A spell whose targets have all become
//! illegal fizzles - it goes to the graveyard doing nothing, and that is a
//! normal outcome, not an error. When only some targets are illegal the
//! surviving ones are still affected.

use crate::catalog::ActivatedAbility;
use crate::core::{
    CardId, CardType, Color, ContinuousEffect, Duration, Effect, EffectScope, Keyword, LayerKind,
    ManaCost, PlayerId, TargetFilter, TargetRef, COLORS,
};
use crate::game::decision::{GameStateView, PlayerAction, ProviderPair};
use crate::game::logger::LogCategory;
use crate::game::stack::{StackObject, StackObjectKind};
use crate::game::state::GameState;
use crate::game::triggers::{DelayedTrigger, DelayedWhen, GameEvent};
use crate::undo::UndoEntry;
use crate::zones::Zone;
use crate::{EngineError, Result};
use smallvec::SmallVec;

impl GameState {
    // ------------------------------------------------------------------
    // Action enumeration

    /// Every action `player` could legally take right now while holding
    /// priority. Ordered: lands, casts, ability activations, mana taps, undo.
    pub fn available_actions(&self, player: PlayerId) -> Result<Vec<PlayerAction>> {
        let mut actions = Vec::new();
        let sorcery_speed = self.sorcery_speed_for(player);

        if sorcery_speed && self.can_play_land(player)? {
            for &card_id in self.player_zones(player).hand.as_slice() {
                if self.cards.get(card_id)?.is_land() {
                    actions.push(PlayerAction::PlayLand(card_id));
                }
            }
        }

        for &card_id in self.player_zones(player).hand.as_slice() {
            if self.can_cast(player, card_id)? {
                actions.push(PlayerAction::CastSpell(card_id));
            }
        }

        for card_id in self.battlefield.iter() {
            let card = self.cards.get(card_id)?;
            if card.controller != player {
                continue;
            }
            let Ok(def) = self.catalog.get(&card.name) else {
                continue;
            };
            for (index, ability) in def.activated.iter().enumerate() {
                if self.can_activate(player, card_id, ability)? {
                    actions.push(PlayerAction::ActivateAbility {
                        card: card_id,
                        index,
                    });
                }
            }
            if card.is_land() && !card.tapped && def.mana_color.is_some() {
                actions.push(PlayerAction::TapForMana(card_id));
            }
        }

        if !self.player(player)?.undo_history.is_empty() {
            actions.push(PlayerAction::Undo);
        }
        Ok(actions)
    }

    /// Sorcery-speed window: this player's main phase, empty stack.
    fn sorcery_speed_for(&self, player: PlayerId) -> bool {
        self.turn.active_player == player
            && self.turn.current_step.is_main()
            && self.stack.is_empty()
    }

    fn can_play_land(&self, player: PlayerId) -> Result<bool> {
        Ok(self.player(player)?.can_play_land())
    }

    fn can_cast(&self, player: PlayerId, card_id: CardId) -> Result<bool> {
        let card = self.cards.get(card_id)?;
        if card.is_land() {
            return Ok(false);
        }
        let def = self.catalog.get(&card.name)?;
        let any_time = def.types.contains(&CardType::Instant) || card.has_keyword(Keyword::Flash);
        if !any_time && !self.sorcery_speed_for(player) {
            return Ok(false);
        }
        let cost = self.cost_to_cast(player, card_id)?;
        if !self.can_afford(player, &cost)? {
            return Ok(false);
        }
        let (count, filter) = self.spell_targeting(card_id)?;
        if count > 0 {
            let valid = self.legal_targets(player, Some(card_id), filter)?;
            if valid.len() < count {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn can_activate(
        &self,
        player: PlayerId,
        card_id: CardId,
        ability: &ActivatedAbility,
    ) -> Result<bool> {
        let card = self.cards.get(card_id)?;
        if ability.cost.tap {
            if card.tapped {
                return Ok(false);
            }
            if card.is_creature()
                && card.summoning_sick(self.turn.turn_number)
                && !card.has_keyword(Keyword::Haste)
            {
                return Ok(false);
            }
        }
        if let Some(delta) = ability.cost.loyalty {
            if !self.sorcery_speed_for(player) {
                return Ok(false);
            }
            if card.activated_this_turn {
                return Ok(false);
            }
            if delta < 0 && card.loyalty() < -delta {
                return Ok(false);
            }
        }
        if let Some(mana) = &ability.cost.mana {
            if !self.can_afford(player, mana)? {
                return Ok(false);
            }
        }
        if let Some(first_targeted) = ability.effects.iter().find(|e| e.requires_target()) {
            let filter = ability
                .target_filter
                .unwrap_or_else(|| first_targeted.default_target_filter());
            if self
                .legal_targets(player, Some(card_id), filter)?
                .is_empty()
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Turn-based and reversible actions

    /// Play a land from hand. Reversible until the next commit point.
    pub fn play_land(&mut self, player: PlayerId, card_id: CardId) -> Result<()> {
        if !self.sorcery_speed_for(player) {
            return Err(EngineError::IllegalAction(
                "lands are played at sorcery speed".to_string(),
            ));
        }
        if !self.can_play_land(player)? {
            return Err(EngineError::IllegalAction(
                "already played a land this turn".to_string(),
            ));
        }
        if !self.player_zones(player).hand.contains(card_id) {
            return Err(EngineError::IllegalAction(format!(
                "{card_id} is not in hand"
            )));
        }
        if !self.cards.get(card_id)?.is_land() {
            return Err(EngineError::IllegalAction(format!(
                "{card_id} is not a land"
            )));
        }

        let name = self.cards.get(card_id)?.name.clone();
        self.move_card(card_id, Zone::Battlefield)?;
        let p = self.player_mut(player)?;
        p.note_land_played();
        p.undo_history.push(UndoEntry::PlayLand { card: card_id });
        self.logger
            .event(LogCategory::Priority, format!("{player} plays {name}"));
        Ok(())
    }

    /// Tap a land for one mana of its color. Reversible until the next
    /// commit point.
    pub fn tap_for_mana(&mut self, player: PlayerId, card_id: CardId) -> Result<()> {
        let color = self.mana_land_color(player, card_id)?;
        self.cards.get_mut(card_id)?.tap();
        let p = self.player_mut(player)?;
        p.mana_pool.add(color);
        p.undo_history.push(UndoEntry::TapForMana {
            card: card_id,
            color,
        });
        self.logger.detail(LogCategory::Priority, || {
            format!("{player} taps {card_id} for {color}")
        });
        Ok(())
    }

    fn mana_land_color(&self, player: PlayerId, card_id: CardId) -> Result<Color> {
        let card = self.cards.get(card_id)?;
        if card.controller != player || !self.battlefield.contains(card_id) {
            return Err(EngineError::IllegalAction(format!(
                "{card_id} is not a permanent you control"
            )));
        }
        if card.tapped {
            return Err(EngineError::IllegalAction(format!(
                "{card_id} is already tapped"
            )));
        }
        self.catalog
            .get(&card.name)?
            .mana_color
            .ok_or_else(|| EngineError::IllegalAction(format!("{card_id} produces no mana")))
    }

    // ------------------------------------------------------------------
    // Casting

    /// Cast a spell from hand: pick targets, pay the (modified) cost, and put
    /// the spell on the stack. Casting is a commit point: the caster's undo
    /// history is cleared.
    pub fn cast_spell(
        &mut self,
        player: PlayerId,
        card_id: CardId,
        providers: &mut ProviderPair<'_>,
    ) -> Result<()> {
        if !self.player_zones(player).hand.contains(card_id) {
            return Err(EngineError::IllegalAction(format!(
                "{card_id} is not in hand"
            )));
        }
        if !self.can_cast(player, card_id)? {
            return Err(EngineError::IllegalAction(format!(
                "{card_id} cannot be cast right now"
            )));
        }

        let name = self.cards.get(card_id)?.name.clone();
        let cost = self.cost_to_cast(player, card_id)?;

        let (target_count, filter) = self.spell_targeting(card_id)?;
        let mut targets: SmallVec<[TargetRef; 2]> = SmallVec::new();
        if target_count > 0 {
            let valid = self.legal_targets(player, Some(card_id), filter)?;
            targets = self.ask_targets(providers, player, card_id, &valid, target_count)?;
        }

        self.pay_cost(player, &cost, providers)?;

        self.move_card(card_id, Zone::Stack)?;
        let seq = self.next_seq();
        self.stack.push(StackObject {
            seq,
            controller: player,
            source: card_id,
            targets,
            kind: StackObjectKind::Spell,
        });
        self.queue_event(GameEvent::SpellCast {
            card: card_id,
            caster: player,
        });
        self.clear_undo(player);
        self.logger.headline(
            LogCategory::Stack,
            format!("{player} casts {name} (seq {seq})"),
        );
        Ok(())
    }

    /// Activate an ability of a permanent. Paying any cost is a commit point.
    pub fn activate_ability(
        &mut self,
        player: PlayerId,
        card_id: CardId,
        index: usize,
        providers: &mut ProviderPair<'_>,
    ) -> Result<()> {
        let (name, ability) = {
            let card = self.cards.get(card_id)?;
            if card.controller != player || !self.battlefield.contains(card_id) {
                return Err(EngineError::IllegalAction(format!(
                    "{card_id} is not a permanent you control"
                )));
            }
            let def = self.catalog.get(&card.name)?;
            let ability = def.activated.get(index).ok_or_else(|| {
                EngineError::IllegalAction(format!("{} has no ability {index}", card.name))
            })?;
            (card.name.clone(), ability.clone())
        };
        if !self.can_activate(player, card_id, &ability)? {
            return Err(EngineError::IllegalAction(format!(
                "ability '{}' cannot be activated right now",
                ability.description
            )));
        }

        let mut targets: SmallVec<[TargetRef; 2]> = SmallVec::new();
        let target_count = ability
            .effects
            .iter()
            .filter(|e| e.requires_target())
            .count();
        if target_count > 0 {
            let filter = ability.target_filter.unwrap_or_else(|| {
                ability
                    .effects
                    .iter()
                    .find(|e| e.requires_target())
                    .map(|e| e.default_target_filter())
                    .unwrap_or(TargetFilter::Permanent)
            });
            let valid = self.legal_targets(player, Some(card_id), filter)?;
            targets = self.ask_targets(providers, player, card_id, &valid, target_count)?;
        }

        if ability.cost.tap {
            self.cards.get_mut(card_id)?.tap();
        }
        if let Some(mana) = &ability.cost.mana {
            self.pay_cost(player, mana, providers)?;
        }
        if let Some(delta) = ability.cost.loyalty {
            self.add_loyalty(card_id, delta)?;
            self.cards.get_mut(card_id)?.activated_this_turn = true;
        }
        self.clear_undo(player);

        let seq = self.next_seq();
        self.stack.push(StackObject {
            seq,
            controller: player,
            source: card_id,
            targets,
            kind: StackObjectKind::Activated {
                effects: ability.effects.clone(),
                description: ability.description.clone(),
            },
        });
        self.logger.event(
            LogCategory::Stack,
            format!(
                "{player} activates '{}' of {name} (seq {seq})",
                ability.description
            ),
        );
        Ok(())
    }

    /// Targeting requirements for a card cast as a spell. Auras target what
    /// they will enchant.
    fn spell_targeting(&self, card_id: CardId) -> Result<(usize, TargetFilter)> {
        let card = self.cards.get(card_id)?;
        let def = self.catalog.get(&card.name)?;
        if let Some(enchant) = def.enchant {
            return Ok((1, enchant));
        }
        let count = def.spell_target_count();
        let filter = def.target_filter.unwrap_or_else(|| {
            def.spell_effects
                .iter()
                .find(|e| e.requires_target())
                .map(|e| e.default_target_filter())
                .unwrap_or(TargetFilter::Permanent)
        });
        Ok((count, filter))
    }

    // ------------------------------------------------------------------
    // Targeting

    /// Enumerate the legal targets for a spell or ability controlled by
    /// `controller`, in a stable order: battlefield permanents first, then
    /// players.
    pub(crate) fn legal_targets(
        &self,
        controller: PlayerId,
        source: Option<CardId>,
        filter: TargetFilter,
    ) -> Result<Vec<TargetRef>> {
        let mut targets = Vec::new();
        if filter != TargetFilter::Player {
            for card_id in self.battlefield.iter() {
                let target = TargetRef::Permanent(card_id);
                if self.target_legal(target, controller, source, filter)? {
                    targets.push(target);
                }
            }
        }
        if matches!(filter, TargetFilter::Player | TargetFilter::AnyDamageable) {
            for player in &self.players {
                targets.push(TargetRef::Player(player.id));
            }
        }
        Ok(targets)
    }

    /// Legal targets for an ability's effect list (used when pushing
    /// triggered abilities).
    pub(crate) fn legal_targets_for_effects(
        &self,
        controller: PlayerId,
        source: Option<CardId>,
        effects: &[Effect],
        filter_override: Option<TargetFilter>,
    ) -> Result<Vec<TargetRef>> {
        let filter = filter_override.unwrap_or_else(|| {
            effects
                .iter()
                .find(|e| e.requires_target())
                .map(|e| e.default_target_filter())
                .unwrap_or(TargetFilter::Permanent)
        });
        self.legal_targets(controller, source, filter)
    }

    /// Whether `target` is a legal choice right now. Checked when targets are
    /// picked and again at resolution.
    pub(crate) fn target_legal(
        &self,
        target: TargetRef,
        controller: PlayerId,
        source: Option<CardId>,
        filter: TargetFilter,
    ) -> Result<bool> {
        match target {
            TargetRef::Player(_) => Ok(matches!(
                filter,
                TargetFilter::Player | TargetFilter::AnyDamageable
            )),
            TargetRef::Permanent(id) => {
                if !self.battlefield.contains(id) {
                    return Ok(false);
                }
                let card = self.cards.get(id)?;
                let shape_ok = match filter {
                    TargetFilter::Creature => card.is_creature(),
                    TargetFilter::AnyDamageable => card.is_creature() || card.is_planeswalker(),
                    TargetFilter::Permanent => true,
                    TargetFilter::Player => false,
                };
                if !shape_ok {
                    return Ok(false);
                }
                if card.has_keyword(Keyword::Shroud) {
                    return Ok(false);
                }
                if card.controller != controller && card.has_keyword(Keyword::Hexproof) {
                    return Ok(false);
                }
                if let Some(source_id) = source {
                    let source_card = self.cards.get(source_id)?;
                    for color in [
                        Color::White,
                        Color::Blue,
                        Color::Black,
                        Color::Red,
                        Color::Green,
                    ] {
                        if source_card.mana_cost.pips(color) > 0
                            && card.has_keyword(Keyword::Protection(color))
                        {
                            return Ok(false);
                        }
                    }
                }
                Ok(true)
            }
        }
    }

    /// Ask a provider for targets out of `valid`.
    pub(crate) fn ask_targets(
        &self,
        providers: &mut ProviderPair<'_>,
        chooser: PlayerId,
        source: CardId,
        valid: &[TargetRef],
        count: usize,
    ) -> Result<SmallVec<[TargetRef; 2]>> {
        let view = GameStateView::new(self, chooser);
        let chosen = providers
            .for_player(chooser)
            .choose_targets(&view, source, valid, count);
        if chosen.len() != count {
            return Err(EngineError::InvalidDecision(format!(
                "{count} targets required, {} chosen",
                chosen.len()
            )));
        }
        for t in &chosen {
            if !valid.contains(t) {
                return Err(EngineError::InvalidDecision(format!(
                    "{t:?} is not among the legal targets for {source}"
                )));
            }
        }
        Ok(chosen)
    }

    // ------------------------------------------------------------------
    // Mana payment

    /// Whether the pool plus untapped mana-producing lands cover a cost.
    fn can_afford(&self, player: PlayerId, cost: &ManaCost) -> Result<bool> {
        let mut virtual_pool = self.player(player)?.mana_pool;
        for card_id in self.battlefield.iter() {
            let card = self.cards.get(card_id)?;
            if card.controller != player || card.tapped {
                continue;
            }
            if let Ok(def) = self.catalog.get(&card.name) {
                if let Some(color) = def.mana_color {
                    virtual_pool.add(color);
                }
            }
        }
        Ok(virtual_pool.can_pay(cost))
    }

    /// Pay a cost: tap lands to cover what the pool lacks, then pay from the
    /// pool, prompting for the generic split only when more than one distinct
    /// split exists.
    fn pay_cost(
        &mut self,
        player: PlayerId,
        cost: &ManaCost,
        providers: &mut ProviderPair<'_>,
    ) -> Result<()> {
        let plan = self.plan_mana_taps(player, cost)?;
        for (card_id, color) in plan {
            self.cards.get_mut(card_id)?.tap();
            self.player_mut(player)?.mana_pool.add(color);
            self.logger.detail(LogCategory::Priority, || {
                format!("{player} taps {card_id} for {color}")
            });
        }

        let pool = self.player(player)?.mana_pool;
        let generic_from: Option<Vec<Color>> = if cost.generic > 0 {
            let mut after_pips = pool;
            for &color in &COLORS {
                for _ in 0..cost.pips(color) {
                    after_pips.remove(color);
                }
            }
            let options = after_pips.generic_payment_options(cost.generic);
            if options.len() > 1 {
                let index = {
                    let view = GameStateView::new(self, player);
                    providers
                        .for_player(player)
                        .choose_generic_payment(&view, &options)
                };
                let choice = options.get(index).ok_or_else(|| {
                    EngineError::InvalidDecision(format!(
                        "generic payment option {index} of {}",
                        options.len()
                    ))
                })?;
                Some(choice.to_vec())
            } else {
                None
            }
        } else {
            None
        };

        self.player_mut(player)?
            .mana_pool
            .pay(cost, generic_from.as_deref())
    }

    /// Decide which untapped lands to tap so the pool covers `cost`: colored
    /// deficits first, then any land for the rest. Pure planning; taps
    /// nothing.
    fn plan_mana_taps(&self, player: PlayerId, cost: &ManaCost) -> Result<Vec<(CardId, Color)>> {
        let mut available: Vec<(CardId, Color)> = Vec::new();
        for card_id in self.battlefield.iter() {
            let card = self.cards.get(card_id)?;
            if card.controller != player || card.tapped {
                continue;
            }
            if let Ok(def) = self.catalog.get(&card.name) {
                if let Some(color) = def.mana_color {
                    available.push((card_id, color));
                }
            }
        }

        let pool = self.player(player)?.mana_pool;
        let mut plan: Vec<(CardId, Color)> = Vec::new();
        for &color in &COLORS {
            let mut deficit = cost.pips(color).saturating_sub(pool.amount(color)) as usize;
            while deficit > 0 {
                let pos = available
                    .iter()
                    .position(|&(_, c)| c == color)
                    .ok_or_else(|| {
                        EngineError::IllegalAction(format!("cannot produce {color} for {cost}"))
                    })?;
                plan.push(available.remove(pos));
                deficit -= 1;
            }
        }
        let mut covered = pool.total() as usize + plan.len();
        while covered < cost.cmc() as usize {
            let next = available.pop().ok_or_else(|| {
                EngineError::IllegalAction(format!("insufficient mana for {cost}"))
            })?;
            plan.push(next);
            covered += 1;
        }
        Ok(plan)
    }

    // ------------------------------------------------------------------
    // Resolution

    /// Resolve the top object of the stack.
    pub fn resolve_top(&mut self, providers: &mut ProviderPair<'_>) -> Result<()> {
        let object = self.stack.pop().ok_or_else(|| {
            EngineError::IllegalAction("nothing on the stack to resolve".to_string())
        })?;
        self.logger.event(
            LogCategory::Stack,
            format!("resolving seq {}: {}", object.seq, object.description()),
        );

        if object.is_spell() {
            self.resolve_spell(object, providers)
        } else {
            let effects = object.ability_effects().unwrap_or(&[]).to_vec();
            self.execute_effects(
                object.controller,
                object.source,
                &effects,
                &object.targets,
                providers,
            )
        }
    }

    fn resolve_spell(
        &mut self,
        object: StackObject,
        providers: &mut ProviderPair<'_>,
    ) -> Result<()> {
        let card_id = object.source;
        let (name, def) = {
            let card = self.cards.get(card_id)?;
            (card.name.clone(), self.catalog.get(&card.name)?.clone())
        };

        // Fizzle check: a spell that required targets and has none left
        // legal goes to the graveyard with no effect.
        let (target_count, filter) = self.spell_targeting(card_id)?;
        if target_count > 0 {
            let any_legal = object.targets.iter().any(|&t| {
                self.target_legal(t, object.controller, Some(card_id), filter)
                    .unwrap_or(false)
            });
            if !any_legal {
                self.logger.event(
                    LogCategory::Stack,
                    format!("{name} fizzles: every target is illegal"),
                );
                self.move_card(card_id, Zone::Graveyard)?;
                return Ok(());
            }
        }

        if def.types.iter().any(|t| t.is_spell_only()) {
            self.execute_effects(
                object.controller,
                card_id,
                &def.spell_effects,
                &object.targets,
                providers,
            )?;
            self.move_card(card_id, Zone::Graveyard)?;
        } else {
            // A permanent spell becomes a permanent.
            if def.enchant.is_some() {
                if let Some(TargetRef::Permanent(host)) = object.targets.first() {
                    self.cards.get_mut(card_id)?.attached_to = Some(*host);
                }
            }
            self.cards.get_mut(card_id)?.controller = object.controller;
            self.move_card(card_id, Zone::Battlefield)?;
            self.logger
                .event(LogCategory::Stack, format!("{name} enters the battlefield"));
        }
        Ok(())
    }

    /// Run an effect list. Targeted effects consume chosen targets in order;
    /// an effect whose own target has become illegal is skipped, the rest
    /// still apply.
    pub(crate) fn execute_effects(
        &mut self,
        controller: PlayerId,
        source: CardId,
        effects: &[Effect],
        targets: &[TargetRef],
        providers: &mut ProviderPair<'_>,
    ) -> Result<()> {
        let mut cursor = 0usize;
        for effect in effects {
            let target = if effect.requires_target() {
                let t = targets.get(cursor).copied();
                cursor += 1;
                match t {
                    Some(t)
                        if self.target_legal(
                            t,
                            controller,
                            Some(source),
                            effect.default_target_filter(),
                        )? =>
                    {
                        Some(t)
                    }
                    _ => {
                        self.logger.detail(LogCategory::Effect, || {
                            format!("skipping {effect:?}: target gone")
                        });
                        continue;
                    }
                }
            } else {
                None
            };
            self.execute_effect(controller, source, effect, target, providers)?;
        }
        Ok(())
    }

    fn execute_effect(
        &mut self,
        controller: PlayerId,
        source: CardId,
        effect: &Effect,
        target: Option<TargetRef>,
        providers: &mut ProviderPair<'_>,
    ) -> Result<()> {
        match effect {
            Effect::DealDamage { amount } => match target {
                Some(TargetRef::Permanent(id)) => {
                    if self.cards.get(id)?.is_planeswalker() {
                        self.remove_loyalty(id, *amount)?;
                    } else {
                        self.cards.get_mut(id)?.damage_marked += amount;
                    }
                    self.logger.event(
                        LogCategory::Effect,
                        format!("{source} deals {amount} damage to {id}"),
                    );
                }
                Some(TargetRef::Player(player)) => {
                    self.player_mut(player)?.life -= amount;
                    self.queue_event(GameEvent::DamageDealtToPlayer {
                        player,
                        amount: *amount,
                    });
                    let life = self.player(player)?.life;
                    self.logger.event(
                        LogCategory::Effect,
                        format!("{source} deals {amount} damage to {player} ({life} life)"),
                    );
                }
                None => {}
            },
            Effect::DestroyPermanent => {
                if let Some(TargetRef::Permanent(id)) = target {
                    if self.cards.get(id)?.has_keyword(Keyword::Indestructible) {
                        self.logger
                            .event(LogCategory::Effect, format!("{id} is indestructible"));
                    } else {
                        self.move_card(id, Zone::Graveyard)?;
                    }
                }
            }
            Effect::TapPermanent => {
                if let Some(TargetRef::Permanent(id)) = target {
                    self.cards.get_mut(id)?.tap();
                }
            }
            Effect::UntapPermanent => {
                if let Some(TargetRef::Permanent(id)) = target {
                    self.cards.get_mut(id)?.untap();
                }
            }
            Effect::PumpTarget { power, toughness } => {
                if let Some(TargetRef::Permanent(id)) = target {
                    self.register_effect(ContinuousEffect {
                        source: Some(source),
                        controller,
                        kind: LayerKind::PtModify {
                            power: *power,
                            toughness: *toughness,
                        },
                        scope: EffectScope::Single(id),
                        duration: Duration::EndOfTurn,
                    });
                }
            }
            Effect::GrantKeywordTarget { keyword } => {
                if let Some(TargetRef::Permanent(id)) = target {
                    self.register_effect(ContinuousEffect {
                        source: Some(source),
                        controller,
                        kind: LayerKind::AbilityGrant {
                            add: smallvec::smallvec![*keyword],
                            remove: SmallVec::new(),
                        },
                        scope: EffectScope::Single(id),
                        duration: Duration::EndOfTurn,
                    });
                }
            }
            Effect::PutCounters { counter, count } => {
                if let Some(TargetRef::Permanent(id)) = target {
                    self.cards.get_mut(id)?.add_counters(counter.clone(), *count);
                }
            }
            Effect::Mill { count } => {
                if let Some(TargetRef::Player(player)) = target {
                    for _ in 0..*count {
                        match self.player_zones_mut(player).library.take_top() {
                            Some(card) => {
                                self.player_zones_mut(player).graveyard.add(card);
                            }
                            None => break,
                        }
                    }
                    self.logger
                        .event(LogCategory::Effect, format!("{player} mills {count} cards"));
                }
            }
            Effect::DrawCards { count } => {
                self.draw_cards(controller, *count as usize)?;
            }
            Effect::GainLife { amount } => {
                self.player_mut(controller)?.life += amount;
                self.logger.event(
                    LogCategory::Effect,
                    format!("{controller} gains {amount} life"),
                );
            }
            Effect::CreateToken { name } => {
                let id = self.instantiate_card(name, controller)?;
                self.move_card(id, Zone::Battlefield)?;
                self.logger.event(
                    LogCategory::Effect,
                    format!("{controller} creates a {name} token"),
                );
            }
            Effect::PreventCombatDamageToYou => {
                self.register_prevention(crate::game::layers::PreventionShield {
                    player: controller,
                    duration: Duration::EndOfTurn,
                });
                self.logger.event(
                    LogCategory::Effect,
                    format!("combat damage to {controller} is prevented this turn"),
                );
            }
            Effect::CreateEmblem { kind, scope } => {
                self.register_effect(ContinuousEffect {
                    source: None,
                    controller,
                    kind: kind.clone(),
                    scope: EffectScope::Board(scope.clone()),
                    duration: Duration::Permanent,
                });
                self.logger
                    .event(LogCategory::Effect, format!("{controller} gets an emblem"));
            }
            Effect::ScheduleAtNextEndStep { effects } => {
                self.delayed_triggers.push(DelayedTrigger {
                    when: DelayedWhen::NextEndStep,
                    controller,
                    source: Some(source),
                    effects: effects.clone(),
                    description: "at the beginning of the next end step".to_string(),
                });
            }
            Effect::SacrificeSourceUnlessPaid { cost } => {
                self.resolve_ransom(controller, source, *cost, providers)?;
            }
            Effect::TransformSource => {
                self.transform(source)?;
            }
        }
        Ok(())
    }

    /// "Sacrifice ~ unless you pay ...": ask, then pay or sacrifice.
    fn resolve_ransom(
        &mut self,
        controller: PlayerId,
        source: CardId,
        cost: ManaCost,
        providers: &mut ProviderPair<'_>,
    ) -> Result<()> {
        if !self.battlefield.contains(source) {
            return Ok(());
        }
        let name = self.cards.get(source)?.name.clone();
        let wants_to_pay = self.can_afford(controller, &cost)? && {
            let view = GameStateView::new(self, controller);
            providers
                .for_player(controller)
                .confirm(&view, &format!("pay {cost} to keep {name}?"))
        };
        if wants_to_pay {
            self.pay_cost(controller, &cost, providers)?;
            self.logger.event(
                LogCategory::Effect,
                format!("{controller} pays {cost} for {name}"),
            );
        } else {
            self.logger
                .event(LogCategory::Effect, format!("{controller} sacrifices {name}"));
            self.move_card(source, Zone::Graveyard)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CardCatalog, CardDefinition};
    use crate::game::scripted::ScriptedProvider;

    fn catalog() -> CardCatalog {
        let mut catalog = CardCatalog::with_basic_lands();
        catalog.register(CardDefinition::creature("Grizzly Bears", "1G", 2, 2).unwrap());
        catalog.register(
            CardDefinition::instant(
                "Lightning Bolt",
                "R",
                vec![Effect::DealDamage { amount: 3 }],
            )
            .unwrap(),
        );
        catalog.register(
            CardDefinition::instant("Divination Lite", "1U", vec![Effect::DrawCards { count: 2 }])
                .unwrap(),
        );
        catalog
    }

    fn pair<'a>(a: &'a mut ScriptedProvider, b: &'a mut ScriptedProvider) -> ProviderPair<'a> {
        ProviderPair::new(a, b)
    }

    #[test]
    fn test_play_land_once_per_turn() {
        let mut game = GameState::new_test(catalog());
        let p0 = PlayerId::new(0);
        let first = game.add_to_hand(p0, "Forest").unwrap();
        let second = game.add_to_hand(p0, "Forest").unwrap();
        game.turn.current_step = crate::game::Step::Main1;

        game.play_land(p0, first).unwrap();
        assert!(game.battlefield.contains(first));
        let err = game.play_land(p0, second).unwrap_err();
        assert!(matches!(err, EngineError::IllegalAction(_)));
    }

    #[test]
    fn test_cast_auto_taps_and_goes_on_stack() {
        let mut game = GameState::new_test(catalog());
        let p0 = PlayerId::new(0);
        let mountain = game.put_on_battlefield(p0, "Mountain").unwrap();
        let bolt = game.add_to_hand(p0, "Lightning Bolt").unwrap();
        let bear = game
            .put_on_battlefield(PlayerId::new(1), "Grizzly Bears")
            .unwrap();

        // Script: target index 0 (the bear) among [bear, P0, P1]
        let mut a = ScriptedProvider::new(p0, vec![0]);
        let mut b = ScriptedProvider::passive(PlayerId::new(1));
        let mut providers = pair(&mut a, &mut b);
        game.cast_spell(p0, bolt, &mut providers).unwrap();

        assert!(game.cards.get(mountain).unwrap().tapped);
        assert_eq!(game.player(p0).unwrap().mana_pool.total(), 0);
        assert_eq!(game.stack.len(), 1);
        assert_eq!(
            game.stack[0].targets.as_slice(),
            &[TargetRef::Permanent(bear)]
        );
        // Casting commits: no undo entries survive
        assert!(game.player(p0).unwrap().undo_history.is_empty());
    }

    #[test]
    fn test_resolution_is_lifo() {
        let mut game = GameState::new_test(catalog());
        let p0 = PlayerId::new(0);
        let p1 = PlayerId::new(1);
        game.put_on_battlefield(p0, "Mountain").unwrap();
        game.put_on_battlefield(p0, "Island").unwrap();
        game.put_on_battlefield(p0, "Forest").unwrap();
        let bolt = game.add_to_hand(p0, "Lightning Bolt").unwrap();
        let draw = game.add_to_hand(p0, "Divination Lite").unwrap();
        game.add_to_library(p0, "Forest").unwrap();
        game.add_to_library(p0, "Forest").unwrap();

        // Bolt targets the opposing player (index 2 of [P0, P1] offset past
        // permanents; the battlefield holds no creatures, so targets are
        // [P0, P1] and index 1 is the opponent).
        let mut a = ScriptedProvider::new(p0, vec![1]);
        let mut b = ScriptedProvider::passive(p1);
        let mut providers = pair(&mut a, &mut b);

        game.cast_spell(p0, bolt, &mut providers).unwrap();
        game.cast_spell(p0, draw, &mut providers).unwrap();
        assert_eq!(game.stack.len(), 2);
        assert!(game.stack[1].seq > game.stack[0].seq);

        // Last in, first out: the draw spell resolves before the bolt.
        game.resolve_top(&mut providers).unwrap();
        assert_eq!(game.player_zones(p0).hand.len(), 2);
        assert_eq!(game.player(p1).unwrap().life, 20);

        game.resolve_top(&mut providers).unwrap();
        assert!(game.stack.is_empty());
        assert_eq!(game.player(p1).unwrap().life, 17);
    }

    #[test]
    fn test_fizzle_goes_to_graveyard_not_error() {
        let mut game = GameState::new_test(catalog());
        let p0 = PlayerId::new(0);
        let p1 = PlayerId::new(1);
        game.put_on_battlefield(p0, "Mountain").unwrap();
        let bolt = game.add_to_hand(p0, "Lightning Bolt").unwrap();
        let bear = game.put_on_battlefield(p1, "Grizzly Bears").unwrap();

        let mut a = ScriptedProvider::new(p0, vec![0]);
        let mut b = ScriptedProvider::passive(p1);
        let mut providers = pair(&mut a, &mut b);
        game.cast_spell(p0, bolt, &mut providers).unwrap();

        // The bear leaves before the bolt resolves.
        game.move_card(bear, Zone::Graveyard).unwrap();
        game.resolve_top(&mut providers).unwrap();

        assert!(game.player_zones(p0).graveyard.contains(bolt));
        assert_eq!(game.player(p0).unwrap().life, 20);
        assert_eq!(game.player(p1).unwrap().life, 20);
        assert!(game.logger.contains("fizzles"));
    }

    #[test]
    fn test_tap_for_mana_recorded_for_undo() {
        let mut game = GameState::new_test(catalog());
        let p0 = PlayerId::new(0);
        let forest = game.put_on_battlefield(p0, "Forest").unwrap();

        game.tap_for_mana(p0, forest).unwrap();
        assert_eq!(game.player(p0).unwrap().mana_pool.green, 1);
        assert_eq!(game.player(p0).unwrap().undo_history.len(), 1);

        // Tapping the same land again is illegal
        assert!(game.tap_for_mana(p0, forest).is_err());
    }

    #[test]
    fn test_cannot_cast_without_mana() {
        let mut game = GameState::new_test(catalog());
        let p0 = PlayerId::new(0);
        let bolt = game.add_to_hand(p0, "Lightning Bolt").unwrap();
        game.put_on_battlefield(PlayerId::new(1), "Grizzly Bears")
            .unwrap();

        let mut a = ScriptedProvider::passive(p0);
        let mut b = ScriptedProvider::passive(PlayerId::new(1));
        let mut providers = pair(&mut a, &mut b);
        assert!(game.cast_spell(p0, bolt, &mut providers).is_err());
    }

    #[test]
    fn test_flash_creature_casts_on_opponents_turn() {
        let mut catalog = catalog();
        catalog.register(
            CardDefinition::creature("Ambush Viper", "1G", 2, 1)
                .unwrap()
                .with_keyword(Keyword::Flash),
        );
        let mut game = GameState::new_test(catalog);
        // It is P0's turn; P1 has no sorcery-speed window anywhere in it.
        let p1 = PlayerId::new(1);
        game.put_on_battlefield(p1, "Forest").unwrap();
        game.put_on_battlefield(p1, "Forest").unwrap();
        let viper = game.add_to_hand(p1, "Ambush Viper").unwrap();
        let bear = game.add_to_hand(p1, "Grizzly Bears").unwrap();

        let mut a = ScriptedProvider::passive(PlayerId::new(0));
        let mut b = ScriptedProvider::passive(p1);
        let mut providers = pair(&mut a, &mut b);

        // A plain creature has to wait for its controller's main phase.
        let err = game.cast_spell(p1, bear, &mut providers).unwrap_err();
        assert!(matches!(err, EngineError::IllegalAction(_)));

        game.cast_spell(p1, viper, &mut providers).unwrap();
        assert_eq!(game.stack.len(), 1);
        assert_eq!(game.stack[0].source, viper);
    }

    /// Delegates everything but always picks a target that was never offered.
    struct WildTargeter(ScriptedProvider);

    impl crate::game::decision::DecisionProvider for WildTargeter {
        fn choose_action(
            &mut self,
            view: &GameStateView<'_>,
            options: &[PlayerAction],
        ) -> Option<PlayerAction> {
            self.0.choose_action(view, options)
        }
        fn choose_targets(
            &mut self,
            _view: &GameStateView<'_>,
            _source: CardId,
            _valid: &[TargetRef],
            _count: usize,
        ) -> SmallVec<[TargetRef; 2]> {
            smallvec::smallvec![TargetRef::Permanent(CardId::new(999))]
        }
        fn choose_generic_payment(
            &mut self,
            view: &GameStateView<'_>,
            options: &[crate::core::GenericPayment],
        ) -> usize {
            self.0.choose_generic_payment(view, options)
        }
        fn confirm(&mut self, view: &GameStateView<'_>, prompt: &str) -> bool {
            self.0.confirm(view, prompt)
        }
        fn choose_card(
            &mut self,
            view: &GameStateView<'_>,
            prompt: &str,
            options: &[CardId],
        ) -> CardId {
            self.0.choose_card(view, prompt, options)
        }
        fn choose_attackers(
            &mut self,
            view: &GameStateView<'_>,
            eligible: &[CardId],
            targets: &[crate::game::combat::AttackTarget],
        ) -> SmallVec<[(CardId, crate::game::combat::AttackTarget); 4]> {
            self.0.choose_attackers(view, eligible, targets)
        }
        fn choose_blockers(
            &mut self,
            view: &GameStateView<'_>,
            eligible: &[CardId],
            attackers: &[CardId],
        ) -> SmallVec<[(CardId, CardId); 4]> {
            self.0.choose_blockers(view, eligible, attackers)
        }
        fn choose_damage_order(
            &mut self,
            view: &GameStateView<'_>,
            attacker: CardId,
            blockers: &[CardId],
        ) -> SmallVec<[CardId; 4]> {
            self.0.choose_damage_order(view, attacker, blockers)
        }
        fn mulligan(&mut self, view: &GameStateView<'_>, hand: &[CardId], taken: u8) -> bool {
            self.0.mulligan(view, hand, taken)
        }
        fn choose_cards_to_bottom(
            &mut self,
            view: &GameStateView<'_>,
            hand: &[CardId],
            count: usize,
        ) -> SmallVec<[CardId; 4]> {
            self.0.choose_cards_to_bottom(view, hand, count)
        }
    }

    #[test]
    fn test_ability_rejects_target_outside_offered_set() {
        use crate::catalog::{AbilityCost, ActivatedAbility};

        let mut catalog = catalog();
        catalog.register(
            CardDefinition::creature("Prodigal Pyromancer", "2R", 1, 1)
                .unwrap()
                .with_activated(ActivatedAbility::new(
                    AbilityCost {
                        tap: true,
                        mana: None,
                        loyalty: None,
                    },
                    vec![Effect::DealDamage { amount: 1 }],
                    "deal 1 damage to any target",
                )),
        );
        let mut game = GameState::new_test(catalog);
        let p0 = PlayerId::new(0);
        let pinger = game.put_on_battlefield(p0, "Prodigal Pyromancer").unwrap();
        game.cards.get_mut(pinger).unwrap().turn_entered_battlefield = None;

        let mut a = WildTargeter(ScriptedProvider::passive(p0));
        let mut b = ScriptedProvider::passive(PlayerId::new(1));
        let mut providers = ProviderPair::new(&mut a, &mut b);
        let err = game
            .activate_ability(p0, pinger, 0, &mut providers)
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidDecision(_)));
        // Rejected before any cost was paid.
        assert!(!game.cards.get(pinger).unwrap().tapped);
        assert!(game.stack.is_empty());
    }

    #[test]
    fn test_hexproof_blocks_opposing_targets_only() {
        let mut catalog = catalog();
        catalog.register(
            CardDefinition::creature("Shy Bear", "1G", 2, 2)
                .unwrap()
                .with_keyword(Keyword::Hexproof),
        );
        let mut game = GameState::new_test(catalog);
        let p0 = PlayerId::new(0);
        let p1 = PlayerId::new(1);
        let shy = game.put_on_battlefield(p1, "Shy Bear").unwrap();

        let from_opponent = game.legal_targets(p0, None, TargetFilter::Creature).unwrap();
        assert!(!from_opponent.contains(&TargetRef::Permanent(shy)));

        let from_controller = game.legal_targets(p1, None, TargetFilter::Creature).unwrap();
        assert!(from_controller.contains(&TargetRef::Permanent(shy)));
    }
}
