//! End-to-end duels through the public API
//!
//! Drives full games with a greedy provider (play a land, cast whatever is
//! castable, attack with everything) against a passive one, and checks both
//! the outcome and that the whole run is deterministic for a fixed seed.

use manastack::catalog::{CardCatalog, CardDefinition, StaticAbility};
use manastack::core::{BoardScope, CardId, GenericPayment, Keyword, LayerKind, PlayerId, TargetRef};
use manastack::game::game_loop::stock_library;
use manastack::game::{
    AttackTarget, DecisionProvider, GameEndReason, GameLogger, GameLoop, GameState, GameStateView,
    PlayerAction, ProviderPair, ScriptedProvider, VerbosityLevel,
};
use smallvec::SmallVec;

/// Plays a land or a spell whenever it can, attacks with every eligible
/// creature, never blocks, never mulligans, never takes anything back.
struct Greedy;

impl DecisionProvider for Greedy {
    fn choose_action(
        &mut self,
        _view: &GameStateView<'_>,
        options: &[PlayerAction],
    ) -> Option<PlayerAction> {
        options
            .iter()
            .find(|a| matches!(a, PlayerAction::PlayLand(_) | PlayerAction::CastSpell(_)))
            .copied()
    }

    fn choose_targets(
        &mut self,
        _view: &GameStateView<'_>,
        _source: CardId,
        valid: &[TargetRef],
        count: usize,
    ) -> SmallVec<[TargetRef; 2]> {
        valid.iter().copied().take(count).collect()
    }

    fn choose_generic_payment(
        &mut self,
        _view: &GameStateView<'_>,
        _options: &[GenericPayment],
    ) -> usize {
        0
    }

    fn confirm(&mut self, _view: &GameStateView<'_>, _prompt: &str) -> bool {
        true
    }

    fn choose_card(
        &mut self,
        _view: &GameStateView<'_>,
        _prompt: &str,
        options: &[CardId],
    ) -> CardId {
        options[0]
    }

    fn choose_attackers(
        &mut self,
        _view: &GameStateView<'_>,
        eligible: &[CardId],
        targets: &[AttackTarget],
    ) -> SmallVec<[(CardId, AttackTarget); 4]> {
        eligible.iter().map(|&c| (c, targets[0])).collect()
    }

    fn choose_blockers(
        &mut self,
        _view: &GameStateView<'_>,
        _eligible: &[CardId],
        _attackers: &[CardId],
    ) -> SmallVec<[(CardId, CardId); 4]> {
        SmallVec::new()
    }

    fn choose_damage_order(
        &mut self,
        _view: &GameStateView<'_>,
        _attacker: CardId,
        blockers: &[CardId],
    ) -> SmallVec<[CardId; 4]> {
        blockers.iter().copied().collect()
    }

    fn mulligan(&mut self, _view: &GameStateView<'_>, _hand: &[CardId], _taken: u8) -> bool {
        false
    }

    fn choose_cards_to_bottom(
        &mut self,
        _view: &GameStateView<'_>,
        hand: &[CardId],
        count: usize,
    ) -> SmallVec<[CardId; 4]> {
        hand.iter().copied().take(count).collect()
    }
}

fn creature_catalog() -> CardCatalog {
    let mut catalog = CardCatalog::with_basic_lands();
    catalog.register(CardDefinition::creature("Grizzly Bears", "1G", 2, 2).unwrap());
    catalog.register(
        CardDefinition::creature("Serra Angel", "3WW", 4, 4)
            .unwrap()
            .with_keyword(Keyword::Flying)
            .with_keyword(Keyword::Vigilance),
    );
    catalog.register(
        CardDefinition::enchantment("Glorious Anthem", "1WW")
            .unwrap()
            .with_static(StaticAbility::new(
                LayerKind::PtModify {
                    power: 1,
                    toughness: 1,
                },
                BoardScope::own_creatures(),
                "creatures you control get +1/+1",
            )),
    );
    catalog
}

fn creature_deck() -> Vec<(&'static str, usize)> {
    vec![
        ("Forest", 10),
        ("Plains", 8),
        ("Grizzly Bears", 8),
        ("Serra Angel", 4),
        ("Glorious Anthem", 2),
    ]
}

fn run_duel(seed: u64) -> (manastack::game::GameResult, Vec<String>) {
    let mut game = GameState::new(
        std::sync::Arc::new(creature_catalog()),
        "Alice",
        "Bob",
        seed,
    );
    game.logger = GameLogger::captured(VerbosityLevel::Normal);
    for player in [PlayerId::new(0), PlayerId::new(1)] {
        stock_library(&mut game, player, &creature_deck()).unwrap();
    }

    let mut a = Greedy;
    let mut b = ScriptedProvider::passive(PlayerId::new(1));
    let providers = ProviderPair::new(&mut a, &mut b);

    let result = GameLoop::new(&mut game, providers)
        .with_max_turns(30)
        .run()
        .unwrap();
    let transcript = game
        .logger
        .entries()
        .iter()
        .map(|entry| entry.message.clone())
        .collect();
    (result, transcript)
}

#[test]
fn test_greedy_beats_passive_by_life_loss() {
    let (result, transcript) = run_duel(42);
    assert_eq!(result.winner, Some(PlayerId::new(0)));
    assert_eq!(result.reason, GameEndReason::LifeLoss);
    assert!(transcript.iter().any(|line| line.contains("wins on turn")));
}

#[test]
fn test_same_seed_same_game() {
    let (result_a, transcript_a) = run_duel(7);
    let (result_b, transcript_b) = run_duel(7);
    assert_eq!(result_a, result_b);
    assert_eq!(transcript_a, transcript_b);
}

#[test]
fn test_different_seeds_shuffle_differently() {
    let (_, transcript_a) = run_duel(1);
    let (_, transcript_b) = run_duel(2);
    // With 32-card libraries two seeds virtually never produce the same game.
    assert_ne!(transcript_a, transcript_b);
}
