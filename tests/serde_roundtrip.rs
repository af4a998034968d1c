//! Serialization round-trips for the value types a driver would persist:
//! card definitions, stack objects, combat declarations, and pending
//! triggers. Focused on the shapes that carry nested enums, not a grid over
//! every type.

use manastack::catalog::{CardDefinition, TriggerCondition, TriggeredAbility};
use manastack::core::{
    BoardScope, ContinuousEffect, Duration, Effect, EffectScope, Keyword, LayerKind, ManaCost,
    PlayerId, TargetFilter, TargetRef,
};
use manastack::core::{CardId, Color};
use manastack::game::stack::{StackObject, StackObjectKind};
use manastack::game::{AttackTarget, CombatState, DelayedTrigger, GameEvent};
use smallvec::smallvec;

#[test]
fn test_card_definition_roundtrip() {
    let def = CardDefinition::creature("Sample Wurm", "4GG", 6, 6)
        .unwrap()
        .with_keyword(Keyword::Trample)
        .with_subtype("Wurm")
        .with_triggered(TriggeredAbility::new(
            TriggerCondition::SelfDies,
            vec![Effect::GainLife { amount: 6 }],
            "when this dies, gain 6 life",
        ));

    let json = serde_json::to_string(&def).unwrap();
    let back: CardDefinition = serde_json::from_str(&json).unwrap();
    assert_eq!(def, back);
}

#[test]
fn test_stack_object_roundtrip() {
    let object = StackObject {
        seq: 17,
        controller: PlayerId::new(1),
        source: CardId::new(5),
        targets: smallvec![
            TargetRef::Permanent(CardId::new(3)),
            TargetRef::Player(PlayerId::new(0)),
        ],
        kind: StackObjectKind::Triggered {
            effects: vec![Effect::DealDamage { amount: 2 }],
            description: "deals 2 damage".to_string(),
        },
    };

    let json = serde_json::to_string(&object).unwrap();
    let back: StackObject = serde_json::from_str(&json).unwrap();
    assert_eq!(object, back);
}

#[test]
fn test_combat_state_roundtrip() {
    let mut combat = CombatState::new();
    combat.declare_attacker(CardId::new(1), AttackTarget::Player(PlayerId::new(1)));
    combat.declare_attacker(CardId::new(2), AttackTarget::Planeswalker(CardId::new(9)));
    combat.declare_blocker(CardId::new(4), CardId::new(1));
    combat.declare_blocker(CardId::new(5), CardId::new(1));

    let json = serde_json::to_string(&combat).unwrap();
    let back: CombatState = serde_json::from_str(&json).unwrap();
    assert_eq!(combat.attackers, back.attackers);
    assert_eq!(combat.blockers, back.blockers);
    assert_eq!(combat.damage_order, back.damage_order);
    assert_eq!(combat.active, back.active);
}

#[test]
fn test_delayed_trigger_roundtrip() {
    let echo = DelayedTrigger::echo(
        CardId::new(7),
        PlayerId::new(0),
        ManaCost::from_string("3GG").unwrap(),
    );

    let json = serde_json::to_string(&echo).unwrap();
    let back: DelayedTrigger = serde_json::from_str(&json).unwrap();
    assert_eq!(echo, back);
}

#[test]
fn test_continuous_effect_roundtrip() {
    let anthem = ContinuousEffect {
        source: Some(CardId::new(11)),
        controller: PlayerId::new(0),
        kind: LayerKind::PtModify {
            power: 1,
            toughness: 1,
        },
        scope: EffectScope::Board(BoardScope::own_creatures()),
        duration: Duration::UntilTurn(5),
    };

    let json = serde_json::to_string(&anthem).unwrap();
    let back: ContinuousEffect = serde_json::from_str(&json).unwrap();
    assert_eq!(anthem, back);
}

#[test]
fn test_event_and_filter_roundtrip() {
    let event = GameEvent::Died {
        card: CardId::new(2),
        controller: PlayerId::new(1),
        was_creature: true,
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: GameEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(event, back);

    let filter = TargetFilter::AnyDamageable;
    let json = serde_json::to_string(&filter).unwrap();
    assert_eq!(filter, serde_json::from_str(&json).unwrap());

    let protection = Keyword::Protection(Color::Red);
    let json = serde_json::to_string(&protection).unwrap();
    assert_eq!(protection, serde_json::from_str::<Keyword>(&json).unwrap());
}
