//! Stack objects
//!
//! The stack itself is a plain `Vec<StackObject>` on `GameState` (last
//! element is the top). Each object carries a monotonically increasing
//! sequence number so logs and tests can assert LIFO resolution order
//! without caring about ids.

use crate::core::{CardId, Effect, PlayerId, TargetRef};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// What kind of object is on the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StackObjectKind {
    /// A spell: the card itself moved to the stack when cast. On resolution
    /// it goes to the battlefield (permanents) or graveyard
    /// (instants/sorceries), and to the graveyard if it fizzles.
    Spell,
    /// A triggered ability. The source card stays where it is; only the
    /// ability resolves.
    Triggered { effects: Vec<Effect>, description: String },
    /// An activated ability, costs already paid.
    Activated { effects: Vec<Effect>, description: String },
}

/// One object waiting to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackObject {
    /// Cast/trigger order; strictly increasing over the whole game.
    pub seq: u64,
    pub controller: PlayerId,
    /// The spell card, or the ability's source.
    pub source: CardId,
    /// Chosen targets, validated when chosen and re-validated at resolution.
    pub targets: SmallVec<[TargetRef; 2]>,
    pub kind: StackObjectKind,
}

impl StackObject {
    pub fn is_spell(&self) -> bool {
        matches!(self.kind, StackObjectKind::Spell)
    }

    /// The effects this object performs when it resolves. For spells the
    /// caller reads them off the card's definition.
    pub fn ability_effects(&self) -> Option<&[Effect]> {
        match &self.kind {
            StackObjectKind::Spell => None,
            StackObjectKind::Triggered { effects, .. }
            | StackObjectKind::Activated { effects, .. } => Some(effects),
        }
    }

    pub fn description(&self) -> &str {
        match &self.kind {
            StackObjectKind::Spell => "spell",
            StackObjectKind::Triggered { description, .. }
            | StackObjectKind::Activated { description, .. } => description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_object_kinds() {
        let spell = StackObject {
            seq: 0,
            controller: PlayerId::new(0),
            source: CardId::new(1),
            targets: SmallVec::new(),
            kind: StackObjectKind::Spell,
        };
        assert!(spell.is_spell());
        assert!(spell.ability_effects().is_none());

        let trigger = StackObject {
            seq: 1,
            controller: PlayerId::new(1),
            source: CardId::new(2),
            targets: SmallVec::new(),
            kind: StackObjectKind::Triggered {
                effects: vec![Effect::DrawCards { count: 1 }],
                description: "draw a card".to_string(),
            },
        };
        assert!(!trigger.is_spell());
        assert_eq!(trigger.ability_effects().unwrap().len(), 1);
    }
}
