//! Bounded per-player undo of reversible actions
//!
//! A player may take back their own recent free actions - tapping a land for
//! mana, playing a land - up until they commit to something irreversible
//! (casting a spell, passing priority), at which point the history is
//! cleared. The history is bounded; the oldest entry falls off when full.
//!
//! Applying an inverse first checks that the current state still matches what
//! the inverse expects (the card is still tapped, the mana is still in the
//! pool). A mismatch means hidden state drifted; the entry is NOT consumed
//! and the caller gets an inconsistency report instead of a half-applied
//! rollback. See `GameState::undo_last` for the application side.

use crate::core::{CardId, Color};
use serde::{Deserialize, Serialize};

/// Default number of reversible actions remembered per player.
pub const DEFAULT_UNDO_DEPTH: usize = 16;

/// One reversible action, recorded after it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndoEntry {
    /// A land was tapped and one mana added to its controller's pool.
    /// Inverse: untap the land, remove that mana.
    TapForMana { card: CardId, color: Color },

    /// A land was played from hand this turn.
    /// Inverse: return it to hand, decrement the land count.
    PlayLand { card: CardId },
}

/// Result of attempting to undo the most recent entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The inverse was applied and the entry consumed.
    Undone(UndoEntry),
    /// Nothing to undo.
    Empty,
    /// The state no longer matches the inverse's preconditions. The entry
    /// stays in the history.
    Inconsistent(String),
}

/// Bounded stack of reversible actions for one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoHistory {
    entries: Vec<UndoEntry>,
    capacity: usize,
}

impl UndoHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        UndoHistory {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Record a reversible action. Drops the oldest entry when full.
    pub fn push(&mut self, entry: UndoEntry) {
        if self.entries.len() == self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(entry);
    }

    /// The entry that would be undone next.
    pub fn peek(&self) -> Option<&UndoEntry> {
        self.entries.last()
    }

    /// Consume the most recent entry. Callers must have validated the
    /// inverse first.
    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop()
    }

    /// Forget everything. Called when the player commits an irreversible
    /// action.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        UndoHistory::with_capacity(DEFAULT_UNDO_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut history = UndoHistory::default();
        assert!(history.is_empty());

        history.push(UndoEntry::PlayLand {
            card: CardId::new(1),
        });
        history.push(UndoEntry::TapForMana {
            card: CardId::new(1),
            color: Color::Green,
        });

        assert_eq!(history.len(), 2);
        assert!(matches!(
            history.peek(),
            Some(UndoEntry::TapForMana { .. })
        ));
        assert!(matches!(history.pop(), Some(UndoEntry::TapForMana { .. })));
        assert!(matches!(history.pop(), Some(UndoEntry::PlayLand { .. })));
        assert!(history.pop().is_none());
    }

    #[test]
    fn test_bounded_drops_oldest() {
        let mut history = UndoHistory::with_capacity(2);
        for i in 0..3 {
            history.push(UndoEntry::PlayLand {
                card: CardId::new(i),
            });
        }
        assert_eq!(history.len(), 2);
        // Entry 0 fell off; 2 is on top
        assert_eq!(
            history.pop(),
            Some(UndoEntry::PlayLand {
                card: CardId::new(2)
            })
        );
        assert_eq!(
            history.pop(),
            Some(UndoEntry::PlayLand {
                card: CardId::new(1)
            })
        );
    }

    #[test]
    fn test_clear_on_commit() {
        let mut history = UndoHistory::default();
        history.push(UndoEntry::TapForMana {
            card: CardId::new(7),
            color: Color::Red,
        });
        history.clear();
        assert!(history.is_empty());
    }
}
