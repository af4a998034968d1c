//! Player representation

use crate::core::{ManaPool, PlayerId, PlayerName};
use crate::undo::UndoHistory;
use serde::{Deserialize, Serialize};

/// Why a player lost the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossReason {
    /// Life total reached zero or less.
    LifeLoss,
    /// Attempted to draw from an empty library.
    Decking,
}

/// One of the two players
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: PlayerName,

    /// Life total
    pub life: i32,

    /// Mana pool (empties between steps)
    pub mana_pool: ManaPool,

    /// Set by the state-based action pass, never directly by damage.
    pub lost: Option<LossReason>,

    /// Tripped when a draw finds an empty library; the next state-based
    /// action pass converts it to a loss.
    pub drew_from_empty_library: bool,

    /// Lands played this turn
    pub lands_played_this_turn: u8,

    /// Maximum lands per turn (usually 1)
    pub max_lands_per_turn: u8,

    /// Discard down to this during cleanup
    pub max_hand_size: usize,

    /// Recent reversible actions this player may take back before committing.
    pub undo_history: UndoHistory,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<PlayerName>, starting_life: i32) -> Self {
        Player {
            id,
            name: name.into(),
            life: starting_life,
            mana_pool: ManaPool::new(),
            lost: None,
            drew_from_empty_library: false,
            lands_played_this_turn: 0,
            max_lands_per_turn: 1,
            max_hand_size: 7,
            undo_history: UndoHistory::default(),
        }
    }

    pub fn has_lost(&self) -> bool {
        self.lost.is_some()
    }

    pub fn gain_life(&mut self, amount: i32) {
        self.life += amount;
    }

    pub fn lose_life(&mut self, amount: i32) {
        self.life -= amount;
    }

    pub fn can_play_land(&self) -> bool {
        self.lands_played_this_turn < self.max_lands_per_turn
    }

    pub fn note_land_played(&mut self) {
        self.lands_played_this_turn += 1;
    }

    pub fn reset_lands_played(&mut self) {
        self.lands_played_this_turn = 0;
    }

    pub fn empty_mana_pool(&mut self) {
        self.mana_pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_creation() {
        let id = PlayerId::new(1);
        let player = Player::new(id, "Alice", 20);

        assert_eq!(player.id, id);
        assert_eq!(player.name.as_str(), "Alice");
        assert_eq!(player.life, 20);
        assert!(!player.has_lost());
    }

    #[test]
    fn test_life_changes_do_not_decide_loss() {
        let mut player = Player::new(PlayerId::new(1), "Bob", 20);

        player.lose_life(25);
        assert_eq!(player.life, -5);
        // Loss is a state-based action, not a side effect of damage
        assert!(!player.has_lost());

        player.lost = Some(LossReason::LifeLoss);
        player.gain_life(10);
        assert!(player.has_lost());
    }

    #[test]
    fn test_land_playing() {
        let mut player = Player::new(PlayerId::new(1), "Charlie", 20);

        assert!(player.can_play_land());
        player.note_land_played();
        assert!(!player.can_play_land());

        player.reset_lands_played();
        assert!(player.can_play_land());
    }
}
