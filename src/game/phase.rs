//! Turn phases and steps

use crate::core::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Major phases of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Beginning,
    PreCombatMain,
    Combat,
    PostCombatMain,
    Ending,
}

/// Steps within phases, in turn order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    Untap,
    Upkeep,
    Draw,
    Main1,
    BeginCombat,
    DeclareAttackers,
    DeclareBlockers,
    CombatDamage,
    EndCombat,
    Main2,
    End,
    Cleanup,
}

impl Step {
    pub fn phase(&self) -> Phase {
        match self {
            Step::Untap | Step::Upkeep | Step::Draw => Phase::Beginning,
            Step::Main1 => Phase::PreCombatMain,
            Step::BeginCombat
            | Step::DeclareAttackers
            | Step::DeclareBlockers
            | Step::CombatDamage
            | Step::EndCombat => Phase::Combat,
            Step::Main2 => Phase::PostCombatMain,
            Step::End | Step::Cleanup => Phase::Ending,
        }
    }

    /// Next step, or None at end of turn.
    pub fn next(&self) -> Option<Step> {
        match self {
            Step::Untap => Some(Step::Upkeep),
            Step::Upkeep => Some(Step::Draw),
            Step::Draw => Some(Step::Main1),
            Step::Main1 => Some(Step::BeginCombat),
            Step::BeginCombat => Some(Step::DeclareAttackers),
            Step::DeclareAttackers => Some(Step::DeclareBlockers),
            Step::DeclareBlockers => Some(Step::CombatDamage),
            Step::CombatDamage => Some(Step::EndCombat),
            Step::EndCombat => Some(Step::Main2),
            Step::Main2 => Some(Step::End),
            Step::End => Some(Step::Cleanup),
            Step::Cleanup => None,
        }
    }

    /// Sorceries, lands, and sorcery-speed abilities are legal only here
    /// (with the stack empty, on the player's own turn).
    pub fn is_main(&self) -> bool {
        matches!(self, Step::Main1 | Step::Main2)
    }

    /// Untap and cleanup pass without anyone receiving priority.
    pub fn has_priority_window(&self) -> bool {
        !matches!(self, Step::Untap | Step::Cleanup)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Untap => "untap",
            Step::Upkeep => "upkeep",
            Step::Draw => "draw",
            Step::Main1 => "first main",
            Step::BeginCombat => "beginning of combat",
            Step::DeclareAttackers => "declare attackers",
            Step::DeclareBlockers => "declare blockers",
            Step::CombatDamage => "combat damage",
            Step::EndCombat => "end of combat",
            Step::Main2 => "second main",
            Step::End => "end",
            Step::Cleanup => "cleanup",
        };
        write!(f, "{name}")
    }
}

/// Where we are in the game's turn cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnStructure {
    /// Current turn number (starts at 1)
    pub turn_number: u32,
    pub current_step: Step,
    /// Whose turn it is
    pub active_player: PlayerId,
    /// Who currently holds priority, if anyone
    pub priority_player: Option<PlayerId>,
}

impl TurnStructure {
    pub fn new(starting_player: PlayerId) -> Self {
        TurnStructure {
            turn_number: 1,
            current_step: Step::Untap,
            active_player: starting_player,
            priority_player: None,
        }
    }

    pub fn current_phase(&self) -> Phase {
        self.current_step.phase()
    }

    /// Advance to the next step; false at end of turn.
    pub fn advance_step(&mut self) -> bool {
        match self.current_step.next() {
            Some(next_step) => {
                self.current_step = next_step;
                true
            }
            None => false,
        }
    }

    /// Begin the next turn with the other player active.
    pub fn next_turn(&mut self) {
        self.turn_number += 1;
        self.current_step = Step::Untap;
        self.active_player = self.active_player.opponent();
        self.priority_player = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_phases() {
        assert_eq!(Step::Untap.phase(), Phase::Beginning);
        assert_eq!(Step::Main1.phase(), Phase::PreCombatMain);
        assert_eq!(Step::DeclareAttackers.phase(), Phase::Combat);
        assert_eq!(Step::Main2.phase(), Phase::PostCombatMain);
        assert_eq!(Step::Cleanup.phase(), Phase::Ending);
    }

    #[test]
    fn test_turn_cycle_alternates_players() {
        let mut turn = TurnStructure::new(PlayerId::new(0));

        while turn.advance_step() {}
        assert_eq!(turn.current_step, Step::Cleanup);

        turn.next_turn();
        assert_eq!(turn.turn_number, 2);
        assert_eq!(turn.current_step, Step::Untap);
        assert_eq!(turn.active_player, PlayerId::new(1));

        turn.next_turn();
        assert_eq!(turn.active_player, PlayerId::new(0));
    }

    #[test]
    fn test_priority_windows() {
        assert!(!Step::Untap.has_priority_window());
        assert!(!Step::Cleanup.has_priority_window());
        assert!(Step::Upkeep.has_priority_window());
        assert!(Step::CombatDamage.has_priority_window());
    }

    #[test]
    fn test_main_steps() {
        assert!(Step::Main1.is_main());
        assert!(Step::Main2.is_main());
        assert!(!Step::Upkeep.is_main());
        assert!(!Step::DeclareAttackers.is_main());
    }
}
