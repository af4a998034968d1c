//! Mana costs and mana pools
//!
//! Costs are parsed from compact strings like "2RR". Payment deducts colored
//! pips first; the generic portion is paid either automatically (WUBRG order)
//! or from an explicit color list chosen by the paying player when more than
//! one payment combination exists.

use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Mana colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Blue,
    Black,
    Red,
    Green,
    Colorless,
}

/// All colors in WUBRG(+C) order, the order used for automatic payment.
pub const COLORS: [Color; 6] = [
    Color::White,
    Color::Blue,
    Color::Black,
    Color::Red,
    Color::Green,
    Color::Colorless,
];

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Color::White => 'W',
            Color::Blue => 'U',
            Color::Black => 'B',
            Color::Red => 'R',
            Color::Green => 'G',
            Color::Colorless => 'C',
        };
        write!(f, "{c}")
    }
}

/// A mana cost (e.g. "2RR" = 2 generic + 2 red)
///
/// Copy-eligible: seven u8 fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManaCost {
    pub generic: u8,
    pub white: u8,
    pub blue: u8,
    pub black: u8,
    pub red: u8,
    pub green: u8,
    pub colorless: u8,
}

impl ManaCost {
    pub fn new() -> Self {
        ManaCost::default()
    }

    /// Parse a cost string like "2RR" or "1UB". Rejects unknown symbols.
    pub fn from_string(s: &str) -> Result<Self> {
        let mut cost = ManaCost::new();
        let mut generic_str = String::new();

        for c in s.chars() {
            match c {
                'W' => cost.white += 1,
                'U' => cost.blue += 1,
                'B' => cost.black += 1,
                'R' => cost.red += 1,
                'G' => cost.green += 1,
                'C' => cost.colorless += 1,
                '0'..='9' => generic_str.push(c),
                _ => return Err(EngineError::InvalidManaCost(s.to_string())),
            }
        }

        if !generic_str.is_empty() {
            cost.generic = generic_str
                .parse()
                .map_err(|_| EngineError::InvalidManaCost(s.to_string()))?;
        }

        Ok(cost)
    }

    /// Number of pips of a given color.
    pub fn pips(&self, color: Color) -> u8 {
        match color {
            Color::White => self.white,
            Color::Blue => self.blue,
            Color::Black => self.black,
            Color::Red => self.red,
            Color::Green => self.green,
            Color::Colorless => self.colorless,
        }
    }

    /// Total converted mana cost
    pub fn cmc(&self) -> u8 {
        self.generic + COLORS.iter().map(|&c| self.pips(c)).sum::<u8>()
    }

    /// Same cost with the generic portion shifted by `delta`, floored at 0.
    /// Colored pips are never touched by cost modification.
    pub fn with_generic_delta(&self, delta: i32) -> Self {
        let generic = (self.generic as i32 + delta).clamp(0, u8::MAX as i32) as u8;
        ManaCost { generic, ..*self }
    }
}

impl fmt::Display for ManaCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generic > 0 || self.cmc() == 0 {
            write!(f, "{}", self.generic)?;
        }
        for &color in &COLORS {
            for _ in 0..self.pips(color) {
                write!(f, "{color}")?;
            }
        }
        Ok(())
    }
}

/// A distinct way of covering a generic cost from a pool: one entry per mana
/// spent, sorted in WUBRG order.
pub type GenericPayment = SmallVec<[Color; 4]>;

/// Mana pool for a player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManaPool {
    pub white: u8,
    pub blue: u8,
    pub black: u8,
    pub red: u8,
    pub green: u8,
    pub colorless: u8,
}

impl ManaPool {
    pub fn new() -> Self {
        ManaPool::default()
    }

    pub fn amount(&self, color: Color) -> u8 {
        match color {
            Color::White => self.white,
            Color::Blue => self.blue,
            Color::Black => self.black,
            Color::Red => self.red,
            Color::Green => self.green,
            Color::Colorless => self.colorless,
        }
    }

    fn slot(&mut self, color: Color) -> &mut u8 {
        match color {
            Color::White => &mut self.white,
            Color::Blue => &mut self.blue,
            Color::Black => &mut self.black,
            Color::Red => &mut self.red,
            Color::Green => &mut self.green,
            Color::Colorless => &mut self.colorless,
        }
    }

    pub fn add(&mut self, color: Color) {
        *self.slot(color) += 1;
    }

    pub fn remove(&mut self, color: Color) -> bool {
        let slot = self.slot(color);
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    pub fn clear(&mut self) {
        *self = ManaPool::new();
    }

    /// Total mana in pool
    pub fn total(&self) -> u8 {
        COLORS.iter().map(|&c| self.amount(c)).sum()
    }

    /// Check whether the pool covers the cost (pips exactly, generic from the
    /// remainder).
    pub fn can_pay(&self, cost: &ManaCost) -> bool {
        for &color in &COLORS {
            if self.amount(color) < cost.pips(color) {
                return false;
            }
        }
        self.total() >= cost.cmc()
    }

    /// Pay a cost from this pool.
    ///
    /// Colored pips are deducted first. The generic portion comes from
    /// `generic_from` when given (must contain exactly `cost.generic`
    /// entries), otherwise from the remaining mana in WUBRG order. Fails
    /// without mutating the pool.
    pub fn pay(&mut self, cost: &ManaCost, generic_from: Option<&[Color]>) -> Result<()> {
        if !self.can_pay(cost) {
            return Err(EngineError::IllegalAction(format!(
                "insufficient mana to pay {cost} from pool {self}"
            )));
        }

        let mut scratch = *self;
        for &color in &COLORS {
            *scratch.slot(color) -= cost.pips(color);
        }

        match generic_from {
            Some(colors) => {
                if colors.len() != cost.generic as usize {
                    return Err(EngineError::InvalidDecision(format!(
                        "generic payment of {} mana offered for a cost of {}",
                        colors.len(),
                        cost.generic
                    )));
                }
                for &color in colors {
                    if !scratch.remove(color) {
                        return Err(EngineError::InvalidDecision(format!(
                            "generic payment names {color} not present in pool"
                        )));
                    }
                }
            }
            None => {
                let mut remaining = cost.generic;
                for &color in &COLORS {
                    while remaining > 0 && scratch.remove(color) {
                        remaining -= 1;
                    }
                }
                debug_assert_eq!(remaining, 0);
            }
        }

        *self = scratch;
        Ok(())
    }

    /// All distinct color multisets from this pool (after pips are already
    /// deducted by the caller) that cover a generic cost of `amount`.
    ///
    /// The payment prompt fires only when this returns more than one option.
    pub fn generic_payment_options(&self, amount: u8) -> Vec<GenericPayment> {
        let mut options = Vec::new();
        let mut current = GenericPayment::new();
        self.collect_options(0, amount, &mut current, &mut options);
        options
    }

    fn collect_options(
        &self,
        color_idx: usize,
        remaining: u8,
        current: &mut GenericPayment,
        out: &mut Vec<GenericPayment>,
    ) {
        if remaining == 0 {
            out.push(current.clone());
            return;
        }
        if color_idx >= COLORS.len() {
            return;
        }
        let color = COLORS[color_idx];
        let max_here = self.amount(color).min(remaining);
        for take in (0..=max_here).rev() {
            for _ in 0..take {
                current.push(color);
            }
            self.collect_options(color_idx + 1, remaining - take, current, out);
            for _ in 0..take {
                current.pop();
            }
        }
    }
}

impl fmt::Display for ManaPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}W {}U {}B {}R {}G {}C",
            self.white, self.blue, self.black, self.red, self.green, self.colorless
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mana_cost_parsing() {
        let cost = ManaCost::from_string("2RR").unwrap();
        assert_eq!(cost.generic, 2);
        assert_eq!(cost.red, 2);
        assert_eq!(cost.cmc(), 4);

        let cost2 = ManaCost::from_string("1UB").unwrap();
        assert_eq!(cost2.generic, 1);
        assert_eq!(cost2.blue, 1);
        assert_eq!(cost2.black, 1);
        assert_eq!(cost2.cmc(), 3);

        assert!(ManaCost::from_string("2X?").is_err());
    }

    #[test]
    fn test_generic_delta_floors_at_zero() {
        let cost = ManaCost::from_string("2RR").unwrap();
        let reduced = cost.with_generic_delta(-5);
        assert_eq!(reduced.generic, 0);
        // Pips untouched by reduction
        assert_eq!(reduced.red, 2);

        let raised = cost.with_generic_delta(3);
        assert_eq!(raised.generic, 5);
    }

    #[test]
    fn test_can_pay() {
        let mut pool = ManaPool::new();
        pool.add(Color::Red);
        pool.add(Color::Red);
        pool.add(Color::Blue);

        assert!(pool.can_pay(&ManaCost::from_string("1R").unwrap()));
        assert!(pool.can_pay(&ManaCost::from_string("2R").unwrap()));
        assert!(!pool.can_pay(&ManaCost::from_string("3R").unwrap()));
        assert!(!pool.can_pay(&ManaCost::from_string("RRR").unwrap()));
    }

    #[test]
    fn test_pay_auto_generic_wubrg_order() {
        let mut pool = ManaPool::new();
        pool.add(Color::Red);
        pool.add(Color::Red);
        pool.add(Color::Red);
        pool.add(Color::Blue);

        // 2R: one red pip, then generic takes blue before red (WUBRG order)
        pool.pay(&ManaCost::from_string("2R").unwrap(), None).unwrap();
        assert_eq!(pool.red, 1);
        assert_eq!(pool.blue, 0);
        assert_eq!(pool.total(), 1);
    }

    #[test]
    fn test_pay_explicit_generic_choice() {
        let mut pool = ManaPool::new();
        pool.add(Color::Red);
        pool.add(Color::Red);
        pool.add(Color::Blue);

        // Pay the generic 1 of "1R" from red, keeping the blue
        pool.pay(&ManaCost::from_string("1R").unwrap(), Some(&[Color::Red]))
            .unwrap();
        assert_eq!(pool.red, 0);
        assert_eq!(pool.blue, 1);
    }

    #[test]
    fn test_pay_explicit_choice_validated() {
        let mut pool = ManaPool::new();
        pool.add(Color::Red);
        pool.add(Color::Red);

        // Claiming a color the pool lacks is an invalid decision
        let err = pool.pay(&ManaCost::from_string("1R").unwrap(), Some(&[Color::Green]));
        assert!(err.is_err());
        // Pool untouched on failure
        assert_eq!(pool.red, 2);
    }

    #[test]
    fn test_pay_insufficient_leaves_pool_unchanged() {
        let mut pool = ManaPool::new();
        pool.add(Color::Blue);
        pool.add(Color::Blue);

        assert!(pool.pay(&ManaCost::from_string("RR").unwrap(), None).is_err());
        assert_eq!(pool.blue, 2);
        assert_eq!(pool.red, 0);
    }

    #[test]
    fn test_generic_payment_options() {
        let mut pool = ManaPool::new();
        pool.add(Color::Red);
        pool.add(Color::Blue);

        // One mana of generic, two colors available: two distinct options
        let options = pool.generic_payment_options(1);
        assert_eq!(options.len(), 2);

        // Two generic from two total: only one way
        let options = pool.generic_payment_options(2);
        assert_eq!(options.len(), 1);

        // Unpayable amount: no options
        let options = pool.generic_payment_options(3);
        assert!(options.is_empty());

        // Homogeneous pool is never ambiguous
        let mut mono = ManaPool::new();
        mono.add(Color::Green);
        mono.add(Color::Green);
        assert_eq!(mono.generic_payment_options(1).len(), 1);
    }
}
