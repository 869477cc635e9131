//! Dice as they travel on the wire.
//!
//! A die is identified by its color and face value, not by instance: clients
//! receive serialized copies of dice, so when they reference "the selected
//! die" in a request the server resolves it by a (color, value) match against
//! the live pool. Equality is defined accordingly.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// The five Sagrada dice colors. The bag holds 18 dice of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DieColor {
    Red,
    Green,
    Yellow,
    Blue,
    Purple,
}

impl DieColor {
    pub const ALL: [DieColor; 5] = [
        DieColor::Red,
        DieColor::Green,
        DieColor::Yellow,
        DieColor::Blue,
        DieColor::Purple,
    ];

    /// One-letter code used in template layouts and log output.
    pub fn letter(&self) -> char {
        match self {
            DieColor::Red => 'R',
            DieColor::Green => 'G',
            DieColor::Yellow => 'Y',
            DieColor::Blue => 'B',
            DieColor::Purple => 'P',
        }
    }
}

/// A single die: fixed color, mutable face value in 1..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Die {
    pub color: DieColor,
    pub value: u8,
}

impl Die {
    pub fn new(color: DieColor, value: u8) -> Self {
        debug_assert!((1..=6).contains(&value));
        Self { color, value }
    }

    /// Creates a die with a freshly rolled face.
    pub fn rolled<R: Rng>(color: DieColor, rng: &mut R) -> Self {
        Self {
            color,
            value: rng.gen_range(1..=6),
        }
    }

    /// Rerolls the face in place.
    pub fn reroll<R: Rng>(&mut self, rng: &mut R) {
        self.value = rng.gen_range(1..=6);
    }

    /// Flips the die to its opposite face (1<->6, 2<->5, 3<->4).
    pub fn flip(&mut self) {
        self.value = 7 - self.value;
    }

    /// Increments the face value. Returns false (unchanged) at 6.
    pub fn increment(&mut self) -> bool {
        if self.value < 6 {
            self.value += 1;
            true
        } else {
            false
        }
    }

    /// Decrements the face value. Returns false (unchanged) at 1.
    pub fn decrement(&mut self) -> bool {
        if self.value > 1 {
            self.value -= 1;
            true
        } else {
            false
        }
    }

    /// Shade bucket used by the public objective cards: light (1-2),
    /// medium (3-4), deep (5-6).
    pub fn is_light(&self) -> bool {
        self.value <= 2
    }

    pub fn is_medium(&self) -> bool {
        self.value == 3 || self.value == 4
    }

    pub fn is_deep(&self) -> bool {
        self.value >= 5
    }
}

impl std::fmt::Display for Die {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.color.letter(), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn test_rolled_die_in_range() {
        let mut rng = thread_rng();
        for _ in 0..100 {
            let die = Die::rolled(DieColor::Blue, &mut rng);
            assert!((1..=6).contains(&die.value));
            assert_eq!(die.color, DieColor::Blue);
        }
    }

    #[test]
    fn test_flip_is_opposite_face() {
        for value in 1..=6u8 {
            let mut die = Die::new(DieColor::Red, value);
            die.flip();
            assert_eq!(die.value + value, 7);
        }
    }

    #[test]
    fn test_increment_saturates_at_six() {
        let mut die = Die::new(DieColor::Green, 5);
        assert!(die.increment());
        assert_eq!(die.value, 6);
        assert!(!die.increment());
        assert_eq!(die.value, 6);
    }

    #[test]
    fn test_decrement_saturates_at_one() {
        let mut die = Die::new(DieColor::Green, 2);
        assert!(die.decrement());
        assert_eq!(die.value, 1);
        assert!(!die.decrement());
        assert_eq!(die.value, 1);
    }

    #[test]
    fn test_equality_is_by_color_and_value() {
        let a = Die::new(DieColor::Purple, 3);
        let b = Die::new(DieColor::Purple, 3);
        let c = Die::new(DieColor::Yellow, 3);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_shade_buckets() {
        assert!(Die::new(DieColor::Red, 1).is_light());
        assert!(Die::new(DieColor::Red, 2).is_light());
        assert!(Die::new(DieColor::Red, 3).is_medium());
        assert!(Die::new(DieColor::Red, 4).is_medium());
        assert!(Die::new(DieColor::Red, 5).is_deep());
        assert!(Die::new(DieColor::Red, 6).is_deep());
    }

    #[test]
    fn test_display_format() {
        assert_eq!(Die::new(DieColor::Blue, 4).to_string(), "B4");
        assert_eq!(Die::new(DieColor::Purple, 1).to_string(), "P1");
    }
}
