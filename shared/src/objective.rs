//! Objective cards: the scoring rules evaluated against finished grids.
//!
//! Both kinds are data-driven closed enums rather than one type per card;
//! the per-card behavior is a scoring formula over the grid, nothing more.

use crate::dice::{Die, DieColor};
use crate::pattern::{PatternCard, GRID_COLS, GRID_ROWS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A player's secret objective: score the pip-sum of one color on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateObjective {
    pub color: DieColor,
}

impl PrivateObjective {
    pub fn score(&self, card: &PatternCard) -> i32 {
        card.dice()
            .filter(|d| d.color == self.color)
            .map(|d| d.value as i32)
            .sum()
    }
}

/// The ten public objective cards, three of which are fixed per match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublicObjective {
    RowColorVariety,
    ColumnColorVariety,
    RowShadeVariety,
    ColumnShadeVariety,
    LightShades,
    MediumShades,
    DeepShades,
    ShadeVariety,
    ColorVariety,
    ColorDiagonals,
}

impl PublicObjective {
    pub const ALL: [PublicObjective; 10] = [
        PublicObjective::RowColorVariety,
        PublicObjective::ColumnColorVariety,
        PublicObjective::RowShadeVariety,
        PublicObjective::ColumnShadeVariety,
        PublicObjective::LightShades,
        PublicObjective::MediumShades,
        PublicObjective::DeepShades,
        PublicObjective::ShadeVariety,
        PublicObjective::ColorVariety,
        PublicObjective::ColorDiagonals,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PublicObjective::RowColorVariety => "Row Color Variety",
            PublicObjective::ColumnColorVariety => "Column Color Variety",
            PublicObjective::RowShadeVariety => "Row Shade Variety",
            PublicObjective::ColumnShadeVariety => "Column Shade Variety",
            PublicObjective::LightShades => "Light Shades",
            PublicObjective::MediumShades => "Medium Shades",
            PublicObjective::DeepShades => "Deep Shades",
            PublicObjective::ShadeVariety => "Shade Variety",
            PublicObjective::ColorVariety => "Color Variety",
            PublicObjective::ColorDiagonals => "Color Diagonals",
        }
    }

    pub fn score(&self, card: &PatternCard) -> i32 {
        match self {
            PublicObjective::RowColorVariety => {
                6 * Self::count_lines(card, true, |d| d.color as u8)
            }
            PublicObjective::ColumnColorVariety => {
                5 * Self::count_lines(card, false, |d| d.color as u8)
            }
            PublicObjective::RowShadeVariety => {
                5 * Self::count_lines(card, true, |d| d.value)
            }
            PublicObjective::ColumnShadeVariety => {
                4 * Self::count_lines(card, false, |d| d.value)
            }
            PublicObjective::LightShades => 2 * Self::count_value_pairs(card, 1, 2),
            PublicObjective::MediumShades => 2 * Self::count_value_pairs(card, 3, 4),
            PublicObjective::DeepShades => 2 * Self::count_value_pairs(card, 5, 6),
            PublicObjective::ShadeVariety => {
                let mut counts = [0i32; 6];
                for die in card.dice() {
                    counts[die.value as usize - 1] += 1;
                }
                5 * counts.iter().copied().min().unwrap_or(0)
            }
            PublicObjective::ColorVariety => {
                let sets = DieColor::ALL
                    .iter()
                    .map(|c| card.dice().filter(|d| d.color == *c).count() as i32)
                    .min()
                    .unwrap_or(0);
                4 * sets
            }
            PublicObjective::ColorDiagonals => Self::score_color_diagonals(card),
        }
    }

    /// Counts full rows (or columns) whose dice are all distinct under `key`.
    fn count_lines(card: &PatternCard, rows: bool, key: impl Fn(&Die) -> u8) -> i32 {
        let (lines, len) = if rows {
            (GRID_ROWS, GRID_COLS)
        } else {
            (GRID_COLS, GRID_ROWS)
        };
        let mut complete = 0;
        for line in 0..lines {
            let mut seen = HashSet::new();
            let mut full = true;
            for i in 0..len {
                let (r, c) = if rows { (line, i) } else { (i, line) };
                match card.die_at(r, c) {
                    Some(die) => {
                        if !seen.insert(key(die)) {
                            full = false;
                            break;
                        }
                    }
                    None => {
                        full = false;
                        break;
                    }
                }
            }
            if full {
                complete += 1;
            }
        }
        complete
    }

    /// Counts complete (a, b) value pairs anywhere on the grid.
    fn count_value_pairs(card: &PatternCard, a: u8, b: u8) -> i32 {
        let count_a = card.dice().filter(|d| d.value == a).count() as i32;
        let count_b = card.dice().filter(|d| d.value == b).count() as i32;
        count_a.min(count_b)
    }

    /// One point per die that touches another die of its color diagonally.
    fn score_color_diagonals(card: &PatternCard) -> i32 {
        let mut points = 0;
        for row in 0..GRID_ROWS {
            for col in 0..GRID_COLS {
                let die = match card.die_at(row, col) {
                    Some(d) => d,
                    None => continue,
                };
                let mut matched = false;
                for (dr, dc) in [(-1i32, -1i32), (-1, 1), (1, -1), (1, 1)] {
                    let r = row as i32 + dr;
                    let c = col as i32 + dc;
                    if r < 0 || c < 0 || r >= GRID_ROWS as i32 || c >= GRID_COLS as i32 {
                        continue;
                    }
                    if let Some(other) = card.die_at(r as usize, c as usize) {
                        if other.color == die.color {
                            matched = true;
                            break;
                        }
                    }
                }
                if matched {
                    points += 1;
                }
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PlacementMode;

    fn blank_card() -> PatternCard {
        PatternCard::from_layout("Test", 4, "....................")
    }

    /// Fills row 0 with the given dice, bypassing nothing (they are legal).
    fn fill_row(card: &mut PatternCard, dice: [Die; 5]) {
        for (col, die) in dice.into_iter().enumerate() {
            card.place(die, 0, col, PlacementMode::Standard).unwrap();
        }
    }

    #[test]
    fn test_private_objective_sums_color_pips() {
        let mut card = blank_card();
        fill_row(
            &mut card,
            [
                Die::new(DieColor::Red, 3),
                Die::new(DieColor::Blue, 4),
                Die::new(DieColor::Red, 5),
                Die::new(DieColor::Green, 2),
                Die::new(DieColor::Red, 1),
            ],
        );
        let obj = PrivateObjective {
            color: DieColor::Red,
        };
        assert_eq!(obj.score(&card), 9);
        let none = PrivateObjective {
            color: DieColor::Purple,
        };
        assert_eq!(none.score(&card), 0);
    }

    #[test]
    fn test_row_color_variety() {
        let mut card = blank_card();
        fill_row(
            &mut card,
            [
                Die::new(DieColor::Red, 1),
                Die::new(DieColor::Blue, 2),
                Die::new(DieColor::Green, 3),
                Die::new(DieColor::Yellow, 4),
                Die::new(DieColor::Purple, 5),
            ],
        );
        assert_eq!(PublicObjective::RowColorVariety.score(&card), 6);
        // Same row also has five distinct values.
        assert_eq!(PublicObjective::RowShadeVariety.score(&card), 5);
    }

    #[test]
    fn test_row_with_repeated_color_scores_zero() {
        let mut card = blank_card();
        fill_row(
            &mut card,
            [
                Die::new(DieColor::Red, 1),
                Die::new(DieColor::Blue, 2),
                Die::new(DieColor::Red, 3),
                Die::new(DieColor::Yellow, 4),
                Die::new(DieColor::Purple, 5),
            ],
        );
        assert_eq!(PublicObjective::RowColorVariety.score(&card), 0);
    }

    #[test]
    fn test_shade_pairs() {
        let mut card = blank_card();
        fill_row(
            &mut card,
            [
                Die::new(DieColor::Red, 1),
                Die::new(DieColor::Blue, 2),
                Die::new(DieColor::Green, 1),
                Die::new(DieColor::Yellow, 2),
                Die::new(DieColor::Purple, 5),
            ],
        );
        // Two 1s and two 2s: two complete light pairs.
        assert_eq!(PublicObjective::LightShades.score(&card), 4);
        assert_eq!(PublicObjective::DeepShades.score(&card), 0);
    }

    #[test]
    fn test_color_diagonals() {
        let mut card = blank_card();
        card.place(Die::new(DieColor::Red, 1), 0, 0, PlacementMode::Standard)
            .unwrap();
        card.place(Die::new(DieColor::Red, 2), 1, 1, PlacementMode::Standard)
            .unwrap();
        // Both dice touch a same-color die diagonally.
        assert_eq!(PublicObjective::ColorDiagonals.score(&card), 2);
    }

    #[test]
    fn test_empty_grid_scores_zero_everywhere() {
        let card = blank_card();
        for objective in PublicObjective::ALL {
            assert_eq!(objective.score(&card), 0, "{}", objective.name());
        }
    }
}
