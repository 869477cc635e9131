//! Pattern cards: the personal 4x5 constrained grids players fill with dice.
//!
//! Card layouts are data-driven: a template table of compact layout strings
//! instead of one type per window. The grid itself is a flat fixed-size
//! array addressed by (row, col), and all placement-rule checks live here so
//! the server and tests share a single rules implementation.

use crate::dice::{Die, DieColor};
use serde::{Deserialize, Serialize};

pub const GRID_ROWS: usize = 4;
pub const GRID_COLS: usize = 5;

/// Per-die availability mask sent to clients alongside the drafted pool.
pub type Mask = [[bool; GRID_COLS]; GRID_ROWS];

/// A die paired with the positions it may legally occupy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DieMask {
    pub die: Die,
    pub mask: Mask,
}

/// Printed restriction of a single box. A box is color-restricted or
/// value-restricted, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxConstraint {
    None,
    Color(DieColor),
    Value(u8),
}

impl BoxConstraint {
    pub fn allows(&self, die: &Die) -> bool {
        match self {
            BoxConstraint::None => true,
            BoxConstraint::Color(c) => die.color == *c,
            BoxConstraint::Value(v) => die.value == *v,
        }
    }

    /// Like [`allows`](Self::allows) but with one rule category relaxed, as
    /// tool cards permit.
    fn allows_relaxed(&self, die: &Die, mode: PlacementMode) -> bool {
        match (self, mode) {
            (BoxConstraint::Color(_), PlacementMode::IgnoreColor) => true,
            (BoxConstraint::Value(_), PlacementMode::IgnoreValue) => true,
            _ => self.allows(die),
        }
    }
}

/// One cell of the grid: its printed constraint plus at most one die.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternBox {
    pub constraint: BoxConstraint,
    pub die: Option<Die>,
}

/// Which rule category, if any, the current placement may bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    /// All standard rules apply.
    Standard,
    /// Box color restrictions are ignored (Eglomise Brush).
    IgnoreColor,
    /// Box value restrictions are ignored (Copper Foil Burnisher).
    IgnoreValue,
    /// The die must NOT touch any other die (Cork-backed Straightedge);
    /// box restrictions still apply.
    Isolated,
}

/// Why a placement attempt was refused. Rejections are values, never state
/// mutations: the grid is untouched when any of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    OutOfBounds,
    BoxOccupied,
    ConstraintViolated,
    NotOnBorder,
    NoAdjacentDie,
    AdjacentDieForbidden,
    NeighborConflict,
}

impl std::fmt::Display for PlacementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementError::OutOfBounds => write!(f, "position outside the 4x5 grid"),
            PlacementError::BoxOccupied => write!(f, "box already holds a die"),
            PlacementError::ConstraintViolated => write!(f, "die does not match the box restriction"),
            PlacementError::NotOnBorder => write!(f, "first die must be placed on the border"),
            PlacementError::NoAdjacentDie => write!(f, "die must touch a previously placed die"),
            PlacementError::AdjacentDieForbidden => write!(f, "die must not touch any other die"),
            PlacementError::NeighborConflict => {
                write!(f, "orthogonal neighbor shares the die's color or value")
            }
        }
    }
}

impl std::error::Error for PlacementError {}

/// A pattern card: named template, difficulty (the favor tokens it grants),
/// and the 4x5 grid of boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCard {
    pub name: String,
    pub difficulty: u8,
    boxes: Vec<PatternBox>,
}

impl PatternCard {
    fn idx(row: usize, col: usize) -> usize {
        row * GRID_COLS + col
    }

    pub fn box_at(&self, row: usize, col: usize) -> &PatternBox {
        &self.boxes[Self::idx(row, col)]
    }

    pub fn die_at(&self, row: usize, col: usize) -> Option<&Die> {
        self.boxes[Self::idx(row, col)].die.as_ref()
    }

    /// Removes and returns the die at the given position, if any.
    pub fn take_die(&mut self, row: usize, col: usize) -> Option<Die> {
        self.boxes[Self::idx(row, col)].die.take()
    }

    pub fn is_grid_empty(&self) -> bool {
        self.boxes.iter().all(|b| b.die.is_none())
    }

    pub fn empty_box_count(&self) -> usize {
        self.boxes.iter().filter(|b| b.die.is_none()).count()
    }

    /// All dice currently on the grid.
    pub fn dice(&self) -> impl Iterator<Item = &Die> {
        self.boxes.iter().filter_map(|b| b.die.as_ref())
    }

    fn on_border(row: usize, col: usize) -> bool {
        row == 0 || row == GRID_ROWS - 1 || col == 0 || col == GRID_COLS - 1
    }

    /// Checks every placement rule for `die` at (row, col) under `mode`.
    pub fn check_placement(
        &self,
        die: &Die,
        row: usize,
        col: usize,
        mode: PlacementMode,
    ) -> Result<(), PlacementError> {
        if row >= GRID_ROWS || col >= GRID_COLS {
            return Err(PlacementError::OutOfBounds);
        }
        let target = self.box_at(row, col);
        if target.die.is_some() {
            return Err(PlacementError::BoxOccupied);
        }
        if !target.constraint.allows_relaxed(die, mode) {
            return Err(PlacementError::ConstraintViolated);
        }

        let any_touch = self.touches_any_die(row, col);
        match mode {
            PlacementMode::Isolated => {
                if any_touch {
                    return Err(PlacementError::AdjacentDieForbidden);
                }
                return Ok(());
            }
            _ => {
                if self.is_grid_empty() {
                    if !Self::on_border(row, col) {
                        return Err(PlacementError::NotOnBorder);
                    }
                } else if !any_touch {
                    return Err(PlacementError::NoAdjacentDie);
                }
            }
        }

        // No orthogonal neighbor may share color or value, under every mode
        // except isolation (where there are no neighbors at all).
        for (r, c) in self.orthogonal(row, col) {
            if let Some(other) = self.die_at(r, c) {
                if other.color == die.color || other.value == die.value {
                    return Err(PlacementError::NeighborConflict);
                }
            }
        }
        Ok(())
    }

    /// Places `die` at (row, col) after validating every rule for `mode`.
    pub fn place(
        &mut self,
        die: Die,
        row: usize,
        col: usize,
        mode: PlacementMode,
    ) -> Result<(), PlacementError> {
        self.check_placement(&die, row, col, mode)?;
        self.boxes[Self::idx(row, col)].die = Some(die);
        Ok(())
    }

    fn orthogonal(&self, row: usize, col: usize) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(4);
        if row > 0 {
            out.push((row - 1, col));
        }
        if row + 1 < GRID_ROWS {
            out.push((row + 1, col));
        }
        if col > 0 {
            out.push((row, col - 1));
        }
        if col + 1 < GRID_COLS {
            out.push((row, col + 1));
        }
        out
    }

    fn touches_any_die(&self, row: usize, col: usize) -> bool {
        let r0 = row.saturating_sub(1);
        let c0 = col.saturating_sub(1);
        for r in r0..=(row + 1).min(GRID_ROWS - 1) {
            for c in c0..=(col + 1).min(GRID_COLS - 1) {
                if (r, c) != (row, col) && self.die_at(r, c).is_some() {
                    return true;
                }
            }
        }
        false
    }

    /// Mask of every legal position for `die` under `mode`.
    pub fn availability_mask(&self, die: &Die, mode: PlacementMode) -> Mask {
        let mut mask = [[false; GRID_COLS]; GRID_ROWS];
        for (row, mask_row) in mask.iter_mut().enumerate() {
            for (col, cell) in mask_row.iter_mut().enumerate() {
                *cell = self.check_placement(die, row, col, mode).is_ok();
            }
        }
        mask
    }

    /// Availability masks for an entire pool, the shape broadcast to clients
    /// at turn start and after every pool mutation.
    pub fn available_positions(&self, pool: &[Die], mode: PlacementMode) -> Vec<DieMask> {
        pool.iter()
            .map(|die| DieMask {
                die: *die,
                mask: self.availability_mask(die, mode),
            })
            .collect()
    }

    /// Builds a card from a 20-character layout string, row-major:
    /// `.` blank, `1`-`6` a value restriction, `RGYBP` a color restriction.
    pub fn from_layout(name: &str, difficulty: u8, layout: &str) -> Self {
        assert_eq!(layout.len(), GRID_ROWS * GRID_COLS, "bad layout: {}", name);
        let boxes = layout
            .chars()
            .map(|ch| PatternBox {
                constraint: match ch {
                    '.' => BoxConstraint::None,
                    '1'..='6' => BoxConstraint::Value(ch as u8 - b'0'),
                    'R' => BoxConstraint::Color(DieColor::Red),
                    'G' => BoxConstraint::Color(DieColor::Green),
                    'Y' => BoxConstraint::Color(DieColor::Yellow),
                    'B' => BoxConstraint::Color(DieColor::Blue),
                    'P' => BoxConstraint::Color(DieColor::Purple),
                    other => panic!("bad layout char {:?} in {}", other, name),
                },
                die: None,
            })
            .collect();
        Self {
            name: name.to_string(),
            difficulty,
            boxes,
        }
    }

    /// The full template catalogue, one card per window.
    pub fn catalogue() -> Vec<PatternCard> {
        TEMPLATES
            .iter()
            .map(|(name, difficulty, layout)| PatternCard::from_layout(name, *difficulty, layout))
            .collect()
    }
}

/// (name, difficulty, row-major layout).
const TEMPLATES: [(&str, u8, &str); 24] = [
    ("Kaleidoscopic Dream", 4, "YB..1G.5.43.R.G2..BY"),
    ("Firmitas", 5, "P6..35P3...2P1..15P4"),
    ("Sun Catcher", 3, ".B2.Y.4.R...5Y.G3..P"),
    ("Luz Celestial", 3, "..R5.P4.G36..B..Y2.."),
    ("Via Lux", 4, "Y.6...152.3YRP...43R"),
    ("Aurora Sagradis", 4, "R.B.Y4P3G2.1.5...6.."),
    ("Aurorae Magnificus", 5, "5GBP2P...YY.6.P1..G4"),
    ("Batllo", 5, "..6...5B4.3GYP214R53"),
    ("Bellesguard", 3, "B6..Y.3B...562..4.1G"),
    ("Chromatic Splendor", 4, "..G..2Y5B1.R3P.1.6.4"),
    ("Comitas", 5, "Y.2.6.4.5Y...Y512..3"),
    ("Fractal Drops", 3, ".4.Y6R.2...R3.5B..1."),
    ("Gravitas", 5, ".1G.2B.4..3B..BR2..1"),
    ("Industria", 5, "1R3.6.5R4..2R5..1R.."),
    ("Lux Astram", 5, ".1GP4P3G25G6P21.2.3."),
    ("Lux Mundi", 6, "..1..1G3B2B546GG5B3."),
    ("Ripples of Light", 5, "...R5..P4R.B3P6B2Y15"),
    ("Shadow Thief", 5, "6P..5.5P..R6P.4R31.."),
    ("Sun's Glory", 6, "1PY..P6..4Y.R2..B531"),
    ("Symphony of Light", 6, "2.5.1Y6P2.R.B.G4.3.5"),
    ("Virtus", 5, "4.25G..6G2.3G4..5G1."),
    ("Water of Life", 6, "6B..15B4.2.B6YRB53.."),
    ("Firelight", 5, "3.R.64R2..R5.31.6.2R"),
    ("Fulgor del Cielo", 5, ".BR..4.5.B.B2.R6R31."),
];
