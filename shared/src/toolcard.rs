//! Tool-card identifiers, pricing, and the phase-move payloads.
//!
//! Effects themselves run on the server; what crosses the wire is the card
//! identifier plus a small closed set of phase-specific move payloads. The
//! payload union replaces per-card request types: the transport resolves one
//! tagged enum at the boundary and the server validates that the variant
//! matches the card and phase currently in flight.

use crate::dice::Die;
use serde::{Deserialize, Serialize};

/// The twelve tool cards. Three are fixed per match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolCardKind {
    GrozingPliers,
    EglomiseBrush,
    CopperFoilBurnisher,
    Lathekin,
    LensCutter,
    FluxBrush,
    GlazingHammer,
    RunningPliers,
    CorkBackedStraightedge,
    GrindingStone,
    FluxRemover,
    TapWheel,
}

impl ToolCardKind {
    pub const ALL: [ToolCardKind; 12] = [
        ToolCardKind::GrozingPliers,
        ToolCardKind::EglomiseBrush,
        ToolCardKind::CopperFoilBurnisher,
        ToolCardKind::Lathekin,
        ToolCardKind::LensCutter,
        ToolCardKind::FluxBrush,
        ToolCardKind::GlazingHammer,
        ToolCardKind::RunningPliers,
        ToolCardKind::CorkBackedStraightedge,
        ToolCardKind::GrindingStone,
        ToolCardKind::FluxRemover,
        ToolCardKind::TapWheel,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolCardKind::GrozingPliers => "Grozing Pliers",
            ToolCardKind::EglomiseBrush => "Eglomise Brush",
            ToolCardKind::CopperFoilBurnisher => "Copper Foil Burnisher",
            ToolCardKind::Lathekin => "Lathekin",
            ToolCardKind::LensCutter => "Lens Cutter",
            ToolCardKind::FluxBrush => "Flux Brush",
            ToolCardKind::GlazingHammer => "Glazing Hammer",
            ToolCardKind::RunningPliers => "Running Pliers",
            ToolCardKind::CorkBackedStraightedge => "Cork-backed Straightedge",
            ToolCardKind::GrindingStone => "Grinding Stone",
            ToolCardKind::FluxRemover => "Flux Remover",
            ToolCardKind::TapWheel => "Tap Wheel",
        }
    }
}

/// A tool card as dealt to a match: identifier plus completed-use count.
/// The first activation costs one favor token, every later one costs two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCard {
    pub kind: ToolCardKind,
    pub uses: u32,
}

impl ToolCard {
    pub fn new(kind: ToolCardKind) -> Self {
        Self { kind, uses: 0 }
    }

    pub fn price(&self) -> u8 {
        if self.uses == 0 {
            1
        } else {
            2
        }
    }
}

/// A grid coordinate, row-major.
pub type GridPos = (usize, usize);

/// Phase-specific continuation payloads for tool-card protocols.
///
/// Which variants a card accepts, and in what order, is the card's protocol;
/// anything else is rejected without side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolCardMove {
    /// Grozing Pliers: bump a drafted die up or down by one.
    AdjustDie { die: Die, increase: bool },
    /// Eglomise Brush / Copper Foil Burnisher / Lathekin / Tap Wheel:
    /// move a die already on the grid.
    MoveDie { from: GridPos, to: GridPos },
    /// Lens Cutter: swap a drafted die with a round-track die.
    SwapWithRoundTrack {
        round: usize,
        track_die: Die,
        pool_die: Die,
    },
    /// Flux Brush: reroll a drafted die.
    RerollDie { die: Die },
    /// Grinding Stone: flip a drafted die to its opposite face.
    FlipDie { die: Die },
    /// Flux Remover: return a drafted die to the bag.
    ReturnDie { die: Die },
    /// Flux Remover: pick the face of the replacement die.
    ChooseValue { value: u8 },
    /// Flux Brush / Flux Remover / Running Pliers / Cork-backed
    /// Straightedge: place a die from the pool.
    PlaceDie { die: Die, row: usize, col: usize },
    /// Tap Wheel: pick the round-track die whose color constrains the moves.
    PickTrackDie { round: usize, die: Die },
    /// Decline an optional phase (skip the second Tap Wheel move, or skip
    /// placing an unplaceable die).
    Skip,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::DieColor;

    #[test]
    fn test_price_escalates_after_first_use() {
        let mut card = ToolCard::new(ToolCardKind::GrozingPliers);
        assert_eq!(card.price(), 1);
        card.uses += 1;
        assert_eq!(card.price(), 2);
        card.uses += 1;
        assert_eq!(card.price(), 2);
    }

    #[test]
    fn test_move_payload_roundtrip() {
        let moves = vec![
            ToolCardMove::AdjustDie {
                die: Die::new(DieColor::Red, 3),
                increase: true,
            },
            ToolCardMove::MoveDie {
                from: (0, 1),
                to: (2, 3),
            },
            ToolCardMove::SwapWithRoundTrack {
                round: 1,
                track_die: Die::new(DieColor::Blue, 2),
                pool_die: Die::new(DieColor::Green, 6),
            },
            ToolCardMove::ChooseValue { value: 4 },
            ToolCardMove::Skip,
        ];
        for mv in moves {
            let bytes = bincode::serialize(&mv).unwrap();
            let back: ToolCardMove = bincode::deserialize(&bytes).unwrap();
            assert_eq!(back, mv);
        }
    }

    #[test]
    fn test_catalogue_names_are_distinct() {
        let mut names: Vec<_> = ToolCardKind::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 12);
    }
}
