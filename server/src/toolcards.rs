//! Tool-card effect engine.
//!
//! Using a tool card opens a short sub-protocol on top of the owning turn:
//! the server prompts, the client answers with [`ToolCardMove`]s, and the
//! card either completes (price charged, updates broadcast) or is aborted
//! by the turn timer (snapshots restored, nothing charged). An invalid move
//! rejects without side effects and leaves the protocol at the same phase,
//! so clients may retry.

use crate::board::Board;
use rand::Rng;
use shared::{
    Die, DieColor, DieMask, PatternCard, PlacementMode, ToolCardKind, ToolCardMove,
    ToolCardUpdate, GRID_COLS, GRID_ROWS,
};

/// Outcome of one protocol step.
#[derive(Debug)]
pub enum ToolStep {
    /// The protocol continues; optionally prompt the actor with fresh data.
    Await(Option<ToolCardUpdate>),
    /// Terminal phase reached. The caller charges the price and broadcasts
    /// the listed updates.
    Completed(Vec<ToolCardUpdate>),
    /// The move was invalid for this card and phase; nothing changed.
    Rejected(String),
}

#[derive(Debug)]
enum Phase {
    AdjustDie,
    GridMoves {
        required: u8,
        done: u8,
        mode: PlacementMode,
    },
    Swap,
    Reroll,
    PlaceRerolled {
        die: Die,
    },
    Flip,
    ReturnToBag,
    ChooseValue,
    PlaceReplacement,
    PlacePool {
        mode: PlacementMode,
    },
    PickTrack,
    TapMoves {
        color: DieColor,
        done: u8,
    },
}

/// An in-flight tool-card protocol, locked to one player for one turn.
pub struct ActiveToolCard {
    pub kind: ToolCardKind,
    pub player: String,
    phase: Phase,
    grid_snapshot: PatternCard,
    /// Flux Remover bookkeeping for rollback: the die taken out of the pool
    /// and the replacement drawn from the bag.
    removed_die: Option<Die>,
    replacement: Option<Die>,
}

impl ActiveToolCard {
    /// Opens the protocol for `kind`. Single-phase cards complete right
    /// away; the caller must still charge the price on [`ToolStep::Completed`].
    pub fn begin<R: Rng>(
        kind: ToolCardKind,
        player: &str,
        board: &mut Board,
        grid: &PatternCard,
        rng: &mut R,
    ) -> (Self, ToolStep) {
        let mut card = Self {
            kind,
            player: player.to_string(),
            phase: Phase::AdjustDie,
            grid_snapshot: grid.clone(),
            removed_die: None,
            replacement: None,
        };
        let step = match kind {
            ToolCardKind::GrozingPliers => {
                card.phase = Phase::AdjustDie;
                ToolStep::Await(None)
            }
            ToolCardKind::EglomiseBrush => {
                card.phase = Phase::GridMoves {
                    required: 1,
                    done: 0,
                    mode: PlacementMode::IgnoreColor,
                };
                ToolStep::Await(Some(ToolCardUpdate::MoveMask {
                    available: grid_move_masks(grid, None, PlacementMode::IgnoreColor),
                }))
            }
            ToolCardKind::CopperFoilBurnisher => {
                card.phase = Phase::GridMoves {
                    required: 1,
                    done: 0,
                    mode: PlacementMode::IgnoreValue,
                };
                ToolStep::Await(Some(ToolCardUpdate::MoveMask {
                    available: grid_move_masks(grid, None, PlacementMode::IgnoreValue),
                }))
            }
            ToolCardKind::Lathekin => {
                card.phase = Phase::GridMoves {
                    required: 2,
                    done: 0,
                    mode: PlacementMode::Standard,
                };
                ToolStep::Await(Some(ToolCardUpdate::MoveMask {
                    available: grid_move_masks(grid, None, PlacementMode::Standard),
                }))
            }
            ToolCardKind::LensCutter => {
                card.phase = Phase::Swap;
                ToolStep::Await(None)
            }
            ToolCardKind::FluxBrush => {
                card.phase = Phase::Reroll;
                ToolStep::Await(None)
            }
            ToolCardKind::GlazingHammer => {
                for die in board.pool().to_vec() {
                    if let Ok(d) = board.pool_die_mut(die) {
                        d.reroll(rng);
                    }
                }
                ToolStep::Completed(vec![ToolCardUpdate::PoolUpdated {
                    dice: board.pool().to_vec(),
                    rerolled: true,
                }])
            }
            ToolCardKind::RunningPliers => {
                card.phase = Phase::PlacePool {
                    mode: PlacementMode::Standard,
                };
                ToolStep::Await(Some(ToolCardUpdate::MoveMask {
                    available: grid.available_positions(board.pool(), PlacementMode::Standard),
                }))
            }
            ToolCardKind::CorkBackedStraightedge => {
                card.phase = Phase::PlacePool {
                    mode: PlacementMode::Isolated,
                };
                ToolStep::Await(Some(ToolCardUpdate::MoveMask {
                    available: grid.available_positions(board.pool(), PlacementMode::Isolated),
                }))
            }
            ToolCardKind::GrindingStone => {
                card.phase = Phase::Flip;
                ToolStep::Await(None)
            }
            ToolCardKind::FluxRemover => {
                card.phase = Phase::ReturnToBag;
                ToolStep::Await(None)
            }
            ToolCardKind::TapWheel => {
                card.phase = Phase::PickTrack;
                ToolStep::Await(None)
            }
        };
        (card, step)
    }

    /// Feeds the next move into the protocol.
    pub fn advance<R: Rng>(
        &mut self,
        mv: ToolCardMove,
        board: &mut Board,
        grid: &mut PatternCard,
        rng: &mut R,
    ) -> ToolStep {
        match (&self.phase, mv) {
            (Phase::AdjustDie, ToolCardMove::AdjustDie { die, increase }) => {
                let pooled = match board.pool_die_mut(die) {
                    Ok(d) => d,
                    Err(e) => return ToolStep::Rejected(e.to_string()),
                };
                let ok = if increase {
                    pooled.increment()
                } else {
                    pooled.decrement()
                };
                if !ok {
                    return ToolStep::Rejected(if increase {
                        "a six cannot be raised".into()
                    } else {
                        "a one cannot be lowered".into()
                    });
                }
                ToolStep::Completed(vec![pool_update(board, false)])
            }

            (
                &Phase::GridMoves {
                    required,
                    done,
                    mode,
                },
                ToolCardMove::MoveDie { from, to },
            ) => {
                if let Err(reason) = move_grid_die(grid, from, to, mode) {
                    return ToolStep::Rejected(reason);
                }
                if done + 1 == required {
                    ToolStep::Completed(vec![self.grid_result(board, grid)])
                } else {
                    self.phase = Phase::GridMoves {
                        required,
                        done: done + 1,
                        mode,
                    };
                    ToolStep::Await(Some(ToolCardUpdate::MoveMask {
                        available: grid_move_masks(grid, None, mode),
                    }))
                }
            }

            (
                Phase::Swap,
                ToolCardMove::SwapWithRoundTrack {
                    round,
                    track_die,
                    pool_die,
                },
            ) => match board.swap_with_track(round, track_die, pool_die) {
                Ok(()) => ToolStep::Completed(vec![
                    pool_update(board, false),
                    ToolCardUpdate::RoundTrackUpdated {
                        entries: board.round_track().to_vec(),
                    },
                ]),
                Err(e) => ToolStep::Rejected(e.to_string()),
            },

            (Phase::Reroll, ToolCardMove::RerollDie { die }) => {
                let pooled = match board.pool_die_mut(die) {
                    Ok(d) => d,
                    Err(e) => return ToolStep::Rejected(e.to_string()),
                };
                pooled.reroll(rng);
                let rerolled = *pooled;
                self.phase = Phase::PlaceRerolled { die: rerolled };
                ToolStep::Await(Some(ToolCardUpdate::DieRerolled {
                    die: rerolled,
                    available: vec![DieMask {
                        die: rerolled,
                        mask: grid.availability_mask(&rerolled, PlacementMode::Standard),
                    }],
                }))
            }

            (&Phase::PlaceRerolled { die }, ToolCardMove::PlaceDie { die: d, row, col }) => {
                if d != die {
                    return ToolStep::Rejected("only the rerolled die may be placed".into());
                }
                if let Err(e) = grid.check_placement(&die, row, col, PlacementMode::Standard) {
                    return ToolStep::Rejected(e.to_string());
                }
                // Checked above, cannot fail now.
                let _ = board.take_from_pool(die);
                let _ = grid.place(die, row, col, PlacementMode::Standard);
                ToolStep::Completed(vec![pool_update(board, false), self.grid_result(board, grid)])
            }
            (Phase::PlaceRerolled { .. }, ToolCardMove::Skip) => {
                ToolStep::Completed(vec![pool_update(board, true)])
            }

            (Phase::Flip, ToolCardMove::FlipDie { die }) => {
                let pooled = match board.pool_die_mut(die) {
                    Ok(d) => d,
                    Err(e) => return ToolStep::Rejected(e.to_string()),
                };
                pooled.flip();
                ToolStep::Completed(vec![pool_update(board, false)])
            }

            (Phase::ReturnToBag, ToolCardMove::ReturnDie { die }) => {
                let removed = match board.take_from_pool(die) {
                    Ok(d) => d,
                    Err(e) => return ToolStep::Rejected(e.to_string()),
                };
                board.return_to_bag(removed.color);
                let replacement = match board.draft_one(rng) {
                    Ok(d) => d,
                    Err(e) => {
                        // Undo the return so the pool is untouched.
                        board.take_color_from_bag(removed.color);
                        board.add_to_pool(removed);
                        return ToolStep::Rejected(e.to_string());
                    }
                };
                self.removed_die = Some(removed);
                self.replacement = Some(replacement);
                self.phase = Phase::ChooseValue;
                ToolStep::Await(Some(ToolCardUpdate::ReplacementDrawn { die: replacement }))
            }

            (Phase::ChooseValue, ToolCardMove::ChooseValue { value }) => {
                if !(1..=6).contains(&value) {
                    return ToolStep::Rejected(format!("{} is not a die face", value));
                }
                let mut die = match self.replacement {
                    Some(d) => d,
                    None => return ToolStep::Rejected("no replacement die drawn".into()),
                };
                die.value = value;
                self.replacement = Some(die);
                self.phase = Phase::PlaceReplacement;
                ToolStep::Await(Some(ToolCardUpdate::ValueChosen {
                    die,
                    available: vec![DieMask {
                        die,
                        mask: grid.availability_mask(&die, PlacementMode::Standard),
                    }],
                }))
            }

            (Phase::PlaceReplacement, ToolCardMove::PlaceDie { die: d, row, col }) => {
                let die = match self.replacement {
                    Some(die) => die,
                    None => return ToolStep::Rejected("no replacement die drawn".into()),
                };
                if d != die {
                    return ToolStep::Rejected("only the replacement die may be placed".into());
                }
                if let Err(e) = grid.place(die, row, col, PlacementMode::Standard) {
                    return ToolStep::Rejected(e.to_string());
                }
                self.removed_die = None;
                self.replacement = None;
                ToolStep::Completed(vec![pool_update(board, false), self.grid_result(board, grid)])
            }
            (Phase::PlaceReplacement, ToolCardMove::Skip) => {
                let die = match self.replacement.take() {
                    Some(die) => die,
                    None => return ToolStep::Rejected("no replacement die drawn".into()),
                };
                board.add_to_pool(die);
                self.removed_die = None;
                ToolStep::Completed(vec![pool_update(board, false)])
            }

            (&Phase::PlacePool { mode }, ToolCardMove::PlaceDie { die, row, col }) => {
                if let Err(e) = grid.check_placement(&die, row, col, mode) {
                    return ToolStep::Rejected(e.to_string());
                }
                if let Err(e) = board.take_from_pool(die) {
                    return ToolStep::Rejected(e.to_string());
                }
                let _ = grid.place(die, row, col, mode);
                ToolStep::Completed(vec![pool_update(board, false), self.grid_result(board, grid)])
            }
            (Phase::PlacePool { .. }, ToolCardMove::Skip) => ToolStep::Completed(Vec::new()),

            (Phase::PickTrack, ToolCardMove::PickTrackDie { round, die }) => {
                let on_track = board
                    .round_track()
                    .get(round)
                    .map_or(false, |entry| entry.contains(&die));
                if !on_track {
                    return ToolStep::Rejected(format!(
                        "die {} is not on round-track entry {}",
                        die, round
                    ));
                }
                self.phase = Phase::TapMoves {
                    color: die.color,
                    done: 0,
                };
                ToolStep::Await(Some(ToolCardUpdate::MoveMask {
                    available: grid_move_masks(grid, Some(die.color), PlacementMode::Standard),
                }))
            }

            (&Phase::TapMoves { color, done }, ToolCardMove::MoveDie { from, to }) => {
                match grid.die_at(from.0, from.1) {
                    Some(die) if die.color == color => {}
                    Some(_) => {
                        return ToolStep::Rejected(format!(
                            "only {:?} dice may be moved",
                            color
                        ))
                    }
                    None => return ToolStep::Rejected("no die at the source box".into()),
                }
                if let Err(reason) = move_grid_die(grid, from, to, PlacementMode::Standard) {
                    return ToolStep::Rejected(reason);
                }
                if done + 1 == 2 {
                    ToolStep::Completed(vec![self.grid_result(board, grid)])
                } else {
                    self.phase = Phase::TapMoves { color, done: 1 };
                    ToolStep::Await(Some(ToolCardUpdate::MoveMask {
                        available: grid_move_masks(grid, Some(color), PlacementMode::Standard),
                    }))
                }
            }
            (&Phase::TapMoves { done, .. }, ToolCardMove::Skip) => {
                if done == 0 {
                    ToolStep::Completed(Vec::new())
                } else {
                    ToolStep::Completed(vec![self.grid_result(board, grid)])
                }
            }

            (_, mv) => ToolStep::Rejected(format!(
                "{:?} does not fit the {} protocol",
                mv,
                self.kind.name()
            )),
        }
    }

    /// Turn-timeout rollback: restores the grid snapshot and reverses any
    /// Flux Remover bag traffic. No price is charged.
    pub fn abort(&mut self, board: &mut Board, grid: &mut PatternCard) {
        *grid = self.grid_snapshot.clone();
        if let Some(replacement) = self.replacement.take() {
            board.return_to_bag(replacement.color);
        }
        if let Some(removed) = self.removed_die.take() {
            board.take_color_from_bag(removed.color);
            board.add_to_pool(removed);
        }
    }

    fn grid_result(&self, board: &Board, grid: &PatternCard) -> ToolCardUpdate {
        ToolCardUpdate::GridUpdated {
            username: self.player.clone(),
            pattern_card: grid.clone(),
            available: grid.available_positions(board.pool(), PlacementMode::Standard),
        }
    }
}

fn pool_update(board: &Board, rerolled: bool) -> ToolCardUpdate {
    ToolCardUpdate::PoolUpdated {
        dice: board.pool().to_vec(),
        rerolled,
    }
}

/// Moves a die already on the grid, re-validating every placement rule at
/// the destination as if the die were being placed fresh (minus itself).
/// When the destination is occupied the two dice swap, and both resulting
/// placements must be legal.
fn move_grid_die(
    grid: &mut PatternCard,
    from: (usize, usize),
    to: (usize, usize),
    mode: PlacementMode,
) -> Result<(), String> {
    if from.0 >= GRID_ROWS || from.1 >= GRID_COLS || to.0 >= GRID_ROWS || to.1 >= GRID_COLS {
        return Err("position out of bounds".into());
    }
    if from == to {
        return Err("a die cannot move onto itself".into());
    }
    let mut scratch = grid.clone();
    let moving = scratch
        .take_die(from.0, from.1)
        .ok_or_else(|| "no die at the source box".to_string())?;
    if let Some(other) = scratch.take_die(to.0, to.1) {
        scratch
            .place(moving, to.0, to.1, mode)
            .map_err(|e| e.to_string())?;
        scratch
            .place(other, from.0, from.1, mode)
            .map_err(|e| e.to_string())?;
    } else {
        scratch
            .place(moving, to.0, to.1, mode)
            .map_err(|e| e.to_string())?;
    }
    *grid = scratch;
    Ok(())
}

/// Masks for every die currently on the grid (optionally filtered by
/// color), each computed against the grid with that die lifted out.
fn grid_move_masks(
    grid: &PatternCard,
    color: Option<DieColor>,
    mode: PlacementMode,
) -> Vec<DieMask> {
    let mut out = Vec::new();
    for row in 0..GRID_ROWS {
        for col in 0..GRID_COLS {
            let die = match grid.die_at(row, col) {
                Some(die) => *die,
                None => continue,
            };
            if color.is_some_and(|c| die.color != c) {
                continue;
            }
            let mut without = grid.clone();
            without.take_die(row, col);
            out.push(DieMask {
                die,
                mask: without.availability_mask(&die, mode),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{PublicObjective, ToolCard};

    fn fixture() -> (Board, PatternCard, StdRng) {
        let board = Board::new(
            vec![PublicObjective::ColorDiagonals],
            ToolCardKind::ALL.iter().map(|k| ToolCard::new(*k)).collect(),
        );
        let grid = PatternCard::from_layout("Test Window", 4, "....................");
        (board, grid, StdRng::seed_from_u64(11))
    }

    #[test]
    fn test_grozing_pliers_adjusts_within_bounds() {
        let (mut board, grid, mut rng) = fixture();
        board.draft_dice(2, &mut rng);
        let die = board.pool()[0];
        let (mut card, step) =
            ActiveToolCard::begin(ToolCardKind::GrozingPliers, "alice", &mut board, &grid, &mut rng);
        assert!(matches!(step, ToolStep::Await(None)));

        let increase = die.value < 6;
        let mut grid = grid;
        let step = card.advance(
            ToolCardMove::AdjustDie { die, increase },
            &mut board,
            &mut grid,
            &mut rng,
        );
        match step {
            ToolStep::Completed(updates) => {
                let expect = if increase { die.value + 1 } else { die.value - 1 };
                assert!(matches!(
                    &updates[0],
                    ToolCardUpdate::PoolUpdated { dice, .. }
                        if dice.iter().any(|d| d.color == die.color && d.value == expect)
                ));
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn test_grozing_pliers_rejects_raising_a_six() {
        let (mut board, mut grid, mut rng) = fixture();
        board.add_to_pool(Die::new(DieColor::Red, 6));
        let (mut card, _) =
            ActiveToolCard::begin(ToolCardKind::GrozingPliers, "alice", &mut board, &grid, &mut rng);
        let step = card.advance(
            ToolCardMove::AdjustDie {
                die: Die::new(DieColor::Red, 6),
                increase: true,
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Rejected(_)));
        assert_eq!(board.pool()[0].value, 6);
    }

    #[test]
    fn test_eglomise_brush_relaxes_color_only() {
        let (mut board, _, mut rng) = fixture();
        // Box (0,0) is red-restricted; a blue die sits on the border at (0,1).
        let mut grid = PatternCard::from_layout("Test Window", 4, "R...................");
        grid.place(Die::new(DieColor::Blue, 3), 0, 1, PlacementMode::Standard)
            .unwrap();
        // Standard move onto the red box would violate the color constraint.
        assert!(move_grid_die(&mut grid.clone(), (0, 1), (0, 0), PlacementMode::Standard).is_err());

        let (mut card, _) =
            ActiveToolCard::begin(ToolCardKind::EglomiseBrush, "alice", &mut board, &grid, &mut rng);
        let step = card.advance(
            ToolCardMove::MoveDie {
                from: (0, 1),
                to: (0, 0),
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Completed(_)));
        assert_eq!(grid.die_at(0, 0), Some(&Die::new(DieColor::Blue, 3)));
        assert!(grid.die_at(0, 1).is_none());
    }

    #[test]
    fn test_lathekin_requires_two_moves() {
        let (mut board, _, mut rng) = fixture();
        let mut grid = PatternCard::from_layout("Test Window", 4, "....................");
        grid.place(Die::new(DieColor::Blue, 3), 0, 0, PlacementMode::Standard)
            .unwrap();
        grid.place(Die::new(DieColor::Red, 5), 0, 1, PlacementMode::Standard)
            .unwrap();

        let (mut card, _) =
            ActiveToolCard::begin(ToolCardKind::Lathekin, "alice", &mut board, &grid, &mut rng);
        let step = card.advance(
            ToolCardMove::MoveDie {
                from: (0, 1),
                to: (1, 1),
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Await(Some(ToolCardUpdate::MoveMask { .. }))));
        let step = card.advance(
            ToolCardMove::MoveDie {
                from: (1, 1),
                to: (1, 0),
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Completed(_)));
        assert_eq!(grid.die_at(1, 0), Some(&Die::new(DieColor::Red, 5)));
    }

    #[test]
    fn test_flux_brush_reroll_then_skip_keeps_die_in_pool() {
        let (mut board, mut grid, mut rng) = fixture();
        board.add_to_pool(Die::new(DieColor::Green, 2));
        let (mut card, _) =
            ActiveToolCard::begin(ToolCardKind::FluxBrush, "alice", &mut board, &grid, &mut rng);
        let step = card.advance(
            ToolCardMove::RerollDie {
                die: Die::new(DieColor::Green, 2),
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        let rerolled = match step {
            ToolStep::Await(Some(ToolCardUpdate::DieRerolled { die, .. })) => die,
            other => panic!("expected reroll prompt, got {:?}", other),
        };
        assert_eq!(rerolled.color, DieColor::Green);

        let step = card.advance(ToolCardMove::Skip, &mut board, &mut grid, &mut rng);
        assert!(matches!(step, ToolStep::Completed(_)));
        assert_eq!(board.pool(), &[rerolled]);
    }

    #[test]
    fn test_glazing_hammer_completes_immediately() {
        let (mut board, grid, mut rng) = fixture();
        board.draft_dice(2, &mut rng);
        let before = board.pool().len();
        let (_, step) =
            ActiveToolCard::begin(ToolCardKind::GlazingHammer, "alice", &mut board, &grid, &mut rng);
        match step {
            ToolStep::Completed(updates) => assert!(matches!(
                &updates[0],
                ToolCardUpdate::PoolUpdated { dice, rerolled: true } if dice.len() == before
            )),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn test_cork_backed_straightedge_demands_isolation() {
        let (mut board, _, mut rng) = fixture();
        let mut grid = PatternCard::from_layout("Test Window", 4, "....................");
        grid.place(Die::new(DieColor::Blue, 3), 0, 0, PlacementMode::Standard)
            .unwrap();
        board.add_to_pool(Die::new(DieColor::Red, 5));

        let (mut card, _) = ActiveToolCard::begin(
            ToolCardKind::CorkBackedStraightedge,
            "alice",
            &mut board,
            &grid,
            &mut rng,
        );
        // Adjacent to the blue die: refused.
        let step = card.advance(
            ToolCardMove::PlaceDie {
                die: Die::new(DieColor::Red, 5),
                row: 0,
                col: 1,
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Rejected(_)));

        let step = card.advance(
            ToolCardMove::PlaceDie {
                die: Die::new(DieColor::Red, 5),
                row: 2,
                col: 3,
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Completed(_)));
        assert!(board.pool().is_empty());
    }

    #[test]
    fn test_flux_remover_full_protocol() {
        let (mut board, mut grid, mut rng) = fixture();
        board.add_to_pool(Die::new(DieColor::Purple, 4));
        let (mut card, _) =
            ActiveToolCard::begin(ToolCardKind::FluxRemover, "alice", &mut board, &grid, &mut rng);

        let step = card.advance(
            ToolCardMove::ReturnDie {
                die: Die::new(DieColor::Purple, 4),
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        let drawn = match step {
            ToolStep::Await(Some(ToolCardUpdate::ReplacementDrawn { die })) => die,
            other => panic!("expected replacement, got {:?}", other),
        };
        assert!(board.pool().is_empty());
        assert_eq!(board.bag_len(), 90);

        let step = card.advance(
            ToolCardMove::ChooseValue { value: 5 },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Await(Some(ToolCardUpdate::ValueChosen { .. }))));

        let chosen = Die::new(drawn.color, 5);
        let step = card.advance(
            ToolCardMove::PlaceDie {
                die: chosen,
                row: 0,
                col: 0,
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Completed(_)));
        assert_eq!(grid.die_at(0, 0), Some(&chosen));
        assert_eq!(board.bag_len(), 90);
    }

    #[test]
    fn test_flux_remover_abort_restores_pool_and_bag() {
        let (mut board, mut grid, mut rng) = fixture();
        let original = Die::new(DieColor::Purple, 4);
        board.add_to_pool(original);
        let (mut card, _) =
            ActiveToolCard::begin(ToolCardKind::FluxRemover, "alice", &mut board, &grid, &mut rng);
        card.advance(
            ToolCardMove::ReturnDie { die: original },
            &mut board,
            &mut grid,
            &mut rng,
        );

        card.abort(&mut board, &mut grid);
        assert_eq!(board.pool(), &[original]);
        assert_eq!(board.bag_len(), 90);
    }

    #[test]
    fn test_tap_wheel_filters_by_track_color() {
        let (mut board, _, mut rng) = fixture();
        let mut grid = PatternCard::from_layout("Test Window", 4, "....................");
        grid.place(Die::new(DieColor::Blue, 3), 0, 0, PlacementMode::Standard)
            .unwrap();
        grid.place(Die::new(DieColor::Red, 5), 0, 1, PlacementMode::Standard)
            .unwrap();
        board.add_to_pool(Die::new(DieColor::Blue, 6));
        board.close_round();

        let (mut card, _) =
            ActiveToolCard::begin(ToolCardKind::TapWheel, "alice", &mut board, &grid, &mut rng);
        let step = card.advance(
            ToolCardMove::PickTrackDie {
                round: 0,
                die: Die::new(DieColor::Blue, 6),
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Await(Some(ToolCardUpdate::MoveMask { .. }))));

        // The red die is not movable under a blue pick.
        let step = card.advance(
            ToolCardMove::MoveDie {
                from: (0, 1),
                to: (1, 1),
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Rejected(_)));

        let step = card.advance(
            ToolCardMove::MoveDie {
                from: (0, 0),
                to: (1, 1),
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Await(Some(ToolCardUpdate::MoveMask { .. }))));
        let step = card.advance(ToolCardMove::Skip, &mut board, &mut grid, &mut rng);
        assert!(matches!(step, ToolStep::Completed(_)));
    }

    #[test]
    fn test_wrong_move_rejects_without_phase_change() {
        let (mut board, mut grid, mut rng) = fixture();
        board.add_to_pool(Die::new(DieColor::Red, 3));
        let (mut card, _) =
            ActiveToolCard::begin(ToolCardKind::GrozingPliers, "alice", &mut board, &grid, &mut rng);
        let step = card.advance(ToolCardMove::Skip, &mut board, &mut grid, &mut rng);
        assert!(matches!(step, ToolStep::Rejected(_)));

        // The protocol still accepts its real move afterwards.
        let step = card.advance(
            ToolCardMove::AdjustDie {
                die: Die::new(DieColor::Red, 3),
                increase: true,
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Completed(_)));
    }

    #[test]
    fn test_abort_restores_grid_snapshot() {
        let (mut board, _, mut rng) = fixture();
        let mut grid = PatternCard::from_layout("Test Window", 4, "....................");
        grid.place(Die::new(DieColor::Blue, 3), 0, 0, PlacementMode::Standard)
            .unwrap();
        let before = grid.clone();

        let (mut card, _) =
            ActiveToolCard::begin(ToolCardKind::EglomiseBrush, "alice", &mut board, &grid, &mut rng);
        card.advance(
            ToolCardMove::MoveDie {
                from: (0, 0),
                to: (0, 1),
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(grid.die_at(0, 0).is_none());

        card.abort(&mut board, &mut grid);
        assert_eq!(grid.die_at(0, 0), before.die_at(0, 0));
        assert!(grid.die_at(0, 1).is_none());
    }

    #[test]
    fn test_moved_lone_die_still_needs_the_border() {
        let (mut board, _, mut rng) = fixture();
        let mut grid = PatternCard::from_layout("Test Window", 4, "....................");
        grid.place(Die::new(DieColor::Blue, 3), 0, 0, PlacementMode::Standard)
            .unwrap();

        let (mut card, _) =
            ActiveToolCard::begin(ToolCardKind::EglomiseBrush, "alice", &mut board, &grid, &mut rng);
        // The relocated die would be alone on the grid, so an interior
        // destination violates the first-die border rule.
        let step = card.advance(
            ToolCardMove::MoveDie {
                from: (0, 0),
                to: (1, 1),
            },
            &mut board,
            &mut grid,
            &mut rng,
        );
        assert!(matches!(step, ToolStep::Rejected(_)));
        assert!(grid.die_at(0, 0).is_some());
    }
}
