//! The shared board: dice bag, drafted pool, round track, and the fixed
//! public objective / tool card picks for the match.
//!
//! Mutation primitives here are deliberately small; rule checks belong to
//! the caller (the match driver and tool-card effects). The one invariant
//! the board itself upholds is dice conservation: every die is in exactly
//! one of bag, drafted pool, or round track, and the only way dice leave is
//! through `take_from_pool` (onto a player grid) or back through
//! `return_to_bag`.

use log::{info, warn};
use rand::Rng;
use shared::{Die, DieColor, PublicObjective, ToolCard, ToolCardKind};
use std::collections::HashMap;

/// Dice of each color the bag starts with.
pub const DICE_PER_COLOR: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    BagEmpty,
    DieNotInPool(Die),
    NoSuchRound(usize),
    DieNotOnTrack(Die),
}

impl std::fmt::Display for BoardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoardError::BagEmpty => write!(f, "dice bag is exhausted"),
            BoardError::DieNotInPool(die) => write!(f, "die {} not in the drafted pool", die),
            BoardError::NoSuchRound(round) => write!(f, "round track has no entry {}", round),
            BoardError::DieNotOnTrack(die) => write!(f, "die {} not on the round track", die),
        }
    }
}

impl std::error::Error for BoardError {}

pub struct Board {
    /// Undrawn dice. Faces do not exist until a die is drafted.
    bag: Vec<DieColor>,
    drafted: Vec<Die>,
    round_track: Vec<Vec<Die>>,
    public_objectives: Vec<PublicObjective>,
    tool_cards: Vec<ToolCard>,
}

impl Board {
    pub fn new(public_objectives: Vec<PublicObjective>, tool_cards: Vec<ToolCard>) -> Self {
        let mut bag = Vec::with_capacity(DICE_PER_COLOR * DieColor::ALL.len());
        for color in DieColor::ALL {
            bag.extend(std::iter::repeat(color).take(DICE_PER_COLOR));
        }
        Self {
            bag,
            drafted: Vec::new(),
            round_track: Vec::new(),
            public_objectives,
            tool_cards,
        }
    }

    pub fn bag_len(&self) -> usize {
        self.bag.len()
    }

    pub fn pool(&self) -> &[Die] {
        &self.drafted
    }

    pub fn round_track(&self) -> &[Vec<Die>] {
        &self.round_track
    }

    pub fn public_objectives(&self) -> &[PublicObjective] {
        &self.public_objectives
    }

    pub fn tool_cards(&self) -> &[ToolCard] {
        &self.tool_cards
    }

    pub fn tool_card(&self, kind: ToolCardKind) -> Option<&ToolCard> {
        self.tool_cards.iter().find(|t| t.kind == kind)
    }

    pub fn tool_card_mut(&mut self, kind: ToolCardKind) -> Option<&mut ToolCard> {
        self.tool_cards.iter_mut().find(|t| t.kind == kind)
    }

    /// Drafts `2 * players + 1` dice from the bag into the pool. Draws as
    /// many as remain if the bag runs short. The pool must have been emptied
    /// by [`close_round`](Self::close_round) beforehand.
    pub fn draft_dice<R: Rng>(&mut self, players: usize, rng: &mut R) -> &[Die] {
        debug_assert!(self.drafted.is_empty(), "drafting over a non-empty pool");
        let want = 2 * players + 1;
        let take = want.min(self.bag.len());
        if take < want {
            warn!("bag short: drafting {} of {} requested dice", take, want);
        }
        for _ in 0..take {
            let idx = rng.gen_range(0..self.bag.len());
            let color = self.bag.swap_remove(idx);
            self.drafted.push(Die::rolled(color, rng));
        }
        info!("drafted {} dice, {} left in bag", take, self.bag.len());
        &self.drafted
    }

    /// Draws a single die from the bag, used by tool cards that inject a
    /// fresh die. The die is handed to the caller, not added to the pool.
    pub fn draft_one<R: Rng>(&mut self, rng: &mut R) -> Result<Die, BoardError> {
        if self.bag.is_empty() {
            return Err(BoardError::BagEmpty);
        }
        let idx = rng.gen_range(0..self.bag.len());
        let color = self.bag.swap_remove(idx);
        Ok(Die::rolled(color, rng))
    }

    /// Removes a die from the pool by (color, value) match. Clients send
    /// serialized copies, so identity resolution is by value.
    pub fn take_from_pool(&mut self, die: Die) -> Result<Die, BoardError> {
        match self.drafted.iter().position(|d| *d == die) {
            Some(idx) => Ok(self.drafted.remove(idx)),
            None => Err(BoardError::DieNotInPool(die)),
        }
    }

    /// Mutable access to a pooled die for in-place face edits.
    pub fn pool_die_mut(&mut self, die: Die) -> Result<&mut Die, BoardError> {
        match self.drafted.iter().position(|d| *d == die) {
            Some(idx) => Ok(&mut self.drafted[idx]),
            None => Err(BoardError::DieNotInPool(die)),
        }
    }

    pub fn add_to_pool(&mut self, die: Die) {
        self.drafted.push(die);
    }

    /// Returns a die to the bag; its face is forgotten.
    pub fn return_to_bag(&mut self, color: DieColor) {
        self.bag.push(color);
    }

    /// Removes one die of `color` from the bag, for effect rollback.
    pub fn take_color_from_bag(&mut self, color: DieColor) -> bool {
        match self.bag.iter().position(|c| *c == color) {
            Some(idx) => {
                self.bag.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Archives the leftover pool as a new round-track entry. Returns the
    /// entry for broadcasting, or None when every die was placed.
    pub fn close_round(&mut self) -> Option<Vec<Die>> {
        if self.drafted.is_empty() {
            return None;
        }
        let entry: Vec<Die> = self.drafted.drain(..).collect();
        self.round_track.push(entry.clone());
        Some(entry)
    }

    /// Lens Cutter: swap a pool die with a round-track die. Both sides of
    /// the swap are checked for existence before anything moves.
    pub fn swap_with_track(
        &mut self,
        round: usize,
        track_die: Die,
        pool_die: Die,
    ) -> Result<(), BoardError> {
        let entry = self
            .round_track
            .get_mut(round)
            .ok_or(BoardError::NoSuchRound(round))?;
        let track_idx = entry
            .iter()
            .position(|d| *d == track_die)
            .ok_or(BoardError::DieNotOnTrack(track_die))?;
        let pool_idx = self
            .drafted
            .iter()
            .position(|d| *d == pool_die)
            .ok_or(BoardError::DieNotInPool(pool_die))?;
        entry[track_idx] = pool_die;
        self.drafted[pool_idx] = track_die;
        Ok(())
    }

    /// Color census over everything the board holds (bag, pool, track).
    /// Callers add grid dice to verify full conservation.
    pub fn color_census(&self) -> HashMap<DieColor, usize> {
        let mut census: HashMap<DieColor, usize> =
            DieColor::ALL.iter().map(|c| (*c, 0)).collect();
        for color in &self.bag {
            *census.get_mut(color).unwrap() += 1;
        }
        for die in &self.drafted {
            *census.get_mut(&die.color).unwrap() += 1;
        }
        for entry in &self.round_track {
            for die in entry {
                *census.get_mut(&die.color).unwrap() += 1;
            }
        }
        census
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_board() -> Board {
        Board::new(
            vec![PublicObjective::RowColorVariety],
            vec![ToolCard::new(ToolCardKind::LensCutter)],
        )
    }

    #[test]
    fn test_new_bag_holds_ninety_dice() {
        let board = test_board();
        assert_eq!(board.bag_len(), 90);
        for (_, count) in board.color_census() {
            assert_eq!(count, DICE_PER_COLOR);
        }
    }

    #[test]
    fn test_draft_draws_two_n_plus_one() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = test_board();
        let drafted = board.draft_dice(4, &mut rng).to_vec();
        assert_eq!(drafted.len(), 9);
        assert_eq!(board.bag_len(), 81);
        for die in drafted {
            assert!((1..=6).contains(&die.value));
        }
    }

    #[test]
    fn test_draft_short_bag_draws_what_remains() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = test_board();
        // Drain the bag down to three dice.
        while board.bag_len() > 3 {
            board.draft_one(&mut rng).unwrap();
        }
        let drafted = board.draft_dice(4, &mut rng).len();
        assert_eq!(drafted, 3);
        assert_eq!(board.bag_len(), 0);
        assert_eq!(board.draft_one(&mut rng), Err(BoardError::BagEmpty));
    }

    #[test]
    fn test_take_from_pool_is_by_color_and_value() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = test_board();
        board.draft_dice(2, &mut rng);
        let target = board.pool()[0];
        let taken = board.take_from_pool(target).unwrap();
        assert_eq!(taken, target);
        assert_eq!(board.pool().len(), 4);

        let missing = Die::new(DieColor::Red, 1);
        if !board.pool().contains(&missing) {
            assert_eq!(
                board.take_from_pool(missing),
                Err(BoardError::DieNotInPool(missing))
            );
        }
    }

    #[test]
    fn test_close_round_archives_leftovers() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = test_board();
        board.draft_dice(2, &mut rng);
        let leftovers = board.pool().to_vec();
        let entry = board.close_round().unwrap();
        assert_eq!(entry, leftovers);
        assert!(board.pool().is_empty());
        assert_eq!(board.round_track().len(), 1);
        // Nothing left: no empty entries are pushed.
        assert_eq!(board.close_round(), None);
        assert_eq!(board.round_track().len(), 1);
    }

    #[test]
    fn test_swap_with_track_exchanges_dice() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = test_board();
        board.draft_dice(2, &mut rng);
        board.close_round();
        board.draft_dice(2, &mut rng);

        let track_die = board.round_track()[0][0];
        let pool_die = board.pool()[0];
        board.swap_with_track(0, track_die, pool_die).unwrap();
        assert!(board.pool().contains(&track_die));
        assert!(board.round_track()[0].contains(&pool_die));

        assert_eq!(
            board.swap_with_track(5, track_die, pool_die),
            Err(BoardError::NoSuchRound(5))
        );
    }

    #[test]
    fn test_conservation_across_draft_and_close() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut board = test_board();
        for _ in 0..5 {
            board.draft_dice(4, &mut rng);
            board.close_round();
        }
        let census = board.color_census();
        let total: usize = census.values().sum();
        assert_eq!(total, 90);
    }

    #[test]
    fn test_return_and_take_from_bag() {
        let mut board = test_board();
        board.return_to_bag(DieColor::Blue);
        assert_eq!(board.bag_len(), 91);
        assert!(board.take_color_from_bag(DieColor::Blue));
        assert_eq!(board.bag_len(), 90);
    }
}
