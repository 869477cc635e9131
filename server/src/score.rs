//! End-of-match scoring.
//!
//! A player's total is the sum of the three public objective scores, plus
//! the private objective pip sum, minus one point per empty pattern box.
//! Ties fall through a fixed cascade: highest private score, then most
//! favor tokens left, then earliest seat in the final rotation order.

use crate::player::Player;
use shared::PublicObjective;

#[derive(Debug, Clone)]
pub struct Standing {
    pub username: String,
    pub total: i32,
    pub private_score: i32,
    pub favor_tokens: u8,
}

fn score_player(player: &Player, publics: &[PublicObjective]) -> Standing {
    let (total, private_score) = match (&player.pattern_card, &player.private_objective) {
        (Some(grid), Some(private)) => {
            let public_total: i32 = publics.iter().map(|p| p.score(grid)).sum();
            let private_score = private.score(grid);
            let empty = grid.empty_box_count() as i32;
            (public_total + private_score - empty, private_score)
        }
        // A player who never got a grid scores nothing.
        _ => (0, 0),
    };
    Standing {
        username: player.username.clone(),
        total,
        private_score,
        favor_tokens: player.favor_tokens,
    }
}

/// Scores every player and picks the winner. Returns the winner's index in
/// `players` (rotation order) alongside the standings, one per player in
/// the same order.
pub fn evaluate_winner(players: &[Player], publics: &[PublicObjective]) -> (usize, Vec<Standing>) {
    debug_assert!(!players.is_empty());
    let standings: Vec<Standing> = players.iter().map(|p| score_player(p, publics)).collect();

    let mut winner = 0;
    for (idx, standing) in standings.iter().enumerate().skip(1) {
        let best = &standings[winner];
        let beats = standing.total > best.total
            || (standing.total == best.total
                && (standing.private_score > best.private_score
                    || (standing.private_score == best.private_score
                        && standing.favor_tokens > best.favor_tokens)));
        if beats {
            winner = idx;
        }
    }
    (winner, standings)
}
