//! Per-match player state.
//!
//! A `Player` is scoped to one match; persistent identity and win/loss
//! tallies live in the user directory owned by the registry.

use shared::{PatternCard, PlayerView, PrivateObjective};

pub struct Player {
    pub username: String,
    /// False while the player is deactivated (disconnected or timed out of
    /// the lobby). Inactive players are skipped by the turn schedule.
    pub active: bool,
    pub pattern_card: Option<PatternCard>,
    pub private_objective: Option<PrivateObjective>,
    /// The four-card deal offered during pattern selection.
    pub candidates: Vec<PatternCard>,
    pub favor_tokens: u8,
}

impl Player {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            active: true,
            pattern_card: None,
            private_objective: None,
            candidates: Vec::new(),
            favor_tokens: 0,
        }
    }

    /// Locks in a pattern card. The window's difficulty becomes the
    /// player's favor token allotment. The choice is immutable once made.
    pub fn assign_pattern(&mut self, card: PatternCard) {
        debug_assert!(self.pattern_card.is_none(), "pattern card chosen twice");
        self.favor_tokens = card.difficulty;
        self.pattern_card = Some(card);
    }

    pub fn has_chosen(&self) -> bool {
        self.pattern_card.is_some()
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            username: self.username.clone(),
            favor_tokens: self.favor_tokens,
            pattern_card: self.pattern_card.clone(),
            active: self.active,
        }
    }
}
