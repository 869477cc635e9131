//! The request/notification protocol between transports and the match core.
//!
//! Transports (socket adapters, test harnesses) marshal client traffic into
//! [`Request`] values and deliver [`Notification`] values back out. The core
//! never sees bytes; it sees these enums.

use crate::dice::Die;
use crate::objective::{PrivateObjective, PublicObjective};
use crate::pattern::{DieMask, PatternCard};
use crate::toolcard::{ToolCard, ToolCardKind, ToolCardMove};
use serde::{Deserialize, Serialize};

/// Inbound operation surface of the match core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Join (or rejoin after a disconnect) the named match.
    JoinMatch { username: String, match_name: String },
    /// Commit a pattern-card selection during the selection phase.
    ChoosePatternCard { username: String, card_name: String },
    /// Ask for the round's dice draft (honored for the acting player).
    DraftDice { username: String },
    /// Attempt a grid placement for the current player.
    PlaceDie {
        username: String,
        die: Die,
        row: usize,
        col: usize,
    },
    /// Begin a tool-card protocol.
    UseToolCard {
        username: String,
        card: ToolCardKind,
    },
    /// Phase-specific tool-card continuation.
    ToolCardMove {
        username: String,
        mv: ToolCardMove,
    },
    /// End the caller's turn if they are the current player.
    EndTurn { username: String },
    /// Acknowledge receipt of a broadcast (counts toward the ack barrier).
    Ack { username: String },
    /// Mark the user inactive; invoked by the transport on detected
    /// disconnect or explicit leave.
    Deactivate { username: String },
}

impl Request {
    pub fn username(&self) -> &str {
        match self {
            Request::JoinMatch { username, .. }
            | Request::ChoosePatternCard { username, .. }
            | Request::DraftDice { username }
            | Request::PlaceDie { username, .. }
            | Request::UseToolCard { username, .. }
            | Request::ToolCardMove { username, .. }
            | Request::EndTurn { username }
            | Request::Ack { username }
            | Request::Deactivate { username } => username,
        }
    }
}

/// One entry of the append-only move history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStatus {
    pub actor: String,
    pub description: String,
}

impl MoveStatus {
    pub fn new(actor: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            description: description.into(),
        }
    }
}

/// Public view of a player, safe to broadcast to every participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub username: String,
    pub favor_tokens: u8,
    pub pattern_card: Option<PatternCard>,
    pub active: bool,
}

/// Intermediate and final payloads of tool-card protocols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolCardUpdate {
    /// Flux Brush: the rerolled die plus where it may now go.
    DieRerolled { die: Die, available: Vec<DieMask> },
    /// Flux Remover: the replacement drawn from the bag.
    ReplacementDrawn { die: Die },
    /// Flux Remover: the chosen face committed, placement options attached.
    ValueChosen { die: Die, available: Vec<DieMask> },
    /// Tap Wheel / Lathekin: positions available for the next grid move.
    MoveMask { available: Vec<DieMask> },
    /// Final pool state after a pool-mutating card.
    PoolUpdated { dice: Vec<Die>, rerolled: bool },
    /// Final grid state after a grid-mutating card.
    GridUpdated {
        username: String,
        pattern_card: PatternCard,
        available: Vec<DieMask>,
    },
    /// Final round-track state after Lens Cutter.
    RoundTrackUpdated { entries: Vec<Vec<Die>> },
}

/// Outbound pushes from the core to a player's observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// Lobby roster update after a join.
    PlayerJoined {
        match_name: String,
        players: Vec<String>,
    },
    /// Selection phase opened: the four candidates dealt to this player and
    /// their secret objective.
    PatternCardChoices {
        choices: Vec<PatternCard>,
        private_objective: PrivateObjective,
    },
    /// Every player chose (or was assigned) a card; full board data follows.
    BoardData {
        players: Vec<PlayerView>,
        public_objectives: Vec<PublicObjective>,
        tool_cards: Vec<ToolCard>,
    },
    /// The acting player may draft the round's dice.
    DraftPrompt,
    /// The round's drafted pool. Clients must [`Request::Ack`] receipt.
    DraftedDice { dice: Vec<Die> },
    /// A turn opened for `username`, with their placement options.
    TurnStarted {
        username: String,
        available: Vec<DieMask>,
    },
    /// Pool changed mid-turn (a die was placed or mutated).
    DraftedDiceUpdated { dice: Vec<Die> },
    /// A player's grid changed, with refreshed placement options.
    GridUpdated {
        username: String,
        pattern_card: PatternCard,
        available: Vec<DieMask>,
    },
    /// Full append-only history; re-sent after each new entry.
    MoveHistory { moves: Vec<MoveStatus> },
    /// Round closed: the leftover dice appended to the round track.
    RoundTrackUpdated { entries: Vec<Vec<Die>> },
    /// Sent only to the player whose turn timer expired.
    TurnTimedOut,
    /// A request was refused; sent only to the actor. No state changed.
    MoveRejected { reason: String },
    /// Tool-card intermediate prompt or final result.
    ToolCard {
        card: ToolCardKind,
        update: ToolCardUpdate,
    },
    /// The requested tool card cannot be used right now.
    ToolCardDenied { reason: String },
    /// Full state replacement for a reconnecting player.
    Resync {
        players: Vec<PlayerView>,
        public_objectives: Vec<PublicObjective>,
        tool_cards: Vec<ToolCard>,
        drafted_dice: Vec<Die>,
        round_track: Vec<Vec<Die>>,
        moves: Vec<MoveStatus>,
    },
    /// Match over: this player won.
    Victory { score: i32 },
    /// Match over: this player lost, with their final score.
    Defeat { score: i32 },
    /// Match dissolved before completion (quorum loss in the lobby or the
    /// selection phase).
    MatchAborted { reason: String },
}

/// Tunable match parameters. Fed from the command line; no hardcoded bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Rounds per match.
    pub rounds: u32,
    /// Per-turn time budget in seconds.
    pub turn_seconds: u64,
    /// Pattern-card selection time budget in seconds.
    pub selection_seconds: u64,
    /// Dice-draft (and draft-ack barrier) time budget in seconds.
    pub draft_seconds: u64,
    /// Lobby wait after the minimum player count is reached, in seconds.
    pub join_seconds: u64,
    /// Liveness poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Players required before the join timer arms.
    pub min_players: usize,
    /// Players at which the match starts immediately.
    pub max_players: usize,
}

impl MatchConfig {
    /// Seats a match can actually deal for: one secret color per player and
    /// four candidate cards each from the fixed catalogue.
    pub const MAX_SEATS: usize = 4;

    /// Clamps the player bounds into `2..=MAX_SEATS` with `min <= max`.
    pub fn normalized(mut self) -> Self {
        self.max_players = self.max_players.clamp(2, Self::MAX_SEATS);
        self.min_players = self.min_players.clamp(2, self.max_players);
        self
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            rounds: 10,
            turn_seconds: 60,
            selection_seconds: 45,
            draft_seconds: 20,
            join_seconds: 30,
            poll_interval_ms: 2000,
            min_players: 2,
            max_players: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::DieColor;

    #[test]
    fn test_request_username_accessor() {
        let req = Request::PlaceDie {
            username: "alice".into(),
            die: Die::new(DieColor::Red, 3),
            row: 0,
            col: 4,
        };
        assert_eq!(req.username(), "alice");
        let req = Request::Ack {
            username: "bob".into(),
        };
        assert_eq!(req.username(), "bob");
    }

    #[test]
    fn test_request_serialization_roundtrip() {
        let requests = vec![
            Request::JoinMatch {
                username: "alice".into(),
                match_name: "table1".into(),
            },
            Request::UseToolCard {
                username: "bob".into(),
                card: ToolCardKind::FluxRemover,
            },
            Request::ToolCardMove {
                username: "bob".into(),
                mv: ToolCardMove::ChooseValue { value: 5 },
            },
            Request::Deactivate {
                username: "carol".into(),
            },
        ];
        for request in requests {
            let bytes = bincode::serialize(&request).unwrap();
            let back: Request = bincode::deserialize(&bytes).unwrap();
            assert_eq!(back, request);
        }
    }

    #[test]
    fn test_notification_serialization_roundtrip() {
        let notification = Notification::DraftedDice {
            dice: vec![
                Die::new(DieColor::Blue, 1),
                Die::new(DieColor::Purple, 6),
            ],
        };
        let bytes = bincode::serialize(&notification).unwrap();
        let back: Notification = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, notification);
    }

    #[test]
    fn test_default_config_is_canonical() {
        let config = MatchConfig::default();
        assert_eq!(config.rounds, 10);
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 4);
    }

    #[test]
    fn test_normalized_clamps_player_bounds() {
        let config = MatchConfig {
            min_players: 0,
            max_players: 99,
            ..MatchConfig::default()
        }
        .normalized();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, MatchConfig::MAX_SEATS);

        let config = MatchConfig {
            min_players: 4,
            max_players: 3,
            ..MatchConfig::default()
        }
        .normalized();
        assert_eq!(config.min_players, 3);
        assert_eq!(config.max_players, 3);
    }
}
