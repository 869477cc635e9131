//! Event-driven orchestration of a single match.
//!
//! One `MatchDriver` owns everything a match needs: roster, board, turn
//! schedule, timers, and the in-flight tool card. All mutation goes through
//! [`MatchDriver::handle_event`], which is synchronous and deterministic;
//! [`MatchDriver::run`] is a thin async loop that feeds it queued requests,
//! due timers, and periodic liveness sweeps. Timer entries carry a
//! generation stamp so a deadline that was cancelled or re-armed cannot
//! fire late.

use crate::barrier::AckBarrier;
use crate::board::Board;
use crate::observer::PlayerObserver;
use crate::player::Player;
use crate::registry::UserDirectory;
use crate::round::Round;
use crate::score::evaluate_winner;
use crate::toolcards::{ActiveToolCard, ToolStep};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{
    MatchConfig, MoveStatus, Notification, PatternCard, PlacementMode, PrivateObjective,
    PublicObjective, Request, ToolCard, ToolCardKind, ToolCardMove,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Lobby countdown once the minimum player count is reached.
    Join,
    /// Pattern-card selection budget.
    Selection,
    /// Wait for the acting player to request the draft.
    Draft,
    /// Escape hatch for the post-draft ack barrier.
    DraftAck,
    /// Per-turn budget.
    Turn,
}

pub enum MatchEvent {
    Request(Request),
    /// A transport (or test) bound a delivery channel for `username`.
    ObserverAttached {
        username: String,
        observer: Box<dyn PlayerObserver>,
    },
    /// A deadline came due. Stale generations are ignored.
    Timer { kind: TimerKind, generation: u64 },
    /// Periodic disconnection probe.
    LivenessSweep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Lobby,
    PatternSelection,
    DiceDraft,
    RoundPlay,
    Closed,
}

pub struct MatchDriver {
    name: String,
    config: MatchConfig,
    directory: Arc<Mutex<UserDirectory>>,
    players: Vec<Player>,
    observers: HashMap<String, Box<dyn PlayerObserver>>,
    phase: MatchPhase,
    board: Option<Board>,
    round: Option<Round>,
    /// Completed rounds.
    round_no: u32,
    active_tool: Option<ActiveToolCard>,
    barrier: Option<AckBarrier>,
    history: Vec<MoveStatus>,
    timers: HashMap<TimerKind, (u64, Instant)>,
    timer_gen: u64,
    history_path: Option<PathBuf>,
    rng: StdRng,
}

impl MatchDriver {
    pub fn new(
        name: impl Into<String>,
        config: MatchConfig,
        directory: Arc<Mutex<UserDirectory>>,
        history_path: Option<PathBuf>,
    ) -> Self {
        Self::build(name, config, directory, history_path, StdRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn seeded(
        name: impl Into<String>,
        config: MatchConfig,
        directory: Arc<Mutex<UserDirectory>>,
        seed: u64,
    ) -> Self {
        Self::build(name, config, directory, None, StdRng::seed_from_u64(seed))
    }

    fn build(
        name: impl Into<String>,
        config: MatchConfig,
        directory: Arc<Mutex<UserDirectory>>,
        history_path: Option<PathBuf>,
        rng: StdRng,
    ) -> Self {
        Self {
            name: name.into(),
            config: config.normalized(),
            directory,
            players: Vec::new(),
            observers: HashMap::new(),
            phase: MatchPhase::Lobby,
            board: None,
            round: None,
            round_no: 0,
            active_tool: None,
            barrier: None,
            history: Vec::new(),
            timers: HashMap::new(),
            timer_gen: 0,
            history_path,
            rng,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == MatchPhase::Closed
    }

    pub fn history(&self) -> &[MoveStatus] {
        &self.history
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn player(&self, username: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.username == username)
    }

    pub fn current_player(&self) -> Option<&str> {
        self.round.as_ref().and_then(|r| r.current_player())
    }

    /// The earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<(TimerKind, u64, Instant)> {
        self.timers
            .iter()
            .min_by_key(|(_, (_, at))| *at)
            .map(|(kind, (gen, at))| (*kind, *gen, *at))
    }

    /// Drives the match until teardown. Queued events, due timers, and the
    /// liveness sweep all funnel into [`handle_event`](Self::handle_event).
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<MatchEvent>) {
        let mut sweep =
            tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        while !self.is_closed() {
            match self.next_deadline() {
                Some((kind, generation, at)) => {
                    tokio::select! {
                        event = rx.recv() => match event {
                            Some(event) => self.handle_event(event),
                            None => break,
                        },
                        _ = tokio::time::sleep_until(tokio::time::Instant::from_std(at)) => {
                            self.handle_event(MatchEvent::Timer { kind, generation });
                        }
                        _ = sweep.tick() => self.handle_event(MatchEvent::LivenessSweep),
                    }
                }
                None => {
                    tokio::select! {
                        event = rx.recv() => match event {
                            Some(event) => self.handle_event(event),
                            None => break,
                        },
                        _ = sweep.tick() => self.handle_event(MatchEvent::LivenessSweep),
                    }
                }
            }
        }
        info!("match '{}' closed", self.name);
    }

    /// Single entry point for all match mutation.
    pub fn handle_event(&mut self, event: MatchEvent) {
        if self.is_closed() {
            return;
        }
        match event {
            MatchEvent::Request(request) => self.handle_request(request),
            MatchEvent::ObserverAttached { username, observer } => {
                debug!("match '{}': observer attached for {}", self.name, username);
                self.observers.insert(username, observer);
            }
            MatchEvent::Timer { kind, generation } => self.handle_timer(kind, generation),
            MatchEvent::LivenessSweep => self.sweep(),
        }
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::JoinMatch { username, .. } => self.on_join(username),
            Request::ChoosePatternCard {
                username,
                card_name,
            } => self.on_choose(&username, &card_name),
            Request::DraftDice { username } => self.on_draft(&username),
            Request::PlaceDie {
                username,
                die,
                row,
                col,
            } => self.on_place(&username, die, row, col),
            Request::UseToolCard { username, card } => self.on_use_tool(&username, card),
            Request::ToolCardMove { username, mv } => self.on_tool_move(&username, mv),
            Request::EndTurn { username } => self.on_end_turn(&username),
            Request::Ack { username } => self.on_ack(&username),
            Request::Deactivate { username } => self.on_deactivate(&username),
        }
    }

    fn handle_timer(&mut self, kind: TimerKind, generation: u64) {
        match self.timers.get(&kind) {
            Some((armed, _)) if *armed == generation => {
                self.timers.remove(&kind);
            }
            // Cancelled or re-armed since this deadline was scheduled.
            _ => return,
        }
        debug!("match '{}': {:?} timer fired", self.name, kind);
        match kind {
            TimerKind::Join => {
                if self.active_count() >= self.config.min_players {
                    self.start_selection();
                }
            }
            TimerKind::Selection => self.finish_selection(),
            TimerKind::Draft => self.do_draft(),
            TimerKind::DraftAck => {
                if self.barrier.as_mut().map_or(false, |b| b.force()) {
                    warn!(
                        "match '{}': draft ack barrier forced open",
                        self.name
                    );
                    self.start_round_play();
                }
            }
            TimerKind::Turn => {
                if let Some(current) = self.current_player().map(String::from) {
                    info!("match '{}': turn of {} timed out", self.name, current);
                    self.send_to(&current, Notification::TurnTimedOut);
                    self.end_turn(&current);
                }
            }
        }
    }

    // -- lobby ------------------------------------------------------------

    fn on_join(&mut self, username: String) {
        if let Some(player) = self.players.iter_mut().find(|p| p.username == username) {
            // Rejoin after a disconnect.
            player.active = true;
            info!("match '{}': {} rejoined", self.name, username);
            if self.phase != MatchPhase::Lobby {
                self.resync(&username);
            }
            return;
        }
        if self.phase != MatchPhase::Lobby {
            self.send_to(
                &username,
                Notification::MoveRejected {
                    reason: "match already started".into(),
                },
            );
            return;
        }
        if self.players.len() >= self.config.max_players {
            self.send_to(
                &username,
                Notification::MoveRejected {
                    reason: "match is full".into(),
                },
            );
            return;
        }
        self.directory.lock().unwrap().ensure(&username);
        self.players.push(Player::new(username.clone()));
        info!(
            "match '{}': {} joined ({}/{})",
            self.name,
            username,
            self.players.len(),
            self.config.max_players
        );
        let roster: Vec<String> = self.players.iter().map(|p| p.username.clone()).collect();
        self.broadcast(Notification::PlayerJoined {
            match_name: self.name.clone(),
            players: roster,
        });
        if self.players.len() == self.config.max_players {
            self.start_selection();
        } else if self.players.len() >= self.config.min_players
            && !self.timers.contains_key(&TimerKind::Join)
        {
            self.arm_timer(TimerKind::Join, Duration::from_secs(self.config.join_seconds));
        }
    }

    // -- pattern selection ------------------------------------------------

    fn start_selection(&mut self) {
        self.cancel_timer(TimerKind::Join);
        self.phase = MatchPhase::PatternSelection;
        info!(
            "match '{}': selection opened for {} players",
            self.name,
            self.players.len()
        );

        let mut colors = shared::DieColor::ALL.to_vec();
        colors.shuffle(&mut self.rng);
        let mut catalogue = PatternCard::catalogue();
        catalogue.shuffle(&mut self.rng);

        let mut deals = Vec::new();
        for (idx, player) in self.players.iter_mut().enumerate() {
            let private = PrivateObjective { color: colors[idx] };
            player.private_objective = Some(private);
            player.candidates = catalogue.drain(..4).collect();
            deals.push((
                player.username.clone(),
                Notification::PatternCardChoices {
                    choices: player.candidates.clone(),
                    private_objective: private,
                },
            ));
        }
        for (username, note) in deals {
            self.send_to(&username, note);
        }
        self.barrier = Some(AckBarrier::new(self.active_count()));
        self.arm_timer(
            TimerKind::Selection,
            Duration::from_secs(self.config.selection_seconds),
        );
    }

    fn on_choose(&mut self, username: &str, card_name: &str) {
        if self.phase != MatchPhase::PatternSelection {
            self.reject(username, "no selection in progress");
            return;
        }
        let Some(player) = self.players.iter_mut().find(|p| p.username == username) else {
            return;
        };
        if player.has_chosen() {
            self.reject(username, "pattern card already chosen");
            return;
        }
        let Some(card) = player.candidates.iter().find(|c| c.name == card_name).cloned() else {
            self.reject(username, "card was not offered to you");
            return;
        };
        player.assign_pattern(card);
        info!("match '{}': {} chose '{}'", self.name, username, card_name);
        if self.barrier.as_mut().map_or(false, |b| b.ack()) {
            self.finish_selection();
        }
    }

    /// Closes the selection phase, assigning a random candidate to anyone
    /// who has not chosen. Reached from the last choice or from the timer;
    /// the phase check makes the second path a no-op.
    fn finish_selection(&mut self) {
        if self.phase != MatchPhase::PatternSelection {
            return;
        }
        self.cancel_timer(TimerKind::Selection);
        self.barrier = None;
        for player in &mut self.players {
            if !player.has_chosen() {
                let pick = self
                    .rng
                    .gen_range(0..player.candidates.len());
                let card = player.candidates[pick].clone();
                info!(
                    "match '{}': assigned '{}' to {}",
                    self.name, card.name, player.username
                );
                player.assign_pattern(card);
            }
        }
        if self.active_count() < self.config.min_players {
            self.abort_match("not enough players to start");
            return;
        }

        let mut publics = PublicObjective::ALL.to_vec();
        publics.shuffle(&mut self.rng);
        publics.truncate(3);
        let mut kinds = ToolCardKind::ALL.to_vec();
        kinds.shuffle(&mut self.rng);
        let tools: Vec<ToolCard> = kinds.into_iter().take(3).map(ToolCard::new).collect();
        let board = Board::new(publics, tools);
        let note = Notification::BoardData {
            players: self.players.iter().map(|p| p.view()).collect(),
            public_objectives: board.public_objectives().to_vec(),
            tool_cards: board.tool_cards().to_vec(),
        };
        self.board = Some(board);
        self.broadcast(note);
        self.open_draft();
    }

    // -- dice draft -------------------------------------------------------

    /// Prompts the rotation head to draft and arms the fallback timer.
    fn open_draft(&mut self) {
        self.phase = MatchPhase::DiceDraft;
        self.barrier = None;
        if let Some(head) = self.draft_head() {
            self.send_to(&head, Notification::DraftPrompt);
        }
        self.arm_timer(TimerKind::Draft, Duration::from_secs(self.config.draft_seconds));
    }

    fn draft_head(&self) -> Option<String> {
        self.players
            .iter()
            .find(|p| p.active)
            .map(|p| p.username.clone())
    }

    fn on_draft(&mut self, username: &str) {
        if self.phase != MatchPhase::DiceDraft || self.barrier.is_some() {
            self.reject(username, "no draft pending");
            return;
        }
        if self.draft_head().as_deref() != Some(username) {
            self.reject(username, "not your draft");
            return;
        }
        self.do_draft();
    }

    fn do_draft(&mut self) {
        if self.phase != MatchPhase::DiceDraft || self.barrier.is_some() {
            return;
        }
        self.cancel_timer(TimerKind::Draft);
        let count = self.players.len();
        let Some(board) = self.board.as_mut() else {
            return;
        };
        let dice = board.draft_dice(count, &mut self.rng).to_vec();
        self.broadcast(Notification::DraftedDice { dice });
        if let Some(head) = self.draft_head() {
            self.record_move(&head, "Drafted dice");
        }
        self.barrier = Some(AckBarrier::new(self.active_count()));
        self.arm_timer(
            TimerKind::DraftAck,
            Duration::from_secs(self.config.draft_seconds),
        );
    }

    fn on_ack(&mut self, username: &str) {
        if self.phase != MatchPhase::DiceDraft {
            return;
        }
        if self.player(username).map_or(true, |p| !p.active) {
            return;
        }
        if self.barrier.as_mut().map_or(false, |b| b.ack()) {
            self.start_round_play();
        }
    }

    // -- round play -------------------------------------------------------

    fn start_round_play(&mut self) {
        self.cancel_timer(TimerKind::DraftAck);
        self.barrier = None;
        self.phase = MatchPhase::RoundPlay;
        let order: Vec<String> = self.players.iter().map(|p| p.username.clone()).collect();
        self.round = Some(Round::new(order));
        info!(
            "match '{}': round {} started",
            self.name,
            self.round_no + 1
        );
        self.advance_turn();
    }

    fn advance_turn(&mut self) {
        let actives: HashSet<String> = self
            .players
            .iter()
            .filter(|p| p.active)
            .map(|p| p.username.clone())
            .collect();
        let next = self
            .round
            .as_mut()
            .and_then(|r| r.advance(|name| actives.contains(name)))
            .map(String::from);
        match next {
            Some(username) => self.start_turn(&username),
            None => self.close_round(),
        }
    }

    fn start_turn(&mut self, username: &str) {
        let available = match (self.board.as_ref(), self.player(username)) {
            (Some(board), Some(player)) => player
                .pattern_card
                .as_ref()
                .map(|grid| grid.available_positions(board.pool(), PlacementMode::Standard))
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        info!("match '{}': turn of {}", self.name, username);
        self.broadcast(Notification::TurnStarted {
            username: username.to_string(),
            available,
        });
        self.arm_timer(TimerKind::Turn, Duration::from_secs(self.config.turn_seconds));
    }

    fn on_place(&mut self, username: &str, die: shared::Die, row: usize, col: usize) {
        if self.phase != MatchPhase::RoundPlay || self.current_player() != Some(username) {
            self.reject(username, "not your turn");
            return;
        }
        if self.active_tool.is_some() {
            self.reject(username, "finish the active tool card first");
            return;
        }
        if self.round.as_ref().map_or(false, |r| r.has_placed_this_turn()) {
            self.reject(username, "a die was already placed this turn");
            return;
        }
        let Some(idx) = self.players.iter().position(|p| p.username == username) else {
            return;
        };
        let Some(board) = self.board.as_mut() else {
            return;
        };
        let Some(grid) = self.players[idx].pattern_card.as_mut() else {
            return;
        };
        if !board.pool().contains(&die) {
            self.reject(username, &format!("die {} not in the drafted pool", die));
            return;
        }
        if let Err(e) = grid.check_placement(&die, row, col, PlacementMode::Standard) {
            let reason = e.to_string();
            self.reject(username, &reason);
            return;
        }
        // Both checks passed; neither call can fail now.
        let _ = board.take_from_pool(die);
        let _ = grid.place(die, row, col, PlacementMode::Standard);
        let dice = board.pool().to_vec();
        if let Some(round) = self.round.as_mut() {
            round.record_placement();
        }

        let grid_note = self.grid_note(username);
        self.broadcast(Notification::DraftedDiceUpdated { dice });
        if let Some(note) = grid_note {
            self.broadcast(note);
        }
        self.record_move(
            username,
            &format!("Placed die {} at ({}, {})", die, row, col),
        );
    }

    fn on_use_tool(&mut self, username: &str, kind: ToolCardKind) {
        if self.phase != MatchPhase::RoundPlay || self.current_player() != Some(username) {
            self.deny_tool(username, "not your turn");
            return;
        }
        if self.active_tool.is_some() {
            self.deny_tool(username, "a tool card is already active");
            return;
        }
        if self.round.as_ref().map_or(false, |r| r.tool_used_this_turn()) {
            self.deny_tool(username, "a tool card was already used this turn");
            return;
        }
        let Some(idx) = self.players.iter().position(|p| p.username == username) else {
            return;
        };
        let price = match self.board.as_ref().and_then(|b| b.tool_card(kind)) {
            Some(card) => card.price(),
            None => {
                self.deny_tool(username, "that tool card is not in play");
                return;
            }
        };
        if self.players[idx].favor_tokens < price {
            self.deny_tool(username, "not enough favor tokens");
            return;
        }
        let Some(board) = self.board.as_mut() else {
            return;
        };
        let Some(grid) = self.players[idx].pattern_card.as_ref() else {
            return;
        };
        let (tool, step) = ActiveToolCard::begin(kind, username, board, grid, &mut self.rng);
        self.record_move(username, &format!("Used toolcard {}", kind.name()));
        match step {
            ToolStep::Await(prompt) => {
                self.active_tool = Some(tool);
                if let Some(update) = prompt {
                    self.send_to(username, Notification::ToolCard { card: kind, update });
                }
            }
            ToolStep::Completed(updates) => self.finalize_tool(kind, username, updates),
            ToolStep::Rejected(reason) => self.deny_tool(username, &reason),
        }
    }

    fn on_tool_move(&mut self, username: &str, mv: ToolCardMove) {
        let Some(mut tool) = self.active_tool.take() else {
            self.reject(username, "no tool card is active");
            return;
        };
        if tool.player != username {
            self.active_tool = Some(tool);
            self.reject(username, "the active tool card is not yours");
            return;
        }
        let Some(idx) = self.players.iter().position(|p| p.username == username) else {
            return;
        };
        let kind = tool.kind;
        let step = match (self.board.as_mut(), self.players[idx].pattern_card.as_mut()) {
            (Some(board), Some(grid)) => tool.advance(mv, board, grid, &mut self.rng),
            _ => return,
        };
        match step {
            ToolStep::Await(prompt) => {
                self.active_tool = Some(tool);
                if let Some(update) = prompt {
                    self.send_to(username, Notification::ToolCard { card: kind, update });
                }
            }
            ToolStep::Completed(updates) => self.finalize_tool(kind, username, updates),
            ToolStep::Rejected(reason) => {
                self.active_tool = Some(tool);
                self.reject(username, &reason);
            }
        }
    }

    /// Charges the price, escalates the card, and broadcasts the final
    /// updates. The favor price lands exactly once, here.
    fn finalize_tool(
        &mut self,
        kind: ToolCardKind,
        username: &str,
        updates: Vec<shared::ToolCardUpdate>,
    ) {
        let price = self
            .board
            .as_mut()
            .and_then(|b| b.tool_card_mut(kind))
            .map(|card| {
                let price = card.price();
                card.uses += 1;
                price
            })
            .unwrap_or(0);
        if let Some(player) = self.players.iter_mut().find(|p| p.username == username) {
            player.favor_tokens = player.favor_tokens.saturating_sub(price);
        }
        if let Some(round) = self.round.as_mut() {
            round.record_tool_use();
        }
        for update in updates {
            self.broadcast(Notification::ToolCard { card: kind, update });
        }
    }

    fn on_end_turn(&mut self, username: &str) {
        if self.phase != MatchPhase::RoundPlay || self.current_player() != Some(username) {
            self.reject(username, "not your turn");
            return;
        }
        let username = username.to_string();
        self.end_turn(&username);
    }

    /// Closes the current turn: aborts any in-flight tool card, records the
    /// history entry, and advances the schedule. Every way a turn can end
    /// (explicit request, timer, disconnect) converges here.
    fn end_turn(&mut self, username: &str) {
        self.cancel_timer(TimerKind::Turn);
        if let Some(mut tool) = self.active_tool.take() {
            let owner = tool.player.clone();
            if let Some(idx) = self.players.iter().position(|p| p.username == owner) {
                if let (Some(board), Some(grid)) =
                    (self.board.as_mut(), self.players[idx].pattern_card.as_mut())
                {
                    tool.abort(board, grid);
                    debug!("match '{}': aborted {} for {}", self.name, tool.kind.name(), owner);
                }
            }
        }
        self.record_move(username, "Ended turn");
        self.advance_turn();
    }

    fn close_round(&mut self) {
        self.round = None;
        if let Some(board) = self.board.as_mut() {
            if board.close_round().is_some() {
                let entries = board.round_track().to_vec();
                self.broadcast(Notification::RoundTrackUpdated { entries });
            }
        }
        self.players.rotate_left(1);
        self.round_no += 1;
        info!(
            "match '{}': round {}/{} complete",
            self.name, self.round_no, self.config.rounds
        );
        if self.round_no >= self.config.rounds {
            self.finish_match();
        } else {
            self.open_draft();
        }
    }

    // -- scoring and teardown ---------------------------------------------

    fn finish_match(&mut self) {
        let publics = self
            .board
            .as_ref()
            .map(|b| b.public_objectives().to_vec())
            .unwrap_or_default();
        let (winner, standings) = evaluate_winner(&self.players, &publics);
        {
            let mut directory = self.directory.lock().unwrap();
            for (idx, player) in self.players.iter().enumerate() {
                if idx == winner {
                    directory.record_win(&player.username);
                } else {
                    directory.record_loss(&player.username);
                }
            }
        }
        // Disconnected players get the stats update only.
        let reachable: Vec<(usize, String)> = standings
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                self.players
                    .iter()
                    .any(|p| p.username == s.username && p.active)
            })
            .map(|(idx, s)| (idx, s.username.clone()))
            .collect();
        for (idx, username) in reachable {
            let note = if idx == winner {
                Notification::Victory {
                    score: standings[idx].total,
                }
            } else {
                Notification::Defeat {
                    score: standings[idx].total,
                }
            };
            self.send_to(&username, note);
        }
        info!(
            "match '{}': {} won with {} points",
            self.name, standings[winner].username, standings[winner].total
        );
        self.teardown();
    }

    /// Quorum collapse: the sole remaining player wins on the spot with a
    /// zeroed score.
    fn force_end(&mut self) {
        let survivor = self
            .players
            .iter()
            .find(|p| p.active)
            .map(|p| p.username.clone());
        {
            let mut directory = self.directory.lock().unwrap();
            for player in &self.players {
                if Some(&player.username) == survivor.as_ref() {
                    directory.record_win(&player.username);
                } else {
                    directory.record_loss(&player.username);
                }
            }
        }
        if let Some(winner) = survivor {
            info!(
                "match '{}': {} wins by forfeit",
                self.name, winner
            );
            self.send_to(&winner, Notification::Victory { score: 0 });
        } else {
            warn!("match '{}': every player disconnected", self.name);
        }
        self.teardown();
    }

    fn abort_match(&mut self, reason: &str) {
        warn!("match '{}' aborted: {}", self.name, reason);
        self.broadcast(Notification::MatchAborted {
            reason: reason.to_string(),
        });
        self.teardown();
    }

    fn teardown(&mut self) {
        self.timers.clear();
        self.barrier = None;
        self.active_tool = None;
        self.round = None;
        self.phase = MatchPhase::Closed;
        if let Some(path) = self.history_path.clone() {
            let record = serde_json::json!({
                "match": self.name,
                "moves": self.history,
            });
            match serde_json::to_string_pretty(&record) {
                Ok(body) => {
                    if let Err(e) = std::fs::write(&path, body) {
                        error!("match '{}': history dump failed: {}", self.name, e);
                    }
                }
                Err(e) => error!("match '{}': history encode failed: {}", self.name, e),
            }
        }
    }

    // -- liveness ---------------------------------------------------------

    fn on_deactivate(&mut self, username: &str) {
        let Some(player) = self.players.iter_mut().find(|p| p.username == username) else {
            return;
        };
        if !player.active {
            return;
        }
        player.active = false;
        // Dropping the channel lets the transport's send pump terminate;
        // only an explicit rejoin attaches a fresh one.
        self.observers.remove(username);
        info!("match '{}': {} deactivated", self.name, username);
        self.after_departure(username);
    }

    /// Periodic probe over every observer. Detects silent disconnects;
    /// reactivation happens only through the explicit rejoin path.
    fn sweep(&mut self) {
        let dropped: Vec<String> = self
            .players
            .iter()
            .filter(|p| {
                p.active
                    && !self
                        .observers
                        .get(&p.username)
                        .map_or(false, |obs| obs.is_connected())
            })
            .map(|p| p.username.clone())
            .collect();
        for username in dropped {
            warn!("match '{}': lost contact with {}", self.name, username);
            if let Some(player) = self.players.iter_mut().find(|p| p.username == username) {
                player.active = false;
            }
            self.observers.remove(&username);
            self.after_departure(&username);
            if self.is_closed() {
                return;
            }
        }
        // Players marked inactive by a failed delivery skipped the departure
        // follow-up; settle the quorum and any ghost turn here.
        if self.phase != MatchPhase::Lobby
            && self.players.len() >= 2
            && self.active_count() <= 1
        {
            self.force_end();
            return;
        }
        if self.phase == MatchPhase::RoundPlay {
            if let Some(current) = self.current_player().map(String::from) {
                let gone = self
                    .players
                    .iter()
                    .any(|p| p.username == current && !p.active);
                if gone {
                    self.end_turn(&current);
                }
            }
        }
    }

    /// Common follow-up once a player goes inactive: drop them from a
    /// waiting lobby, close their turn, and check the quorum.
    fn after_departure(&mut self, username: &str) {
        if self.phase == MatchPhase::Lobby {
            self.players.retain(|p| p.active);
            if self.players.len() < self.config.min_players {
                self.cancel_timer(TimerKind::Join);
            }
            let roster: Vec<String> = self.players.iter().map(|p| p.username.clone()).collect();
            self.broadcast(Notification::PlayerJoined {
                match_name: self.name.clone(),
                players: roster,
            });
            return;
        }
        if self.players.len() >= 2 && self.active_count() <= 1 {
            self.force_end();
            return;
        }
        if self.phase == MatchPhase::RoundPlay && self.current_player() == Some(username) {
            let username = username.to_string();
            self.end_turn(&username);
        }
    }

    fn resync(&mut self, username: &str) {
        let note = match self.board.as_ref() {
            Some(board) => Notification::Resync {
                players: self.players.iter().map(|p| p.view()).collect(),
                public_objectives: board.public_objectives().to_vec(),
                tool_cards: board.tool_cards().to_vec(),
                drafted_dice: board.pool().to_vec(),
                round_track: board.round_track().to_vec(),
                moves: self.history.clone(),
            },
            // Selection still running: replay the player's own deal.
            None => match self.player(username) {
                Some(player) => match player.private_objective {
                    Some(private) => Notification::PatternCardChoices {
                        choices: player.candidates.clone(),
                        private_objective: private,
                    },
                    None => return,
                },
                None => return,
            },
        };
        self.send_to(username, note);
    }

    // -- plumbing ---------------------------------------------------------

    fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.active).count()
    }

    fn grid_note(&self, username: &str) -> Option<Notification> {
        let board = self.board.as_ref()?;
        let player = self.player(username)?;
        let grid = player.pattern_card.as_ref()?;
        Some(Notification::GridUpdated {
            username: username.to_string(),
            pattern_card: grid.clone(),
            available: grid.available_positions(board.pool(), PlacementMode::Standard),
        })
    }

    fn record_move(&mut self, actor: &str, description: &str) {
        self.history.push(MoveStatus::new(actor, description));
        self.broadcast(Notification::MoveHistory {
            moves: self.history.clone(),
        });
    }

    fn reject(&mut self, username: &str, reason: &str) {
        debug!("match '{}': rejected {}: {}", self.name, username, reason);
        self.send_to(
            username,
            Notification::MoveRejected {
                reason: reason.to_string(),
            },
        );
    }

    fn deny_tool(&mut self, username: &str, reason: &str) {
        debug!("match '{}': tool denied for {}: {}", self.name, username, reason);
        self.send_to(
            username,
            Notification::ToolCardDenied {
                reason: reason.to_string(),
            },
        );
    }

    /// Delivery failures mark the target disconnected; they never abort the
    /// transition that produced the notification.
    fn broadcast(&mut self, note: Notification) {
        let mut failed = Vec::new();
        for player in &self.players {
            if !player.active {
                continue;
            }
            if let Some(obs) = self.observers.get(&player.username) {
                if obs.deliver(note.clone()).is_err() {
                    failed.push(player.username.clone());
                }
            }
        }
        for username in failed {
            self.mark_unreachable(&username);
        }
    }

    fn send_to(&mut self, username: &str, note: Notification) {
        let delivered = self
            .observers
            .get(username)
            .map_or(true, |obs| obs.deliver(note).is_ok());
        if !delivered {
            self.mark_unreachable(username);
        }
    }

    /// Lighter than a full departure: the sweep picks up the consequences
    /// (turn close, quorum) on its next tick.
    fn mark_unreachable(&mut self, username: &str) {
        if let Some(player) = self.players.iter_mut().find(|p| p.username == username) {
            if player.active {
                warn!("match '{}': delivery to {} failed", self.name, username);
                player.active = false;
                self.observers.remove(username);
            }
        }
    }

    fn arm_timer(&mut self, kind: TimerKind, after: Duration) {
        self.timer_gen += 1;
        self.timers.insert(kind, (self.timer_gen, Instant::now() + after));
    }

    fn cancel_timer(&mut self, kind: TimerKind) {
        self.timers.remove(&kind);
    }
}
