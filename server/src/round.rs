//! Turn scheduling within a round.
//!
//! Each round runs a forward pass followed by a backward pass over the
//! rotation order, so every player gets two turns and the last player in
//! the forward pass takes them back to back. Inactive players are skipped
//! at advance time rather than removed from the schedule, so a player who
//! reconnects mid-round resumes their remaining slots.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Turn(usize),
    Closed,
}

pub struct Round {
    order: Vec<String>,
    /// Indices into `order`: 0..n then n-1..=0.
    schedule: Vec<usize>,
    state: State,
    placed_this_turn: bool,
    tool_used_this_turn: bool,
}

impl Round {
    pub fn new(order: Vec<String>) -> Self {
        let n = order.len();
        let schedule: Vec<usize> = (0..n).chain((0..n).rev()).collect();
        Self {
            order,
            schedule,
            state: State::Idle,
            placed_this_turn: false,
            tool_used_this_turn: false,
        }
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn current_player(&self) -> Option<&str> {
        match self.state {
            State::Turn(slot) => Some(self.order[self.schedule[slot]].as_str()),
            _ => None,
        }
    }

    pub fn pass(&self) -> Option<Pass> {
        match self.state {
            State::Turn(slot) if slot < self.order.len() => Some(Pass::Forward),
            State::Turn(_) => Some(Pass::Backward),
            _ => None,
        }
    }

    /// Moves to the next turn, skipping players for whom `active` returns
    /// false. Returns the new current player, or None once the schedule is
    /// exhausted and the round is closed.
    pub fn advance<F: Fn(&str) -> bool>(&mut self, active: F) -> Option<&str> {
        let mut slot = match self.state {
            State::Idle => 0,
            State::Turn(slot) => slot + 1,
            State::Closed => return None,
        };
        while slot < self.schedule.len() {
            let name = self.order[self.schedule[slot]].as_str();
            if active(name) {
                self.state = State::Turn(slot);
                self.placed_this_turn = false;
                self.tool_used_this_turn = false;
                return self.current_player();
            }
            slot += 1;
        }
        self.state = State::Closed;
        None
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    pub fn record_placement(&mut self) {
        self.placed_this_turn = true;
    }

    pub fn has_placed_this_turn(&self) -> bool {
        self.placed_this_turn
    }

    pub fn record_tool_use(&mut self) {
        self.tool_used_this_turn = true;
    }

    pub fn tool_used_this_turn(&self) -> bool {
        self.tool_used_this_turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_forward_then_backward_schedule() {
        let mut round = Round::new(names(&["a", "b", "c"]));
        let mut seen = Vec::new();
        while let Some(player) = round.advance(|_| true) {
            seen.push(player.to_string());
        }
        assert_eq!(seen, vec!["a", "b", "c", "c", "b", "a"]);
        assert!(round.is_closed());
    }

    #[test]
    fn test_pass_direction() {
        let mut round = Round::new(names(&["a", "b"]));
        round.advance(|_| true);
        assert_eq!(round.pass(), Some(Pass::Forward));
        round.advance(|_| true);
        assert_eq!(round.pass(), Some(Pass::Forward));
        round.advance(|_| true);
        assert_eq!(round.pass(), Some(Pass::Backward));
    }

    #[test]
    fn test_inactive_players_are_skipped() {
        let mut round = Round::new(names(&["a", "b", "c"]));
        let mut seen = Vec::new();
        while let Some(player) = round.advance(|name| name != "b") {
            seen.push(player.to_string());
        }
        assert_eq!(seen, vec!["a", "c", "c", "a"]);
    }

    #[test]
    fn test_all_inactive_closes_immediately() {
        let mut round = Round::new(names(&["a", "b"]));
        assert_eq!(round.advance(|_| false), None);
        assert!(round.is_closed());
    }

    #[test]
    fn test_turn_flags_reset_each_turn() {
        let mut round = Round::new(names(&["a", "b"]));
        round.advance(|_| true);
        round.record_placement();
        round.record_tool_use();
        assert!(round.has_placed_this_turn());
        assert!(round.tool_used_this_turn());
        round.advance(|_| true);
        assert!(!round.has_placed_this_turn());
        assert!(!round.tool_used_this_turn());
    }
}
