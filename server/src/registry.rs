//! Match lifecycle and user bookkeeping.
//!
//! The registry owns one event channel per live match and spawns each
//! match's driver task. Persistent identity (win/loss tallies) lives in the
//! [`UserDirectory`], shared with every driver so scoring can record
//! results without going back through the registry.

use crate::match_driver::{MatchDriver, MatchEvent};
use crate::observer::PlayerObserver;
use log::{info, warn};
use shared::{MatchConfig, Request};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub username: String,
    pub wins: u32,
    pub losses: u32,
}

/// Persistent per-user records, keyed by username. Usernames are unique;
/// a returning user keeps their tallies.
#[derive(Debug, Default)]
pub struct UserDirectory {
    accounts: HashMap<String, UserAccount>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(&mut self, username: &str) -> &UserAccount {
        self.accounts
            .entry(username.to_string())
            .or_insert_with(|| UserAccount {
                username: username.to_string(),
                wins: 0,
                losses: 0,
            })
    }

    pub fn get(&self, username: &str) -> Option<&UserAccount> {
        self.accounts.get(username)
    }

    pub fn record_win(&mut self, username: &str) {
        self.accounts
            .entry(username.to_string())
            .and_modify(|a| a.wins += 1);
    }

    pub fn record_loss(&mut self, username: &str) {
        self.accounts
            .entry(username.to_string())
            .and_modify(|a| a.losses += 1);
    }
}

struct MatchHandle {
    tx: mpsc::UnboundedSender<MatchEvent>,
}

/// Routes players and requests to matches, creating drivers on demand.
pub struct MatchRegistry {
    config: MatchConfig,
    directory: Arc<Mutex<UserDirectory>>,
    matches: HashMap<String, MatchHandle>,
    history_dir: Option<PathBuf>,
}

impl MatchRegistry {
    pub fn new(config: MatchConfig, history_dir: Option<PathBuf>) -> Self {
        Self {
            config,
            directory: Arc::new(Mutex::new(UserDirectory::new())),
            matches: HashMap::new(),
            history_dir,
        }
    }

    pub fn directory(&self) -> Arc<Mutex<UserDirectory>> {
        Arc::clone(&self.directory)
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Binds `observer` as the player's delivery channel and joins (or
    /// rejoins) the named match, spawning its driver on first contact.
    pub fn join(
        &mut self,
        username: &str,
        match_name: &str,
        observer: Box<dyn PlayerObserver>,
    ) {
        let tx = self.handle_for(match_name);
        let attached = tx
            .send(MatchEvent::ObserverAttached {
                username: username.to_string(),
                observer,
            })
            .is_ok();
        let joined = attached
            && tx
                .send(MatchEvent::Request(Request::JoinMatch {
                    username: username.to_string(),
                    match_name: match_name.to_string(),
                }))
                .is_ok();
        if !joined {
            warn!("match '{}' is gone; dropping join from {}", match_name, username);
            self.matches.remove(match_name);
        }
    }

    /// Forwards a request to a live match. Closed matches are pruned on the
    /// first failed send.
    pub fn route(&mut self, match_name: &str, request: Request) {
        let Some(handle) = self.matches.get(match_name) else {
            warn!(
                "no match '{}' for request from {}",
                match_name,
                request.username()
            );
            return;
        };
        if handle.tx.send(MatchEvent::Request(request)).is_err() {
            info!("match '{}' closed; pruning", match_name);
            self.matches.remove(match_name);
        }
    }

    fn handle_for(&mut self, match_name: &str) -> mpsc::UnboundedSender<MatchEvent> {
        if let Some(handle) = self.matches.get(match_name) {
            if !handle.tx.is_closed() {
                return handle.tx.clone();
            }
            self.matches.remove(match_name);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let history_path = self
            .history_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", match_name)));
        let driver = MatchDriver::new(
            match_name,
            self.config.clone(),
            Arc::clone(&self.directory),
            history_path,
        );
        info!("created match '{}'", match_name);
        tokio::spawn(driver.run(rx));
        self.matches.insert(
            match_name.to_string(),
            MatchHandle { tx: tx.clone() },
        );
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ChannelObserver;
    use shared::Notification;

    #[test]
    fn test_directory_tallies_persist_per_username() {
        let mut directory = UserDirectory::new();
        directory.ensure("alice");
        directory.record_win("alice");
        directory.record_win("alice");
        directory.record_loss("alice");
        let account = directory.get("alice").unwrap();
        assert_eq!(account.wins, 2);
        assert_eq!(account.losses, 1);
        // Ensure is idempotent.
        directory.ensure("alice");
        assert_eq!(directory.get("alice").unwrap().wins, 2);
    }

    #[test]
    fn test_record_for_unknown_user_is_ignored() {
        let mut directory = UserDirectory::new();
        directory.record_win("ghost");
        assert!(directory.get("ghost").is_none());
    }

    #[tokio::test]
    async fn test_join_creates_match_once() {
        let mut registry = MatchRegistry::new(MatchConfig::default(), None);
        let (alice, mut alice_rx) = ChannelObserver::new();
        let (bob, _bob_rx) = ChannelObserver::new();
        registry.join("alice", "arena", Box::new(alice));
        registry.join("bob", "arena", Box::new(bob));
        assert_eq!(registry.match_count(), 1);

        // The driver task picks both joins up and broadcasts the roster.
        let note = alice_rx.recv().await.unwrap();
        assert!(matches!(note, Notification::PlayerJoined { ref players, .. } if players == &["alice".to_string()]));
    }
}
