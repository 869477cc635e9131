//! # Match Server Library
//!
//! Authoritative server for a network-playable dice-drafting board game.
//! Clients never hold state they could falsify: every placement, tool-card
//! effect, and timer decision is made here and pushed out as notifications.
//!
//! ## Architecture
//!
//! Each match runs as a single task owning all of its state
//! ([`match_driver`]). Requests, timer deadlines, and liveness probes are
//! funneled through one synchronous event handler, so there is no lock
//! contention inside a match and every transition is deterministic given
//! the event order. Timers are generation-stamped deadlines rather than
//! spawned tasks; a cancelled deadline can never fire late.
//!
//! The transport ([`network`]) is a thin UDP adapter: it decodes requests,
//! tracks which socket address belongs to which player, and pumps
//! notifications back out. Swapping it for another transport only requires
//! implementing [`observer::PlayerObserver`].
//!
//! ## Module Organization
//!
//! - [`registry`]: match lifecycle, user directory, request routing
//! - [`match_driver`]: per-match orchestration of phases, timers, barriers
//! - [`board`]: dice bag, drafted pool, round track
//! - [`round`]: forward/backward turn schedule
//! - [`toolcards`]: multi-phase tool-card protocols
//! - [`score`]: end-of-match scoring cascade
//! - [`observer`]: notification delivery seam
//! - [`network`]: UDP transport

pub mod barrier;
pub mod board;
pub mod match_driver;
pub mod network;
pub mod observer;
pub mod player;
pub mod registry;
pub mod round;
pub mod score;
pub mod toolcards;
