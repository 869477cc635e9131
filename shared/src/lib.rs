//! Wire-visible model and protocol types shared between the Sagrada match
//! server and its transports.
//!
//! Everything here is serde-serializable and carries no server-side logic
//! beyond the game rules that both sides must agree on: placement rules on
//! pattern grids, objective scoring, and die arithmetic. Orchestration
//! (turns, timers, barriers, tool-card protocols) lives in the server crate.

pub mod dice;
pub mod objective;
pub mod pattern;
pub mod protocol;
pub mod toolcard;

pub use dice::{Die, DieColor};
pub use objective::{PrivateObjective, PublicObjective};
pub use pattern::{
    BoxConstraint, DieMask, Mask, PatternBox, PatternCard, PlacementError, PlacementMode,
    GRID_COLS, GRID_ROWS,
};
pub use protocol::{
    MatchConfig, MoveStatus, Notification, PlayerView, Request, ToolCardUpdate,
};
pub use toolcard::{GridPos, ToolCard, ToolCardKind, ToolCardMove};
