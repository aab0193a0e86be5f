//! Shared data model and wire format for Gazdálkodj matches.
//!
//! Everything that crosses a process boundary lives here: player and game state,
//! the shop catalog, and the typed messages exchanged between peers and server.

pub mod catalog;
pub mod ids;
pub mod message;
pub mod player;
pub mod state;
pub mod wire;

pub use catalog::{ShopItem, CAR, HOUSE, PURCHASEABLE_ITEMS};
pub use ids::{ItemId, PlayerIndex, Position, BOARD_SIZE, JAIL, JAIL_EXIT, START};
pub use message::{ClientMessage, JoinRejectReason, RejectReason, ServerFrame, ServerMessage};
pub use player::{Player, TurnPhase, STARTING_MONEY};
pub use state::{GameData, GameMeta, GameState, GameStatePatch};
pub use wire::*;
