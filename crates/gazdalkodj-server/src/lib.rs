//! Gazdálkodj multiplayer server
//!
//! Authoritative match host using Renet for networking.
//! Clients send intents; the server validates them, resolves dice and fines,
//! and broadcasts the sequenced results every peer applies.

pub mod channels;
pub mod client;
pub mod config;
pub mod game;
pub mod host;
pub mod sessions;
pub mod transport;

pub use channels::*;
pub use client::ClientRunner;
pub use config::ServerConfig;
pub use game::{ApplyResult, MatchState};
pub use host::{MatchHost, Outgoing};
pub use sessions::{JoinError, Seat, SeatState, SessionManager};
pub use transport::{ListenConfig, ServerRunner, TransportError, PROTOCOL_ID};
