//! Authoritative match state.

pub mod state;

pub use state::{ApplyResult, MatchState};
