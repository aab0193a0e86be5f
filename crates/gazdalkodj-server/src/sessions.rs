//! Seat management: which network client controls which player.
//!
//! Seats are fixed by the match; clients claim one by player id and get a
//! reconnect token. A dropped seat stays reserved for that token until the
//! grace period runs out, then anyone may claim it again.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use gazdalkodj_protocol::{JoinRejectReason, Player, PlayerIndex};
use rand::Rng;

/// Seat lifecycle state
#[derive(Clone, Debug)]
pub enum SeatState {
    /// Nobody has claimed the seat
    Open,
    Connected {
        client_id: u64,
        connected_at: Instant,
        last_activity: Instant,
    },
    /// Dropped, reserved for the reconnect token
    Disconnected { disconnected_at: Instant },
}

#[derive(Clone, Debug)]
pub struct Seat {
    pub index: PlayerIndex,
    pub player_id: String,
    pub name: String,
    pub reconnect_token: Option<String>,
    pub state: SeatState,
    /// Rate limiting: message count in current window
    pub message_count: u32,
    /// Rate limiting: window start time
    pub rate_window_start: Instant,
}

/// Errors when claiming a seat
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("No seat for player {0:?}")]
    UnknownPlayer(String),
    #[error("Seat is taken")]
    SeatTaken,
    #[error("Invalid reconnect token")]
    InvalidToken,
    #[error("Client already holds a seat")]
    AlreadyJoined,
}

impl From<&JoinError> for JoinRejectReason {
    fn from(err: &JoinError) -> Self {
        match err {
            JoinError::UnknownPlayer(_) => JoinRejectReason::UnknownPlayer,
            JoinError::SeatTaken => JoinRejectReason::SeatTaken,
            JoinError::InvalidToken => JoinRejectReason::InvalidReconnectToken,
            JoinError::AlreadyJoined => JoinRejectReason::AlreadyJoined,
        }
    }
}

pub struct SessionManager {
    seats: Vec<Seat>,
    /// Client ID to seat mapping
    client_to_seat: HashMap<u64, PlayerIndex>,
    disconnect_grace: Duration,
    /// Rate limit config
    rate_limit_messages: u32,
    rate_limit_window: Duration,
}

impl SessionManager {
    pub fn new(players: &[Player], disconnect_grace: Duration) -> Self {
        let now = Instant::now();
        let seats = players
            .iter()
            .map(|p| Seat {
                index: p.index,
                player_id: p.id.clone(),
                name: p.name.clone(),
                reconnect_token: None,
                state: SeatState::Open,
                message_count: 0,
                rate_window_start: now,
            })
            .collect();
        Self {
            seats,
            client_to_seat: HashMap::new(),
            disconnect_grace,
            rate_limit_messages: 60, // 60 messages per window
            rate_limit_window: Duration::from_secs(1),
        }
    }

    pub fn with_rate_limit(mut self, messages: u32, window: Duration) -> Self {
        self.rate_limit_messages = messages;
        self.rate_limit_window = window;
        self
    }

    /// Claim the seat of `player_id`, or reclaim it with its reconnect token.
    pub fn join(
        &mut self,
        client_id: u64,
        player_id: &str,
        token: Option<&str>,
    ) -> Result<(PlayerIndex, String), JoinError> {
        if self.client_to_seat.contains_key(&client_id) {
            return Err(JoinError::AlreadyJoined);
        }
        let seat = self
            .seats
            .iter_mut()
            .find(|s| s.player_id == player_id)
            .ok_or_else(|| JoinError::UnknownPlayer(player_id.to_string()))?;

        let token = match &seat.state {
            SeatState::Connected { .. } => return Err(JoinError::SeatTaken),
            SeatState::Disconnected { .. } => {
                let valid = seat.reconnect_token.as_deref();
                if token.is_none() || token != valid {
                    return Err(JoinError::InvalidToken);
                }
                valid.map(str::to_string).unwrap_or_else(generate_token)
            }
            SeatState::Open => generate_token(),
        };

        let now = Instant::now();
        seat.state = SeatState::Connected {
            client_id,
            connected_at: now,
            last_activity: now,
        };
        seat.reconnect_token = Some(token.clone());
        seat.message_count = 0;
        seat.rate_window_start = now;
        let index = seat.index;
        self.client_to_seat.insert(client_id, index);
        Ok((index, token))
    }

    /// Handle client disconnect
    pub fn disconnect(&mut self, client_id: u64) -> Option<PlayerIndex> {
        let index = self.client_to_seat.remove(&client_id)?;
        let seat = self.seat_mut(index)?;
        seat.state = SeatState::Disconnected {
            disconnected_at: Instant::now(),
        };
        Some(index)
    }

    /// Reopen seats whose grace period ran out; returns the reopened seats
    pub fn process_disconnections(&mut self) -> Vec<PlayerIndex> {
        let now = Instant::now();
        let grace = self.disconnect_grace;
        let mut reopened = Vec::new();

        for seat in &mut self.seats {
            if let SeatState::Disconnected { disconnected_at } = seat.state {
                if now.duration_since(disconnected_at) >= grace {
                    seat.state = SeatState::Open;
                    seat.reconnect_token = None;
                    reopened.push(seat.index);
                }
            }
        }

        reopened
    }

    /// Check and update rate limit for a client
    /// Returns true if message is allowed, false if rate limited
    pub fn check_rate_limit(&mut self, client_id: u64) -> bool {
        let Some(index) = self.client_to_seat.get(&client_id).copied() else {
            return true; // Unseated client - let message through for error handling
        };
        let window = self.rate_limit_window;
        let limit = self.rate_limit_messages;
        let Some(seat) = self.seat_mut(index) else {
            return true;
        };

        let now = Instant::now();

        // Reset window if expired
        if now.duration_since(seat.rate_window_start) >= window {
            seat.rate_window_start = now;
            seat.message_count = 0;
        }

        seat.message_count += 1;
        if let SeatState::Connected { last_activity, .. } = &mut seat.state {
            *last_activity = now;
        }

        seat.message_count <= limit
    }

    pub fn seat_of(&self, client_id: u64) -> Option<PlayerIndex> {
        self.client_to_seat.get(&client_id).copied()
    }

    pub fn client_of(&self, index: PlayerIndex) -> Option<u64> {
        match self.seat(index)?.state {
            SeatState::Connected { client_id, .. } => Some(client_id),
            _ => None,
        }
    }

    pub fn seat(&self, index: PlayerIndex) -> Option<&Seat> {
        self.seats.get(index.as_usize())
    }

    fn seat_mut(&mut self, index: PlayerIndex) -> Option<&mut Seat> {
        self.seats.get_mut(index.as_usize())
    }

    pub fn is_connected(&self, index: PlayerIndex) -> bool {
        self.client_of(index).is_some()
    }

    pub fn connected_count(&self) -> usize {
        self.client_to_seat.len()
    }
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| {
            let idx = rng.gen_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}
