//! Message dispatch for one hosted match.
//!
//! Turns raw client payloads into replies and broadcasts. Knows nothing about
//! renet; the server loop ships the returned [`Outgoing`] frames.

use gazdalkodj_core::{DirSaveStore, SaveStore};
use gazdalkodj_protocol::{
    deserialize_client_message, ClientMessage, GameData, JoinRejectReason, PlayerIndex,
    RejectReason, ServerFrame, ServerMessage,
};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::game::{ApplyResult, MatchState};
use crate::sessions::SessionManager;

/// A frame addressed to one client or to everyone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outgoing {
    To { client_id: u64, frame: ServerFrame },
    Broadcast(ServerFrame),
}

pub struct MatchHost {
    game: MatchState,
    sessions: SessionManager,
    saves: Option<DirSaveStore>,
}

impl MatchHost {
    pub fn new(data: GameData, config: &ServerConfig, saves: Option<DirSaveStore>) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let sessions = SessionManager::new(&data.state.players, config.disconnect_grace())
            .with_rate_limit(config.rate_limit_messages, config.rate_limit_window());
        info!(
            id = %data.meta.id,
            name = %data.meta.name,
            players = data.state.players.len(),
            seed,
            "hosting match"
        );
        Self {
            game: MatchState::new(data, seed, config.fine_probability),
            sessions,
            saves,
        }
    }

    pub fn game(&self) -> &MatchState {
        &self.game
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handle one payload received from `client_id`.
    pub fn handle_message(&mut self, client_id: u64, data: &[u8]) -> Vec<Outgoing> {
        let message = match deserialize_client_message(data) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Failed to deserialize message from {:?}: {}", client_id, e);
                return Vec::new();
            }
        };

        if !self.sessions.check_rate_limit(client_id) {
            debug!(client_id, kind = message.kind(), "rate limited");
            return vec![reject(client_id, &message, RejectReason::RateLimited)];
        }

        match &message {
            ClientMessage::Join {
                player_id,
                reconnect_token,
            } => self.handle_join(client_id, player_id, reconnect_token.as_deref()),
            ClientMessage::RequestState {} => vec![Outgoing::To {
                client_id,
                frame: self.game.sync_frame(),
            }],
            _ => self.handle_intent(client_id, &message),
        }
    }

    fn handle_join(&mut self, client_id: u64, player_id: &str, token: Option<&str>) -> Vec<Outgoing> {
        match self.sessions.join(client_id, player_id, token) {
            Ok((player_index, reconnect_token)) => {
                info!(client_id, seat = %player_index, "seat claimed");
                vec![
                    Outgoing::To {
                        client_id,
                        frame: ServerFrame::unsequenced(ServerMessage::JoinAccepted {
                            player_index,
                            reconnect_token,
                        }),
                    },
                    Outgoing::To {
                        client_id,
                        frame: self.game.sync_frame(),
                    },
                ]
            }
            Err(err) => {
                info!(client_id, %player_id, %err, "join rejected");
                vec![Outgoing::To {
                    client_id,
                    frame: ServerFrame::unsequenced(ServerMessage::JoinRejected {
                        reason: JoinRejectReason::from(&err),
                    }),
                }]
            }
        }
    }

    fn handle_intent(&mut self, client_id: u64, message: &ClientMessage) -> Vec<Outgoing> {
        let Some(seat) = self.sessions.seat_of(client_id) else {
            return vec![reject(client_id, message, RejectReason::NotJoined)];
        };

        match self.game.apply_intent(seat, message) {
            ApplyResult::Success { frames, turn_ended } => {
                if turn_ended {
                    self.persist();
                }
                frames.into_iter().map(Outgoing::Broadcast).collect()
            }
            refused => {
                debug!(client_id, seat = %seat, kind = message.kind(), ?refused, "intent refused");
                match refused.reject_reason() {
                    Some(reason) => vec![reject(client_id, message, reason)],
                    None => Vec::new(),
                }
            }
        }
    }

    pub fn client_disconnected(&mut self, client_id: u64) -> Option<PlayerIndex> {
        let seat = self.sessions.disconnect(client_id)?;
        info!(client_id, seat = %seat, "seat held for reconnect");
        Some(seat)
    }

    /// Periodic housekeeping: release seats whose grace period ran out.
    pub fn tick(&mut self) {
        for seat in self.sessions.process_disconnections() {
            info!(seat = %seat, "seat reopened");
        }
    }

    /// Write the match to the save directory, if one is configured.
    pub fn persist(&mut self) {
        let Some(store) = self.saves.as_mut() else {
            return;
        };
        let mut data = self.game.game_data();
        if let Err(err) = store.touch(&mut data) {
            warn!(id = %data.meta.id, %err, "failed to save match");
        }
    }
}

fn reject(client_id: u64, message: &ClientMessage, reason: RejectReason) -> Outgoing {
    Outgoing::To {
        client_id,
        frame: ServerFrame::unsequenced(ServerMessage::IntentRejected {
            intent: message.kind().to_string(),
            reason,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazdalkodj_core::saves::new_game;
    use gazdalkodj_protocol::serialize_client_message;

    fn host() -> MatchHost {
        let config = ServerConfig {
            seed: Some(3),
            ..ServerConfig::default()
        };
        MatchHost::new(new_game(None, 2), &config, None)
    }

    fn send(host: &mut MatchHost, client_id: u64, msg: ClientMessage) -> Vec<Outgoing> {
        host.handle_message(client_id, &serialize_client_message(&msg).unwrap())
    }

    #[test]
    fn join_replies_with_seat_and_state() {
        let mut host = host();
        let out = send(
            &mut host,
            10,
            ClientMessage::Join {
                player_id: "player-2".into(),
                reconnect_token: None,
            },
        );
        assert_eq!(out.len(), 2);
        let Outgoing::To { client_id, frame } = &out[0] else {
            panic!("expected a direct reply");
        };
        assert_eq!(*client_id, 10);
        assert!(matches!(
            frame.message,
            ServerMessage::JoinAccepted {
                player_index: PlayerIndex(1),
                ..
            }
        ));
        assert!(matches!(
            &out[1],
            Outgoing::To { frame, .. } if matches!(frame.message, ServerMessage::SyncGameState(_))
        ));
    }

    #[test]
    fn unseated_intent_is_rejected() {
        let mut host = host();
        let out = send(
            &mut host,
            10,
            ClientMessage::RollDice {
                player_index: PlayerIndex(0),
            },
        );
        assert_eq!(
            out,
            vec![Outgoing::To {
                client_id: 10,
                frame: ServerFrame::unsequenced(ServerMessage::IntentRejected {
                    intent: "roll-dice".into(),
                    reason: RejectReason::NotJoined,
                }),
            }]
        );
    }

    #[test]
    fn garbage_is_dropped() {
        let mut host = host();
        assert!(host.handle_message(10, b"not json").is_empty());
    }

    #[test]
    fn roll_is_broadcast() {
        let mut host = host();
        send(
            &mut host,
            10,
            ClientMessage::Join {
                player_id: "player-1".into(),
                reconnect_token: None,
            },
        );
        let out = send(
            &mut host,
            10,
            ClientMessage::RollDice {
                player_index: PlayerIndex(0),
            },
        );
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|o| matches!(o, Outgoing::Broadcast(_))));
    }
}
