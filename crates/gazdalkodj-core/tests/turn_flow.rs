//! Two mirrored clients playing through scripted turns.
//!
//! A minimal in-test authority turns intents into results with scripted dice,
//! then both clients apply the broadcast. Their states must stay identical.

use std::time::Duration;

use gazdalkodj_core::{LogGateway, SequencerConfig, SyncClient};
use gazdalkodj_protocol::{
    state_hash, ClientMessage, GameState, Player, PlayerIndex, ServerFrame, ServerMessage,
    TurnPhase,
};

struct Table {
    clients: Vec<SyncClient>,
    seq: u64,
    dice: Vec<u8>,
}

impl Table {
    fn new(state: GameState) -> Self {
        let clients = (0..state.players.len())
            .map(|i| {
                let mut client = SyncClient::new(
                    state.clone(),
                    SequencerConfig::default(),
                    Box::new(LogGateway),
                    Box::new(LogGateway),
                );
                client.handle_frame(ServerFrame::unsequenced(ServerMessage::JoinAccepted {
                    player_index: PlayerIndex(i as u8),
                    reconnect_token: format!("token-{i}"),
                }));
                client
            })
            .collect();
        Self {
            clients,
            seq: 0,
            dice: Vec::new(),
        }
    }

    fn broadcast(&mut self, message: ServerMessage) {
        self.seq += 1;
        for client in &mut self.clients {
            client.handle_frame(ServerFrame::sequenced(message.clone(), self.seq));
        }
    }

    /// Deliver every queued intent and let the reveal pauses elapse.
    fn pump(&mut self) {
        loop {
            let intents: Vec<ClientMessage> =
                self.clients.iter_mut().flat_map(|c| c.drain_outbox()).collect();
            if intents.is_empty() {
                break;
            }
            for intent in intents {
                self.resolve(intent);
            }
            self.tick(Duration::from_secs(1));
        }
        self.tick(Duration::from_secs(1));
    }

    fn resolve(&mut self, intent: ClientMessage) {
        match intent {
            ClientMessage::RollDice { player_index } => {
                self.broadcast(ServerMessage::RollDiceStarted { player_index });
                let result = self.dice.remove(0);
                self.broadcast(ServerMessage::RollDiceResult {
                    player_index,
                    result,
                });
            }
            ClientMessage::MovePlayer {
                player_index,
                steps,
            } => self.broadcast(ServerMessage::MovePlayerResult {
                player_index,
                steps,
            }),
            ClientMessage::EndAction { player_index } => {
                self.broadcast(ServerMessage::ActionEnded { player_index })
            }
            ClientMessage::EndTurn { player_index } => {
                self.broadcast(ServerMessage::EndTurnResult { player_index })
            }
            ClientMessage::BuyItem {
                player_index,
                item_id,
            } => self.broadcast(ServerMessage::BuyItemResult {
                player_index,
                item_id,
            }),
            other => panic!("unexpected intent {other:?}"),
        }
    }

    fn tick(&mut self, elapsed: Duration) {
        for client in &mut self.clients {
            client.advance(elapsed);
        }
    }

    fn client(&mut self, seat: usize) -> &mut SyncClient {
        &mut self.clients[seat]
    }

    fn state(&self) -> &GameState {
        self.clients[0].state()
    }

    fn assert_converged(&self) {
        let first = state_hash(self.clients[0].state()).unwrap();
        for client in &self.clients[1..] {
            assert_eq!(state_hash(client.state()).unwrap(), first);
        }
    }

    fn play_roll(&mut self, seat: usize, value: u8) {
        self.dice.push(value);
        self.client(seat).roll_dice().unwrap();
        self.pump();
        self.client(seat).move_player().unwrap();
        self.pump();
    }
}

fn two_players() -> GameState {
    GameState::new(vec![
        Player::new("a", PlayerIndex(0), "Anna", "a.png"),
        Player::new("b", PlayerIndex(1), "Bela", "b.png"),
    ])
}

/// A full round: instant field, interactive field, end turns.
#[test]
fn round_trip_keeps_clients_converged() {
    let mut table = Table::new(two_players());

    table.play_roll(0, 2);
    assert_eq!(table.state().players[0].position, 2);
    assert_eq!(table.state().players[0].money, 398_500);
    assert_eq!(table.state().players[0].state, TurnPhase::ActionEnded);
    table.assert_converged();

    table.client(0).end_turn().unwrap();
    table.pump();
    assert_eq!(table.state().current_player, PlayerIndex(1));

    table.play_roll(1, 3);
    assert_eq!(table.state().players[1].state, TurnPhase::ActionStarted);
    assert!(table.client(1).is_popup_open());
    assert!(!table.client(0).is_popup_open());

    table.client(1).close_popup().unwrap();
    table.pump();
    assert_eq!(table.state().players[1].state, TurnPhase::ActionEnded);

    table.client(1).end_turn().unwrap();
    table.pump();
    assert_eq!(table.state().current_player, PlayerIndex(0));
    table.assert_converged();
}

/// Passing start: 26 + 4 lands on 2 with +150 000 - 70 000 before the field fee.
#[test]
fn passing_start_settles_once_on_every_client() {
    let mut state = two_players();
    state.players[0].position = 26;
    state.players[0].money = 200_000;
    let mut table = Table::new(state);

    table.play_roll(0, 4);
    for seat in 0..2 {
        let p = &table.client(seat).state().players[0];
        assert_eq!(p.position, 2);
        assert_eq!(p.money, 200_000 + 80_000 - 1_500);
    }
    table.assert_converged();
}

/// A hospital stay costs the next turn on every mirror.
#[test]
fn hospital_skips_next_turn() {
    let mut state = two_players();
    state.players[0].position = 20;
    state.players[0].money = 100_000;
    let mut table = Table::new(state);

    table.play_roll(0, 3);
    assert!(table.state().players[0].in_hospital);
    table.client(0).end_turn().unwrap();
    table.pump();

    table.play_roll(1, 2);
    table.client(1).end_turn().unwrap();
    table.pump();

    let p = &table.state().players[0];
    assert_eq!(table.state().current_player, PlayerIndex(0));
    assert!(!p.can_roll_dice);
    assert!(p.can_end_turn);
    assert!(!p.in_hospital);
    assert!(table.client(0).roll_dice().is_err());
    table.assert_converged();
}

/// A jailed player stays put on a five and gets to end the turn.
#[test]
fn jail_roll_failure_then_retry_next_turn() {
    let mut state = two_players();
    state.players[0].lock_up();
    let mut table = Table::new(state);

    table.play_roll(0, 5);
    let p = &table.state().players[0];
    assert!(p.in_jail);
    assert_eq!(p.position, 27);
    assert_eq!(p.state, TurnPhase::RolledDice);
    assert!(p.can_end_turn);

    table.client(0).end_turn().unwrap();
    table.pump();
    table.play_roll(1, 2);
    table.client(1).end_turn().unwrap();
    table.pump();

    table.play_roll(0, 6);
    let p = &table.state().players[0];
    assert!(!p.in_jail);
    assert_eq!(p.position, 15);
    table.assert_converged();
}
