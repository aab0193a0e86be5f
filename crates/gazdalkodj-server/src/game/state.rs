//! Server-authoritative match state.
//!
//! Clients only send intents. This module validates them against the
//! authoritative [`GameState`], resolves randomness (dice, fines), applies the
//! resulting transition through the shared [`TurnSequencer`] and returns the
//! sequenced `*-result` frames to broadcast.

use gazdalkodj_core::{GameStore, SequencerConfig, SequencerError, Step, TurnSequencer};
use gazdalkodj_protocol::{
    state_hash, ClientMessage, GameData, GameState, PlayerIndex, RejectReason, ServerFrame,
    ServerMessage, WireError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Result of validating and applying an intent.
#[derive(Debug)]
pub enum ApplyResult {
    /// Intent applied; broadcast these frames in order.
    Success {
        frames: Vec<ServerFrame>,
        /// Whether this intent handed the turn to the next player.
        turn_ended: bool,
    },
    /// The sender may not act right now.
    NotYourTurn,
    /// The intent names a seat other than the sender's.
    WrongSeat,
    GameOver,
    /// The intent is not legal in the current turn state.
    ValidationError { reason: String },
}

impl ApplyResult {
    /// Reason to report back for a refused intent.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            ApplyResult::Success { .. } => None,
            ApplyResult::NotYourTurn => Some(RejectReason::NotYourTurn),
            ApplyResult::WrongSeat => Some(RejectReason::WrongSeat),
            ApplyResult::GameOver => Some(RejectReason::GameOver),
            ApplyResult::ValidationError { reason } => Some(RejectReason::Illegal {
                detail: reason.clone(),
            }),
        }
    }
}

/// One running match.
pub struct MatchState {
    data: GameData,
    store: GameStore,
    sequencer: TurnSequencer,
    rng: StdRng,
    fine_probability: f64,
    seq: u64,
}

impl MatchState {
    pub fn new(data: GameData, seed: u64, fine_probability: f64) -> Self {
        let store = GameStore::new(data.state.clone());
        Self {
            data,
            store,
            sequencer: TurnSequencer::new(SequencerConfig::instant()),
            rng: StdRng::seed_from_u64(seed),
            fine_probability,
            seq: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        self.store.state()
    }

    /// The match as it should be persisted right now.
    pub fn game_data(&self) -> GameData {
        GameData {
            meta: self.data.meta.clone(),
            state: self.state().clone(),
        }
    }

    /// Sequence number of the last broadcast result.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn checksum(&self) -> Result<u64, WireError> {
        state_hash(self.state())
    }

    pub fn is_game_over(&self) -> bool {
        self.state().is_game_over
    }

    /// Full state for a (re)joining client, stamped with the current sequence.
    pub fn sync_frame(&self) -> ServerFrame {
        ServerFrame::sequenced(ServerMessage::SyncGameState(self.state().to_patch()), self.seq)
    }

    /// Validate and apply an intent sent by the client holding `seat`.
    pub fn apply_intent(&mut self, seat: PlayerIndex, intent: &ClientMessage) -> ApplyResult {
        let Some(player) = intent.player_index() else {
            return ApplyResult::ValidationError {
                reason: format!("{} is not a game intent", intent.kind()),
            };
        };
        if player != seat {
            return ApplyResult::WrongSeat;
        }
        // Only the turn hand-off survives the end of the match.
        if self.is_game_over() && !matches!(intent, ClientMessage::EndTurn { .. }) {
            return ApplyResult::GameOver;
        }
        if !self.state().is_current(seat) {
            return ApplyResult::NotYourTurn;
        }

        let outcome = match intent {
            ClientMessage::RollDice { .. } => self.roll_dice(seat),
            ClientMessage::MovePlayer { steps, .. } => {
                let steps = *steps;
                self.run(ServerMessage::MovePlayerResult {
                    player_index: seat,
                    steps,
                }, |s, state| s.move_player(state, seat, steps))
                .map(|frame| vec![frame])
            }
            ClientMessage::EndAction { .. } => self
                .run(ServerMessage::ActionEnded { player_index: seat }, |s, state| {
                    s.end_action(state, seat)
                })
                .map(|frame| vec![frame]),
            ClientMessage::EndTurn { .. } => self
                .run(ServerMessage::EndTurnResult { player_index: seat }, |s, state| {
                    s.end_turn(state, seat)
                })
                .map(|frame| vec![frame]),
            ClientMessage::BuyItem { item_id, .. } => self
                .run(
                    ServerMessage::BuyItemResult {
                        player_index: seat,
                        item_id: item_id.clone(),
                    },
                    |s, state| s.buy_item(state, seat, item_id),
                )
                .map(|frame| vec![frame]),
            ClientMessage::BuyTrainTicket { stop, .. } => {
                let stop = *stop;
                self.run(
                    ServerMessage::BuyTrainTicketResult {
                        player_index: seat,
                        stop,
                    },
                    |s, state| s.buy_train_ticket(state, seat, stop),
                )
                .map(|frame| vec![frame])
            }
            ClientMessage::FreeRideTrain { stop, .. } => self.free_ride(seat, *stop),
            ClientMessage::Join { .. } | ClientMessage::RequestState {} => {
                Err(SequencerError::IllegalState {
                    action: "apply",
                    reason: "not a game intent",
                })
            }
        };

        match outcome {
            Ok(frames) => {
                let turn_ended = matches!(intent, ClientMessage::EndTurn { .. });
                if turn_ended {
                    info!(
                        next = %self.state().current_player,
                        winner = ?self.state().winning_player_index,
                        "turn ended"
                    );
                }
                ApplyResult::Success { frames, turn_ended }
            }
            Err(err) => ApplyResult::ValidationError {
                reason: err.to_string(),
            },
        }
    }

    fn roll_dice(&mut self, seat: PlayerIndex) -> Result<Vec<ServerFrame>, SequencerError> {
        // Both halves are validated before either is committed.
        let started = self.sequencer.request_roll(self.state(), seat)?;
        let result = self.rng.gen_range(1..=6u8);
        let rolled = self.sequencer.dice_rolled(&started.state, seat, result)?;
        debug!(seat = %seat, result, "dice rolled");

        let first = self.commit(started, ServerMessage::RollDiceStarted { player_index: seat })?;
        let second = self.commit(
            rolled,
            ServerMessage::RollDiceResult {
                player_index: seat,
                result,
            },
        )?;
        Ok(vec![first, second])
    }

    fn free_ride(&mut self, seat: PlayerIndex, stop: u8) -> Result<Vec<ServerFrame>, SequencerError> {
        // Validate before spending randomness on the fine.
        self.sequencer
            .free_ride_train(self.state(), seat, stop, false)?;
        let fined = self.rng.gen_bool(self.fine_probability);
        let frame = self.run(
            ServerMessage::FreeRideTrainResult {
                player_index: seat,
                stop,
                fined,
            },
            |s, state| s.free_ride_train(state, seat, stop, fined),
        )?;
        Ok(vec![frame])
    }

    fn run(
        &mut self,
        message: ServerMessage,
        transition: impl FnOnce(&TurnSequencer, &GameState) -> Result<Step, SequencerError>,
    ) -> Result<ServerFrame, SequencerError> {
        let step = transition(&self.sequencer, self.state())?;
        self.commit(step, message)
    }

    /// Resolve every continuation of `step`, commit it and stamp the broadcast.
    fn commit(&mut self, step: Step, message: ServerMessage) -> Result<ServerFrame, SequencerError> {
        let settled = self.sequencer.run_inline(step)?;
        self.store.commit(settled.state);
        self.seq += 1;
        Ok(ServerFrame::sequenced(message, self.seq))
    }
}

impl std::fmt::Debug for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchState")
            .field("id", &self.data.meta.id)
            .field("seq", &self.seq)
            .field("store", &self.store)
            .finish()
    }
}
