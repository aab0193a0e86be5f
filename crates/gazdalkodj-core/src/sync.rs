//! Client-side mirror of a networked match.
//!
//! A [`SyncClient`] never decides anything random on its own. Local intents are
//! checked against the mirrored state and queued in the outbox; the server's
//! `*-result` broadcasts are applied through the same [`TurnSequencer`]
//! transitions the server used, so every peer converges on the same state.

use std::collections::VecDeque;
use std::time::Duration;

use gazdalkodj_protocol::{
    catalog, ClientMessage, GameState, PlayerIndex, Position, ServerFrame, ServerMessage,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gateway::{AlertGateway, AlertOptions, Notice, PopupGateway};
use crate::sequencer::{
    Effect, SequencerConfig, SequencerError, Stage, Step, TurnSequencer, TICKET_PRICE,
};
use crate::store::GameStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("no seat claimed yet")]
    NotSeated,
    #[error("intent refused locally: {0}")]
    Refused(#[from] SequencerError),
}

#[derive(Debug)]
struct Timer {
    due: Duration,
    stage: Stage,
}

pub struct SyncClient {
    store: GameStore,
    sequencer: TurnSequencer,
    seat: Option<PlayerIndex>,
    reconnect_token: Option<String>,
    outbox: VecDeque<ClientMessage>,
    clock: Duration,
    timers: Vec<Timer>,
    last_seq: Option<u64>,
    popup_open: bool,
    popups: Box<dyn PopupGateway>,
    alerts: Box<dyn AlertGateway>,
}

impl SyncClient {
    pub fn new(
        state: GameState,
        config: SequencerConfig,
        popups: Box<dyn PopupGateway>,
        alerts: Box<dyn AlertGateway>,
    ) -> Self {
        Self {
            store: GameStore::new(state),
            sequencer: TurnSequencer::new(config),
            seat: None,
            reconnect_token: None,
            outbox: VecDeque::new(),
            clock: Duration::ZERO,
            timers: Vec::new(),
            last_seq: None,
            popup_open: false,
            popups,
            alerts,
        }
    }

    pub fn state(&self) -> &GameState {
        self.store.state()
    }

    /// The store, e.g. to subscribe to state changes.
    pub fn store_mut(&mut self) -> &mut GameStore {
        &mut self.store
    }

    pub fn seat(&self) -> Option<PlayerIndex> {
        self.seat
    }

    pub fn reconnect_token(&self) -> Option<&str> {
        self.reconnect_token.as_deref()
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn is_popup_open(&self) -> bool {
        self.popup_open
    }

    /// Reveal pauses that have not elapsed yet.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// True when it is this client's turn.
    pub fn is_my_turn(&self) -> bool {
        self.seat.is_some_and(|seat| self.state().is_current(seat))
    }

    /// Messages waiting to be sent to the server.
    pub fn drain_outbox(&mut self) -> Vec<ClientMessage> {
        self.outbox.drain(..).collect()
    }

    // Intents

    /// Ask for a seat. `player_id` is the id of the player record to control.
    pub fn join(&mut self, player_id: impl Into<String>) {
        self.outbox.push_back(ClientMessage::Join {
            player_id: player_id.into(),
            reconnect_token: self.reconnect_token.clone(),
        });
    }

    pub fn request_state(&mut self) {
        self.outbox.push_back(ClientMessage::RequestState {});
    }

    pub fn roll_dice(&mut self) -> Result<(), SyncError> {
        let seat = self.my_seat()?;
        self.sequencer.request_roll(self.state(), seat)?;
        self.outbox.push_back(ClientMessage::RollDice { player_index: seat });
        Ok(())
    }

    /// Move by the value the server rolled for us.
    pub fn move_player(&mut self) -> Result<(), SyncError> {
        let seat = self.my_seat()?;
        let p = self.sequencer.acting(self.state(), seat)?;
        let steps = p.rolled_dice.ok_or(SequencerError::IllegalState {
            action: "move",
            reason: "dice not rolled",
        })?;
        self.sequencer.move_player(self.state(), seat, steps)?;
        self.outbox.push_back(ClientMessage::MovePlayer {
            player_index: seat,
            steps,
        });
        Ok(())
    }

    pub fn end_turn(&mut self) -> Result<(), SyncError> {
        let seat = self.my_seat()?;
        self.sequencer.end_turn(self.state(), seat)?;
        self.outbox.push_back(ClientMessage::EndTurn { player_index: seat });
        Ok(())
    }

    /// Buy a catalog item. Missing funds or an owned item are reported through
    /// the alert gateway and nothing is sent.
    pub fn buy_item(&mut self, item_id: &str) -> Result<(), SyncError> {
        let seat = self.my_seat()?;
        if let Err(err) = self.sequencer.buy_item(self.state(), seat, item_id) {
            match &err {
                SequencerError::InsufficientFunds { needed, .. } => {
                    let name = catalog::item(item_id).map_or(item_id, |i| i.name);
                    self.alert(Notice::InsufficientFunds {
                        item: name.to_string(),
                        price: *needed,
                    });
                }
                SequencerError::AlreadyOwned(item) => {
                    self.alert(Notice::AlreadyOwned { item: item.clone() });
                }
                _ => {}
            }
            return Err(err.into());
        }
        self.outbox.push_back(ClientMessage::BuyItem {
            player_index: seat,
            item_id: item_id.to_string(),
        });
        Ok(())
    }

    pub fn buy_train_ticket(&mut self, stop: Position) -> Result<(), SyncError> {
        let seat = self.my_seat()?;
        if let Err(err) = self.sequencer.buy_train_ticket(self.state(), seat, stop) {
            if matches!(err, SequencerError::InsufficientFunds { .. }) {
                self.alert(Notice::InsufficientFunds {
                    item: "train ticket".to_string(),
                    price: TICKET_PRICE,
                });
            }
            return Err(err.into());
        }
        self.outbox.push_back(ClientMessage::BuyTrainTicket {
            player_index: seat,
            stop,
        });
        Ok(())
    }

    pub fn free_ride_train(&mut self, stop: Position) -> Result<(), SyncError> {
        let seat = self.my_seat()?;
        self.sequencer.free_ride_train(self.state(), seat, stop, false)?;
        self.outbox.push_back(ClientMessage::FreeRideTrain {
            player_index: seat,
            stop,
        });
        Ok(())
    }

    /// The user closed the field popup; report the end of the action.
    pub fn close_popup(&mut self) -> Result<(), SyncError> {
        let seat = self.my_seat()?;
        self.sequencer.end_action(self.state(), seat)?;
        self.hide_popup();
        self.outbox.push_back(ClientMessage::EndAction { player_index: seat });
        Ok(())
    }

    fn my_seat(&self) -> Result<PlayerIndex, SyncError> {
        self.seat.ok_or(SyncError::NotSeated)
    }

    // Inbound

    /// Apply one frame from the server.
    pub fn handle_frame(&mut self, frame: ServerFrame) {
        let ServerFrame { message, seq } = frame;

        if message.is_result() {
            if let (Some(seq), Some(last)) = (seq, self.last_seq) {
                if seq <= last {
                    debug!(seq, last, kind = message.kind(), "dropping already applied result");
                    return;
                }
            }
            // Results are ordered after everything the server already resolved,
            // so pending reveal pauses are due now.
            self.flush_timers();
        }

        match message {
            ServerMessage::JoinAccepted {
                player_index,
                reconnect_token,
            } => {
                info!(seat = %player_index, "seat claimed");
                self.seat = Some(player_index);
                self.reconnect_token = Some(reconnect_token);
            }
            ServerMessage::JoinRejected { reason } => {
                warn!(?reason, "join rejected");
            }
            ServerMessage::IntentRejected { intent, reason } => {
                warn!(%intent, ?reason, "server rejected intent");
            }
            ServerMessage::SyncGameState(patch) => {
                if let (Some(seq), Some(last)) = (seq, self.last_seq) {
                    if seq < last {
                        debug!(seq, last, "dropping stale state sync");
                        return;
                    }
                }
                self.timers.clear();
                let next = self.state().clone().merge(patch);
                self.store.replace(next);
                self.bump_seq(seq);
                self.hide_popup();
                let effects = self.sequencer.resume_effects(self.state());
                self.run_effects(effects);
            }
            result => {
                match self.apply_result(&result) {
                    Ok(step) => self.commit(step),
                    Err(err) => {
                        warn!(kind = result.kind(), %err, "inbound result does not apply, resyncing");
                        self.request_state();
                    }
                }
                self.bump_seq(seq);
            }
        }
    }

    /// The applied sequence only ever moves forward.
    fn bump_seq(&mut self, seq: Option<u64>) {
        if seq.is_some() {
            self.last_seq = self.last_seq.max(seq);
        }
    }

    fn apply_result(&self, message: &ServerMessage) -> Result<Step, SequencerError> {
        let state = self.state();
        let s = &self.sequencer;
        match message {
            ServerMessage::RollDiceStarted { player_index } => s.request_roll(state, *player_index),
            ServerMessage::RollDiceResult {
                player_index,
                result,
            } => s.dice_rolled(state, *player_index, *result),
            ServerMessage::MovePlayerResult {
                player_index,
                steps,
            } => s.move_player(state, *player_index, *steps),
            ServerMessage::ActionEnded { player_index } => s.end_action(state, *player_index),
            ServerMessage::EndTurnResult { player_index } => s.end_turn(state, *player_index),
            ServerMessage::BuyItemResult {
                player_index,
                item_id,
            } => s.buy_item(state, *player_index, item_id),
            ServerMessage::BuyTrainTicketResult { player_index, stop } => {
                s.buy_train_ticket(state, *player_index, *stop)
            }
            ServerMessage::FreeRideTrainResult {
                player_index,
                stop,
                fined,
            } => s.free_ride_train(state, *player_index, *stop, *fined),
            ServerMessage::JoinAccepted { .. }
            | ServerMessage::JoinRejected { .. }
            | ServerMessage::SyncGameState(_)
            | ServerMessage::IntentRejected { .. } => Err(SequencerError::IllegalState {
                action: "apply",
                reason: "not a result message",
            }),
        }
    }

    // Timers

    /// Let `elapsed` of virtual time pass and run every stage that came due.
    pub fn advance(&mut self, elapsed: Duration) {
        self.clock += elapsed;
        while let Some(i) = self.next_due(Some(self.clock)) {
            let timer = self.timers.remove(i);
            self.run_stage(timer.stage);
        }
    }

    /// Run every pending stage now, regardless of its due time.
    pub fn flush_timers(&mut self) {
        while let Some(i) = self.next_due(None) {
            let timer = self.timers.remove(i);
            self.clock = self.clock.max(timer.due);
            self.run_stage(timer.stage);
        }
    }

    fn next_due(&self, now: Option<Duration>) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .filter(|(_, t)| now.map_or(true, |now| t.due <= now))
            .min_by_key(|(_, t)| t.due)
            .map(|(i, _)| i)
    }

    fn run_stage(&mut self, stage: Stage) {
        match self.sequencer.resume(self.state(), stage) {
            Ok(step) => self.commit(step),
            Err(err) => warn!(?stage, %err, "dropping stale stage"),
        }
    }

    fn commit(&mut self, step: Step) {
        let Step { state, effects } = step;
        self.store.commit(state);
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Continue(stage) => self.run_stage(stage),
                Effect::Schedule { after, stage } => self.timers.push(Timer {
                    due: self.clock + after,
                    stage,
                }),
                Effect::OpenPopup(request) => {
                    if self.is_acting(request.player) {
                        self.popups.open(&request);
                        self.popup_open = true;
                    }
                }
                Effect::ClosePopup => self.hide_popup(),
                Effect::Alert { player, notice } => {
                    if self.is_acting(player) {
                        self.alert(notice);
                    }
                }
                Effect::EndAction { player } => {
                    if self.is_acting(player) {
                        self.hide_popup();
                        self.outbox
                            .push_back(ClientMessage::EndAction { player_index: player });
                    }
                }
            }
        }
    }

    /// Popups and alerts only run on the client whose seat is the current player.
    fn is_acting(&self, player: PlayerIndex) -> bool {
        self.seat == Some(player) && self.state().is_current(player)
    }

    fn alert(&mut self, notice: Notice) {
        let options = AlertOptions::for_notice(&notice);
        self.alerts.show(&notice, &options);
    }

    fn hide_popup(&mut self) {
        if self.popup_open {
            self.popups.close();
            self.popup_open = false;
        }
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("seat", &self.seat)
            .field("last_seq", &self.last_seq)
            .field("clock", &self.clock)
            .field("timers", &self.timers)
            .field("store", &self.store)
            .finish()
    }
}
