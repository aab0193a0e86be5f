//! Typed messages exchanged over the match channel.
//!
//! Every message is a `{ "type": ..., "data": {...} }` envelope. Server frames may carry a
//! `seq` stamp; clients use it to drop results they have already applied.

use serde::{Deserialize, Serialize};

use crate::{GameStatePatch, ItemId, PlayerIndex, Position};

/// Client-to-server intents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Claim a seat (or reclaim it after a disconnect).
    #[serde(rename_all = "camelCase")]
    Join {
        player_id: String,
        #[serde(default)]
        reconnect_token: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RollDice { player_index: PlayerIndex },
    #[serde(rename_all = "camelCase")]
    MovePlayer { player_index: PlayerIndex, steps: u8 },
    #[serde(rename_all = "camelCase")]
    EndAction { player_index: PlayerIndex },
    #[serde(rename_all = "camelCase")]
    EndTurn { player_index: PlayerIndex },
    #[serde(rename_all = "camelCase")]
    BuyItem {
        player_index: PlayerIndex,
        item_id: ItemId,
    },
    #[serde(rename_all = "camelCase")]
    BuyTrainTicket {
        player_index: PlayerIndex,
        stop: Position,
    },
    #[serde(rename_all = "camelCase")]
    FreeRideTrain {
        player_index: PlayerIndex,
        stop: Position,
    },
    /// Ask for a full `sync-game-state` (reconnect, suspected desync).
    RequestState {},
}

impl ClientMessage {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::RollDice { .. } => "roll-dice",
            ClientMessage::MovePlayer { .. } => "move-player",
            ClientMessage::EndAction { .. } => "end-action",
            ClientMessage::EndTurn { .. } => "end-turn",
            ClientMessage::BuyItem { .. } => "buy-item",
            ClientMessage::BuyTrainTicket { .. } => "buy-train-ticket",
            ClientMessage::FreeRideTrain { .. } => "free-ride-train",
            ClientMessage::RequestState {} => "request-state",
        }
    }

    /// Acting player of a state-changing intent.
    pub fn player_index(&self) -> Option<PlayerIndex> {
        match self {
            ClientMessage::RollDice { player_index }
            | ClientMessage::MovePlayer { player_index, .. }
            | ClientMessage::EndAction { player_index }
            | ClientMessage::EndTurn { player_index }
            | ClientMessage::BuyItem { player_index, .. }
            | ClientMessage::BuyTrainTicket { player_index, .. }
            | ClientMessage::FreeRideTrain { player_index, .. } => Some(*player_index),
            ClientMessage::Join { .. } | ClientMessage::RequestState {} => None,
        }
    }
}

/// Server-to-client messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    JoinAccepted {
        player_index: PlayerIndex,
        reconnect_token: String,
    },
    #[serde(rename_all = "camelCase")]
    JoinRejected { reason: JoinRejectReason },
    #[serde(rename_all = "camelCase")]
    RollDiceStarted { player_index: PlayerIndex },
    #[serde(rename_all = "camelCase")]
    RollDiceResult { player_index: PlayerIndex, result: u8 },
    #[serde(rename_all = "camelCase")]
    MovePlayerResult { player_index: PlayerIndex, steps: u8 },
    #[serde(rename_all = "camelCase")]
    ActionEnded { player_index: PlayerIndex },
    #[serde(rename_all = "camelCase")]
    EndTurnResult { player_index: PlayerIndex },
    #[serde(rename_all = "camelCase")]
    BuyItemResult {
        player_index: PlayerIndex,
        item_id: ItemId,
    },
    #[serde(rename_all = "camelCase")]
    BuyTrainTicketResult {
        player_index: PlayerIndex,
        stop: Position,
    },
    #[serde(rename_all = "camelCase")]
    FreeRideTrainResult {
        player_index: PlayerIndex,
        stop: Position,
        fined: bool,
    },
    /// Wholesale state replacement (late join, reconnect, resync).
    SyncGameState(GameStatePatch),
    /// The sender's intent was refused; nothing changed.
    #[serde(rename_all = "camelCase")]
    IntentRejected { intent: String, reason: RejectReason },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::JoinAccepted { .. } => "join-accepted",
            ServerMessage::JoinRejected { .. } => "join-rejected",
            ServerMessage::RollDiceStarted { .. } => "roll-dice-started",
            ServerMessage::RollDiceResult { .. } => "roll-dice-result",
            ServerMessage::MovePlayerResult { .. } => "move-player-result",
            ServerMessage::ActionEnded { .. } => "action-ended",
            ServerMessage::EndTurnResult { .. } => "end-turn-result",
            ServerMessage::BuyItemResult { .. } => "buy-item-result",
            ServerMessage::BuyTrainTicketResult { .. } => "buy-train-ticket-result",
            ServerMessage::FreeRideTrainResult { .. } => "free-ride-train-result",
            ServerMessage::SyncGameState(_) => "sync-game-state",
            ServerMessage::IntentRejected { .. } => "intent-rejected",
        }
    }

    /// Broadcast results that every client applies to its mirror.
    pub fn is_result(&self) -> bool {
        !matches!(
            self,
            ServerMessage::JoinAccepted { .. }
                | ServerMessage::JoinRejected { .. }
                | ServerMessage::SyncGameState(_)
                | ServerMessage::IntentRejected { .. }
        )
    }
}

/// A server message plus its broadcast sequence number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFrame {
    #[serde(flatten)]
    pub message: ServerMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl ServerFrame {
    pub fn unsequenced(message: ServerMessage) -> Self {
        Self { message, seq: None }
    }

    pub fn sequenced(message: ServerMessage, seq: u64) -> Self {
        Self {
            message,
            seq: Some(seq),
        }
    }
}

/// Reasons for refusing a seat claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinRejectReason {
    UnknownPlayer,
    SeatTaken,
    InvalidReconnectToken,
    AlreadyJoined,
}

/// Reasons for refusing an intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum RejectReason {
    /// The client has not claimed a seat.
    NotJoined,
    /// The intent names a seat other than the sender's.
    WrongSeat,
    NotYourTurn,
    GameOver,
    RateLimited,
    /// The intent is not legal in the current turn state.
    Illegal { detail: String },
}
