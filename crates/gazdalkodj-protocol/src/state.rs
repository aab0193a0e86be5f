use serde::{Deserialize, Serialize};

use crate::{catalog, Player, PlayerIndex};

/// Full match state; the unit that is mirrored between clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub current_player: PlayerIndex,
    #[serde(with = "crate::ids::sentinel_index")]
    pub winning_player_index: Option<PlayerIndex>,
    pub players: Vec<Player>,
    #[serde(default)]
    pub is_game_over: bool,
}

impl GameState {
    /// Start a match; players are re-indexed in the given order and the first one is current.
    pub fn new(mut players: Vec<Player>) -> Self {
        for (i, player) in players.iter_mut().enumerate() {
            player.index = PlayerIndex(i as u8);
        }
        Self {
            current_player: PlayerIndex(0),
            winning_player_index: None,
            players,
            is_game_over: false,
        }
    }

    pub fn player(&self, index: PlayerIndex) -> Option<&Player> {
        self.players.get(index.as_usize())
    }

    pub fn player_mut(&mut self, index: PlayerIndex) -> Option<&mut Player> {
        self.players.get_mut(index.as_usize())
    }

    pub fn current(&self) -> Option<&Player> {
        self.player(self.current_player)
    }

    pub fn is_current(&self, index: PlayerIndex) -> bool {
        self.current_player == index
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// First player whose inventory covers every required catalog item.
    pub fn find_winner(&self) -> Option<PlayerIndex> {
        self.players
            .iter()
            .position(|p| catalog::required_items().all(|item| p.owns(item.id)))
            .map(|i| PlayerIndex(i as u8))
    }

    /// Shallow merge: every field present in the patch replaces ours wholesale.
    pub fn merge(mut self, patch: GameStatePatch) -> Self {
        if let Some(current) = patch.current_player {
            self.current_player = current;
        }
        if let Some(winner) = patch.winning_player_index {
            self.winning_player_index = winner;
        }
        if let Some(players) = patch.players {
            self.players = players;
        }
        if let Some(over) = patch.is_game_over {
            self.is_game_over = over;
        }
        self
    }

    /// A patch that carries the whole state.
    pub fn to_patch(&self) -> GameStatePatch {
        GameStatePatch {
            current_player: Some(self.current_player),
            winning_player_index: Some(self.winning_player_index),
            players: Some(self.players.clone()),
            is_game_over: Some(self.is_game_over),
        }
    }
}

/// Partial game state as carried by `sync-game-state`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_player: Option<PlayerIndex>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::ids::sentinel_index::patch"
    )]
    pub winning_player_index: Option<Option<PlayerIndex>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<Player>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_game_over: Option<bool>,
}

/// Display/persistence metadata of a saved match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMeta {
    pub id: String,
    pub name: String,
    /// Milliseconds since the Unix epoch; 0 = never played.
    #[serde(default)]
    pub last_played: u64,
}

/// A saved match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameData {
    pub meta: GameMeta,
    pub state: GameState,
}
