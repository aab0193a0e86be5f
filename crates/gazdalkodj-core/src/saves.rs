//! Saved matches, stored as one JSON document per match.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use gazdalkodj_protocol::{
    deserialize_game_data_json, serialize_game_data_json, GameData, GameMeta, GameState, Player,
    PlayerIndex, WireError,
};
use rand::Rng;
use tracing::{debug, warn};

/// Key prefix of saved matches.
pub const KEY_PREFIX: &str = "local-game-";
const ID_LEN: usize = 8;
const DEFAULT_GAME_NAME: &str = "Helyi játék";
const DEFAULT_IMAGE: &str = "puppets/red-1.png";

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("no saved game {0:?}")]
    NotFound(String),
    #[error("invalid game id {0:?}")]
    InvalidId(String),
    #[error("storage error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Keyed storage of [`GameData`].
pub trait SaveStore {
    /// All saved games, most recently played first.
    fn list(&self) -> Result<Vec<GameData>, SaveError>;
    fn load(&self, id: &str) -> Result<GameData, SaveError>;
    fn save(&mut self, game: &GameData) -> Result<(), SaveError>;
    fn delete(&mut self, id: &str) -> Result<(), SaveError>;

    /// Create and store a new game with `player_count` default players.
    fn create(&mut self, name: Option<&str>, player_count: usize) -> Result<GameData, SaveError> {
        let game = new_game(name, player_count);
        self.save(&game)?;
        Ok(game)
    }

    /// Stamp the game as played now and store it.
    fn touch(&mut self, game: &mut GameData) -> Result<(), SaveError> {
        game.meta.last_played = now_millis();
        self.save(game)
    }
}

/// Storage key of a game id.
pub fn key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

/// Random alphanumeric id, as used for new games.
pub fn make_id(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Default player as set up on the new-game screen.
pub fn default_player(index: usize) -> Player {
    let number = index + 1;
    Player::new(
        format!("player-{number}"),
        PlayerIndex(index as u8),
        format!("Játékos {number}"),
        DEFAULT_IMAGE,
    )
}

pub fn new_game(name: Option<&str>, player_count: usize) -> GameData {
    let players = (0..player_count.max(1)).map(default_player).collect();
    new_game_with(name, players)
}

/// New match around an explicit seating, in the order given.
pub fn new_game_with(name: Option<&str>, players: Vec<Player>) -> GameData {
    GameData {
        meta: GameMeta {
            id: make_id(ID_LEN),
            name: name.unwrap_or(DEFAULT_GAME_NAME).to_string(),
            last_played: 0,
        },
        state: GameState::new(players),
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn sort_by_last_played(games: &mut [GameData]) {
    games.sort_by(|a, b| b.meta.last_played.cmp(&a.meta.last_played));
}

/// Saves kept as `<dir>/local-game-<id>.json`.
#[derive(Clone, Debug)]
pub struct DirSaveStore {
    dir: PathBuf,
}

impl DirSaveStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SaveError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &str) -> Result<PathBuf, SaveError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SaveError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key(id))))
    }
}

impl SaveStore for DirSaveStore {
    fn list(&self) -> Result<Vec<GameData>, SaveError> {
        let mut games = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_save = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(KEY_PREFIX) && n.ends_with(".json"));
            if !is_save {
                continue;
            }
            let json = fs::read_to_string(&path)?;
            match deserialize_game_data_json(&json) {
                Ok(game) => games.push(game),
                Err(err) => warn!(path = %path.display(), %err, "skipping unreadable save"),
            }
        }
        sort_by_last_played(&mut games);
        Ok(games)
    }

    fn load(&self, id: &str) -> Result<GameData, SaveError> {
        let path = self.path(id)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SaveError::NotFound(id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(deserialize_game_data_json(&json)?)
    }

    fn save(&mut self, game: &GameData) -> Result<(), SaveError> {
        let path = self.path(&game.meta.id)?;
        let json = serialize_game_data_json(game)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        debug!(id = %game.meta.id, "game saved");
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), SaveError> {
        let path = self.path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(SaveError::NotFound(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> DirSaveStore {
        let dir = std::env::temp_dir().join(format!("gazdalkodj-saves-{name}-{}", make_id(6)));
        DirSaveStore::open(dir).unwrap()
    }

    #[test]
    fn new_game_uses_defaults() {
        let game = new_game(None, 3);
        assert_eq!(game.meta.id.len(), 8);
        assert_eq!(game.meta.name, "Helyi játék");
        assert_eq!(game.meta.last_played, 0);
        assert_eq!(game.state.players.len(), 3);
        assert_eq!(game.state.players[2].name, "Játékos 3");
        assert!(game.state.players.iter().all(|p| p.is_fresh()));
        assert_eq!(game.state.winning_player_index, None);
    }

    #[test]
    fn explicit_seating_is_reindexed() {
        let game = new_game_with(
            Some("Kedd"),
            vec![
                Player::new("zoli", PlayerIndex(5), "Zoli", "z.png"),
                Player::new("eva", PlayerIndex(5), "Éva", "e.png"),
            ],
        );
        assert_eq!(game.meta.name, "Kedd");
        assert_eq!(game.state.players[1].id, "eva");
        assert_eq!(game.state.players[1].index, PlayerIndex(1));
    }

    #[test]
    fn create_load_delete() {
        let mut store = scratch("cld");
        let game = store.create(Some("Friday"), 2).unwrap();
        assert_eq!(store.load(&game.meta.id).unwrap(), game);

        store.delete(&game.meta.id).unwrap();
        assert!(matches!(store.load(&game.meta.id), Err(SaveError::NotFound(_))));
        assert!(matches!(store.delete(&game.meta.id), Err(SaveError::NotFound(_))));
        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn list_is_most_recent_first() {
        let mut store = scratch("list");
        let mut old = store.create(Some("old"), 1).unwrap();
        let never = store.create(Some("never"), 1).unwrap();
        let mut recent = store.create(Some("recent"), 1).unwrap();

        old.meta.last_played = 1_000;
        store.save(&old).unwrap();
        recent.meta.last_played = 2_000;
        store.save(&recent).unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|g| g.meta.name).collect();
        assert_eq!(names, vec!["recent", "old", "never"]);
        assert_eq!(never.meta.last_played, 0);
        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn touch_stamps_last_played() {
        let mut store = scratch("touch");
        let mut game = store.create(None, 1).unwrap();
        store.touch(&mut game).unwrap();
        assert!(game.meta.last_played > 0);
        assert_eq!(store.load(&game.meta.id).unwrap().meta.last_played, game.meta.last_played);
        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn path_traversal_ids_are_rejected() {
        let store = scratch("ids");
        assert!(matches!(store.load("../etc"), Err(SaveError::InvalidId(_))));
        fs::remove_dir_all(store.dir()).unwrap();
    }
}
