use serde::{Deserialize, Serialize};

/// Item ids are the catalog keys (`"house"`, `"car"`, ...), stable across versions.
pub type ItemId = String;

/// Board position, always `0..BOARD_SIZE`.
pub type Position = u8;

/// Number of fields on the board.
pub const BOARD_SIZE: u8 = 28;

/// The start field.
pub const START: Position = 0;
/// Jail field a player is locked up on.
pub const JAIL: Position = 27;
/// Visiting side of the jail; a rolled six moves the prisoner on from here.
pub const JAIL_EXIT: Position = 9;

/// Seat index of a player within a match (order of play).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerIndex(pub u8);

impl PlayerIndex {
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Next seat in play order, wrapping at `player_count`.
    pub fn next(self, player_count: usize) -> Self {
        if player_count == 0 {
            return self;
        }
        Self(((self.as_usize() + 1) % player_count) as u8)
    }
}

impl std::fmt::Display for PlayerIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Serde adapter for `Option<PlayerIndex>` encoded as an integer where `-1` means none.
///
/// The browser clients use `winningPlayerIndex: -1` rather than `null`.
pub mod sentinel_index {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::PlayerIndex;

    pub fn serialize<S>(value: &Option<PlayerIndex>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(index) => serializer.serialize_i32(i32::from(index.0)),
            None => serializer.serialize_i32(-1),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<PlayerIndex>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i32::deserialize(deserializer)?;
        from_raw(raw).map_err(serde::de::Error::custom)
    }

    pub(crate) fn from_raw(raw: i32) -> Result<Option<PlayerIndex>, String> {
        match raw {
            r if r < 0 => Ok(None),
            r => u8::try_from(r)
                .map(|v| Some(PlayerIndex(v)))
                .map_err(|_| format!("player index {r} out of range")),
        }
    }

    /// Same encoding for an optional (patch) field: absent = no change.
    pub mod patch {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::super::PlayerIndex;

        pub fn serialize<S>(
            value: &Option<Option<PlayerIndex>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(inner) => super::serialize(inner, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<PlayerIndex>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<i32>::deserialize(deserializer)?;
            match raw {
                Some(r) => super::from_raw(r)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
