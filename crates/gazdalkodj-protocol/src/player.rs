use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ItemId, PlayerIndex, Position};

/// Money every player starts with.
pub const STARTING_MONEY: i64 = 400_000;

/// Where a player is within their own turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnPhase {
    #[default]
    JustStarted,
    RolledDice,
    ActionStarted,
    ActionEnded,
}

/// Per-player economic and turn state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub index: PlayerIndex,
    pub name: String,
    pub image: String,
    /// Unbounded below: nothing enforces bankruptcy.
    pub money: i64,
    pub position: Position,
    #[serde(default)]
    pub inventory: BTreeSet<ItemId>,
    #[serde(default)]
    pub insurances: BTreeSet<ItemId>,
    #[serde(default)]
    pub in_hospital: bool,
    #[serde(default)]
    pub in_jail: bool,
    pub can_roll_dice: bool,
    pub can_end_turn: bool,
    #[serde(default)]
    pub rolling_dice: bool,
    #[serde(default)]
    pub rolled_dice: Option<u8>,
    #[serde(default)]
    pub state: TurnPhase,
    #[serde(default = "full_battery")]
    pub battery_percentage: u8,
}

fn full_battery() -> u8 {
    100
}

impl Player {
    /// A fresh player standing on start with the default purse.
    pub fn new(
        id: impl Into<String>,
        index: PlayerIndex,
        name: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            index,
            name: name.into(),
            image: image.into(),
            money: STARTING_MONEY,
            position: 0,
            inventory: BTreeSet::new(),
            insurances: BTreeSet::new(),
            in_hospital: false,
            in_jail: false,
            can_roll_dice: true,
            can_end_turn: false,
            rolling_dice: false,
            rolled_dice: None,
            state: TurnPhase::JustStarted,
            battery_percentage: full_battery(),
        }
    }

    pub fn owns(&self, item: &str) -> bool {
        self.inventory.contains(item)
    }

    /// True before the player's very first move: on start, untouched purse, nothing bought.
    pub fn is_fresh(&self) -> bool {
        self.position == 0 && self.money == STARTING_MONEY && self.inventory.is_empty()
    }

    /// Send the player to the locked-up jail field. Only a rolled six gets them out.
    pub fn lock_up(&mut self) {
        self.position = crate::ids::JAIL;
        self.in_jail = true;
    }

    /// Flags a player gets when their turn begins.
    pub fn begin_turn(&mut self) {
        self.state = TurnPhase::JustStarted;
        self.can_roll_dice = true;
        self.can_end_turn = false;
        self.rolling_dice = false;
        self.rolled_dice = None;

        if self.in_hospital {
            self.can_roll_dice = false;
            self.can_end_turn = true;
            self.state = TurnPhase::ActionEnded;
            self.in_hospital = false;
        }
    }
}
