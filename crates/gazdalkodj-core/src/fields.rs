//! The board: 28 fields in play order and the resolver for their effects.

use gazdalkodj_protocol::{GameState, PlayerIndex, Position, BOARD_SIZE, CAR};
use serde::Serialize;

/// Popup screens a field can open. The popup contents live with the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PopupKind {
    Lucky,
    Elza,
    Steelroad,
    BankRobbery,
    ElzaAndIdea,
    Casino,
    BobTheBuilder,
    CarShop,
    Idea,
    Yappel,
    Insurance,
}

/// What landing on a field does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Money added to the lander.
    Payout(i64),
    /// Money taken from the lander.
    Fee(i64),
    Popup(PopupKind),
    /// Move forward again, optionally only when owning an item.
    Jump {
        steps: u8,
        requires: Option<&'static str>,
    },
    Hospital,
    RollAgain,
    /// Nothing happens (jail fields).
    Idle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Field {
    pub id: Position,
    pub name: &'static str,
    /// Board coordinates in percent of the board image (x, y).
    pub coords: (f32, f32),
    /// Railway stations reachable by train.
    pub is_stop: bool,
    /// Instant fields resolve without a popup.
    pub is_action_instant: bool,
    pub kind: FieldKind,
}

const fn field(
    id: Position,
    name: &'static str,
    coords: (f32, f32),
    is_stop: bool,
    is_action_instant: bool,
    kind: FieldKind,
) -> Field {
    Field {
        id,
        name,
        coords,
        is_stop,
        is_action_instant,
        kind,
    }
}

use FieldKind::*;
use PopupKind as P;

pub static FIELDS: [Field; BOARD_SIZE as usize] = [
    field(0, "Start", (92.45, 83.0), false, true, Payout(170_000)),
    field(1, "Lucky 1", (73.7, 84.0), false, false, Popup(P::Lucky)),
    field(2, "Trash", (65.4, 84.0), false, true, Fee(1_500)),
    field(3, "Elza", (57.1, 84.0), false, false, Popup(P::Elza)),
    field(4, "South Station", (48.9, 84.0), true, false, Popup(P::Steelroad)),
    field(5, "Bank Robbery", (40.6, 84.0), false, false, Popup(P::BankRobbery)),
    field(6, "Elza and Idea", (32.5, 84.0), false, false, Popup(P::ElzaAndIdea)),
    field(7, "Lucky 2", (24.2, 84.0), false, false, Popup(P::Lucky)),
    field(8, "Smoking", (16.0, 84.0), false, true, Fee(1_500)),
    field(9, "Jail (visiting)", (1.25, 91.5), false, true, Idle),
    field(10, "Movie Theater", (5.0, 64.0), false, true, Fee(5_000)),
    field(11, "West Station", (5.0, 45.0), true, false, Popup(P::Steelroad)),
    field(12, "Casino", (5.0, 26.5), false, false, Popup(P::Casino)),
    field(
        13,
        "Airport",
        (5.0, 10.0),
        false,
        false,
        Jump {
            steps: 4,
            requires: None,
        },
    ),
    field(14, "Bob the Builder", (16.0, 7.5), false, false, Popup(P::BobTheBuilder)),
    field(15, "Car Shop", (24.2, 7.5), false, false, Popup(P::CarShop)),
    field(
        16,
        "Car travel",
        (32.5, 7.5),
        false,
        false,
        Jump {
            steps: 10,
            requires: Some(CAR),
        },
    ),
    field(17, "Lucky 3", (40.6, 7.5), false, false, Popup(P::Lucky)),
    field(18, "North Station", (48.9, 7.5), true, false, Popup(P::Steelroad)),
    field(19, "Abidas", (57.1, 7.5), false, true, Fee(15_000)),
    field(20, "Idea", (65.4, 7.5), false, false, Popup(P::Idea)),
    field(21, "Yappel", (73.7, 7.5), false, false, Popup(P::Yappel)),
    field(22, "ABC", (81.8, 7.5), false, true, Fee(10_000)),
    field(23, "Hospital", (94.0, 11.0), false, true, Hospital),
    field(24, "Insurance", (93.0, 26.0), false, false, Popup(P::Insurance)),
    field(25, "East Station", (93.0, 45.0), true, false, Popup(P::Steelroad)),
    field(26, "Roll again", (93.0, 64.0), false, true, RollAgain),
    field(27, "Jail (locked up)", (5.0, 84.0), false, true, Idle),
];

/// Field at a board position; positions wrap around the board.
pub fn lookup(position: Position) -> &'static Field {
    &FIELDS[usize::from(position % BOARD_SIZE)]
}

/// Position `steps` fields ahead of `from`.
pub fn advance(from: Position, steps: u8) -> Position {
    ((u16::from(from) + u16::from(steps)) % u16::from(BOARD_SIZE)) as Position
}

/// All train stations in board order.
pub fn stops() -> impl Iterator<Item = &'static Field> {
    FIELDS.iter().filter(|f| f.is_stop)
}

/// What is left to do after a field's immediate effect was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldOutcome {
    /// Nothing more; the action is over.
    Done,
    /// Hand over to a popup; the action ends when it closes.
    Popup(PopupKind),
    /// The player was moved forward and the landed field still has to resolve.
    Jumped { to: Position },
}

/// Apply the effect of the field `player` stands on.
///
/// Unknown players leave the state untouched.
pub fn resolve(mut state: GameState, player: PlayerIndex) -> (GameState, FieldOutcome) {
    let Some(p) = state.player_mut(player) else {
        return (state, FieldOutcome::Done);
    };
    let outcome = match lookup(p.position).kind {
        Payout(amount) => {
            p.money += amount;
            FieldOutcome::Done
        }
        Fee(amount) => {
            p.money -= amount;
            FieldOutcome::Done
        }
        Popup(kind) => FieldOutcome::Popup(kind),
        Jump { steps, requires } => {
            if requires.map_or(true, |item| p.owns(item)) {
                p.position = advance(p.position, steps);
                FieldOutcome::Jumped { to: p.position }
            } else {
                FieldOutcome::Done
            }
        }
        Hospital => {
            p.in_hospital = true;
            p.can_roll_dice = false;
            FieldOutcome::Done
        }
        RollAgain => {
            p.can_roll_dice = true;
            p.rolling_dice = false;
            p.rolled_dice = None;
            FieldOutcome::Done
        }
        Idle => FieldOutcome::Done,
    };
    (state, outcome)
}
