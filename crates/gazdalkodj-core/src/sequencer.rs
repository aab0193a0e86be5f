//! Turn state machine.
//!
//! A turn runs `justStarted -> rolledDice -> actionStarted/actionEnded -> (next player)`.
//! Every transition is a pure function of the current [`GameState`] that returns the
//! next state plus a list of [`Effect`]s. Effects that name a [`Stage`] continue the
//! turn, either right away or after the reveal delay; the host decides how to wait.
//!
//! The same transitions run on the server (with a zero delay, see
//! [`TurnSequencer::run_inline`]) and on every client, so all peers end up with the
//! same state.

use std::collections::VecDeque;
use std::time::Duration;

use gazdalkodj_protocol::{
    catalog, GameState, Player, PlayerIndex, Position, TurnPhase, BOARD_SIZE, HOUSE, JAIL_EXIT,
};
use thiserror::Error;

use crate::fields::{self, FieldKind, FieldOutcome};
use crate::gateway::{Notice, PopupRequest};

/// Paid for passing the start field.
pub const START_BONUS: i64 = 150_000;
/// Charged for passing the start field without owning a house.
pub const UPKEEP: i64 = 70_000;
pub const TICKET_PRICE: i64 = 3_000;
pub const FARE_DODGER_FINE: i64 = 40_000;
/// The only roll that frees a jailed player.
pub const JAIL_BREAK_ROLL: u8 = 6;
/// Jumps resolve the landed field, but a second jump from there is not taken.
const MAX_JUMP_DEPTH: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Pause between a move and the landed field's action.
    pub reveal_delay: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            reveal_delay: Duration::from_secs(1),
        }
    }
}

impl SequencerConfig {
    /// No pauses; used by the authoritative server and in tests.
    pub fn instant() -> Self {
        Self {
            reveal_delay: Duration::ZERO,
        }
    }
}

/// Continuation points of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Start-crossing income and upkeep, judged against the pre-move snapshot.
    Settle {
        player: PlayerIndex,
        from: Position,
        was_jailed: bool,
        fresh: bool,
    },
    /// End of the reveal pause: the landed field's action becomes active.
    Reveal { player: PlayerIndex },
    FireAction { player: PlayerIndex, depth: u8 },
    /// End of the pause after a jump.
    Land { player: PlayerIndex, depth: u8 },
    /// End of the pause after a failed jail roll.
    JailRetry { player: PlayerIndex },
}

/// Side effects a transition asks its host to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Commit, then resume at `stage` immediately.
    Continue(Stage),
    /// Commit, then resume at `stage` once `after` has elapsed.
    Schedule { after: Duration, stage: Stage },
    OpenPopup(PopupRequest),
    ClosePopup,
    Alert { player: PlayerIndex, notice: Notice },
    /// The acting client should close its popup and report `end-action`.
    EndAction { player: PlayerIndex },
}

/// Outcome of one transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub state: GameState,
    pub effects: Vec<Effect>,
}

impl Step {
    fn new(state: GameState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SequencerError {
    #[error("the game is over")]
    GameOver,
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerIndex),
    #[error("player {player} acted while {current} is current")]
    NotCurrentPlayer {
        player: PlayerIndex,
        current: PlayerIndex,
    },
    #[error("cannot {action}: {reason}")]
    IllegalState {
        action: &'static str,
        reason: &'static str,
    },
    #[error("invalid dice value {0}")]
    InvalidDice(u8),
    #[error("field {0} is not a train stop")]
    NotAStop(Position),
    #[error("unknown item {0:?}")]
    UnknownItem(String),
    #[error("item {0:?} is already owned")]
    AlreadyOwned(String),
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },
}

fn illegal(action: &'static str, reason: &'static str) -> SequencerError {
    SequencerError::IllegalState { action, reason }
}

#[derive(Clone, Debug, Default)]
pub struct TurnSequencer {
    config: SequencerConfig,
}

impl TurnSequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Check that `player` may act right now and return them.
    pub fn acting<'a>(
        &self,
        state: &'a GameState,
        player: PlayerIndex,
    ) -> Result<&'a Player, SequencerError> {
        if state.is_game_over {
            return Err(SequencerError::GameOver);
        }
        self.holding_turn(state, player)
    }

    /// Like [`acting`](Self::acting), but also after the match has been won.
    fn holding_turn<'a>(
        &self,
        state: &'a GameState,
        player: PlayerIndex,
    ) -> Result<&'a Player, SequencerError> {
        let p = state
            .player(player)
            .ok_or(SequencerError::UnknownPlayer(player))?;
        if !state.is_current(player) {
            return Err(SequencerError::NotCurrentPlayer {
                player,
                current: state.current_player,
            });
        }
        Ok(p)
    }

    /// `roll-dice-started`: the dice are in the air.
    pub fn request_roll(&self, state: &GameState, player: PlayerIndex) -> Result<Step, SequencerError> {
        let p = self.acting(state, player)?;
        if !p.can_roll_dice {
            return Err(illegal("roll", "no roll left this turn"));
        }
        if p.rolling_dice {
            return Err(illegal("roll", "dice are already rolling"));
        }
        if p.rolled_dice.is_some() {
            return Err(illegal("roll", "rolled dice not used yet"));
        }

        let mut next = state.clone();
        mut_player(&mut next, player)?.rolling_dice = true;
        Ok(Step::new(next))
    }

    /// `roll-dice-result`: record the value the server rolled.
    pub fn dice_rolled(
        &self,
        state: &GameState,
        player: PlayerIndex,
        result: u8,
    ) -> Result<Step, SequencerError> {
        check_dice(result)?;
        let p = self.acting(state, player)?;
        if !p.can_roll_dice {
            return Err(illegal("record roll", "no roll left this turn"));
        }
        if p.rolled_dice.is_some() {
            return Err(illegal("record roll", "dice already rolled"));
        }

        let mut next = state.clone();
        let p = mut_player(&mut next, player)?;
        p.rolled_dice = Some(result);
        p.rolling_dice = false;
        Ok(Step::new(next))
    }

    /// `move-player-result`: move by the rolled value, or try to break out of jail.
    pub fn move_player(
        &self,
        state: &GameState,
        player: PlayerIndex,
        steps: u8,
    ) -> Result<Step, SequencerError> {
        check_dice(steps)?;
        let p = self.acting(state, player)?;
        if !p.can_roll_dice {
            return Err(illegal("move", "already moved this turn"));
        }
        match p.rolled_dice {
            Some(rolled) if rolled == steps => {}
            Some(_) => return Err(illegal("move", "steps differ from the rolled value")),
            None => return Err(illegal("move", "dice not rolled")),
        }

        let from = p.position;
        let was_jailed = p.in_jail;
        let fresh = p.is_fresh();

        let mut next = state.clone();
        let p = mut_player(&mut next, player)?;
        p.can_roll_dice = false;

        if was_jailed && steps != JAIL_BREAK_ROLL {
            return Ok(Step::new(next)
                .with(Effect::Alert {
                    player,
                    notice: Notice::JailStay,
                })
                .with(self.after_delay(Stage::JailRetry { player })));
        }

        if was_jailed {
            p.in_jail = false;
            p.position = fields::advance(JAIL_EXIT, steps);
        } else {
            p.position = fields::advance(from, steps);
        }
        p.can_end_turn = false;
        p.state = TurnPhase::RolledDice;

        Ok(Step::new(next).with(Effect::Continue(Stage::Settle {
            player,
            from,
            was_jailed,
            fresh,
        })))
    }

    /// Continue a turn at a stage requested by an earlier [`Effect`].
    pub fn resume(&self, state: &GameState, stage: Stage) -> Result<Step, SequencerError> {
        match stage {
            Stage::Settle {
                player,
                from,
                was_jailed,
                fresh,
            } => {
                let mut next = state.clone();
                let p = mut_player(&mut next, player)?;
                settle_start(p, from, was_jailed, fresh);
                Ok(Step::new(next).with(self.after_delay(Stage::Reveal { player })))
            }
            Stage::Reveal { player } => {
                let mut next = state.clone();
                if next.player(player).is_none() {
                    return Err(SequencerError::UnknownPlayer(player));
                }
                for p in &mut next.players {
                    p.can_end_turn = true;
                }
                let p = mut_player(&mut next, player)?;
                p.state = phase_on(p.position);
                Ok(Step::new(next).with(Effect::Continue(Stage::FireAction { player, depth: 0 })))
            }
            Stage::FireAction { player, depth } => self.fire_action(state, player, depth),
            Stage::Land { player, depth } => {
                let mut next = state.clone();
                let p = mut_player(&mut next, player)?;
                p.state = phase_on(p.position);
                Ok(Step::new(next).with(Effect::Continue(Stage::FireAction { player, depth })))
            }
            Stage::JailRetry { player } => {
                let mut next = state.clone();
                let p = mut_player(&mut next, player)?;
                p.state = TurnPhase::RolledDice;
                p.can_end_turn = true;
                Ok(Step::new(next))
            }
        }
    }

    fn fire_action(
        &self,
        state: &GameState,
        player: PlayerIndex,
        depth: u8,
    ) -> Result<Step, SequencerError> {
        let position = state
            .player(player)
            .ok_or(SequencerError::UnknownPlayer(player))?
            .position;
        let field = fields::lookup(position);

        if depth >= MAX_JUMP_DEPTH && matches!(field.kind, FieldKind::Jump { .. }) {
            let mut next = state.clone();
            end_action_phase(mut_player(&mut next, player)?);
            return Ok(Step::new(next));
        }

        let (mut next, outcome) = fields::resolve(state.clone(), player);
        match outcome {
            FieldOutcome::Done => {
                end_action_phase(mut_player(&mut next, player)?);
                Ok(Step::new(next))
            }
            FieldOutcome::Popup(kind) => Ok(Step::new(next).with(Effect::OpenPopup(PopupRequest {
                kind,
                player,
                field: position,
            }))),
            FieldOutcome::Jumped { .. } => Ok(Step::new(next).with(self.after_delay(Stage::Land {
                player,
                depth: depth + 1,
            }))),
        }
    }

    /// `action-ended`: the popup of the acting player was closed.
    pub fn end_action(&self, state: &GameState, player: PlayerIndex) -> Result<Step, SequencerError> {
        let p = self.acting(state, player)?;
        if p.state != TurnPhase::ActionStarted {
            return Err(illegal("end action", "no action in progress"));
        }

        let mut next = state.clone();
        mut_player(&mut next, player)?.state = TurnPhase::ActionEnded;
        Ok(Step::new(next).with(Effect::ClosePopup))
    }

    /// `end-turn-result`: hand the turn to the next player and check for a winner.
    ///
    /// The hand-off keeps working after a win; nothing else is left to do then,
    /// so the turn flags no longer gate it.
    pub fn end_turn(&self, state: &GameState, player: PlayerIndex) -> Result<Step, SequencerError> {
        let p = self.holding_turn(state, player)?;
        if !state.is_game_over {
            if !p.can_end_turn {
                return Err(illegal("end turn", "turn not finished"));
            }
            if p.state == TurnPhase::ActionStarted {
                return Err(illegal("end turn", "action in progress"));
            }
        }

        let mut next = state.clone();
        let following = player.next(next.player_count());
        next.current_player = following;
        mut_player(&mut next, following)?.begin_turn();

        next.winning_player_index = next.find_winner();
        if next.winning_player_index.is_some() {
            next.is_game_over = true;
        }
        Ok(Step::new(next))
    }

    /// `buy-item-result`: pay for and take a catalog item.
    pub fn buy_item(
        &self,
        state: &GameState,
        player: PlayerIndex,
        item_id: &str,
    ) -> Result<Step, SequencerError> {
        let p = self.acting(state, player)?;
        let item =
            catalog::item(item_id).ok_or_else(|| SequencerError::UnknownItem(item_id.to_string()))?;
        if p.owns(item.id) {
            return Err(SequencerError::AlreadyOwned(item.id.to_string()));
        }
        if p.money < item.price {
            return Err(SequencerError::InsufficientFunds {
                needed: item.price,
                available: p.money,
            });
        }

        let mut next = state.clone();
        let p = mut_player(&mut next, player)?;
        p.money -= item.price;
        p.inventory.insert(item.id.to_string());
        Ok(Step::new(next))
    }

    /// `buy-train-ticket-result`: ride to another station with a ticket.
    pub fn buy_train_ticket(
        &self,
        state: &GameState,
        player: PlayerIndex,
        stop: Position,
    ) -> Result<Step, SequencerError> {
        let p = self.check_travel(state, player, stop)?;
        if p.money < TICKET_PRICE {
            return Err(SequencerError::InsufficientFunds {
                needed: TICKET_PRICE,
                available: p.money,
            });
        }

        let mut next = state.clone();
        let p = mut_player(&mut next, player)?;
        p.money -= TICKET_PRICE;
        ride_to(p, stop);
        Ok(Step::new(next).with(Effect::EndAction { player }))
    }

    /// `free-ride-train-result`: ride without a ticket; the server decided on the fine.
    pub fn free_ride_train(
        &self,
        state: &GameState,
        player: PlayerIndex,
        stop: Position,
        fined: bool,
    ) -> Result<Step, SequencerError> {
        self.check_travel(state, player, stop)?;

        let mut next = state.clone();
        let p = mut_player(&mut next, player)?;
        ride_to(p, stop);
        let mut step = Step::new(next);
        if fined {
            mut_player(&mut step.state, player)?.money -= FARE_DODGER_FINE;
            step = step.with(Effect::Alert {
                player,
                notice: Notice::Fined {
                    amount: FARE_DODGER_FINE,
                },
            });
        }
        Ok(step.with(Effect::EndAction { player }))
    }

    fn check_travel<'a>(
        &self,
        state: &'a GameState,
        player: PlayerIndex,
        stop: Position,
    ) -> Result<&'a Player, SequencerError> {
        let p = self.acting(state, player)?;
        if stop >= BOARD_SIZE || !fields::lookup(stop).is_stop {
            return Err(SequencerError::NotAStop(stop));
        }
        if p.state != TurnPhase::ActionStarted || !fields::lookup(p.position).is_stop {
            return Err(illegal("travel", "not waiting at a station"));
        }
        if p.position == stop {
            return Err(illegal("travel", "already at that station"));
        }
        Ok(p)
    }

    /// Effects that bring a freshly synced peer back to where the turn stands.
    pub fn resume_effects(&self, state: &GameState) -> Vec<Effect> {
        let Some(p) = state.current() else {
            return Vec::new();
        };
        if state.is_game_over || p.state != TurnPhase::ActionStarted {
            return Vec::new();
        }
        match fields::lookup(p.position).kind {
            FieldKind::Popup(kind) => vec![Effect::OpenPopup(PopupRequest {
                kind,
                player: p.index,
                field: p.position,
            })],
            _ => Vec::new(),
        }
    }

    /// Run every continuation of `step` to completion without waiting.
    ///
    /// Returns the final state and the effects that are not continuations.
    pub fn run_inline(&self, step: Step) -> Result<Step, SequencerError> {
        let Step { mut state, effects } = step;
        let mut pending: VecDeque<Effect> = effects.into();
        let mut remaining = Vec::new();

        while let Some(effect) = pending.pop_front() {
            match effect {
                Effect::Continue(stage) | Effect::Schedule { stage, .. } => {
                    let next = self.resume(&state, stage)?;
                    state = next.state;
                    pending.extend(next.effects);
                }
                other => remaining.push(other),
            }
        }

        Ok(Step {
            state,
            effects: remaining,
        })
    }

    fn after_delay(&self, stage: Stage) -> Effect {
        if self.config.reveal_delay.is_zero() {
            Effect::Continue(stage)
        } else {
            Effect::Schedule {
                after: self.config.reveal_delay,
                stage,
            }
        }
    }
}

fn check_dice(value: u8) -> Result<(), SequencerError> {
    if (1..=6).contains(&value) {
        Ok(())
    } else {
        Err(SequencerError::InvalidDice(value))
    }
}

fn mut_player(state: &mut GameState, player: PlayerIndex) -> Result<&mut Player, SequencerError> {
    state
        .player_mut(player)
        .ok_or(SequencerError::UnknownPlayer(player))
}

fn phase_on(position: Position) -> TurnPhase {
    if fields::lookup(position).is_action_instant {
        TurnPhase::ActionEnded
    } else {
        TurnPhase::ActionStarted
    }
}

fn end_action_phase(p: &mut Player) {
    if p.state == TurnPhase::ActionStarted {
        p.state = TurnPhase::ActionEnded;
    }
}

/// Income and upkeep for a move that ended on `p.position`.
fn settle_start(p: &mut Player, from: Position, was_jailed: bool, fresh: bool) {
    let crossed = from > p.position && p.position != 0 && !was_jailed;
    if crossed {
        p.money += START_BONUS;
    }
    if (crossed || from == 0) && !p.owns(HOUSE) && !fresh {
        p.money -= UPKEEP;
    }
}

/// Train rides pay the start bonus and upkeep when they wrap past the start.
fn ride_to(p: &mut Player, stop: Position) {
    let from = p.position;
    p.position = stop;
    if from > stop {
        p.money += START_BONUS;
        if !p.owns(HOUSE) {
            p.money -= UPKEEP;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazdalkodj_protocol::{catalog::required_items, STARTING_MONEY};

    fn game(n: usize) -> GameState {
        GameState::new(
            (0..n)
                .map(|i| Player::new(format!("p{i}"), PlayerIndex(i as u8), format!("P{i}"), ""))
                .collect(),
        )
    }

    fn seq() -> TurnSequencer {
        TurnSequencer::new(SequencerConfig::instant())
    }

    /// Roll `value` for the current player and move, running every stage inline.
    fn roll_and_move(s: &TurnSequencer, state: &GameState, value: u8) -> Step {
        let player = state.current_player;
        let state = s.request_roll(state, player).unwrap().state;
        let state = s.dice_rolled(&state, player, value).unwrap().state;
        let step = s.move_player(&state, player, value).unwrap();
        s.run_inline(step).unwrap()
    }

    #[test]
    fn crossing_start_pays_bonus_minus_upkeep() {
        let s = seq();
        let mut state = game(2);
        state.players[0].position = 26;
        state.players[0].money = 100_000;

        let step = roll_and_move(&s, &state, 4);
        let p = &step.state.players[0];
        assert_eq!(p.position, 2);
        // +150 000 - 70 000, then the trash fee of field 2.
        assert_eq!(p.money, 100_000 + 80_000 - 1_500);
        assert_eq!(p.state, TurnPhase::ActionEnded);
        assert!(step.state.players.iter().all(|p| p.can_end_turn));
    }

    #[test]
    fn house_owner_pays_no_upkeep() {
        let s = seq();
        let mut state = game(1);
        state.players[0].position = 25;
        state.players[0].inventory.insert(HOUSE.to_string());

        let step = roll_and_move(&s, &state, 5);
        assert_eq!(step.state.players[0].position, 2);
        assert_eq!(step.state.players[0].money, STARTING_MONEY + 150_000 - 1_500);
    }

    #[test]
    fn first_move_from_start_is_free() {
        let s = seq();
        let state = game(2);
        let step = roll_and_move(&s, &state, 2);
        assert_eq!(step.state.players[0].money, STARTING_MONEY - 1_500);
    }

    #[test]
    fn leaving_start_later_costs_upkeep() {
        let s = seq();
        let mut state = game(2);
        state.players[0].money = 500_000;

        let step = roll_and_move(&s, &state, 2);
        assert_eq!(step.state.players[0].money, 500_000 - 70_000 - 1_500);
    }

    #[test]
    fn landing_on_start_pays_only_the_field() {
        let s = seq();
        let mut state = game(1);
        state.players[0].position = 24;
        state.players[0].money = 10;

        let step = roll_and_move(&s, &state, 4);
        assert_eq!(step.state.players[0].position, 0);
        assert_eq!(step.state.players[0].money, 10 + 170_000);
    }

    #[test]
    fn jailed_player_needs_a_six() {
        let s = seq();
        let mut state = game(2);
        state.players[0].lock_up();

        let step = roll_and_move(&s, &state, 5);
        let p = &step.state.players[0];
        assert!(p.in_jail);
        assert_eq!(p.position, 27);
        assert!(!p.can_roll_dice);
        assert_eq!(p.state, TurnPhase::RolledDice);
        assert!(p.can_end_turn);
        assert_eq!(
            step.effects,
            vec![Effect::Alert {
                player: PlayerIndex(0),
                notice: Notice::JailStay
            }]
        );
    }

    #[test]
    fn six_breaks_out_of_jail_without_settlement() {
        let s = seq();
        let mut state = game(2);
        state.players[0].lock_up();
        state.players[0].money = 1_000;

        let step = roll_and_move(&s, &state, 6);
        let p = &step.state.players[0];
        assert!(!p.in_jail);
        assert_eq!(p.position, 15);
        assert_eq!(p.money, 1_000);
        assert_eq!(p.state, TurnPhase::ActionStarted);
        assert!(matches!(
            step.effects.as_slice(),
            [Effect::OpenPopup(PopupRequest { field: 15, .. })]
        ));
    }

    #[test]
    fn reveal_is_delayed_when_configured() {
        let s = TurnSequencer::default();
        let mut state = game(1);
        state.players[0].rolled_dice = Some(3);

        let step = s.move_player(&state, PlayerIndex(0), 3).unwrap();
        let Effect::Continue(settle) = step.effects[0] else {
            panic!("expected settle, got {:?}", step.effects);
        };
        let settled = s.resume(&step.state, settle).unwrap();
        assert_eq!(
            settled.effects,
            vec![Effect::Schedule {
                after: Duration::from_secs(1),
                stage: Stage::Reveal {
                    player: PlayerIndex(0)
                },
            }]
        );
        assert!(!settled.state.players[0].can_end_turn);
    }

    #[test]
    fn airport_lands_on_the_next_field() {
        let s = seq();
        let mut state = game(1);
        state.players[0].position = 10;

        let step = roll_and_move(&s, &state, 3);
        let p = &step.state.players[0];
        assert_eq!(p.position, 17);
        assert_eq!(p.state, TurnPhase::ActionStarted);
        assert!(matches!(
            step.effects.as_slice(),
            [Effect::OpenPopup(PopupRequest { field: 17, .. })]
        ));
    }

    #[test]
    fn car_travel_without_car_ends_the_action() {
        let s = seq();
        let mut state = game(1);
        state.players[0].position = 14;

        let step = roll_and_move(&s, &state, 2);
        let p = &step.state.players[0];
        assert_eq!(p.position, 16);
        assert_eq!(p.state, TurnPhase::ActionEnded);
        assert!(step.effects.is_empty());
    }

    #[test]
    fn car_travel_with_car_reaches_roll_again() {
        let s = seq();
        let mut state = game(1);
        state.players[0].position = 14;
        state.players[0].inventory.insert("car".into());

        let step = roll_and_move(&s, &state, 2);
        let p = &step.state.players[0];
        assert_eq!(p.position, 26);
        assert_eq!(p.state, TurnPhase::ActionEnded);
        assert!(p.can_roll_dice);
        assert_eq!(p.rolled_dice, None);
    }

    #[test]
    fn move_requires_matching_roll() {
        let s = seq();
        let state = game(2);
        assert!(matches!(
            s.move_player(&state, PlayerIndex(0), 3),
            Err(SequencerError::IllegalState { .. })
        ));

        let rolled = s.dice_rolled(&state, PlayerIndex(0), 4).unwrap().state;
        assert!(s.move_player(&rolled, PlayerIndex(0), 3).is_err());
        assert_eq!(
            s.move_player(&rolled, PlayerIndex(0), 9),
            Err(SequencerError::InvalidDice(9))
        );
    }

    #[test]
    fn duplicate_move_is_rejected() {
        let s = seq();
        let state = game(2);
        let rolled = s.dice_rolled(&state, PlayerIndex(0), 4).unwrap().state;
        let moved = s.run_inline(s.move_player(&rolled, PlayerIndex(0), 4).unwrap()).unwrap();
        assert!(s.move_player(&moved.state, PlayerIndex(0), 4).is_err());
    }

    #[test]
    fn out_of_turn_actions_are_rejected() {
        let s = seq();
        let state = game(3);
        assert_eq!(
            s.request_roll(&state, PlayerIndex(2)),
            Err(SequencerError::NotCurrentPlayer {
                player: PlayerIndex(2),
                current: PlayerIndex(0)
            })
        );
        assert_eq!(
            s.request_roll(&state, PlayerIndex(7)),
            Err(SequencerError::UnknownPlayer(PlayerIndex(7)))
        );
    }

    #[test]
    fn end_turn_advances_and_resets() {
        let s = seq();
        let state = game(3);
        let moved = roll_and_move(&s, &state, 2).state;

        let next = s.end_turn(&moved, PlayerIndex(0)).unwrap().state;
        assert_eq!(next.current_player, PlayerIndex(1));
        let p = &next.players[1];
        assert!(p.can_roll_dice);
        assert!(!p.can_end_turn);
        assert_eq!(p.rolled_dice, None);
        assert_eq!(p.state, TurnPhase::JustStarted);
        assert_eq!(next.winning_player_index, None);
    }

    #[test]
    fn end_turn_wraps_and_skips_hospital() {
        let s = seq();
        let mut state = game(2);
        state.current_player = PlayerIndex(1);
        state.players[1].can_end_turn = true;
        state.players[1].state = TurnPhase::ActionEnded;
        state.players[0].in_hospital = true;

        let next = s.end_turn(&state, PlayerIndex(1)).unwrap().state;
        assert_eq!(next.current_player, PlayerIndex(0));
        let p = &next.players[0];
        assert!(!p.can_roll_dice);
        assert!(p.can_end_turn);
        assert_eq!(p.state, TurnPhase::ActionEnded);
        assert!(!p.in_hospital);
    }

    #[test]
    fn end_turn_blocked_during_popup() {
        let s = seq();
        let mut state = game(2);
        state.players[0].can_end_turn = true;
        state.players[0].state = TurnPhase::ActionStarted;
        assert!(s.end_turn(&state, PlayerIndex(0)).is_err());

        let ended = s.end_action(&state, PlayerIndex(0)).unwrap();
        assert_eq!(ended.effects, vec![Effect::ClosePopup]);
        assert!(s.end_turn(&ended.state, PlayerIndex(0)).is_ok());
    }

    #[test]
    fn end_turn_declares_winner() {
        let s = seq();
        let mut state = game(2);
        for item in required_items() {
            state.players[1].inventory.insert(item.id.to_string());
        }
        state.players[0].can_end_turn = true;

        let next = s.end_turn(&state, PlayerIndex(0)).unwrap().state;
        assert_eq!(next.winning_player_index, Some(PlayerIndex(1)));
        assert!(next.is_game_over);
        assert_eq!(
            s.request_roll(&next, PlayerIndex(1)),
            Err(SequencerError::GameOver)
        );
    }

    #[test]
    fn turns_keep_rotating_after_a_win() {
        let s = seq();
        let mut state = game(3);
        for item in required_items() {
            state.players[2].inventory.insert(item.id.to_string());
        }
        state.players[0].can_end_turn = true;

        let first = s.end_turn(&state, PlayerIndex(0)).unwrap().state;
        assert_eq!(first.current_player, PlayerIndex(1));
        assert!(first.is_game_over);

        let second = s.end_turn(&first, PlayerIndex(1)).unwrap().state;
        assert_eq!(second.current_player, PlayerIndex(2));
        assert_eq!(second.winning_player_index, Some(PlayerIndex(2)));
        assert_eq!(second.players[2].state, TurnPhase::JustStarted);

        let third = s.end_turn(&second, PlayerIndex(2)).unwrap().state;
        assert_eq!(third.current_player, PlayerIndex(0));
        assert_eq!(
            s.end_turn(&third, PlayerIndex(1)),
            Err(SequencerError::NotCurrentPlayer {
                player: PlayerIndex(1),
                current: PlayerIndex(0),
            })
        );
    }

    #[test]
    fn buying_checks_funds_and_ownership() {
        let s = seq();
        let state = game(1);
        let bought = s.buy_item(&state, PlayerIndex(0), "fridge").unwrap().state;
        assert_eq!(bought.players[0].money, STARTING_MONEY - 300_000);
        assert!(bought.players[0].owns("fridge"));

        assert_eq!(
            s.buy_item(&bought, PlayerIndex(0), "fridge"),
            Err(SequencerError::AlreadyOwned("fridge".into()))
        );
        assert_eq!(
            s.buy_item(&bought, PlayerIndex(0), HOUSE),
            Err(SequencerError::InsufficientFunds {
                needed: 25_000_000,
                available: 100_000
            })
        );
        assert!(matches!(
            s.buy_item(&bought, PlayerIndex(0), "yacht"),
            Err(SequencerError::UnknownItem(_))
        ));
    }

    fn at_station(position: Position) -> GameState {
        let mut state = game(2);
        let p = &mut state.players[0];
        p.position = position;
        p.state = TurnPhase::ActionStarted;
        p.can_roll_dice = false;
        state
    }

    #[test]
    fn train_ticket_forward_costs_only_the_ticket() {
        let s = seq();
        let step = s.buy_train_ticket(&at_station(4), PlayerIndex(0), 18).unwrap();
        assert_eq!(step.state.players[0].position, 18);
        assert_eq!(step.state.players[0].money, STARTING_MONEY - 3_000);
        assert_eq!(
            step.effects,
            vec![Effect::EndAction {
                player: PlayerIndex(0)
            }]
        );
    }

    #[test]
    fn train_ride_past_start_settles() {
        let s = seq();
        let step = s.buy_train_ticket(&at_station(25), PlayerIndex(0), 4).unwrap();
        assert_eq!(
            step.state.players[0].money,
            STARTING_MONEY - 3_000 + 150_000 - 70_000
        );
    }

    #[test]
    fn fined_free_ride_alerts() {
        let s = seq();
        let step = s.free_ride_train(&at_station(11), PlayerIndex(0), 25, true).unwrap();
        assert_eq!(step.state.players[0].money, STARTING_MONEY - 40_000);
        assert_eq!(
            step.effects,
            vec![
                Effect::Alert {
                    player: PlayerIndex(0),
                    notice: Notice::Fined { amount: 40_000 }
                },
                Effect::EndAction {
                    player: PlayerIndex(0)
                },
            ]
        );

        let free = s.free_ride_train(&at_station(11), PlayerIndex(0), 25, false).unwrap();
        assert_eq!(free.state.players[0].money, STARTING_MONEY);
    }

    #[test]
    fn train_needs_a_real_stop() {
        let s = seq();
        assert_eq!(
            s.buy_train_ticket(&at_station(4), PlayerIndex(0), 5),
            Err(SequencerError::NotAStop(5))
        );
        assert!(s.buy_train_ticket(&at_station(4), PlayerIndex(0), 4).is_err());
        assert!(s.buy_train_ticket(&at_station(2), PlayerIndex(0), 4).is_err());
    }

    #[test]
    fn resume_reopens_a_pending_popup() {
        let s = seq();
        let state = at_station(18);
        assert_eq!(
            s.resume_effects(&state),
            vec![Effect::OpenPopup(PopupRequest {
                kind: crate::fields::PopupKind::Steelroad,
                player: PlayerIndex(0),
                field: 18,
            })]
        );
        assert!(s.resume_effects(&game(2)).is_empty());
    }
}
