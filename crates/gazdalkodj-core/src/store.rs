//! Canonical game state of one peer plus change notification.

use gazdalkodj_protocol::GameState;

/// Handle returned by [`GameStore::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&GameState, u64)>;

/// Owns the current [`GameState`] and notifies observers after every commit.
///
/// Each commit bumps the revision, so a multi-step turn shows up as several
/// observable states rather than one batched change.
pub struct GameStore {
    state: GameState,
    revision: u64,
    next_subscription: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

impl GameStore {
    pub fn new(state: GameState) -> Self {
        Self {
            state,
            revision: 0,
            next_subscription: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Number of commits so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Observe every committed state together with its revision.
    pub fn subscribe(&mut self, f: impl FnMut(&GameState, u64) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(f)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Apply a pure transformation and commit its result.
    pub fn update(&mut self, transform: impl FnOnce(GameState) -> GameState) -> &GameState {
        let next = transform(self.state.clone());
        self.commit(next)
    }

    /// Like [`update`](Self::update), then run `on_applied` against the committed state.
    pub fn update_then<R>(
        &mut self,
        transform: impl FnOnce(GameState) -> GameState,
        on_applied: impl FnOnce(&GameState) -> R,
    ) -> R {
        let committed = self.update(transform);
        on_applied(committed)
    }

    /// Commit an already computed state.
    pub fn commit(&mut self, next: GameState) -> &GameState {
        self.state = next;
        self.revision += 1;
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&self.state, self.revision);
        }
        &self.state
    }

    /// Wholesale replacement, used when the server pushes a full sync.
    pub fn replace(&mut self, state: GameState) -> &GameState {
        self.commit(state)
    }
}

impl std::fmt::Debug for GameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameStore")
            .field("revision", &self.revision)
            .field("subscribers", &self.subscribers.len())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use gazdalkodj_protocol::{Player, PlayerIndex};

    fn store() -> GameStore {
        GameStore::new(GameState::new(vec![
            Player::new("a", PlayerIndex(0), "Anna", "a.png"),
            Player::new("b", PlayerIndex(1), "Bela", "b.png"),
        ]))
    }

    #[test]
    fn every_update_is_observed() {
        let mut store = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |state, rev| sink.borrow_mut().push((rev, state.players[0].money)));

        store.update(|mut s| {
            s.players[0].money += 150_000;
            s
        });
        store.update(|mut s| {
            s.players[0].money -= 70_000;
            s
        });

        assert_eq!(*seen.borrow(), vec![(1, 550_000), (2, 480_000)]);
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn update_then_sees_committed_state() {
        let mut store = store();
        let current = store.update_then(
            |mut s| {
                s.current_player = PlayerIndex(1);
                s
            },
            |s| s.current_player,
        );
        assert_eq!(current, PlayerIndex(1));
    }

    #[test]
    fn unsubscribed_observers_stop_hearing() {
        let mut store = store();
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        let id = store.subscribe(move |_, _| *sink.borrow_mut() += 1);

        store.update(|s| s);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.update(|s| s);
        assert_eq!(*count.borrow(), 1);
    }
}
