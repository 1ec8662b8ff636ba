//! Observable state container shared by the chat and audio stores.
//!
//! State is a plain value.  Actions are applied by a pure function,
//! [`Reducer::apply`], that returns the next state or `None` when the action
//! changes nothing.  A [`Store`] owns the current value, swaps in the next
//! one atomically, and notifies every [`Subscription`] when something was
//! actually applied.  No-ops never notify.

use std::convert::Infallible;

use tokio::sync::watch;

use crate::observability::{STORE_DISPATCHES, STORE_NOOPS};

/// A state type together with the pure transition function for its actions.
pub trait Reducer: Clone + Send + Sync + 'static {
    /// The actions this state understands.
    type Action;

    /// Compute the state that follows `self` after `action`.
    ///
    /// Returns `None` when the action does not apply, e.g. because it names
    /// an id that is not present.
    fn apply(&self, action: Self::Action) -> Option<Self>;
}

/// Owner of a single state value of type `S`.
#[derive(Debug)]
pub struct Store<S: Reducer> {
    state: watch::Sender<S>,
}

impl<S: Reducer> Store<S> {
    /// Create a store holding `initial`.
    pub fn new(initial: S) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Apply `action`, returning true if the state changed.
    ///
    /// The read-compute-write happens under the store's lock, so concurrent
    /// dispatches are serialized.
    pub fn dispatch(&self, action: S::Action) -> bool {
        match self.dispatch_with(action, |_, _| Ok::<(), Infallible>(())) {
            Ok(applied) => applied,
            Err(never) => match never {},
        }
    }

    /// Apply `action` only if `commit` accepts the transition.
    ///
    /// `commit` receives the current and the next state and runs under the
    /// store's lock, before anyone can observe the next state.  When it
    /// fails the state is left as it was and its error is returned.
    pub fn dispatch_with<E>(
        &self,
        action: S::Action,
        commit: impl FnOnce(&S, &S) -> std::result::Result<(), E>,
    ) -> std::result::Result<bool, E> {
        STORE_DISPATCHES.click();
        let mut outcome = Ok(());
        let applied = self.state.send_if_modified(|state| {
            let Some(next) = state.apply(action) else {
                return false;
            };
            if let Err(err) = commit(state, &next) {
                outcome = Err(err);
                return false;
            }
            *state = next;
            true
        });
        outcome?;
        if !applied {
            STORE_NOOPS.click();
        }
        Ok(applied)
    }

    /// A clone of the current state.
    pub fn snapshot(&self) -> S {
        self.state.borrow().clone()
    }

    /// Run `f` against the current state without cloning it.
    ///
    /// `f` must not dispatch to the same store.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Observe future state changes.
    pub fn subscribe(&self) -> Subscription<S> {
        Subscription {
            rx: self.state.subscribe(),
        }
    }
}

/// Receives a notification for every applied action of one store.
///
/// Notifications coalesce: a slow observer sees the latest state, not every
/// intermediate one.
#[derive(Debug)]
pub struct Subscription<S> {
    rx: watch::Receiver<S>,
}

impl<S: Clone> Subscription<S> {
    /// Wait for the next change and return the state after it.
    ///
    /// Returns `None` once the store has been dropped.
    ///
    /// ```
    /// use parlance::ChatStore;
    ///
    /// # tokio_test::block_on(async {
    /// let store = ChatStore::new();
    /// let mut sub = store.subscribe();
    /// store.create_session("Drum loops");
    /// let state = sub.changed().await.unwrap();
    /// assert_eq!(state.sessions[0].title, "Drum loops");
    /// # });
    /// ```
    pub async fn changed(&mut self) -> Option<S> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Returns true if a change happened since the last call to `changed`.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// The latest state, marking it as seen.
    pub fn latest(&mut self) -> S {
        self.rx.borrow_and_update().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Tally(u32);

    enum TallyAction {
        Add(u32),
        Reset,
    }

    impl Reducer for Tally {
        type Action = TallyAction;

        fn apply(&self, action: TallyAction) -> Option<Self> {
            match action {
                TallyAction::Add(0) => None,
                TallyAction::Add(n) => Some(Tally(self.0 + n)),
                TallyAction::Reset if self.0 == 0 => None,
                TallyAction::Reset => Some(Tally(0)),
            }
        }
    }

    #[test]
    fn dispatch_reports_whether_applied() {
        let store = Store::new(Tally(0));
        assert!(store.dispatch(TallyAction::Add(2)));
        assert!(!store.dispatch(TallyAction::Add(0)));
        assert_eq!(store.snapshot(), Tally(2));
        assert_eq!(store.with(|t| t.0), 2);
    }

    #[test]
    fn noops_do_not_notify() {
        let store = Store::new(Tally(0));
        let mut sub = store.subscribe();
        assert!(!store.dispatch(TallyAction::Reset));
        assert!(!sub.has_changed());
        assert!(store.dispatch(TallyAction::Add(1)));
        assert!(sub.has_changed());
        assert_eq!(sub.latest(), Tally(1));
        assert!(!sub.has_changed());
    }

    #[test]
    fn rejected_commit_leaves_state_alone() {
        let store = Store::new(Tally(1));
        let mut sub = store.subscribe();
        let err = store
            .dispatch_with(TallyAction::Add(2), |before, after| {
                assert_eq!((before.0, after.0), (1, 3));
                Err("disk full")
            })
            .unwrap_err();
        assert_eq!(err, "disk full");
        assert_eq!(store.snapshot(), Tally(1));
        assert!(!sub.has_changed());

        assert_eq!(store.dispatch_with(TallyAction::Add(2), |_, _| Ok::<(), ()>(())), Ok(true));
        assert_eq!(store.snapshot(), Tally(3));
        assert!(sub.has_changed());
    }

    #[test]
    fn noop_skips_commit() {
        let store = Store::new(Tally(0));
        let result = store.dispatch_with(TallyAction::Reset, |_, _| Err("should not run"));
        assert_eq!(result, Ok(false));
    }

    #[tokio::test]
    async fn subscriber_wakes_on_change() {
        let store = std::sync::Arc::new(Store::new(Tally(0)));
        let mut sub = store.subscribe();
        let writer = std::sync::Arc::clone(&store);
        tokio::spawn(async move {
            writer.dispatch(TallyAction::Add(5));
        });
        assert_eq!(sub.changed().await, Some(Tally(5)));
    }

    #[tokio::test]
    async fn subscription_ends_with_store() {
        let store = Store::new(Tally(0));
        let mut sub = store.subscribe();
        drop(store);
        assert_eq!(sub.changed().await, None);
    }
}
