//! State plumbing shared by the three store shapes.

use std::sync::Mutex;

use tokio::sync::watch;

use crate::StoreError;

/// The `{data, params, loading, error}` tuple every store owns, plus the
/// epoch used to suppress stale fetch commits after a `clear`.
pub(crate) struct State<D, Q> {
    pub data: D,
    pub params: Q,
    pub loading: bool,
    pub error: Option<String>,
    pub epoch: u64,
}

/// Lock + change channel around a [`State`]. The lock is never held across
/// an await; fetches release it before the network call and re-acquire it
/// at the commit point.
pub(crate) struct Shared<D, Q> {
    state: Mutex<State<D, Q>>,
    changed: watch::Sender<u64>,
}

impl<D, Q> Shared<D, Q>
where
    Q: Clone,
{
    pub fn new(data: D, params: Q) -> Self {
        Self {
            state: Mutex::new(State {
                data,
                params,
                loading: false,
                error: None,
                epoch: 0,
            }),
            changed: watch::Sender::new(0),
        }
    }

    pub fn watch(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    pub fn notify(&self) {
        self.changed.send_modify(|version| *version += 1);
    }

    pub fn read<R>(&self, read: impl FnOnce(&State<D, Q>) -> R) -> R {
        read(&self.state.lock().expect("store state poisoned"))
    }

    /// Mutate state and notify watchers. Returns the closure's value.
    pub fn mutate<R>(&self, mutate: impl FnOnce(&mut State<D, Q>) -> R) -> R {
        let result = mutate(&mut self.state.lock().expect("store state poisoned"));
        self.notify();
        result
    }

    /// Begin a fetch under the at-most-one-in-flight guard. Returns the
    /// params snapshot to fetch with and the epoch to commit against, or
    /// `None` when the call is dropped because a fetch is already running.
    pub fn begin_fetch(
        &self,
        ignore_loading: bool,
        prepare: impl FnOnce(&mut State<D, Q>),
    ) -> Option<(Q, u64)> {
        let mut state = self.state.lock().expect("store state poisoned");
        if state.loading && !ignore_loading {
            tracing::debug!("fetch skipped: request already in flight");
            return None;
        }
        state.loading = true;
        state.error = None;
        prepare(&mut state);
        let snapshot = (state.params.clone(), state.epoch);
        drop(state);
        self.notify();
        Some(snapshot)
    }

    /// Commit a fetch outcome. A completion whose epoch no longer matches
    /// (the store was cleared while the request was in flight) is dropped
    /// without touching state. `loading` resets on every live path.
    pub fn commit_fetch<R>(
        &self,
        epoch: u64,
        outcome: anyhow::Result<R>,
        apply: impl FnOnce(&mut State<D, Q>, R),
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store state poisoned");
        if state.epoch != epoch {
            tracing::debug!("fetch result dropped: store was cleared while in flight");
            return Ok(());
        }
        state.loading = false;
        let result = match outcome {
            Ok(value) => {
                apply(&mut state, value);
                Ok(())
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!(error = %message, "fetch failed");
                state.error = Some(message.clone());
                Err(StoreError::Fetch(message))
            }
        };
        drop(state);
        self.notify();
        result
    }

    /// Reset to the initial snapshot: data, params and (via `extra`) any
    /// shape-specific state. Forces `loading = false` and bumps the epoch so
    /// in-flight fetches cannot commit. `error` is left for `clear_error`.
    pub fn reset(
        &self,
        initial_data: &D,
        initial_params: &Q,
        extra: impl FnOnce(&mut State<D, Q>),
    ) where
        D: Clone,
    {
        let mut state = self.state.lock().expect("store state poisoned");
        state.data = initial_data.clone();
        state.params = initial_params.clone();
        state.loading = false;
        state.epoch += 1;
        extra(&mut state);
        drop(state);
        self.notify();
    }
}
