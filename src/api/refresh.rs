//! Single-flight coordination of access-token refreshes
//!
//! The first caller to hit a 401 becomes the leader and performs the refresh;
//! everyone who hits a 401 while it is in flight gets a `WaitTicket` and is
//! woken with the leader's outcome. The flag and the waiter queue live under
//! one mutex that is never held across an `.await`, so "check in progress"
//! and "start refresh" are a single step.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;

use super::error::ApiError;

type Outcome = Result<String, ApiError>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: VecDeque<oneshot::Sender<Outcome>>,
}

/// Per-client refresh state.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

/// What a caller that just observed a first-time 401 has to do.
pub enum Role<'a> {
    /// Perform the refresh, then `settle` the guard.
    Leader(RefreshGuard<'a>),
    /// Another caller is refreshing; wait for its outcome.
    Waiter(WaitTicket),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Join the current refresh, or start one.
    pub fn begin(&self) -> Role<'_> {
        let mut state = self.lock();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            tracing::debug!("Refresh in flight, queued ({} waiting)", state.waiters.len());
            Role::Waiter(WaitTicket(rx))
        } else {
            state.refreshing = true;
            Role::Leader(RefreshGuard {
                coordinator: self,
                settled: false,
            })
        }
    }

    #[cfg(test)]
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    #[cfg(test)]
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Hand `outcome` to every waiter (FIFO) and clear the flag, atomically.
    fn settle(&self, outcome: Outcome) -> usize {
        let mut state = self.lock();
        let count = state.waiters.len();
        while let Some(waiter) = state.waiters.pop_front() {
            // Receiver gone means the caller was dropped; nothing to deliver.
            let _ = waiter.send(outcome.clone());
        }
        state.refreshing = false;
        count
    }
}

/// Held by the refresh leader. Dropping it unsettled rejects every waiter
/// with `RefreshCancelled` and clears the flag.
pub struct RefreshGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshGuard<'_> {
    /// Deliver the refresh outcome. Returns how many waiters were woken.
    pub fn settle(mut self, outcome: Outcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Token refresh abandoned before completion");
            self.coordinator.settle(Err(ApiError::RefreshCancelled));
        }
    }
}

/// A queued caller's handle on the in-flight refresh.
pub struct WaitTicket(oneshot::Receiver<Outcome>);

impl WaitTicket {
    pub async fn wait(self) -> Outcome {
        self.0.await.unwrap_or(Err(ApiError::RefreshCancelled))
    }
}
