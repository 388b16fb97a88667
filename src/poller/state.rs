use std::fmt;

use serde::{Deserialize, Serialize};

/// The two states of a job status poller.
///
/// `Idle` owns no timer; `Polling` owns exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PollerState {
    #[default]
    Idle,
    Polling,
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollerState::Idle => write!(f, "IDLE"),
            PollerState::Polling => write!(f, "POLLING"),
        }
    }
}

/// Inputs that can move the poller between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The local job list was replaced by a fetch.
    JobsChanged { has_active: bool },
    /// A fetch failed for any reason other than rate limiting.
    FetchFailed,
    /// The server answered 429.
    RateLimited,
    /// The owning view is going away.
    Teardown,
}

/// What to do with the timer after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Drop any existing timer, then start a fresh one.
    Reschedule,
    /// Drop any existing timer.
    Cancel,
    /// Leave the timer as it is.
    Keep,
}

/// Evaluates poller transitions.
pub struct PollerMachine;

impl PollerMachine {
    /// Compute the next state and the timer action for a signal.
    ///
    /// - A job list with active jobs always reschedules, even when already
    ///   polling, so repeated list changes never stack timers.
    /// - A job list with no active jobs, a rate limit, or teardown cancels.
    /// - Other fetch failures keep both state and timer; the next tick retries.
    pub fn next(state: PollerState, signal: Signal) -> (PollerState, TimerAction) {
        match signal {
            Signal::JobsChanged { has_active: true } => {
                (PollerState::Polling, TimerAction::Reschedule)
            }
            Signal::JobsChanged { has_active: false }
            | Signal::RateLimited
            | Signal::Teardown => (PollerState::Idle, TimerAction::Cancel),
            Signal::FetchFailed => (state, TimerAction::Keep),
        }
    }
}
