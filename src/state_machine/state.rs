use std::fmt;

/// States a single job run moves through.
///
/// IDLE → LOADING_HISTORY → GENERATING → PUBLISHING → LOGGING →
/// NOTIFYING_SUCCESS | NOTIFYING_FAILURE → IDLE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    LoadingHistory,
    Generating,
    Publishing,
    Logging,
    NotifyingSuccess,
    NotifyingFailure,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "IDLE"),
            State::LoadingHistory => write!(f, "LOADING_HISTORY"),
            State::Generating => write!(f, "GENERATING"),
            State::Publishing => write!(f, "PUBLISHING"),
            State::Logging => write!(f, "LOGGING"),
            State::NotifyingSuccess => write!(f, "NOTIFYING_SUCCESS"),
            State::NotifyingFailure => write!(f, "NOTIFYING_FAILURE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition {from} → {to}")]
pub struct InvalidTransition {
    pub from: State,
    pub to: State,
}

/// Transition rules for a job run.
pub struct StateMachine;

impl StateMachine {
    /// Whether `from → to` is allowed.
    ///
    /// - The happy path advances one step at a time.
    /// - Any working state may bail out to `NotifyingFailure`.
    /// - Both notifying states return to `Idle`.
    pub fn can_transition(from: State, to: State) -> bool {
        use State::*;
        matches!(
            (from, to),
            (Idle, LoadingHistory)
                | (LoadingHistory, Generating)
                | (Generating, Publishing)
                | (Publishing, Logging)
                | (Logging, NotifyingSuccess)
                | (LoadingHistory | Generating | Publishing | Logging, NotifyingFailure)
                | (NotifyingSuccess | NotifyingFailure, Idle)
        )
    }

    pub fn check(from: State, to: State) -> Result<(), InvalidTransition> {
        if Self::can_transition(from, to) {
            Ok(())
        } else {
            Err(InvalidTransition { from, to })
        }
    }
}
