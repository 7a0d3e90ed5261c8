//! Sequence state types

use crate::config::{IdleTimerPolicy, UnobservedError};
use std::collections::VecDeque;

/// One step of a sequence as seen by the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Value(T),
    Done,
}

impl<T> Step<T> {
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done)
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Step::Value(v) => Some(v),
            Step::Done => None,
        }
    }
}

/// Lifecycle phase. `Ended` and `Errored` are absorbing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase<E> {
    Open,
    Ended,
    /// `error` is only retained under [`UnobservedError::Deliver`], and is
    /// taken by the first request that finds the buffer empty.
    Errored { error: Option<E> },
}

impl<E> Phase<E> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Phase::Open)
    }
}

/// Idle timer bookkeeping. The generation tells a stale firing (from a
/// timer that was re-armed or disarmed while it was already running) from
/// the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Armed { generation: u64 },
    Disarmed,
}

/// Everything the transition function reads and writes
#[derive(Debug, Clone)]
pub struct SeqState<T, E> {
    pub phase: Phase<E>,
    /// Values pushed while no consumer was waiting, oldest first
    pub buffer: VecDeque<T>,
    /// A consumer request is parked
    pub waiting: bool,
    pub timer: TimerState,
    pub timer_policy: IdleTimerPolicy,
    pub unobserved_error: UnobservedError,
}

impl<T, E> SeqState<T, E> {
    /// Fresh open state with the timer armed at generation zero
    pub fn new(timer_policy: IdleTimerPolicy, unobserved_error: UnobservedError) -> Self {
        Self {
            phase: Phase::Open,
            buffer: VecDeque::new(),
            waiting: false,
            timer: TimerState::Armed { generation: 0 },
            timer_policy,
            unobserved_error,
        }
    }

    /// Nothing left to hand out: terminal, drained, and no retained error
    pub fn is_exhausted(&self) -> bool {
        self.buffer.is_empty()
            && matches!(self.phase, Phase::Ended | Phase::Errored { error: None })
    }
}
