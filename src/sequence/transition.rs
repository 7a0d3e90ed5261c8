//! Pure state transition function
//!
//! Given the same state and event this always produces the same state and
//! effects. Waiters, timers and locks live in the handle that executes the
//! effects.

use super::effect::Effect;
use super::event::Event;
use super::state::{Phase, SeqState, Step, TimerState};
use crate::config::{IdleTimerPolicy, UnobservedError};

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult<T, E> {
    /// False when the event was a no-op because the sequence is closed
    pub accepted: bool,
    pub effects: Vec<Effect<T, E>>,
}

impl<T, E> TransitionResult<T, E> {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            effects: vec![],
        }
    }

    pub fn ignored() -> Self {
        Self {
            accepted: false,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect<T, E>) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Apply `event` to `state`
pub fn transition<T, E>(state: &mut SeqState<T, E>, event: Event<T, E>) -> TransitionResult<T, E> {
    match event {
        Event::Push { value } => push(state, value),

        Event::End | Event::ProducersGone => close(state, None),

        Event::Throw { error } => close(state, Some(error)),

        // A timer from an older generation lost a race with a rearm or a
        // disarm and must not close the sequence.
        Event::TimerFired { generation } => match state.timer {
            TimerState::Armed { generation: live } if live == generation => close(state, None),
            _ => TransitionResult::ignored(),
        },

        Event::RequestNext => request_next(state),

        Event::ConsumerGone => {
            // Nobody can drain the buffer any more
            state.buffer.clear();
            state.waiting = false;
            if state.phase.is_terminal() {
                return TransitionResult::ignored();
            }
            state.phase = Phase::Ended;
            disarm(state, TransitionResult::accepted())
        }
    }
}

fn push<T, E>(state: &mut SeqState<T, E>, value: T) -> TransitionResult<T, E> {
    if state.phase.is_terminal() {
        return TransitionResult::ignored();
    }

    let result = if state.waiting {
        state.waiting = false;
        TransitionResult::accepted().with_effect(Effect::Resolve(Step::Value(value)))
    } else {
        state.buffer.push_back(value);
        TransitionResult::accepted()
    };

    match (state.timer_policy, state.timer) {
        (IdleTimerPolicy::FirstValue, TimerState::Armed { .. }) => disarm(state, result),
        (IdleTimerPolicy::IdleReset, TimerState::Armed { generation }) => {
            let generation = generation + 1;
            state.timer = TimerState::Armed { generation };
            result.with_effect(Effect::RearmTimer { generation })
        }
        _ => result,
    }
}

fn close<T, E>(state: &mut SeqState<T, E>, error: Option<E>) -> TransitionResult<T, E> {
    if state.phase.is_terminal() {
        return TransitionResult::ignored();
    }

    let waiting = std::mem::replace(&mut state.waiting, false);
    let result = match error {
        None => {
            state.phase = Phase::Ended;
            let result = TransitionResult::accepted();
            if waiting {
                result.with_effect(Effect::Resolve(Step::Done))
            } else {
                result
            }
        }
        Some(error) if waiting => {
            state.phase = Phase::Errored { error: None };
            TransitionResult::accepted().with_effect(Effect::Reject(error))
        }
        Some(error) => {
            let retained = match state.unobserved_error {
                UnobservedError::Drop => None,
                UnobservedError::Deliver => Some(error),
            };
            state.phase = Phase::Errored { error: retained };
            TransitionResult::accepted()
        }
    };

    disarm(state, result)
}

fn request_next<T, E>(state: &mut SeqState<T, E>) -> TransitionResult<T, E> {
    if let Some(value) = state.buffer.pop_front() {
        return TransitionResult::accepted().with_effect(Effect::Reply(Ok(Step::Value(value))));
    }

    let reply = match &mut state.phase {
        Phase::Open => {
            // A second request while one is parked replaces it; the owning
            // handle never issues one.
            state.waiting = true;
            return TransitionResult::accepted().with_effect(Effect::Park);
        }
        Phase::Ended => Ok(Step::Done),
        Phase::Errored { error } => error.take().map_or(Ok(Step::Done), Err),
    };
    TransitionResult::accepted().with_effect(Effect::Reply(reply))
}

fn disarm<T, E>(state: &mut SeqState<T, E>, result: TransitionResult<T, E>) -> TransitionResult<T, E> {
    match state.timer {
        TimerState::Armed { .. } => {
            state.timer = TimerState::Disarmed;
            result.with_effect(Effect::DisarmTimer)
        }
        TimerState::Disarmed => result,
    }
}
