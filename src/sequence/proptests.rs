//! Property-based tests for the sequence state machine
//!
//! Random event scripts are run through the pure transition function and a
//! simple consumer model, checking the invariants after every step.

use super::effect::Effect;
use super::event::Event;
use super::state::*;
use super::transition::*;
use crate::config::{IdleTimerPolicy, UnobservedError};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_timer_policy() -> impl Strategy<Value = IdleTimerPolicy> {
    prop_oneof![
        Just(IdleTimerPolicy::FirstValue),
        Just(IdleTimerPolicy::Deadline),
        Just(IdleTimerPolicy::IdleReset),
    ]
}

fn arb_unobserved_error() -> impl Strategy<Value = UnobservedError> {
    prop_oneof![Just(UnobservedError::Drop), Just(UnobservedError::Deliver)]
}

/// Producer and timer events, plus consumer requests. `ConsumerGone` is left
/// out so every script can be checked for FIFO delivery.
fn arb_event() -> impl Strategy<Value = Event<u32, String>> {
    prop_oneof![
        6 => any::<u32>().prop_map(|value| Event::Push { value }),
        4 => Just(Event::RequestNext),
        1 => Just(Event::End),
        1 => "[a-z]{1,8}".prop_map(|error| Event::Throw { error }),
        1 => Just(Event::ProducersGone),
        1 => (0u64..4).prop_map(|generation| Event::TimerFired { generation }),
    ]
}

/// Events only a producer or the timer can raise
fn arb_producer_event() -> impl Strategy<Value = Event<u32, String>> {
    prop_oneof![
        any::<u32>().prop_map(|value| Event::Push { value }),
        Just(Event::End),
        "[a-z]{1,8}".prop_map(|error| Event::Throw { error }),
        Just(Event::ProducersGone),
        (0u64..4).prop_map(|generation| Event::TimerFired { generation }),
    ]
}

fn arb_script() -> impl Strategy<Value = Vec<Event<u32, String>>> {
    proptest::collection::vec(arb_event(), 0..40)
}

// ============================================================================
// Consumer model
// ============================================================================

/// What a single well-behaved consumer observes
#[derive(Debug, Default)]
struct Observed {
    values: Vec<u32>,
    errors: Vec<String>,
    dones: usize,
}

impl Observed {
    fn record(&mut self, outcome: Result<Step<u32>, String>) {
        match outcome {
            Ok(Step::Value(v)) => self.values.push(v),
            Ok(Step::Done) => self.dones += 1,
            Err(e) => self.errors.push(e),
        }
    }
}

/// Runs a script, skipping `RequestNext` while a request is already parked
/// (single consumer contract). Returns the final state, what the consumer
/// saw, and the values the transition accepted.
fn run(
    policy: IdleTimerPolicy,
    unobserved: UnobservedError,
    script: Vec<Event<u32, String>>,
) -> (SeqState<u32, String>, Observed, Vec<u32>) {
    let mut state = SeqState::new(policy, unobserved);
    let mut observed = Observed::default();
    let mut accepted_values = Vec::new();

    for event in script {
        if matches!(event, Event::RequestNext) && state.waiting {
            continue;
        }
        let pushed = match &event {
            Event::Push { value } => Some(*value),
            _ => None,
        };
        let was_waiting = state.waiting;
        let was_terminal = state.phase.is_terminal();

        let result = transition(&mut state, event);

        if let (Some(v), true) = (pushed, result.accepted) {
            accepted_values.push(v);
        }
        for effect in result.effects {
            match effect {
                Effect::Resolve(step) => {
                    assert!(was_waiting, "resolved a request nobody made");
                    observed.record(Ok(step));
                }
                Effect::Reject(error) => {
                    assert!(was_waiting, "rejected a request nobody made");
                    observed.record(Err(error));
                }
                Effect::Reply(outcome) => observed.record(outcome),
                Effect::Park | Effect::RearmTimer { .. } | Effect::DisarmTimer => {}
            }
        }

        assert!(
            !(state.waiting && !state.buffer.is_empty()),
            "waiter and buffer both non-empty"
        );
        if was_terminal {
            assert!(state.phase.is_terminal(), "terminal phase was left");
        }
    }

    (state, observed, accepted_values)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Delivered values are always a FIFO prefix of the accepted pushes,
    /// and the rest is still buffered.
    #[test]
    fn prop_fifo_delivery(
        policy in arb_timer_policy(),
        unobserved in arb_unobserved_error(),
        script in arb_script(),
    ) {
        let (state, observed, accepted) = run(policy, unobserved, script);

        let mut expected = observed.values.clone();
        expected.extend(state.buffer.iter().copied());
        prop_assert_eq!(expected, accepted);
    }

    /// No value is accepted once the sequence is terminal
    #[test]
    fn prop_push_after_terminal_ignored(
        script in arb_script(),
        value in any::<u32>(),
    ) {
        let (mut state, _, _) = run(IdleTimerPolicy::FirstValue, UnobservedError::Drop, script);
        if state.phase.is_terminal() {
            let before = state.buffer.len();
            let result = transition(&mut state, Event::Push { value });
            prop_assert!(!result.accepted);
            prop_assert!(result.effects.is_empty());
            prop_assert_eq!(state.buffer.len(), before);
        }
    }

    /// Draining a terminal sequence never parks, and ends in `Done` forever
    #[test]
    fn prop_terminal_drains_without_parking(
        unobserved in arb_unobserved_error(),
        script in arb_script(),
    ) {
        let (mut state, _, _) = run(IdleTimerPolicy::Deadline, unobserved, script);
        let _ = transition(&mut state, Event::End);
        // A parked waiter would have been resolved by End
        prop_assert!(!state.waiting);

        let mut errors = 0;
        for _ in 0..(state.buffer.len() + 3) {
            let result = transition(&mut state, Event::RequestNext);
            prop_assert_eq!(result.effects.len(), 1);
            match &result.effects[0] {
                Effect::Reply(Err(_)) => errors += 1,
                Effect::Reply(Ok(_)) => {}
                other => prop_assert!(false, "unexpected effect {:?}", other),
            }
        }
        prop_assert!(errors <= 1, "error raised more than once");
        let last = transition(&mut state, Event::RequestNext);
        prop_assert_eq!(last.effects, vec![Effect::Reply(Ok(Step::Done))]);
    }

    /// The consumer sees at most one terminal signal (done or error) for a
    /// parked request
    #[test]
    fn prop_error_surfaces_at_most_once(script in arb_script()) {
        let (_, observed, _) = run(IdleTimerPolicy::FirstValue, UnobservedError::Deliver, script);
        prop_assert!(observed.errors.len() <= 1);
    }

    /// Only `IdleReset` ever re-arms, and nothing re-arms after disarming
    #[test]
    fn prop_timer_never_rearms_after_disarm(
        policy in arb_timer_policy(),
        script in arb_script(),
    ) {
        let mut state: SeqState<u32, String> = SeqState::new(policy, UnobservedError::Drop);
        let mut disarmed = false;

        for event in script {
            if matches!(event, Event::RequestNext) && state.waiting {
                continue;
            }
            let result = transition(&mut state, event);
            for effect in &result.effects {
                match effect {
                    Effect::RearmTimer { .. } => {
                        prop_assert_eq!(policy, IdleTimerPolicy::IdleReset);
                        prop_assert!(!disarmed, "re-armed after disarm");
                    }
                    Effect::DisarmTimer => {
                        prop_assert!(!disarmed, "disarmed twice");
                        disarmed = true;
                    }
                    _ => {}
                }
            }
            if state.phase.is_terminal() {
                prop_assert_eq!(state.timer, TimerState::Disarmed);
            }
        }
    }

    /// Once the consumer is gone the buffer and waiter slot are cleared, the
    /// timer is released, and no producer event has any effect
    #[test]
    fn prop_consumer_gone_is_inert(
        policy in arb_timer_policy(),
        unobserved in arb_unobserved_error(),
        script in arb_script(),
        after in proptest::collection::vec(arb_producer_event(), 1..20),
    ) {
        let (mut state, _, _) = run(policy, unobserved, script);
        let _ = transition(&mut state, Event::ConsumerGone);

        prop_assert!(state.buffer.is_empty());
        prop_assert!(!state.waiting);
        prop_assert!(state.phase.is_terminal());
        prop_assert_eq!(state.timer, TimerState::Disarmed);

        for event in after {
            let result = transition(&mut state, event);
            prop_assert!(!result.accepted);
            prop_assert!(result.effects.is_empty());
            prop_assert!(state.buffer.is_empty());
            prop_assert!(!state.waiting);
        }
    }
}
