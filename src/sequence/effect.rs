//! Effects produced by state transitions

use super::state::Step;

/// Effects to be executed after a state transition, outside the state lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect<T, E> {
    /// Resolve the parked consumer request
    Resolve(Step<T>),

    /// Fail the parked consumer request
    Reject(E),

    /// Answer the current request without suspending
    Reply(Result<Step<T>, E>),

    /// Park the current request until a producer or the timer answers it
    Park,

    /// Restart the idle countdown under a new generation
    RearmTimer { generation: u64 },

    /// Release the idle timer
    DisarmTimer,
}
