//! Events that drive the sequence state machine

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event<T, E> {
    // Producer events
    Push { value: T },
    End,
    Throw { error: E },
    /// The last producer handle was dropped
    ProducersGone,

    // Consumer events
    RequestNext,
    /// The consumer handle was dropped
    ConsumerGone,

    // Timer events
    TimerFired { generation: u64 },
}

impl<T, E> Event<T, E> {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Push { .. } => "push",
            Event::End => "end",
            Event::Throw { .. } => "throw",
            Event::ProducersGone => "producers_gone",
            Event::RequestNext => "request_next",
            Event::ConsumerGone => "consumer_gone",
            Event::TimerFired { .. } => "timer_fired",
        }
    }
}
