//! Pushable timed async sequence
//!
//! A producer pushes values, ends, or throws an error at arbitrary times
//! through a [`Pusher`]; a single consumer pulls them in push order through a
//! [`Sequence`]. An idle timer ends the sequence when the producer stays
//! silent for the configured timeout.
//!
//! State changes go through the pure [`transition`] function. The handles
//! only execute its effects: parking and settling the consumer's waiter and
//! managing the timer task.

mod effect;
mod event;
mod state;
mod timer;
mod transition;

#[cfg(test)]
mod proptests;

pub use state::Step;

use crate::config::SequenceConfig;
use effect::Effect;
use event::Event;
use futures::stream::{FusedStream, Stream};
use state::SeqState;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{ready, Context, Poll};
use std::time::Duration;
use timer::IdleTimer;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use transition::transition;

type Outcome<T, E> = Result<Step<T>, E>;

/// State shared by the producer and consumer handles
struct Shared<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    core: Mutex<Core<T, E>>,
    /// Live `Pusher` handles
    producers: AtomicUsize,
    /// Cancelled once the sequence reaches a terminal phase
    closed: CancellationToken,
    runtime: Handle,
    timeout: Duration,
}

struct Core<T, E> {
    state: SeqState<T, E>,
    waiter: Option<oneshot::Sender<Outcome<T, E>>>,
    timer: Option<IdleTimer>,
}

/// Answer to a `RequestNext`
enum Reply<T, E> {
    Ready(Outcome<T, E>),
    Parked(oneshot::Receiver<Outcome<T, E>>),
}

struct Dispatched<T, E> {
    accepted: bool,
    reply: Option<Reply<T, E>>,
}

impl<T, E> Shared<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Core<T, E>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one transition and execute its effects
    fn dispatch(self: &Arc<Self>, event: Event<T, E>) -> Dispatched<T, E> {
        let name = event.name();
        let mut delivery = None;
        let mut released = None;
        let mut reply = None;

        let (accepted, now_closed) = {
            let mut core = self.lock();
            let was_open = !core.state.phase.is_terminal();
            let result = transition(&mut core.state, event);

            for effect in result.effects {
                match effect {
                    Effect::Resolve(step) => {
                        delivery = core.waiter.take().map(|tx| (tx, Ok(step)));
                    }
                    Effect::Reject(error) => {
                        delivery = core.waiter.take().map(|tx| (tx, Err(error)));
                    }
                    Effect::Reply(outcome) => reply = Some(Reply::Ready(outcome)),
                    Effect::Park => {
                        let (tx, rx) = oneshot::channel();
                        core.waiter = Some(tx);
                        reply = Some(Reply::Parked(rx));
                    }
                    Effect::RearmTimer { generation } => {
                        released = core.timer.replace(self.spawn_timer(generation));
                    }
                    Effect::DisarmTimer => released = core.timer.take(),
                }
            }

            (
                result.accepted,
                was_open && core.state.phase.is_terminal(),
            )
        };

        // Settle the waiter only after the lock is released, so whatever the
        // consumer does on wake-up sees a consistent state.
        drop(released);
        if let Some((tx, outcome)) = delivery {
            let _ = tx.send(outcome);
        }

        if now_closed {
            self.closed.cancel();
            tracing::debug!(event = name, "Sequence closed");
        } else if !accepted {
            tracing::trace!(event = name, "Event ignored");
        }

        Dispatched { accepted, reply }
    }

    fn spawn_timer(self: &Arc<Self>, generation: u64) -> IdleTimer {
        let shared = Arc::downgrade(self);
        IdleTimer::spawn(&self.runtime, self.timeout, move || {
            if let Some(shared) = shared.upgrade() {
                tracing::debug!(generation, "Idle timer fired");
                shared.dispatch(Event::TimerFired { generation });
            }
        })
    }
}

/// Create a sequence and arm its idle timer.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn channel<T, E>(config: &SequenceConfig) -> (Pusher<T, E>, Sequence<T, E>)
where
    T: Send + 'static,
    E: Send + 'static,
{
    let shared = Arc::new(Shared {
        core: Mutex::new(Core {
            state: SeqState::new(config.timer(), config.unobserved_error()),
            waiter: None,
            timer: None,
        }),
        producers: AtomicUsize::new(1),
        closed: CancellationToken::new(),
        runtime: Handle::current(),
        timeout: config.timeout(),
    });

    {
        // Held while spawning so the timer cannot fire before it is stored
        let mut core = shared.lock();
        core.timer = Some(shared.spawn_timer(0));
    }

    (
        Pusher {
            shared: Arc::clone(&shared),
        },
        Sequence {
            shared,
            parked: None,
            finished: false,
        },
    )
}

// ============================================================================
// Producer side
// ============================================================================

/// Producer handle. Cloneable; the sequence ends when the last clone is
/// dropped while it is still open.
pub struct Pusher<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Pusher<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Hand `value` to a waiting consumer, or buffer it.
    ///
    /// Returns `false` when the sequence is already closed; the value is
    /// discarded in that case.
    pub fn push(&self, value: T) -> bool {
        self.shared.dispatch(Event::Push { value }).accepted
    }

    /// End the sequence cleanly. Buffered values remain deliverable.
    pub fn end(&self) {
        self.shared.dispatch(Event::End);
    }

    /// Fail the consumer's outstanding request with `error` and close the
    /// sequence.
    ///
    /// The caller always gets `Step::Done` back; the error goes to the
    /// consumer, never to the thrower. With no request outstanding the
    /// error is handled per [`crate::UnobservedError`].
    pub fn throw(&self, error: E) -> Step<T> {
        self.shared.dispatch(Event::Throw { error });
        Step::Done
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Completes once the sequence is closed by any means
    pub async fn closed(&self) {
        self.shared.closed.cancelled().await;
    }
}

impl<T, E> Clone for Pusher<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn clone(&self) -> Self {
        self.shared.producers.fetch_add(1, Ordering::Relaxed);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Drop for Pusher<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn drop(&mut self) {
        if self.shared.producers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.dispatch(Event::ProducersGone);
        }
    }
}

// ============================================================================
// Consumer side
// ============================================================================

/// Consumer handle. Pull with [`Sequence::next_step`] or use it as a
/// [`Stream`] of `Result<T, E>`.
pub struct Sequence<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    shared: Arc<Shared<T, E>>,
    /// Request parked in the shared waiter slot. Kept here rather than in
    /// the `next_step` future so dropping that future loses nothing.
    parked: Option<oneshot::Receiver<Outcome<T, E>>>,
    /// The stream surface has yielded `None`
    finished: bool,
}

impl<T, E> Sequence<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Request the next step.
    ///
    /// Returns a buffered value without suspending, `Step::Done` once the
    /// sequence is closed and drained, and otherwise waits for a push, an
    /// end, a throw or the idle timer.
    ///
    /// # Errors
    ///
    /// Returns the error thrown while this request was outstanding, or a
    /// retained error under [`crate::UnobservedError::Deliver`].
    pub async fn next_step(&mut self) -> Result<Step<T>, E> {
        poll_fn(|cx| self.poll_next_step(cx)).await
    }

    /// Poll form of [`Sequence::next_step`]
    pub fn poll_next_step(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step<T>, E>> {
        if self.parked.is_none() {
            match self.shared.dispatch(Event::RequestNext).reply {
                Some(Reply::Ready(outcome)) => return Poll::Ready(outcome),
                Some(Reply::Parked(rx)) => self.parked = Some(rx),
                None => return Poll::Ready(Ok(Step::Done)),
            }
        }

        let Some(rx) = self.parked.as_mut() else {
            return Poll::Ready(Ok(Step::Done));
        };
        let outcome = ready!(Pin::new(rx).poll(cx));
        self.parked = None;
        // A waiter dropped without an answer only happens on teardown
        Poll::Ready(outcome.unwrap_or(Ok(Step::Done)))
    }

    /// Inject `error` from the consumer side. Same semantics as
    /// [`Pusher::throw`]: a request parked by an earlier, dropped
    /// `next_step` call observes the error on the next call.
    pub fn throw(&mut self, error: E) -> Step<T> {
        self.shared.dispatch(Event::Throw { error });
        Step::Done
    }

    /// Values pushed but not yet delivered
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.shared.lock().state.buffer.len()
    }

    /// Closed, drained, and holding no undelivered error
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.parked.is_none() && self.shared.lock().state.is_exhausted()
    }
}

impl<T, E> Stream for Sequence<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        let item = match ready!(this.poll_next_step(cx)) {
            Ok(Step::Value(value)) => Some(Ok(value)),
            Ok(Step::Done) => None,
            Err(error) => Some(Err(error)),
        };
        this.finished = item.is_none();
        Poll::Ready(item)
    }
}

impl<T, E> FusedStream for Sequence<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl<T, E> Drop for Sequence<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn drop(&mut self) {
        self.shared.dispatch(Event::ConsumerGone);
    }
}
