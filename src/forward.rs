//! Feed an external stream into a sequence
//!
//! Whatever owns the real data source (browser responses, RPC notifications)
//! usually hands out a stream already. `forward` pumps it into a [`Pusher`]
//! on a background task.

use crate::sequence::Pusher;
use futures::stream::Stream;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

/// Push every `Ok` item of `source`, throw the first `Err`, and end the
/// sequence when `source` finishes.
///
/// The task stops early, dropping `source`, as soon as the sequence closes
/// for any other reason (consumer dropped, idle timeout, another producer
/// ended it).
pub fn forward<S, T, E>(source: S, pusher: Pusher<T, E>) -> JoinHandle<()>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    tokio::spawn(async move {
        let mut source = Box::pin(source);
        let mut forwarded: u64 = 0;

        loop {
            let item = tokio::select! {
                () = pusher.closed() => {
                    tracing::debug!(forwarded, "Sequence closed, forwarding stopped");
                    return;
                }
                item = source.next() => item,
            };

            match item {
                Some(Ok(value)) => {
                    if !pusher.push(value) {
                        tracing::debug!(forwarded, "Sequence closed, forwarding stopped");
                        return;
                    }
                    forwarded += 1;
                }
                Some(Err(error)) => {
                    tracing::debug!(forwarded, "Source failed, throwing into sequence");
                    pusher.throw(error);
                    return;
                }
                None => {
                    tracing::debug!(forwarded, "Source finished");
                    pusher.end();
                    return;
                }
            }
        }
    })
}
