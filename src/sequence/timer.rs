//! Idle timer task

use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// A scheduled callback that is cancelled when this value is dropped
pub(super) struct IdleTimer {
    _guard: DropGuard,
}

impl IdleTimer {
    /// Run `on_fire` after `after`, unless the timer is dropped first.
    pub(super) fn spawn(
        runtime: &Handle,
        after: Duration,
        on_fire: impl FnOnce() + Send + 'static,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        runtime.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(after) => on_fire(),
            }
        });

        Self {
            _guard: cancel.drop_guard(),
        }
    }
}
