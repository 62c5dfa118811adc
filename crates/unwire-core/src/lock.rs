// ── Lock with a pending-operation queue ──
//
// A primary async mutex guarding the data, plus a short-lived std mutex
// guarding a FIFO of deferred closures. Notification-driven work never
// waits: it runs if the primary is free, otherwise it is queued. Whoever
// releases the primary drains the queue first.
//
// Lock order is always pending -> primary (try only). The drain loop
// releases the primary while still holding the pending lock, so an op
// queued by a notifier that just lost the `try_lock` race is never
// stranded.

use std::collections::VecDeque;
use std::sync::{Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CoreError;

/// Deferred mutation. Runs synchronously with the primary lock held and
/// must not block or perform I/O.
pub(crate) type PendingOp<T> = Box<dyn FnOnce(&mut T) + Send>;

/// What `lock_and_run_or_pend` did with the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Ran,
    Pended,
}

pub(crate) struct PendingLock<T> {
    primary: Mutex<T>,
    pending: StdMutex<VecDeque<(&'static str, PendingOp<T>)>>,
}

impl<T: Send> PendingLock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            primary: Mutex::new(value),
            pending: StdMutex::new(VecDeque::new()),
        }
    }

    fn queue(&self) -> StdMutexGuard<'_, VecDeque<(&'static str, PendingOp<T>)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Direct path: wait for the primary lock, run `body`, then drain the
    /// pending queue before releasing. Waiting is abandoned with
    /// [`CoreError::Interrupted`] once `cancel` fires; a free lock is still
    /// taken after cancellation so shutdown can persist state.
    pub(crate) async fn lock_while<R>(
        &self,
        tag: &'static str,
        cancel: &CancellationToken,
        body: impl FnOnce(&mut T) -> R,
    ) -> Result<R, CoreError> {
        let mut guard = tokio::select! {
            biased;
            guard = self.primary.lock() => guard,
            () = cancel.cancelled() => return Err(CoreError::Interrupted),
        };
        debug!(tag, "locked");
        let result = body(&mut guard);
        self.release(guard);
        Ok(result)
    }

    /// Notification path: run `op` now if the primary lock is free,
    /// otherwise queue it for the current holder. Never waits.
    pub(crate) fn lock_and_run_or_pend(
        &self,
        tag: &'static str,
        op: impl FnOnce(&mut T) + Send + 'static,
    ) -> Dispatch {
        let mut queue = self.queue();
        match self.primary.try_lock() {
            Ok(mut guard) => {
                drop(queue);
                op(&mut guard);
                self.release(guard);
                Dispatch::Ran
            }
            Err(_) => {
                debug!(tag, "pending op");
                queue.push_back((tag, Box::new(op)));
                Dispatch::Pended
            }
        }
    }

    /// Run queued ops in arrival order, then let go of the primary.
    fn release(&self, mut guard: MutexGuard<'_, T>) {
        loop {
            let mut queue = self.queue();
            let Some((tag, op)) = queue.pop_front() else {
                drop(guard);
                return;
            };
            drop(queue);
            debug!(tag, "running pending op");
            op(&mut guard);
        }
    }

    /// Throw away queued ops without running them.
    pub(crate) fn discard_pending(&self) -> usize {
        let mut queue = self.queue();
        let discarded = queue.len();
        queue.clear();
        discarded
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.queue().len()
    }

    #[cfg(test)]
    pub(crate) async fn hold(&self) -> MutexGuard<'_, T> {
        self.primary.lock().await
    }
}
