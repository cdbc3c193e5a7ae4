use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use futures::{
    channel::oneshot,
    future::{FutureExt, Shared},
    pin_mut, select,
};

use crate::Error;

/// Returns a linked pair: firing (or dropping) the `Teardown` cancels every clone
/// of the `Cancellation`.
pub fn cancellation() -> (Teardown, Cancellation) {
    let (sender, receiver) = oneshot::channel();
    let fired = Arc::new(AtomicBool::new(false));
    (
        Teardown {
            fired: fired.clone(),
            _sender: sender,
        },
        Cancellation {
            fired,
            signal: receiver.shared(),
        },
    )
}

pub struct Teardown {
    fired: Arc<AtomicBool>,
    _sender: oneshot::Sender<()>,
}

impl Teardown {
    pub fn fire(self) {
        // dropping the sender wakes up all the pending receivers
        drop(self)
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("fired", &self.fired.load(Ordering::SeqCst))
            .finish()
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.fired.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct Cancellation {
    fired: Arc<AtomicBool>,
    signal: Shared<oneshot::Receiver<()>>,
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Cancellation {
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolves once the linked `Teardown` is gone
    pub async fn cancelled(&self) {
        let _ = self.signal.clone().await;
    }

    /// Runs `fut` until it completes or the view is torn down, whichever happens first
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        if self.is_cancelled() {
            return Err(Error::Aborted);
        }
        let fut = fut.fuse();
        let cancelled = self.signal.clone().fuse();
        pin_mut!(fut, cancelled);
        select! {
            res = fut => res,
            _ = cancelled => Err(Error::Aborted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_passes_through_results() {
        let (_teardown, cancel) = cancellation();
        assert_eq!(cancel.guard(async { Ok(42) }).await, Ok(42));
        assert_eq!(
            cancel.guard(async { Err::<(), _>(Error::NotFound) }).await,
            Err(Error::NotFound)
        );
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn teardown_aborts_pending_calls() {
        let (teardown, cancel) = cancellation();
        let pending = cancel.guard(futures::future::pending::<Result<(), Error>>());
        let fire = async move {
            tokio::task::yield_now().await;
            teardown.fire();
        };
        let (res, ()) = futures::join!(pending, fire);
        assert_eq!(res, Err(Error::Aborted));
        assert!(cancel.is_cancelled());
        assert_eq!(cancel.guard(async { Ok(1) }).await, Err(Error::Aborted));
    }

    #[tokio::test]
    async fn dropping_teardown_cancels() {
        let (teardown, cancel) = cancellation();
        drop(teardown);
        cancel.cancelled().await;
        assert!(cancel.is_cancelled());
    }
}
