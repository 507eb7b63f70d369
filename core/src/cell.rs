//! Single-assignment result cell shared by a pipeline and its caller.
//!
//! # Design
//! `result_cell` splits the cell into a `Completer` (held by the pipeline
//! task) and a `FetchHandle` (held by the caller). `Completer::commit` takes
//! `self`, so the type system rules out a second write. Publication goes
//! through a tokio oneshot channel, which is the only synchronisation
//! between the two sides.
//!
//! If the completer is dropped without committing (the runtime was shut
//! down, the task panicked) the handle resolves to `FetchError::Abandoned`,
//! so a caller waiting on it is never left hanging.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::types::{FetchId, Outcome};

/// Create a linked writer/reader pair for one fetch.
pub fn result_cell(id: FetchId, runtime: Handle) -> (Completer, FetchHandle) {
    let (tx, rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    let completer = Completer {
        id,
        tx,
        cancel: cancel.clone(),
    };
    let handle = FetchHandle {
        id,
        rx,
        cancel,
        runtime,
        spent: false,
    };
    (completer, handle)
}

/// Write side of the cell. Owned by exactly one pipeline.
#[derive(Debug)]
pub struct Completer {
    id: FetchId,
    tx: oneshot::Sender<Outcome>,
    cancel: CancellationToken,
}

impl Completer {
    pub fn id(&self) -> FetchId {
        self.id
    }

    /// Token the pipeline watches for a cancel request from the handle.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Publish the outcome. A caller that already dropped its handle simply
    /// never sees it.
    pub fn commit(self, outcome: Outcome) {
        if self.tx.send(outcome).is_err() {
            tracing::debug!(id = %self.id, "handle dropped before completion, outcome discarded");
        }
    }
}

/// Read side of the cell, returned by `Fetcher::fetch`.
///
/// The outcome can be taken exactly once, by whichever of these the caller
/// prefers: `.await`, `wait`, `try_take`, or `on_complete`. Dropping the
/// handle does not stop the fetch; use `cancel` for that.
#[derive(Debug)]
pub struct FetchHandle {
    id: FetchId,
    rx: oneshot::Receiver<Outcome>,
    cancel: CancellationToken,
    runtime: Handle,
    spent: bool,
}

impl FetchHandle {
    pub fn id(&self) -> FetchId {
        self.id
    }

    /// Ask the pipeline to stop at its next suspension point. The handle
    /// then resolves to `FetchError::Cancelled` unless the outcome was
    /// already committed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Non-blocking poll. Returns `None` while the fetch is in flight, and
    /// also after the outcome has been taken once.
    pub fn try_take(&mut self) -> Option<Outcome> {
        if self.spent {
            return None;
        }
        let outcome = match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(FetchError::Abandoned),
        };
        self.spent = true;
        Some(outcome)
    }

    /// Block the current thread until the outcome is available.
    ///
    /// # Panics
    /// When called from inside an async context; `.await` the handle there.
    pub fn wait(self) -> Outcome {
        if self.spent {
            return Err(FetchError::Abandoned);
        }
        self.rx.blocking_recv().unwrap_or(Err(FetchError::Abandoned))
    }

    /// Run `f` with the outcome once it is available. `f` runs on the
    /// runtime that drives the fetch, not on the calling thread.
    pub fn on_complete<F>(self, f: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        runtime.spawn(async move { f(self.await) });
    }
}

impl Future for FetchHandle {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome> {
        if self.spent {
            return Poll::Ready(Err(FetchError::Abandoned));
        }
        let received = ready!(Pin::new(&mut self.rx).poll(cx));
        self.spent = true;
        Poll::Ready(received.unwrap_or(Err(FetchError::Abandoned)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn committed_outcome_is_taken_once() {
        let rt = runtime();
        let (completer, mut handle) = result_cell(FetchId::new(), rt.handle().clone());
        assert!(handle.try_take().is_none());

        completer.commit(Ok(b"payload".to_vec()));
        assert_eq!(handle.try_take().unwrap().unwrap(), b"payload");
        assert!(handle.try_take().is_none());
    }

    #[test]
    fn dropped_completer_abandons_handle() {
        let rt = runtime();
        let (completer, handle) = result_cell(FetchId::new(), rt.handle().clone());
        drop(completer);
        assert!(matches!(handle.wait(), Err(FetchError::Abandoned)));
    }

    #[test]
    fn wait_blocks_until_commit_from_another_thread() {
        let rt = runtime();
        let (completer, handle) = result_cell(FetchId::new(), rt.handle().clone());
        let writer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            completer.commit(Err(FetchError::Cancelled));
        });
        assert!(matches!(handle.wait(), Err(FetchError::Cancelled)));
        writer.join().unwrap();
    }

    #[test]
    fn cancel_reaches_completer_token() {
        let rt = runtime();
        let (completer, handle) = result_cell(FetchId::new(), rt.handle().clone());
        let token = completer.cancellation();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn on_complete_runs_on_runtime() {
        let rt = runtime();
        let (completer, handle) = result_cell(FetchId::new(), rt.handle().clone());
        let (tx, rx) = oneshot::channel();
        handle.on_complete(move |outcome| {
            tx.send(outcome.map(|bytes| bytes.len())).unwrap();
        });
        completer.commit(Ok(vec![0; 5]));
        assert_eq!(rt.block_on(rx).unwrap().unwrap(), 5);
    }

    #[tokio::test]
    async fn handle_is_awaitable() {
        let (completer, handle) = result_cell(FetchId::new(), Handle::current());
        completer.commit(Ok(Vec::new()));
        assert!(handle.await.unwrap().is_empty());
    }
}
