//! Single-slot rendezvous between an engine completion and the flow that
//! issued the query.
//!
//! [`Waiter::pair`] hands out the two halves: the [`Completion`] goes to the
//! engine, the [`Waiter`] stays with the caller, which suspends in
//! [`Waiter::get`] until the engine delivers. Both halves are consumed by
//! use, so a value is delivered and observed at most once.

use crate::dns::channel::EngineError;
use tokio::sync::oneshot;

type Slot<T> = Result<T, EngineError>;

/// Caller half.
#[derive(Debug)]
pub struct Waiter<T> {
    rx: oneshot::Receiver<Slot<T>>,
}

/// Engine half.
#[derive(Debug)]
pub struct Completion<T> {
    tx: oneshot::Sender<Slot<T>>,
}

impl<T> Waiter<T> {
    /// Creates an empty waiter and the completion that fills it.
    pub fn pair() -> (Completion<T>, Waiter<T>) {
        let (tx, rx) = oneshot::channel();
        (Completion { tx }, Waiter { rx })
    }

    /// Suspends until the completion is signaled.
    ///
    /// A completion dropped without being signaled means the engine tore the
    /// query down; that is reported as [`EngineError::Destruction`].
    pub async fn get(self) -> Result<T, EngineError> {
        match self.rx.await {
            Ok(slot) => slot,
            Err(_) => Err(EngineError::Destruction),
        }
    }
}

impl<T> Completion<T> {
    /// Delivers a value.
    pub fn switch(self, value: T) {
        self.deliver(Ok(value));
    }

    /// Delivers an error.
    pub fn throw(self, err: EngineError) {
        self.deliver(Err(err));
    }

    pub fn deliver(self, result: Result<T, EngineError>) {
        if self.tx.send(result).is_err() {
            tracing::trace!("waiter dropped before completion was delivered");
        }
    }

    /// True once the waiting side has gone away.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}
