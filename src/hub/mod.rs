//! Cooperative scheduling primitives.
//!
//! A [`Hub`] wraps the tokio runtime the resolver lives on and adds the three
//! services the resolver needs from its scheduler:
//!
//! - a deferred-callback queue ([`Hub::run_callback`]): callbacks run in
//!   FIFO order on their own task, so they only ever execute at a scheduling
//!   boundary, never inside another flow's issue/suspend window;
//! - a view of the live process id ([`Hub::getpid`]);
//! - fork notification ([`Hub::fork`], [`Hub::reinit`]). After a fork the
//!   child calls [`Hub::reinit`]; if the process id changed, every started
//!   [`ForkWatcher`] callback is queued on the deferred-callback queue.
//!
//! [`waiter`] provides the single-slot future used to bridge engine
//! completions back into the calling flow.

pub mod waiter;

use dashmap::DashMap;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc, Weak,
    },
};
use tokio::{runtime::Handle, sync::mpsc, sync::oneshot};

type Callback = Box<dyn FnOnce() + Send + 'static>;
type ForkCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Source of the live process id. Defaults to [`std::process::id`].
pub type PidSource = Arc<dyn Fn() -> u32 + Send + Sync + 'static>;

struct HubInner {
    handle: Handle,
    callbacks: mpsc::UnboundedSender<Callback>,
    watchers: DashMap<u64, ForkCallback>,
    next_watcher: AtomicU64,
    pid_source: PidSource,
    pid: AtomicU32,
}

/// Handle to the scheduler. Cheap to clone.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Creates a hub on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new() -> Self {
        Self::with_pid_source(Arc::new(std::process::id))
    }

    /// Creates a hub that reads the live process id from `pid_source`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn with_pid_source(pid_source: PidSource) -> Self {
        let handle = Handle::current();
        let (tx, mut rx) = mpsc::unbounded_channel::<Callback>();

        handle.spawn(async move {
            while let Some(callback) = rx.recv().await {
                callback();
            }
            tracing::trace!("hub callback queue closed");
        });

        let pid = pid_source();
        Self {
            inner: Arc::new(HubInner {
                handle,
                callbacks: tx,
                watchers: DashMap::new(),
                next_watcher: AtomicU64::new(1),
                pid_source,
                pid: AtomicU32::new(pid),
            }),
        }
    }

    /// The runtime this hub drives.
    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    /// The live process id.
    pub fn getpid(&self) -> u32 {
        (self.inner.pid_source)()
    }

    /// Queues `callback` to run at the next scheduling boundary.
    pub fn run_callback<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inner.callbacks.send(Box::new(callback)).is_err() {
            tracing::warn!("hub callback queue is gone, dropping callback");
        }
    }

    /// Resolves once every callback queued before this call has run.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.run_callback(move || {
            let _ = tx.send(());
        });
        let _ = rx.await;
    }

    /// Creates a stopped fork watcher.
    pub fn fork(&self) -> ForkWatcher {
        ForkWatcher {
            hub: Arc::downgrade(&self.inner),
            id: self.inner.next_watcher.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Re-reads the process id; when it changed since the last look, queues
    /// every started fork watcher. Returns whether a fork was detected.
    pub fn reinit(&self) -> bool {
        let pid = self.getpid();
        let previous = self.inner.pid.swap(pid, Ordering::AcqRel);
        if previous == pid {
            return false;
        }

        tracing::debug!(previous, pid, watchers = self.inner.watchers.len(), "fork detected");
        let callbacks: Vec<ForkCallback> =
            self.inner.watchers.iter().map(|entry| Arc::clone(entry.value())).collect();
        for callback in callbacks {
            self.run_callback(move || callback());
        }
        true
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("pid", &self.inner.pid.load(Ordering::Relaxed))
            .field("fork_watchers", &self.inner.watchers.len())
            .finish_non_exhaustive()
    }
}

/// Subscription to fork notifications. Stopped on drop.
pub struct ForkWatcher {
    hub: Weak<HubInner>,
    id: u64,
}

impl ForkWatcher {
    /// Starts delivering fork notifications to `callback`, replacing any
    /// previously started callback.
    pub fn start<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if let Some(hub) = self.hub.upgrade() {
            hub.watchers.insert(self.id, Arc::new(callback));
        }
    }

    pub fn stop(&self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.watchers.remove(&self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.hub.upgrade().is_some_and(|hub| hub.watchers.contains_key(&self.id))
    }
}

impl Drop for ForkWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ForkWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkWatcher")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
