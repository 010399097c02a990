// Input debouncing and last-input-wins bookkeeping for recompute passes.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(700);

/// Cancellable quiet-period timer. Holds at most one pending action; scheduling a new
/// one aborts the previous before arming.
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    /// Run `action` once `delay` passes without another `schedule` or `cancel`.
    pub fn schedule<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Monotonic pass counter shared between the input side and in-flight passes.
#[derive(Clone, Debug, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new pass; every earlier token becomes stale.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.current() == token
    }
}

/// Latest published pass result. Results from superseded passes are dropped.
#[derive(Debug)]
pub struct LatestSlot<T> {
    inner: Mutex<Option<(u64, T)>>,
}

impl<T: Clone> LatestSlot<T> {
    pub fn new() -> Self {
        Self { inner: Mutex::new(None) }
    }

    /// Store `value` produced by pass `token`. Returns false when the pass is stale.
    pub fn publish(&self, generation: &Generation, token: u64, value: T) -> bool {
        let mut slot = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !generation.is_current(token) || slot.as_ref().is_some_and(|(held, _)| *held > token) {
            log::debug!("dropping result of superseded pass {}", token);
            return false;
        }
        *slot = Some((token, value));
        true
    }

    pub fn get(&self) -> Option<T> {
        self.tagged().map(|(_, v)| v)
    }

    /// Latest value with the pass token that produced it.
    pub fn tagged(&self) -> Option<(u64, T)> {
        let slot = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone()
    }
}

impl<T: Clone> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Debounced recompute: every input bumps the generation and re-arms the timer, and only
/// the pass for the newest input may publish.
pub struct DebouncedRecompute<T> {
    debouncer: Debouncer,
    generation: Generation,
    latest: Arc<LatestSlot<T>>,
}

impl<T: Clone + Send + 'static> DebouncedRecompute<T> {
    pub fn new(delay: Duration) -> Self {
        Self { debouncer: Debouncer::new(delay), generation: Generation::new(), latest: Arc::new(LatestSlot::new()) }
    }

    /// Register an input. `pass` is not polled until the quiet period ends; returns its token.
    pub fn on_input<F>(&mut self, pass: F) -> u64
    where
        F: Future<Output = T> + Send + 'static,
    {
        let token = self.generation.next();
        let (generation, latest) = (self.generation.clone(), self.latest.clone());
        self.debouncer.schedule(async move {
            let value = pass.await;
            if latest.publish(&generation, token, value) {
                log::debug!("published recompute pass {}", token);
            }
        });
        token
    }

    pub fn latest(&self) -> Option<(u64, T)> {
        self.latest.tagged()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.current()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

impl<T: Clone + Send + 'static> Default for DebouncedRecompute<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
