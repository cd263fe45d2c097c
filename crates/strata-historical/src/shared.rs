//! Shared handle to the historical cache
//!
//! Application handlers query state while the host-response loop delivers
//! entries. Both go through a cloneable handle guarding one [`StateCache`].

use crate::builder::LiveStore;
use crate::cache::{CacheStats, StateCache};
use crate::host::{route_host_response, HistoricalEntrySink, HostResponse, HostWriter, RouteOutcome};
use crate::trust::RequestStage;
use parking_lot::Mutex;
use std::sync::Arc;
use strata_core::KvStore;
use tokio::sync::mpsc::UnboundedReceiver;

/// Read access to historical state for application code
pub trait HistoricalStateProvider: Send + Sync {
    /// Trusted snapshot at `index`, or `None` while it is being established
    fn get_state_at(&self, index: u64) -> Option<Arc<KvStore>>;
}

/// Cloneable, lock-guarded [`StateCache`]
pub struct SharedStateCache<W, S> {
    inner: Arc<Mutex<StateCache<W, S>>>,
}

impl<W, S> Clone for SharedStateCache<W, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W, S> std::fmt::Debug for SharedStateCache<W, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStateCache").finish_non_exhaustive()
    }
}

impl<W: HostWriter, S: LiveStore> SharedStateCache<W, S> {
    /// Share `cache`
    pub fn new(cache: StateCache<W, S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// See [`StateCache::get_state_at`]
    pub fn get_state_at(&self, index: u64) -> Option<Arc<KvStore>> {
        self.inner.lock().get_state_at(index)
    }

    /// See [`StateCache::handle_ledger_entry`]
    pub fn handle_ledger_entry(&self, index: u64, data: &[u8]) -> bool {
        self.inner.lock().handle_ledger_entry(index, data)
    }

    /// See [`StateCache::handle_no_entry`]
    pub fn handle_no_entry(&self, index: u64) {
        self.inner.lock().handle_no_entry(index);
    }

    /// Route one host response through the cache
    pub fn route(&self, response: HostResponse) -> RouteOutcome {
        let mut cache = self.inner.lock();
        route_host_response(&mut *cache, response)
    }

    /// Stage of a tracked index
    pub fn stage_at(&self, index: u64) -> Option<RequestStage> {
        self.inner.lock().stage_at(index)
    }

    /// Snapshot of the activity counters
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats().clone()
    }

    /// Run `f` with the cache locked
    pub fn with_cache<R>(&self, f: impl FnOnce(&StateCache<W, S>) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Feed host responses to the cache until the channel closes
    ///
    /// Returns the number of responses that answered historical queries.
    pub async fn run_host_responses(self, mut responses: UnboundedReceiver<HostResponse>) -> u64 {
        let mut handled = 0;
        while let Some(response) = responses.recv().await {
            let index = response.index();
            match self.route(response) {
                RouteOutcome::NotHistorical => {}
                outcome => {
                    handled += 1;
                    tracing::trace!(index, ?outcome, "Routed host response");
                }
            }
        }
        tracing::debug!(handled, "Host response channel closed");
        handled
    }
}

impl<W: HostWriter, S: LiveStore> HistoricalEntrySink for SharedStateCache<W, S> {
    fn deliver_entry(&mut self, index: u64, data: &[u8]) -> bool {
        self.handle_ledger_entry(index, data)
    }

    fn deliver_missing(&mut self, index: u64) {
        self.handle_no_entry(index);
    }
}

impl<W, S> HistoricalStateProvider for SharedStateCache<W, S>
where
    W: HostWriter + Send,
    S: LiveStore + Send,
{
    fn get_state_at(&self, index: u64) -> Option<Arc<KvStore>> {
        SharedStateCache::get_state_at(self, index)
    }
}
