//! Historical state cache
//!
//! Answers "what was the state at index I" with either nothing or a snapshot
//! whose entry digest has been matched against a signed Merkle root. The
//! bytes come from the untrusted host; the cache only ever hands out
//! snapshots the ledger's signers vouched for.
//!
//! Queries are hints: an untracked index starts being fetched and the caller
//! is expected to ask again later. Fetching an ordinary entry triggers a
//! fetch of the next index, walking forward until a signature transaction
//! arrives and settles every untrusted entry it covers.
//!
//! The cache is driven by a single owner. Wrap it in
//! [`SharedStateCache`](crate::SharedStateCache) to share it between threads.

use crate::builder::{EntryKind, LiveStore, SnapshotBuilder};
use crate::config::HistoricalCacheConfig;
use crate::error::{HistoricalError, Result};
use crate::fetcher::LedgerFetcher;
use crate::host::{HistoricalEntrySink, HostWriter};
use crate::recency::RecencyList;
use crate::trust::{RequestStage, TrustTracker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strata_core::KvStore;

/// Counters describing cache activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Calls to `get_state_at`
    pub queries: u64,
    /// Queries answered with a trusted snapshot
    pub hits: u64,
    /// Fetch messages sent to the host
    pub fetches_sent: u64,
    /// Deliveries that were processed
    pub entries_accepted: u64,
    /// Deliveries for indices that were not pending
    pub unsolicited_entries: u64,
    /// Deliveries that could not be used
    pub failed_entries: u64,
    /// Missing-entry notices received
    pub missing_entries: u64,
    /// Signatures that verified
    pub signatures_verified: u64,
    /// Signatures rejected by root, signer or signature checks
    pub signatures_rejected: u64,
    /// Indices promoted to trusted
    pub promotions: u64,
    /// Untrusted candidates dropped on digest mismatch
    pub discards: u64,
    /// Tracked indices evicted by the recency bound
    pub evictions: u64,
}

/// Historical state cache
pub struct StateCache<W, S> {
    live: S,
    fetcher: LedgerFetcher<W>,
    builder: SnapshotBuilder,
    tracker: TrustTracker,
    recent: RecencyList,
    stats: CacheStats,
}

impl<W, S> std::fmt::Debug for StateCache<W, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCache")
            .field("tracked", &self.tracker.len())
            .field("recent", &self.recent)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<W: HostWriter, S: LiveStore> StateCache<W, S> {
    /// Cache with the default tracking bound
    pub fn new(live: S, writer: W) -> Self {
        let config = HistoricalCacheConfig::default();
        Self::build(live, writer, config.max_active_requests)
    }

    /// Cache with an explicit configuration
    pub fn with_config(live: S, writer: W, config: &HistoricalCacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(live, writer, config.max_active_requests))
    }

    fn build(live: S, writer: W, capacity: usize) -> Self {
        Self {
            live,
            fetcher: LedgerFetcher::new(writer),
            builder: SnapshotBuilder::new(),
            tracker: TrustTracker::new(),
            recent: RecencyList::new(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Trusted snapshot of the state at `index`, if available yet
    ///
    /// Querying refreshes the index's recency; an untracked index starts
    /// being fetched and `None` is returned.
    pub fn get_state_at(&mut self, index: u64) -> Option<Arc<KvStore>> {
        self.stats.queries += 1;
        self.touch(index);

        if self.tracker.track(index) {
            self.fetch(index);
            return None;
        }

        let request = self.tracker.get(index)?;
        if request.stage() == RequestStage::Fetching && !self.fetcher.is_pending(index) {
            tracing::debug!(index, "Re-requesting stalled historical entry");
            self.fetch(index);
            return None;
        }

        let snapshot = request.trusted_snapshot();
        if snapshot.is_some() {
            self.stats.hits += 1;
        }
        snapshot
    }

    /// Process entry bytes delivered by the host
    ///
    /// Returns `false` for entries that were never requested and for
    /// entries that could not be used. Failures are logged, never raised.
    pub fn handle_ledger_entry(&mut self, index: u64, data: &[u8]) -> bool {
        if !self.fetcher.complete(index) {
            tracing::warn!(index, "Ignoring unrequested ledger entry");
            self.stats.unsolicited_entries += 1;
            return false;
        }

        match self.process_entry(index, data) {
            Ok(()) => {
                self.stats.entries_accepted += 1;
                true
            }
            Err(e) => {
                if e.is_verification_failure() {
                    self.stats.signatures_rejected += 1;
                    tracing::warn!(index, error = %e, "Rejected signature transaction");
                } else {
                    tracing::error!(index, error = %e, "Unable to process ledger entry");
                }
                self.stats.failed_entries += 1;
                false
            }
        }
    }

    /// The host failed or refused to supply `index`
    ///
    /// A tracked index still waiting for its entry is forgotten; nothing is
    /// retried until a caller queries it again.
    pub fn handle_no_entry(&mut self, index: u64) {
        self.stats.missing_entries += 1;
        if self.tracker.discard_if_fetching(index) {
            self.recent.remove(index);
            tracing::debug!(index, "Host has no entry, dropping request");
        }
        self.fetcher.forget(index);
    }

    /// Stage of a tracked index
    pub fn stage_at(&self, index: u64) -> Option<RequestStage> {
        self.tracker.stage(index)
    }

    /// Number of tracked indices
    pub fn tracked_count(&self) -> usize {
        self.tracker.len()
    }

    /// Number of outstanding host requests
    pub fn pending_count(&self) -> usize {
        self.fetcher.pending_count()
    }

    /// Whether a host request for `index` is outstanding
    pub fn is_pending(&self, index: u64) -> bool {
        self.fetcher.is_pending(index)
    }

    /// Tracked indices from most to least recently queried
    pub fn recent_indices(&self) -> Vec<u64> {
        self.recent.iter().collect()
    }

    /// Maximum number of tracked indices
    pub fn capacity(&self) -> usize {
        self.recent.capacity()
    }

    /// Activity counters
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn touch(&mut self, index: u64) {
        for evicted in self.recent.touch(index) {
            if self.tracker.untrack(evicted).is_some() {
                self.stats.evictions += 1;
                tracing::debug!(index = evicted, "Evicted historical request");
            }
        }
    }

    fn fetch(&mut self, index: u64) {
        if self.fetcher.fetch(index) {
            self.stats.fetches_sent += 1;
        }
    }

    fn process_entry(&mut self, index: u64, data: &[u8]) -> Result<()> {
        let built = self.builder.build(&self.live, index, data)?;

        let next = match built.kind {
            EntryKind::Normal => Some(index.checked_add(1).ok_or_else(|| {
                HistoricalError::Deserialise {
                    index,
                    reason: "no index follows the last representable index".into(),
                }
            })?),
            EntryKind::Signature => None,
        };
        self.tracker.record_entry(index, &built);

        match next {
            Some(next) => self.fetch(next),
            None => {
                let report = self
                    .tracker
                    .apply_signature(index, &built.snapshot, &self.live)?;
                for discarded in &report.discarded {
                    self.recent.remove(*discarded);
                }
                self.stats.signatures_verified += 1;
                self.stats.promotions += report.promoted.len() as u64;
                self.stats.discards += report.discarded.len() as u64;
            }
        }
        Ok(())
    }
}

impl<W: HostWriter, S: LiveStore> HistoricalEntrySink for StateCache<W, S> {
    fn deliver_entry(&mut self, index: u64, data: &[u8]) -> bool {
        self.handle_ledger_entry(index, data)
    }

    fn deliver_missing(&mut self, index: u64) {
        self.handle_no_entry(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostRequest, LedgerRequestPurpose};
    use strata_core::{Schema, WriteSet, NODES_MAP};
    use tokio::sync::mpsc;

    type TestCache = StateCache<mpsc::UnboundedSender<HostRequest>, KvStore>;

    fn cache(capacity: usize) -> (TestCache, mpsc::UnboundedReceiver<HostRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = HistoricalCacheConfig::with_max_active_requests(capacity);
        let cache = StateCache::with_config(KvStore::new(Schema::new()), tx, &config).unwrap();
        (cache, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<HostRequest>) -> Vec<u64> {
        let mut indices = Vec::new();
        while let Ok(HostRequest::LedgerGet { index, purpose }) = rx.try_recv() {
            assert_eq!(purpose, LedgerRequestPurpose::HistoricalQuery);
            indices.push(index);
        }
        indices
    }

    #[test]
    fn first_query_fetches_once() {
        let (mut cache, mut rx) = cache(10);

        assert!(cache.get_state_at(4).is_none());
        assert!(cache.get_state_at(4).is_none());
        assert_eq!(drain(&mut rx), vec![4]);
        assert_eq!(cache.stage_at(4), Some(RequestStage::Fetching));
    }

    #[test]
    fn eviction_drops_least_recent() {
        let (mut cache, _rx) = cache(2);
        cache.get_state_at(1);
        cache.get_state_at(2);
        cache.get_state_at(1);
        cache.get_state_at(3);

        assert_eq!(cache.recent_indices(), vec![3, 1]);
        assert_eq!(cache.stage_at(2), None);
        assert_eq!(cache.tracked_count(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn unsolicited_entry_is_rejected() {
        let (mut cache, _rx) = cache(10);
        assert!(!cache.handle_ledger_entry(8, b"anything"));
        assert_eq!(cache.tracked_count(), 0);
        assert_eq!(cache.stats().unsolicited_entries, 1);
    }

    #[test]
    fn undecodable_entry_is_reported_not_raised() {
        let (mut cache, _rx) = cache(10);
        cache.get_state_at(8);

        assert!(!cache.handle_ledger_entry(8, &[0xde, 0xad]));
        assert_eq!(cache.stage_at(8), Some(RequestStage::Fetching));
        assert!(!cache.is_pending(8));
        assert_eq!(cache.stats().failed_entries, 1);
    }

    #[test]
    fn stalled_request_is_fetched_again_on_query() {
        let (mut cache, mut rx) = cache(10);
        cache.get_state_at(8);
        assert!(!cache.handle_ledger_entry(8, &[0xde, 0xad]));
        assert_eq!(drain(&mut rx), vec![8]);

        assert!(cache.get_state_at(8).is_none());
        assert!(cache.is_pending(8));
        assert!(cache.get_state_at(8).is_none());
        assert_eq!(drain(&mut rx), vec![8]);
    }

    #[test]
    fn entry_at_last_index_leaves_request_fetching() {
        let (mut cache, mut rx) = cache(10);
        let mut ws = WriteSet::new(u64::MAX);
        ws.put(NODES_MAP, b"k".to_vec(), b"v".to_vec());
        let data = ws.serialise(None).unwrap();

        cache.get_state_at(u64::MAX);
        assert!(!cache.handle_ledger_entry(u64::MAX, &data));
        assert_eq!(cache.stage_at(u64::MAX), Some(RequestStage::Fetching));
        assert_eq!(cache.stats().failed_entries, 1);
        assert_eq!(drain(&mut rx), vec![u64::MAX]);
    }

    #[test]
    fn missing_entry_drops_fetching_request() {
        let (mut cache, _rx) = cache(10);
        cache.get_state_at(8);
        cache.handle_no_entry(8);

        assert_eq!(cache.stage_at(8), None);
        assert!(cache.recent_indices().is_empty());
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel::<HostRequest>();
        let config = HistoricalCacheConfig::with_max_active_requests(0);
        assert!(StateCache::with_config(KvStore::new(Schema::new()), tx, &config).is_err());
    }
}
