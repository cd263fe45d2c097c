//! Ledger entry fetcher
//!
//! Tracks which indices have been requested from the host and not yet
//! answered. This set is the only thing separating entries we asked for
//! from junk the host sends unprompted, so every delivery must be checked
//! against it. It includes look-ahead fetches that no caller asked for.

use crate::host::{HostRequest, HostWriter, LedgerRequestPurpose};
use std::collections::BTreeSet;

/// Issues deduplicated historical fetches to the host
#[derive(Debug)]
pub struct LedgerFetcher<W> {
    writer: W,
    pending: BTreeSet<u64>,
}

impl<W: HostWriter> LedgerFetcher<W> {
    /// Create a fetcher sending through `writer`
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending: BTreeSet::new(),
        }
    }

    /// Request `index` unless a request for it is already outstanding
    ///
    /// Returns `true` when a message was sent.
    pub fn fetch(&mut self, index: u64) -> bool {
        if self.pending.contains(&index) {
            return false;
        }

        let request = HostRequest::LedgerGet {
            index,
            purpose: LedgerRequestPurpose::HistoricalQuery,
        };
        match self.writer.send(request) {
            Ok(()) => {
                tracing::debug!(index, "Requested historical ledger entry");
                self.pending.insert(index);
                true
            }
            Err(e) => {
                tracing::error!(index, error = %e, "Unable to request historical ledger entry");
                false
            }
        }
    }

    /// Mark the response for `index` as received
    ///
    /// Returns `false` if no request for `index` was outstanding.
    pub fn complete(&mut self, index: u64) -> bool {
        self.pending.remove(&index)
    }

    /// Stop waiting for `index`
    pub fn forget(&mut self, index: u64) {
        self.pending.remove(&index);
    }

    /// Whether a request for `index` is outstanding
    pub fn is_pending(&self, index: u64) -> bool {
        self.pending.contains(&index)
    }

    /// Number of outstanding requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
