//! # Strata Historical - trusted access to past ledger state
//!
//! Application code asks for the key-value state written at some ledger
//! index. The ledger lives with the untrusted host, so every entry fetched
//! back is replayed into a standalone snapshot and held as *untrusted* until
//! a signature transaction, verified against the signing node's certificate,
//! commits to a Merkle tree containing the entry's digest.
//!
//! ## Flow
//!
//! 1. [`StateCache::get_state_at`] tracks the index and asks the host for it
//! 2. [`StateCache::handle_ledger_entry`] replays the bytes and, for ordinary
//!    entries, fetches the next index
//! 3. When a signature entry arrives its tree settles every untrusted index it
//!    covers: matching digests are promoted, mismatches dropped
//! 4. Later queries for a promoted index return the snapshot
//!
//! At most [`MAX_ACTIVE_REQUESTS`] indices are tracked by default; the least
//! recently queried index is evicted first.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod host;
pub mod recency;
pub mod shared;
pub mod trust;

pub use builder::{BuiltEntry, EntryKind, LiveStore, SnapshotBuilder};
pub use cache::{CacheStats, StateCache};
pub use config::{HistoricalCacheConfig, MAX_ACTIVE_REQUESTS, MAX_ACTIVE_REQUESTS_ENV};
pub use error::{HistoricalError, Result};
pub use fetcher::LedgerFetcher;
pub use host::{
    route_host_response, HistoricalEntrySink, HostChannelClosed, HostRequest, HostResponse,
    HostWriter, LedgerRequestPurpose, RouteOutcome,
};
pub use recency::RecencyList;
pub use shared::{HistoricalStateProvider, SharedStateCache};
pub use trust::{RecordOutcome, RequestStage, SignatureReport, TrackedRequest, TrustTracker};
