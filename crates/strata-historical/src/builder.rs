//! Snapshot builder
//!
//! Rebuilds the state written by a single ledger entry into a fresh store
//! that shares the live store's schema and encryptor but none of its data.

use crate::error::{HistoricalError, Result};
use std::sync::Arc;
use strata_core::{
    DeserialiseSuccess, KvStore, NodeIdentityLookup, Schema, Sha256Hash, TxEncryptor,
};

/// The live store, as seen by the historical cache
///
/// Only the schema, the encryptor and the membership table are read.
pub trait LiveStore: NodeIdentityLookup {
    /// Schema candidate snapshots must share
    fn schema(&self) -> Schema;

    /// Ledger encryptor for private writes
    fn encryptor(&self) -> Option<Arc<dyn TxEncryptor>>;
}

impl LiveStore for KvStore {
    fn schema(&self) -> Schema {
        KvStore::schema(self).clone()
    }

    fn encryptor(&self) -> Option<Arc<dyn TxEncryptor>> {
        KvStore::encryptor(self)
    }
}

impl<T: LiveStore + ?Sized> LiveStore for Arc<T> {
    fn schema(&self) -> Schema {
        (**self).schema()
    }

    fn encryptor(&self) -> Option<Arc<dyn TxEncryptor>> {
        (**self).encryptor()
    }
}

/// Kind of transaction a ledger entry held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Ordinary transaction
    Normal,
    /// Signature over the Merkle root of preceding entries
    Signature,
}

/// Candidate snapshot rebuilt from one ledger entry
#[derive(Debug, Clone)]
pub struct BuiltEntry {
    /// Kind of transaction replayed
    pub kind: EntryKind,
    /// Digest of the raw entry bytes
    pub entry_hash: Sha256Hash,
    /// State written by the entry
    pub snapshot: Arc<KvStore>,
}

/// Builds candidate snapshots compatible with the live store
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Create a builder
    pub fn new() -> Self {
        Self
    }

    /// Replay the entry at `index` into a fresh snapshot
    pub fn build<S>(&self, live: &S, index: u64, data: &[u8]) -> Result<BuiltEntry>
    where
        S: LiveStore + ?Sized,
    {
        let mut snapshot = KvStore::new(live.schema());
        snapshot.set_encryptor(live.encryptor());

        let outcome = snapshot
            .deserialise_views(data)
            .map_err(|e| HistoricalError::Deserialise {
                index,
                reason: e.to_string(),
            })?;

        let kind = match outcome {
            DeserialiseSuccess::Pass => EntryKind::Normal,
            DeserialiseSuccess::PassSignature => EntryKind::Signature,
        };
        tracing::debug!(index, ?kind, "Processed transaction");

        Ok(BuiltEntry {
            kind,
            entry_hash: Sha256Hash::digest(data),
            snapshot: Arc::new(snapshot),
        })
    }
}
