//! Trust state machine for tracked historical indices
//!
//! Each tracked index moves `Fetching -> Untrusted -> Trusted`. An index
//! becomes `Untrusted` once its entry has been replayed and digested, and
//! `Trusted` once a verified signature's Merkle tree has the same digest at
//! that position. A verified tree with a different digest means the host
//! lied about the entry: the candidate is dropped so a later query can fetch
//! it again.

use crate::builder::BuiltEntry;
use crate::error::{HistoricalError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_core::{verify_root, KvStore, NodeIdentityLookup, Sha256Hash};

/// Observable stage of a tracked index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStage {
    /// Entry requested, nothing received yet
    Fetching,
    /// Entry replayed but not yet covered by a verified signature
    Untrusted,
    /// Entry digest matched a verified signature
    Trusted,
}

#[derive(Debug, Clone)]
struct Candidate {
    entry_hash: Sha256Hash,
    snapshot: Arc<KvStore>,
}

#[derive(Debug, Clone)]
enum Stage {
    Fetching,
    Untrusted(Candidate),
    Trusted(Candidate),
}

/// State kept for one index of interest
#[derive(Debug, Clone)]
pub struct TrackedRequest {
    stage: Stage,
}

impl TrackedRequest {
    fn fetching() -> Self {
        Self {
            stage: Stage::Fetching,
        }
    }

    /// Current stage
    pub fn stage(&self) -> RequestStage {
        match self.stage {
            Stage::Fetching => RequestStage::Fetching,
            Stage::Untrusted(_) => RequestStage::Untrusted,
            Stage::Trusted(_) => RequestStage::Trusted,
        }
    }

    /// Digest of the received entry, absent while fetching
    pub fn entry_hash(&self) -> Option<Sha256Hash> {
        self.candidate().map(|c| c.entry_hash)
    }

    /// Candidate snapshot, absent while fetching
    pub fn snapshot(&self) -> Option<&Arc<KvStore>> {
        self.candidate().map(|c| &c.snapshot)
    }

    /// Snapshot, only once trusted
    pub fn trusted_snapshot(&self) -> Option<Arc<KvStore>> {
        match &self.stage {
            Stage::Trusted(c) => Some(Arc::clone(&c.snapshot)),
            _ => None,
        }
    }

    fn candidate(&self) -> Option<&Candidate> {
        match &self.stage {
            Stage::Fetching => None,
            Stage::Untrusted(c) | Stage::Trusted(c) => Some(c),
        }
    }

    fn promote(&mut self) {
        self.stage = match std::mem::replace(&mut self.stage, Stage::Fetching) {
            Stage::Untrusted(c) => Stage::Trusted(c),
            other => other,
        };
    }
}

/// What recording a replayed entry did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Index is not tracked; the entry only served trust discovery
    Untracked,
    /// Tracked index moved from fetching to untrusted
    Recorded,
    /// Tracked index already had an entry; nothing changed
    AlreadyHave(RequestStage),
}

/// Effect of one verified signature on the tracked indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureReport {
    /// Index of the signature transaction
    pub signature_index: u64,
    /// First index covered by the signed tree
    pub first_covered: u64,
    /// Last index covered by the signed tree
    pub last_covered: u64,
    /// Indices promoted to trusted
    pub promoted: Vec<u64>,
    /// Indices whose candidate contradicted the signed tree and was dropped
    pub discarded: Vec<u64>,
}

enum Verdict {
    Promote,
    Discard,
}

/// Tracked requests keyed by ledger index
#[derive(Debug, Clone, Default)]
pub struct TrustTracker {
    requests: BTreeMap<u64, TrackedRequest>,
}

impl TrustTracker {
    /// Empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `index`; returns `false` if it was already tracked
    pub fn track(&mut self, index: u64) -> bool {
        if self.requests.contains_key(&index) {
            return false;
        }
        self.requests.insert(index, TrackedRequest::fetching());
        true
    }

    /// Stop tracking `index` regardless of stage
    pub fn untrack(&mut self, index: u64) -> Option<TrackedRequest> {
        self.requests.remove(&index)
    }

    /// Stop tracking `index` if nothing has been received for it yet
    pub fn discard_if_fetching(&mut self, index: u64) -> bool {
        match self.requests.get(&index) {
            Some(request) if request.stage() == RequestStage::Fetching => {
                self.requests.remove(&index);
                true
            }
            _ => false,
        }
    }

    /// Tracked request for `index`
    pub fn get(&self, index: u64) -> Option<&TrackedRequest> {
        self.requests.get(&index)
    }

    /// Stage of `index`, `None` if untracked
    pub fn stage(&self, index: u64) -> Option<RequestStage> {
        self.requests.get(&index).map(TrackedRequest::stage)
    }

    /// Whether `index` is tracked
    pub fn contains(&self, index: u64) -> bool {
        self.requests.contains_key(&index)
    }

    /// Number of tracked indices
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Tracked indices in ascending order
    pub fn indices(&self) -> impl Iterator<Item = u64> + '_ {
        self.requests.keys().copied()
    }

    /// Store a replayed entry as the untrusted candidate for `index`
    pub fn record_entry(&mut self, index: u64, entry: &BuiltEntry) -> RecordOutcome {
        let Some(request) = self.requests.get_mut(&index) else {
            return RecordOutcome::Untracked;
        };

        match request.stage {
            Stage::Fetching => {
                request.stage = Stage::Untrusted(Candidate {
                    entry_hash: entry.entry_hash,
                    snapshot: Arc::clone(&entry.snapshot),
                });
                tracing::debug!(index, hash = %entry.entry_hash, "Holding untrusted entry");
                RecordOutcome::Recorded
            }
            _ => {
                let stage = request.stage();
                tracing::debug!(
                    index,
                    ?stage,
                    "Not recording ledger entry: already have it"
                );
                RecordOutcome::AlreadyHave(stage)
            }
        }
    }

    /// Verify the signature transaction replayed into `signature_store` and
    /// use it to promote or discard the untrusted indices it covers
    ///
    /// A signature that fails verification changes nothing.
    pub fn apply_signature<L>(
        &mut self,
        signature_index: u64,
        signature_store: &KvStore,
        identities: &L,
    ) -> Result<SignatureReport>
    where
        L: NodeIdentityLookup + ?Sized,
    {
        let malformed = |reason: String| HistoricalError::MalformedSignature {
            index: signature_index,
            reason,
        };

        let signature = signature_store
            .signature()
            .map_err(|e| malformed(e.to_string()))?
            .ok_or_else(|| malformed("missing signature value".into()))?;
        let tree = signature.tree().map_err(|e| malformed(e.to_string()))?;

        let root = tree.root();
        if root != signature.root {
            return Err(HistoricalError::InvalidRoot {
                index: signature_index,
            });
        }

        // Membership is read as of now, not as of the signature's index.
        let node = identities
            .node_info(&signature.node)
            .ok_or_else(|| HistoricalError::UnknownNode {
                index: signature_index,
                node: signature.node.clone(),
            })?;

        if let Err(e) = verify_root(&node.cert, &root, &signature.sig) {
            tracing::debug!(index = signature_index, error = %e, "Signature verification failed");
            return Err(HistoricalError::InvalidSignature {
                index: signature_index,
            });
        }

        let first = tree.first_index();
        let last = tree.last_index().unwrap_or(first);

        let verdicts: Vec<(u64, Verdict)> = self
            .requests
            .range(first..=last)
            .filter_map(|(&index, request)| match &request.stage {
                Stage::Untrusted(candidate) => {
                    let verdict = if tree.leaf(index) == Some(candidate.entry_hash) {
                        Verdict::Promote
                    } else {
                        Verdict::Discard
                    };
                    Some((index, verdict))
                }
                Stage::Fetching | Stage::Trusted(_) => None,
            })
            .collect();

        let mut report = SignatureReport {
            signature_index,
            first_covered: first,
            last_covered: last,
            promoted: Vec::new(),
            discarded: Vec::new(),
        };

        for (index, verdict) in verdicts {
            match verdict {
                Verdict::Promote => {
                    if let Some(request) = self.requests.get_mut(&index) {
                        request.promote();
                    }
                    tracing::debug!(index, signature_index, "Now trusting entry due to signature");
                    report.promoted.push(index);
                }
                Verdict::Discard => {
                    self.requests.remove(&index);
                    tracing::warn!(
                        index,
                        signature_index,
                        "Signature has a different transaction than previously received"
                    );
                    report.discarded.push(index);
                }
            }
        }

        Ok(report)
    }
}
