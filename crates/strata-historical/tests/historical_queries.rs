//! End-to-end historical query scenarios against a simulated host

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use strata_core::{KvStore, MerkleTreeHistory, Sha256Hash};
use strata_historical::{
    HistoricalCacheConfig, HostRequest, LedgerRequestPurpose, RequestStage, RouteOutcome,
    StateCache,
};
use strata_testkit::{
    init_test_tracing, record_key, record_value, secret_value, signature_entry, HostSimulator,
    KeyTestFixture, LedgerFixture, RecordingHostWriter, RECORDS_MAP, SECRETS_MAP,
};

type Cache = StateCache<RecordingHostWriter, Arc<KvStore>>;

fn setup(capacity: usize) -> (LedgerFixture, RecordingHostWriter, Cache) {
    init_test_tracing();
    let ledger = LedgerFixture::new();
    let writer = RecordingHostWriter::new();
    let config = HistoricalCacheConfig::with_max_active_requests(capacity);
    let cache = StateCache::with_config(ledger.live(), writer.clone(), &config).unwrap();
    (ledger, writer, cache)
}

#[test]
fn query_becomes_trusted_once_signature_arrives() {
    let (mut ledger, writer, mut cache) = setup(10);
    let entry_5 = ledger.entry(5);
    let entry_6 = ledger.entry(6);
    let sig_7 = ledger.sign_range(7, 5, 6);

    assert!(cache.get_state_at(5).is_none());
    assert_eq!(writer.requested_indices(), vec![5]);
    assert_eq!(
        writer.take(),
        vec![HostRequest::LedgerGet {
            index: 5,
            purpose: LedgerRequestPurpose::HistoricalQuery
        }]
    );

    assert!(cache.handle_ledger_entry(5, &entry_5));
    assert_eq!(cache.stage_at(5), Some(RequestStage::Untrusted));
    assert_eq!(writer.take().len(), 1);
    assert!(cache.is_pending(6));

    assert!(cache.handle_ledger_entry(6, &entry_6));
    assert_eq!(cache.stage_at(6), None);
    assert!(cache.is_pending(7));
    writer.take();

    assert!(cache.handle_ledger_entry(7, &sig_7));
    assert!(writer.take().is_empty());
    assert_eq!(cache.stage_at(5), Some(RequestStage::Trusted));

    let snapshot = cache.get_state_at(5).unwrap();
    assert_eq!(snapshot.get(RECORDS_MAP, &record_key(5)), Some(&record_value(5)[..]));
    assert_eq!(snapshot.get(SECRETS_MAP, &record_key(5)), Some(&secret_value(5)[..]));
    assert_eq!(snapshot.get(RECORDS_MAP, &record_key(6)), None);
    assert_eq!(snapshot.version(), 5);
    assert_eq!(cache.stats().promotions, 1);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn simulated_host_drives_the_fetch_chain() {
    let (mut ledger, writer, mut cache) = setup(10);
    ledger.sign_range(4, 1, 3);
    ledger.sign_range(8, 5, 7);

    cache.get_state_at(2);
    cache.get_state_at(6);
    let outcomes = HostSimulator::new().serve(&ledger, &writer, &mut cache);

    let indices: Vec<u64> = outcomes.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![2, 6, 3, 7, 4, 8]);
    assert!(outcomes.iter().all(|(_, o)| *o == RouteOutcome::Accepted));

    assert_eq!(cache.stage_at(2), Some(RequestStage::Trusted));
    assert_eq!(cache.stage_at(6), Some(RequestStage::Trusted));
    assert_eq!(cache.pending_count(), 0);
}

#[test]
fn repeated_delivery_does_not_change_stage() {
    let (mut ledger, writer, mut cache) = setup(10);
    let entry = ledger.entry(5);

    cache.get_state_at(5);
    assert!(cache.handle_ledger_entry(5, &entry));

    // The second copy was never requested.
    assert!(!cache.handle_ledger_entry(5, &entry));
    assert_eq!(cache.stage_at(5), Some(RequestStage::Untrusted));
    assert_eq!(writer.requested_indices(), vec![5, 6]);
    assert_eq!(cache.stats().unsolicited_entries, 1);
}

#[test]
fn substituted_entry_is_discarded_and_refetched() {
    let (mut ledger, writer, mut cache) = setup(10);
    ledger.sign_range(7, 5, 6);
    let mut host = HostSimulator::new();
    host.substitute(5, ledger.forged_entry(5));

    cache.get_state_at(5);
    host.serve(&ledger, &writer, &mut cache);

    assert_eq!(cache.stage_at(5), None);
    assert!(cache.recent_indices().is_empty());
    assert_eq!(cache.stats().discards, 1);

    assert!(cache.get_state_at(5).is_none());
    assert_eq!(writer.requested_indices(), vec![5]);
    assert_eq!(cache.stage_at(5), Some(RequestStage::Fetching));

    host.restore(5);
    host.serve(&ledger, &writer, &mut cache);
    assert!(cache.get_state_at(5).is_some());
}

#[test]
fn unsigned_suffix_stays_untrusted() {
    let (mut ledger, writer, mut cache) = setup(10);
    ledger.entry(5);
    ledger.entry(6);

    cache.get_state_at(5);
    let outcomes = HostSimulator::new().serve(&ledger, &writer, &mut cache);

    assert_eq!(outcomes.last(), Some(&(7, RouteOutcome::Missing)));
    assert_eq!(cache.stage_at(5), Some(RequestStage::Untrusted));
    assert!(cache.get_state_at(5).is_none());
    assert_eq!(cache.pending_count(), 0);
}

#[test]
fn trusted_entries_survive_later_signatures() {
    let (mut ledger, writer, mut cache) = setup(10);
    ledger.sign_range(7, 5, 6);

    cache.get_state_at(5);
    HostSimulator::new().serve(&ledger, &writer, &mut cache);
    assert_eq!(cache.stage_at(5), Some(RequestStage::Trusted));

    // A later signature with a different leaf at 5 no longer affects it.
    let genuine = ledger.tree_for(5, 6);
    let tree = MerkleTreeHistory::from_leaves(
        5,
        vec![Sha256Hash::digest(b"other"), genuine.leaf(6).unwrap()],
    );
    let later = signature_entry(&ledger.sign_tree(9, &tree, ledger.signer()));
    cache.get_state_at(9);
    assert!(cache.handle_ledger_entry(9, &later));
    assert_eq!(cache.stage_at(5), Some(RequestStage::Trusted));
}

#[test]
fn signature_from_unknown_node_changes_nothing() {
    let (mut ledger, writer, mut cache) = setup(10);
    let tree = ledger.tree_for(5, 6);
    let rogue = KeyTestFixture::from_seed_string("rogue");
    let forged = signature_entry(&ledger.sign_tree(7, &tree, &rogue));
    let mut host = HostSimulator::new();
    host.substitute(7, forged);

    cache.get_state_at(5);
    let outcomes = host.serve(&ledger, &writer, &mut cache);

    assert_eq!(outcomes.last(), Some(&(7, RouteOutcome::Rejected)));
    assert_eq!(cache.stage_at(5), Some(RequestStage::Untrusted));
    assert_eq!(cache.stats().signatures_rejected, 1);
    assert_eq!(cache.stats().promotions, 0);
}

#[test]
fn tampered_signatures_change_nothing() {
    let (mut ledger, _writer, mut cache) = setup(10);
    let entry_5 = ledger.entry(5);
    let tree = ledger.tree_for(5, 6);
    let genuine = ledger.sign_tree(7, &tree, ledger.signer());

    let mut wrong_root = genuine.clone();
    wrong_root.root = Sha256Hash::digest(b"not the root");
    let mut wrong_bytes = genuine.clone();
    wrong_bytes.sig[0] ^= 0x01;
    let mut short_bytes = genuine;
    short_bytes.sig.truncate(10);

    cache.get_state_at(5);
    assert!(cache.handle_ledger_entry(5, &entry_5));

    for (index, tampered) in [(7, wrong_root), (8, wrong_bytes), (9, short_bytes)] {
        cache.get_state_at(index);
        assert!(!cache.handle_ledger_entry(index, &signature_entry(&tampered)));
        assert_eq!(cache.stage_at(5), Some(RequestStage::Untrusted));
    }
    assert_eq!(cache.stats().signatures_rejected, 3);
    assert_eq!(cache.stats().discards, 0);
    assert_eq!(cache.stats().promotions, 0);
}

#[test]
fn missing_entry_only_drops_fetching_requests() {
    let (mut ledger, _writer, mut cache) = setup(10);
    let entry_5 = ledger.entry(5);

    cache.get_state_at(5);
    cache.get_state_at(9);
    assert!(cache.handle_ledger_entry(5, &entry_5));

    cache.handle_no_entry(5);
    cache.handle_no_entry(9);

    assert_eq!(cache.stage_at(5), Some(RequestStage::Untrusted));
    assert_eq!(cache.stage_at(9), None);
    assert_eq!(cache.recent_indices(), vec![5]);
}

#[test]
fn eviction_keeps_most_recent_queries() {
    let (_ledger, writer, mut cache) = setup(3);

    for index in [1, 2, 3] {
        cache.get_state_at(index);
    }
    cache.get_state_at(1);
    cache.get_state_at(4);

    assert_eq!(cache.tracked_count(), 3);
    assert_eq!(cache.recent_indices(), vec![4, 1, 3]);
    assert_eq!(cache.stage_at(2), None);
    assert_eq!(writer.requested_indices(), vec![1, 2, 3, 4]);
}

#[test]
fn late_response_for_evicted_index_is_harmless() {
    let (mut ledger, writer, mut cache) = setup(2);
    let entry_1 = ledger.entry(1);

    cache.get_state_at(1);
    cache.get_state_at(2);
    cache.get_state_at(3);
    assert_eq!(cache.stage_at(1), None);
    assert!(cache.is_pending(1));

    assert!(cache.handle_ledger_entry(1, &entry_1));
    assert_eq!(cache.stage_at(1), None);
    assert_eq!(cache.tracked_count(), 2);
    assert_eq!(writer.requested_indices(), vec![1, 2, 3]);
}

#[test]
fn failed_send_is_retried_by_next_query() {
    let (mut ledger, writer, mut cache) = setup(10);
    ledger.sign_range(7, 5, 6);
    writer.close();

    assert!(cache.get_state_at(5).is_none());
    assert_eq!(cache.stage_at(5), Some(RequestStage::Fetching));
    assert!(!cache.is_pending(5));
    assert!(!cache.handle_ledger_entry(5, &ledger.entry(5)));

    writer.reopen();
    assert!(cache.get_state_at(5).is_none());
    assert!(cache.is_pending(5));
    assert!(cache.get_state_at(5).is_none());
    assert_eq!(writer.requested_indices(), vec![5]);

    HostSimulator::new().serve(&ledger, &writer, &mut cache);
    assert_eq!(cache.stage_at(5), Some(RequestStage::Trusted));
    assert!(cache.get_state_at(5).is_some());
}
