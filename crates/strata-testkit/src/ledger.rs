//! Ledger fixtures
//!
//! A [`LedgerFixture`] plays the part of the ledger the host stores. It keeps
//! the serialised bytes of every entry it produced, so signatures commit to
//! exactly the bytes a test later delivers, and it owns a live store whose
//! schema, encryptor and membership table match those entries.

use crate::keys::KeyTestFixture;
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_core::{
    ChaChaTxEncryptor, KvStore, MerkleTreeHistory, PrimarySignature, Schema, Sha256Hash,
    TxEncryptor, WriteSet, NODES_MAP, SIGNATURES_MAP, SIGNATURE_KEY,
};

/// Public application map written by every ordinary entry
pub const RECORDS_MAP: &str = "public:app.records";

/// Private application map written by every ordinary entry
pub const SECRETS_MAP: &str = "app.secrets";

/// Ledger contents plus the live store that goes with them
#[derive(Debug)]
pub struct LedgerFixture {
    signer: KeyTestFixture,
    encryptor: Arc<ChaChaTxEncryptor>,
    live: Arc<KvStore>,
    entries: BTreeMap<u64, Vec<u8>>,
}

impl Default for LedgerFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerFixture {
    /// Fixture signed by a node derived from the seed string "primary"
    pub fn new() -> Self {
        Self::with_signer(KeyTestFixture::from_seed_string("primary"))
    }

    /// Fixture whose signatures are made by `signer`
    pub fn with_signer(signer: KeyTestFixture) -> Self {
        let encryptor = Arc::new(ChaChaTxEncryptor::new([0x5a; 32]));

        let mut live = KvStore::new(schema());
        let shared: Arc<dyn TxEncryptor> = encryptor.clone();
        live.set_encryptor(Some(shared));
        live.put_typed(NODES_MAP, signer.node_id(), &signer.node_info())
            .expect("registering signer in live store");

        Self {
            signer,
            encryptor,
            live: Arc::new(live),
            entries: BTreeMap::new(),
        }
    }

    /// Live store handed to the cache
    pub fn live(&self) -> Arc<KvStore> {
        Arc::clone(&self.live)
    }

    /// Node whose signatures the live store trusts
    pub fn signer(&self) -> &KeyTestFixture {
        &self.signer
    }

    /// Bytes stored at `index`, if the fixture produced an entry there
    pub fn stored(&self, index: u64) -> Option<&[u8]> {
        self.entries.get(&index).map(Vec::as_slice)
    }

    /// Ordinary entry at `index`, created on first use
    pub fn entry(&mut self, index: u64) -> Vec<u8> {
        if let Some(bytes) = self.entries.get(&index) {
            return bytes.clone();
        }
        let bytes = self.write_entry(index, &record_value(index), &secret_value(index));
        self.entries.insert(index, bytes.clone());
        bytes
    }

    /// An ordinary entry for `index` that differs from the stored one
    ///
    /// This is what a host substituting content would deliver.
    pub fn forged_entry(&self, index: u64) -> Vec<u8> {
        self.write_entry(index, b"forged", b"forged")
    }

    /// Tree over the digests of the stored entries in `first..=last`
    ///
    /// Missing ordinary entries are created.
    pub fn tree_for(&mut self, first: u64, last: u64) -> MerkleTreeHistory {
        let leaves = (first..=last)
            .map(|index| Sha256Hash::digest(&self.entry(index)))
            .collect();
        MerkleTreeHistory::from_leaves(first, leaves)
    }

    /// Signature entry at `index` over entries `first..=last`, signed by the
    /// trusted signer and stored in the ledger
    pub fn sign_range(&mut self, index: u64, first: u64, last: u64) -> Vec<u8> {
        let tree = self.tree_for(first, last);
        let signature = self.sign_tree(index, &tree, &self.signer);
        let bytes = signature_entry(&signature);
        self.entries.insert(index, bytes.clone());
        bytes
    }

    /// Signature record at `index` over `tree`, signed by `signer`
    pub fn sign_tree(
        &self,
        index: u64,
        tree: &MerkleTreeHistory,
        signer: &KeyTestFixture,
    ) -> PrimarySignature {
        PrimarySignature::sign(signer.node_id().clone(), index, tree, signer.signing_key())
            .expect("serialising merkle tree")
    }

    fn write_entry(&self, index: u64, record: &[u8], secret: &[u8]) -> Vec<u8> {
        let mut ws = WriteSet::new(index);
        ws.put(RECORDS_MAP, record_key(index), record.to_vec());
        ws.put(SECRETS_MAP, record_key(index), secret.to_vec());
        let encryptor: &dyn TxEncryptor = self.encryptor.as_ref();
        ws.serialise(Some(encryptor)).expect("sealing test entry")
    }
}

/// Serialise a signature record as a ledger entry
pub fn signature_entry(signature: &PrimarySignature) -> Vec<u8> {
    let mut ws = WriteSet::new(signature.seqno);
    ws.put_typed(SIGNATURES_MAP, &SIGNATURE_KEY, signature)
        .expect("encoding signature record");
    ws.serialise(None).expect("serialising signature entry")
}

/// Schema shared by the fixture's live store and entries
pub fn schema() -> Schema {
    Schema::new().with_map(RECORDS_MAP).with_map(SECRETS_MAP)
}

/// Key written by the entry at `index`
pub fn record_key(index: u64) -> Vec<u8> {
    format!("record-{index}").into_bytes()
}

/// Public value written by the entry at `index`
pub fn record_value(index: u64) -> Vec<u8> {
    format!("value-{index}").into_bytes()
}

/// Private value written by the entry at `index`
pub fn secret_value(index: u64) -> Vec<u8> {
    format!("secret-{index}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::DeserialiseSuccess;

    #[test]
    fn entries_are_stable_once_created() {
        let mut ledger = LedgerFixture::new();
        let first = ledger.entry(3);
        assert_eq!(ledger.entry(3), first);
        assert_ne!(ledger.forged_entry(3), first);
    }

    #[test]
    fn entries_replay_into_live_schema() {
        let mut ledger = LedgerFixture::new();
        let mut store = KvStore::new(schema());
        store.set_encryptor(ledger.live().encryptor());

        let outcome = store.deserialise_views(&ledger.entry(4)).unwrap();
        assert_eq!(outcome, DeserialiseSuccess::Pass);
        assert_eq!(store.get(SECRETS_MAP, &record_key(4)), Some(&secret_value(4)[..]));
    }

    #[test]
    fn signature_commits_to_stored_entries() {
        let mut ledger = LedgerFixture::new();
        let bytes = ledger.sign_range(7, 5, 6);

        let mut store = KvStore::new(schema());
        assert_eq!(
            store.deserialise_views(&bytes).unwrap(),
            DeserialiseSuccess::PassSignature
        );
        let tree = store.signature().unwrap().unwrap().tree().unwrap();
        assert_eq!(tree.leaf(5), Some(Sha256Hash::digest(ledger.stored(5).unwrap())));
        assert_eq!(ledger.stored(7), Some(&bytes[..]));
    }
}
