//! Ledger transaction wire format
//!
//! One ledger entry holds one serialised [`LedgerTransaction`]. Writes to
//! maps named `public:*` travel in clear; all other writes are bincode
//! encoded, sealed by the ledger encryptor, and carried as one opaque blob.

use crate::encryptor::TxEncryptor;
use crate::error::{CoreError, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of maps whose contents are not encrypted in the ledger
pub const PUBLIC_PREFIX: &str = "public:";

/// Map holding the signature record of a signature transaction
pub const SIGNATURES_MAP: &str = "public:strata.internal.signatures";

/// Map holding node membership records, keyed by node id
pub const NODES_MAP: &str = "public:strata.gov.nodes";

/// Key of the single record in [`SIGNATURES_MAP`]
pub const SIGNATURE_KEY: u64 = 0;

/// Per-map writes; `None` removes the key
pub type MapWrites = BTreeMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>;

/// Whether `map` is written in clear
pub fn is_public_map(map: &str) -> bool {
    map.starts_with(PUBLIC_PREFIX)
}

/// Encode a typed key or value the way the store does
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Decode a typed key or value read from the store
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Serialised form of a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Ledger index this transaction was committed at
    pub version: u64,
    /// Writes to public maps
    pub public_writes: MapWrites,
    /// Sealed, bincode-encoded [`MapWrites`] for private maps
    pub private_writes: Option<Vec<u8>>,
}

impl LedgerTransaction {
    /// Decode an entry
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        decode(data)
    }

    /// Encode this entry
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    /// Recover the complete write set, opening the private section
    pub fn open(&self, encryptor: Option<&dyn TxEncryptor>) -> Result<MapWrites> {
        let mut writes = self.public_writes.clone();
        if let Some(map) = writes.keys().find(|m| !is_public_map(m)) {
            return Err(CoreError::serialization(format!(
                "Private map {map} written in the public section"
            )));
        }

        if let Some(sealed) = &self.private_writes {
            let encryptor = encryptor.ok_or(CoreError::MissingEncryptor)?;
            let plain = encryptor.decrypt(self.version, sealed)?;
            let private: MapWrites = decode(&plain)?;
            for (map, entries) in private {
                if is_public_map(&map) {
                    return Err(CoreError::serialization(format!(
                        "Public map {map} written in the private section"
                    )));
                }
                writes.insert(map, entries);
            }
        }

        Ok(writes)
    }
}

/// Builder for the writes of one transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    version: u64,
    writes: MapWrites,
}

impl WriteSet {
    /// Start a transaction that will be committed at `version`
    pub fn new(version: u64) -> Self {
        Self {
            version,
            writes: MapWrites::new(),
        }
    }

    /// Version the transaction commits at
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Write raw bytes
    pub fn put(&mut self, map: &str, key: Vec<u8>, value: Vec<u8>) -> &mut Self {
        self.writes
            .entry(map.to_string())
            .or_default()
            .insert(key, Some(value));
        self
    }

    /// Remove a key
    pub fn remove(&mut self, map: &str, key: Vec<u8>) -> &mut Self {
        self.writes
            .entry(map.to_string())
            .or_default()
            .insert(key, None);
        self
    }

    /// Write a typed key and value
    pub fn put_typed<K, V>(&mut self, map: &str, key: &K, value: &V) -> Result<&mut Self>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        Ok(self.put(map, encode(key)?, encode(value)?))
    }

    /// All writes, by map
    pub fn writes(&self) -> &MapWrites {
        &self.writes
    }

    /// Split into public and sealed private sections
    pub fn into_transaction(self, encryptor: Option<&dyn TxEncryptor>) -> Result<LedgerTransaction> {
        let (public_writes, private): (MapWrites, MapWrites) = self
            .writes
            .into_iter()
            .partition(|(map, _)| is_public_map(map));

        let private_writes = if private.is_empty() {
            None
        } else {
            let encryptor = encryptor.ok_or(CoreError::MissingEncryptor)?;
            Some(encryptor.encrypt(self.version, &encode(&private)?)?)
        };

        Ok(LedgerTransaction {
            version: self.version,
            public_writes,
            private_writes,
        })
    }

    /// Serialise straight to ledger entry bytes
    pub fn serialise(self, encryptor: Option<&dyn TxEncryptor>) -> Result<Vec<u8>> {
        self.into_transaction(encryptor)?.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryptor::ChaChaTxEncryptor;

    #[test]
    fn private_writes_are_sealed() {
        let encryptor = ChaChaTxEncryptor::new([1u8; 32]);
        let mut ws = WriteSet::new(4);
        ws.put("public:app.meta", b"k".to_vec(), b"v".to_vec());
        ws.put("app.secrets", b"k".to_vec(), b"hidden".to_vec());

        let tx = ws.into_transaction(Some(&encryptor)).unwrap();
        assert!(tx.public_writes.contains_key("public:app.meta"));
        assert!(!tx.public_writes.contains_key("app.secrets"));

        let sealed = tx.private_writes.as_ref().unwrap();
        assert!(!sealed.windows(6).any(|w| w == b"hidden"));

        let opened = tx.open(Some(&encryptor)).unwrap();
        assert_eq!(
            opened["app.secrets"][&b"k".to_vec()],
            Some(b"hidden".to_vec())
        );
    }

    #[test]
    fn private_writes_need_an_encryptor() {
        let mut ws = WriteSet::new(1);
        ws.put("app.secrets", vec![1], vec![2]);
        assert_eq!(
            ws.into_transaction(None).unwrap_err(),
            CoreError::MissingEncryptor
        );
    }

    #[test]
    fn private_map_in_public_section_is_rejected() {
        let mut public_writes = MapWrites::new();
        public_writes.entry("app.secrets".into()).or_default();
        let tx = LedgerTransaction {
            version: 1,
            public_writes,
            private_writes: None,
        };
        assert!(tx.open(None).is_err());
    }
}
