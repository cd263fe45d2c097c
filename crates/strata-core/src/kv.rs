//! Key-value store and historical snapshots
//!
//! The same type backs the live store and the candidate snapshots rebuilt
//! from single ledger entries. A snapshot shares the live store's schema and
//! encryptor but none of its data.

use crate::encryptor::TxEncryptor;
use crate::error::{CoreError, Result};
use crate::identity::{NodeId, NodeIdentityLookup, NodeInfo};
use crate::signature::PrimarySignature;
use crate::tx::{self, LedgerTransaction, MapWrites, NODES_MAP, SIGNATURES_MAP, SIGNATURE_KEY};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Declared map names of a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    maps: BTreeSet<String>,
}

impl Schema {
    /// Schema holding only the built-in service maps
    pub fn new() -> Self {
        let maps = [SIGNATURES_MAP, NODES_MAP]
            .into_iter()
            .map(str::to_string)
            .collect();
        Self { maps }
    }

    /// Declare an application map
    pub fn with_map(mut self, name: impl Into<String>) -> Self {
        self.maps.insert(name.into());
        self
    }

    /// Whether `name` is declared
    pub fn contains(&self, name: &str) -> bool {
        self.maps.contains(name)
    }

    /// Declared map names
    pub fn maps(&self) -> impl Iterator<Item = &str> + '_ {
        self.maps.iter().map(String::as_str)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of replaying a ledger entry into a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeserialiseSuccess {
    /// Ordinary transaction
    Pass,
    /// Transaction writing only the signatures map
    PassSignature,
}

/// In-memory key-value store
#[derive(Clone, Default)]
pub struct KvStore {
    schema: Schema,
    encryptor: Option<Arc<dyn TxEncryptor>>,
    maps: BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
    version: u64,
}

impl fmt::Debug for KvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvStore")
            .field("schema", &self.schema)
            .field("encrypted", &self.encryptor.is_some())
            .field("maps", &self.maps.len())
            .field("version", &self.version)
            .finish()
    }
}

impl KvStore {
    /// Empty store with the given schema and no encryptor
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Adopt the schema of another store, keeping this store's data
    pub fn clone_schema(&mut self, other: &KvStore) {
        self.schema = other.schema.clone();
    }

    /// Install the ledger encryptor
    pub fn set_encryptor(&mut self, encryptor: Option<Arc<dyn TxEncryptor>>) {
        self.encryptor = encryptor;
    }

    /// Ledger encryptor, shared with snapshots built from this store
    pub fn encryptor(&self) -> Option<Arc<dyn TxEncryptor>> {
        self.encryptor.clone()
    }

    /// Store schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Version of the last applied transaction
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Read a raw value
    pub fn get(&self, map: &str, key: &[u8]) -> Option<&[u8]> {
        self.maps.get(map)?.get(key).map(Vec::as_slice)
    }

    /// Read a typed value
    pub fn get_typed<K, V>(&self, map: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        match self.get(map, &tx::encode(key)?) {
            Some(bytes) => Ok(Some(tx::decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of keys in `map`
    pub fn map_len(&self, map: &str) -> usize {
        self.maps.get(map).map_or(0, BTreeMap::len)
    }

    /// Write a raw value directly, as the live store's commit path does
    pub fn put(&mut self, map: &str, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        if !self.schema.contains(map) {
            return Err(CoreError::UnknownMap(map.to_string()));
        }
        self.maps
            .entry(map.to_string())
            .or_default()
            .insert(key, value);
        Ok(())
    }

    /// Write a typed value directly
    pub fn put_typed<K, V>(&mut self, map: &str, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        self.put(map, tx::encode(key)?, tx::encode(value)?)
    }

    /// Signature record, present when this store holds a signature transaction
    pub fn signature(&self) -> Result<Option<PrimarySignature>> {
        self.get_typed(SIGNATURES_MAP, &SIGNATURE_KEY)
    }

    /// Replay one serialised transaction into this store
    ///
    /// The store is left untouched when an error is returned.
    pub fn deserialise_views(&mut self, data: &[u8]) -> Result<DeserialiseSuccess> {
        let tx = LedgerTransaction::from_bytes(data)?;
        let writes = tx.open(self.encryptor.as_deref())?;

        if let Some(map) = writes.keys().find(|m| !self.schema.contains(m)) {
            return Err(CoreError::UnknownMap(map.clone()));
        }

        let outcome = if writes.contains_key(SIGNATURES_MAP) {
            if writes.len() > 1 {
                return Err(CoreError::serialization(
                    "Signature transaction writes to maps other than the signatures map",
                ));
            }
            DeserialiseSuccess::PassSignature
        } else {
            DeserialiseSuccess::Pass
        };

        self.apply(writes);
        self.version = tx.version;
        Ok(outcome)
    }

    fn apply(&mut self, writes: MapWrites) {
        for (map, entries) in writes {
            let target = self.maps.entry(map).or_default();
            for (key, value) in entries {
                match value {
                    Some(value) => {
                        target.insert(key, value);
                    }
                    None => {
                        target.remove(&key);
                    }
                }
            }
        }
    }
}

impl NodeIdentityLookup for KvStore {
    fn node_info(&self, node: &NodeId) -> Option<NodeInfo> {
        match self.get_typed(NODES_MAP, node) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(node = %node, error = %e, "Undecodable node record");
                None
            }
        }
    }
}
