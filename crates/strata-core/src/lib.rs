//! # Strata Core - ledger primitives
//!
//! Types shared by the live store and the historical state cache:
//!
//! - **Digests**: SHA-256 entry and node hashes
//! - **Merkle history**: the tree a signature transaction commits to
//! - **Identities**: node membership records and their lookup
//! - **Signed roots**: Ed25519 signatures over Merkle roots
//! - **Transactions**: ledger entry wire format with sealed private writes
//! - **Key-value store**: the live store and the snapshots rebuilt from entries
//!
//! Nothing here performs I/O. Consensus decides what goes into the ledger;
//! this crate only describes what a ledger entry looks like and how to
//! check it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod encryptor;
pub mod error;
pub mod hash;
pub mod identity;
pub mod kv;
pub mod merkle;
pub mod signature;
pub mod tx;

pub use encryptor::{ChaChaTxEncryptor, TxEncryptor};
pub use error::{CoreError, Result};
pub use hash::Sha256Hash;
pub use identity::{NodeId, NodeIdentityLookup, NodeInfo, NodeStatus};
pub use kv::{DeserialiseSuccess, KvStore, Schema};
pub use merkle::MerkleTreeHistory;
pub use signature::{sign_root, verify_root, PrimarySignature};
pub use tx::{LedgerTransaction, WriteSet, NODES_MAP, SIGNATURES_MAP, SIGNATURE_KEY};
