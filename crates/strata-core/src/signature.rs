//! Signed Merkle roots
//!
//! Consensus periodically appends a signature transaction holding the Merkle
//! tree of the entries since the previous signature, its root, and the
//! primary's Ed25519 signature over that root.

use crate::error::{CoreError, Result};
use crate::hash::Sha256Hash;
use crate::identity::NodeId;
use crate::merkle::MerkleTreeHistory;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Signature record stored in the signatures map of a signature transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimarySignature {
    /// Node that produced the signature
    pub node: NodeId,
    /// Ledger index of the signature transaction itself
    pub seqno: u64,
    /// Claimed Merkle root
    pub root: Sha256Hash,
    /// Ed25519 signature over `root`
    pub sig: Vec<u8>,
    /// Serialised [`MerkleTreeHistory`] the root was computed from
    pub tree: Vec<u8>,
}

impl PrimarySignature {
    /// Sign the root of `tree` as `node`
    pub fn sign(
        node: NodeId,
        seqno: u64,
        tree: &MerkleTreeHistory,
        signing_key: &SigningKey,
    ) -> Result<Self> {
        let root = tree.root();
        Ok(Self {
            node,
            seqno,
            root,
            sig: sign_root(signing_key, &root),
            tree: tree.serialise()?,
        })
    }

    /// Decode the embedded Merkle tree
    pub fn tree(&self) -> Result<MerkleTreeHistory> {
        MerkleTreeHistory::deserialise(&self.tree)
    }
}

/// Sign a Merkle root
pub fn sign_root(signing_key: &SigningKey, root: &Sha256Hash) -> Vec<u8> {
    signing_key.sign(root.as_bytes()).to_bytes().to_vec()
}

/// Verify `sig` over `root` with the Ed25519 public key in `cert`
pub fn verify_root(cert: &[u8], root: &Sha256Hash, sig: &[u8]) -> Result<()> {
    let key_bytes: [u8; 32] = cert.try_into().map_err(|_| {
        CoreError::crypto(format!(
            "Invalid certificate length: expected 32 bytes, got {}",
            cert.len()
        ))
    })?;
    let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|e| CoreError::crypto(e.to_string()))?;
    let signature = Signature::from_slice(sig).map_err(|e| CoreError::crypto(e.to_string()))?;

    verifying_key
        .verify(root.as_bytes(), &signature)
        .map_err(|e| CoreError::crypto(format!("Signature verification failed: {e}")))
}
