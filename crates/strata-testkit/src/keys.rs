//! Deterministic node keys

use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use strata_core::{NodeId, NodeInfo};

/// Signing identity of a test node
#[derive(Debug, Clone)]
pub struct KeyTestFixture {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    node_id: NodeId,
}

impl KeyTestFixture {
    /// Key derived directly from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();
        let node_id = NodeId::new(format!("node_{}", hex_prefix(verifying_key.as_bytes())));

        Self {
            signing_key,
            verifying_key,
            node_id,
        }
    }

    /// Key derived from the SHA-256 of a seed string
    pub fn from_seed_string(seed: &str) -> Self {
        let digest: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
        Self::from_seed(&digest)
    }

    /// Signing key
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Verifying key
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Identifier the node signs under
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Certificate bytes as stored in the membership table
    pub fn cert(&self) -> Vec<u8> {
        self.verifying_key.to_bytes().to_vec()
    }

    /// Trusted membership record for this node
    pub fn node_info(&self) -> NodeInfo {
        NodeInfo::trusted(self.cert())
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}
