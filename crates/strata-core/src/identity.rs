//! Replica identities and the membership lookup used to verify signatures
//!
//! The lookup answers with the *current* membership record of a node. It is
//! not versioned by ledger index, so verifying a historical signature is only
//! sound while membership records are never deleted or replaced. A retired
//! node's record stays readable and its old signatures keep verifying; a node
//! whose certificate was rotated can no longer have signatures made under the
//! previous certificate verified.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a replica in the service
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Membership status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Joined but not yet trusted by governance
    Pending,
    /// Active member of the service
    Trusted,
    /// Removed from the service
    Retired,
}

/// Membership record of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Ed25519 public key bytes the node signs Merkle roots with
    pub cert: Vec<u8>,
    /// Current membership status
    pub status: NodeStatus,
}

impl NodeInfo {
    /// Record for an active node
    pub fn trusted(cert: impl Into<Vec<u8>>) -> Self {
        Self {
            cert: cert.into(),
            status: NodeStatus::Trusted,
        }
    }
}

/// Read-only view of the membership table
pub trait NodeIdentityLookup {
    /// Current membership record of `node`, if it is known
    fn node_info(&self, node: &NodeId) -> Option<NodeInfo>;
}

impl<T: NodeIdentityLookup + ?Sized> NodeIdentityLookup for std::sync::Arc<T> {
    fn node_info(&self, node: &NodeId) -> Option<NodeInfo> {
        (**self).node_info(node)
    }
}

impl<T: NodeIdentityLookup + ?Sized> NodeIdentityLookup for &T {
    fn node_info(&self, node: &NodeId) -> Option<NodeInfo> {
        (**self).node_info(node)
    }
}
