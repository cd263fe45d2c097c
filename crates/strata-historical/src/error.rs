//! Historical cache errors
//!
//! None of these escape the cache's host-facing entry points: a failed
//! delivery is logged and reported as `false`.

use strata_core::NodeId;

/// Errors raised while processing a delivered ledger entry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoricalError {
    /// The entry could not be decoded, decrypted or replayed
    #[error("Unable to deserialise entry {index}: {reason}")]
    Deserialise {
        /// Ledger index of the entry
        index: u64,
        /// Underlying failure
        reason: String,
    },

    /// A signature transaction without a usable signature record or tree
    #[error("Malformed signature transaction at {index}: {reason}")]
    MalformedSignature {
        /// Ledger index of the signature transaction
        index: u64,
        /// What was missing or undecodable
        reason: String,
    },

    /// The claimed root does not match the root recomputed from the tree
    #[error("Invalid signature at {index}: invalid root")]
    InvalidRoot {
        /// Ledger index of the signature transaction
        index: u64,
    },

    /// The signing node is not in the membership table
    #[error("Signature {index} claims it was produced by node {node}: this node is unknown")]
    UnknownNode {
        /// Ledger index of the signature transaction
        index: u64,
        /// Claimed signer
        node: NodeId,
    },

    /// The signature does not verify under the node's certificate
    #[error("Signature at {index} is invalid")]
    InvalidSignature {
        /// Ledger index of the signature transaction
        index: u64,
    },

    /// Configuration could not be loaded or is out of range
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HistoricalError {
    /// Whether this is a rejected signature rather than unusable input
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidRoot { .. } | Self::UnknownNode { .. } | Self::InvalidSignature { .. }
        )
    }

    /// Ledger index the error refers to, if any
    pub fn index(&self) -> Option<u64> {
        match self {
            Self::Deserialise { index, .. }
            | Self::MalformedSignature { index, .. }
            | Self::InvalidRoot { index }
            | Self::UnknownNode { index, .. }
            | Self::InvalidSignature { index } => Some(*index),
            Self::Config(_) => None,
        }
    }
}

/// Result alias for the historical cache
pub type Result<T> = std::result::Result<T, HistoricalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_errors_carry_their_index() {
        let errors = [
            HistoricalError::Deserialise {
                index: 3,
                reason: "truncated".into(),
            },
            HistoricalError::MalformedSignature {
                index: 3,
                reason: "no tree".into(),
            },
            HistoricalError::InvalidRoot { index: 3 },
            HistoricalError::UnknownNode {
                index: 3,
                node: NodeId::from("n9"),
            },
            HistoricalError::InvalidSignature { index: 3 },
        ];
        for error in &errors {
            assert_eq!(error.index(), Some(3), "{error}");
        }
        assert_eq!(HistoricalError::Config("bad".into()).index(), None);
    }

    #[test]
    fn only_rejected_signatures_are_verification_failures() {
        assert!(HistoricalError::InvalidRoot { index: 1 }.is_verification_failure());
        assert!(HistoricalError::InvalidSignature { index: 1 }.is_verification_failure());
        assert!(!HistoricalError::MalformedSignature {
            index: 1,
            reason: "missing".into(),
        }
        .is_verification_failure());
        assert!(!HistoricalError::Config("bad".into()).is_verification_failure());
    }
}
