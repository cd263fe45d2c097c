//! Error type for ledger primitives

/// Errors raised by ledger primitives
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Encoding or decoding failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// What failed to encode or decode
        message: String,
    },

    /// Encryption, decryption or signature verification failed
    #[error("Crypto error: {message}")]
    Crypto {
        /// Description of the cryptographic failure
        message: String,
    },

    /// A Merkle tree is structurally unusable
    #[error("Invalid Merkle tree: {0}")]
    InvalidTree(String),

    /// A transaction wrote to a map that is not part of the store schema
    #[error("Map {0} is not part of the store schema")]
    UnknownMap(String),

    /// A transaction carries private writes but the store has no encryptor
    #[error("Private writes present but no encryptor is configured")]
    MissingEncryptor,
}

impl CoreError {
    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }
}

impl From<bincode::Error> for CoreError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Result alias for ledger primitives
pub type Result<T> = std::result::Result<T, CoreError>;
