//! Encryption of the private section of ledger transactions
//!
//! Sealed payloads are `nonce (12 bytes) || ciphertext`. The transaction
//! version is bound as associated data so a sealed section cannot be moved
//! to a different transaction.

use crate::error::{CoreError, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;

/// Seals and opens the private writes of a transaction
pub trait TxEncryptor: Send + Sync {
    /// Encrypt `plain` for the transaction at `version`
    fn encrypt(&self, version: u64, plain: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a sealed section of the transaction at `version`
    fn decrypt(&self, version: u64, sealed: &[u8]) -> Result<Vec<u8>>;
}

/// ChaCha20-Poly1305 ledger encryptor
pub struct ChaChaTxEncryptor {
    key: Zeroizing<[u8; 32]>,
}

impl ChaChaTxEncryptor {
    /// Create an encryptor from a 32-byte ledger secret
    pub fn new(ledger_secret: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(ledger_secret),
        }
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key[..]))
    }
}

impl fmt::Debug for ChaChaTxEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaChaTxEncryptor").finish_non_exhaustive()
    }
}

impl TxEncryptor for ChaChaTxEncryptor {
    fn encrypt(&self, version: u64, plain: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let aad = version.to_le_bytes();
        let ciphertext = self
            .cipher()
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plain,
                    aad: &aad,
                },
            )
            .map_err(|e| CoreError::crypto(format!("ChaCha20-Poly1305 encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, version: u64, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(CoreError::crypto(format!(
                "Sealed payload too short: {} bytes",
                sealed.len()
            )));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let aad = version.to_le_bytes();
        self.cipher()
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|e| CoreError::crypto(format!("ChaCha20-Poly1305 decryption failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_payload_opens_under_same_version() {
        let encryptor = ChaChaTxEncryptor::new([3u8; 32]);
        let sealed = encryptor.encrypt(12, b"private writes").unwrap();

        assert_eq!(encryptor.decrypt(12, &sealed).unwrap(), b"private writes");
    }

    #[test]
    fn sealed_payload_is_bound_to_version() {
        let encryptor = ChaChaTxEncryptor::new([3u8; 32]);
        let sealed = encryptor.encrypt(12, b"private writes").unwrap();

        assert!(encryptor.decrypt(13, &sealed).is_err());
    }

    #[test]
    fn wrong_secret_cannot_open() {
        let sealed = ChaChaTxEncryptor::new([3u8; 32])
            .encrypt(1, b"data")
            .unwrap();

        assert!(ChaChaTxEncryptor::new([4u8; 32]).decrypt(1, &sealed).is_err());
        assert!(ChaChaTxEncryptor::new([3u8; 32]).decrypt(1, &sealed[..5]).is_err());
    }
}
