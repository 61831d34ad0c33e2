//! At-rest encryption seam for stored page payloads.
//!
//! Browsers delegate this to platform crypto, so the engine does the same:
//! the host injects a cipher and the store only sees opaque bytes. Payloads
//! are the raw serialized JSON (UTF-8), so multi-byte text survives the
//! round trip unchanged.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EncryptionError {
    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Symmetric cipher supplied by the host.
pub trait HistoryEncryption: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, EncryptionError>;
}
