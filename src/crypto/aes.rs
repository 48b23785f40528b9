//! AES-256-GCM sealing of session identifiers for the cross-domain bridge
//!
//! A token is `nonce || ciphertext+tag`, encoded as URL-safe base64 without
//! padding so it can travel in a query string unescaped. The nonce is random
//! per call, so sealing the same id twice yields different tokens.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
    Engine,
};
use rand::Rng;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encryption key for AES-256-GCM
#[derive(Clone)]
pub struct EncryptionKey {
    key: [u8; 32],
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Encryption error types
#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("Invalid key: must be exactly 32 bytes (256 bits)")]
    InvalidKeyLength,

    #[error("Invalid base64 encoding: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid token or wrong key")]
    DecryptionFailed,

    #[error("Token too short")]
    TruncatedToken,
}

impl EncryptionKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Create encryption key from a standard base64-encoded string
    pub fn from_base64(encoded: &str) -> Result<Self, EncryptionError> {
        let bytes = BASE64.decode(encoded.trim())?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EncryptionError::InvalidKeyLength)?;
        Ok(Self { key })
    }

    /// Generate a random key. Sessions bridged with it do not survive a restart.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill(&mut key);
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    fn cipher(&self) -> Result<Aes256Gcm, EncryptionError> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|_| EncryptionError::InvalidKeyLength)
    }
}

/// Seal a session identifier into a query-safe token.
pub fn encrypt(key: &EncryptionKey, plaintext: &str) -> Result<String, EncryptionError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill(&mut nonce_bytes);

    let ciphertext = key
        .cipher()?
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(URL_SAFE_NO_PAD.encode(sealed))
}

/// Open a token produced by [encrypt]. Any tampering fails authentication.
pub fn decrypt(key: &EncryptionKey, token: &str) -> Result<String, EncryptionError> {
    let sealed = URL_SAFE_NO_PAD.decode(token)?;
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(EncryptionError::TruncatedToken);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let plaintext = key
        .cipher()?
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| EncryptionError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| EncryptionError::DecryptionFailed)
}
