//! Symmetric AEAD primitives.
//!
//! A 32-byte key is derived by SHA-256 over the configured key material,
//! whatever its original length. Ciphertext layout for both algorithms:
//!
//! ```text
//! bytes 0..11   : nonce
//! bytes 12..end : AEAD output (ciphertext || tag)
//! ```

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use chacha20poly1305::ChaCha20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::config::SymmetricConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::load_key_bytes;

pub(crate) const NONCE_LEN: usize = 12;

/// The two supported AEAD algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymmetricAlgorithm {
    /// AES-256 in GCM mode.
    Aes256Gcm,
    /// ChaCha20 with Poly1305.
    ChaCha20Poly1305,
}

impl SymmetricAlgorithm {
    /// Parse the configuration name; empty means the AES default.
    pub fn from_name(name: &str) -> CryptoResult<Self> {
        match name {
            "" | "AES256-GCM" => Ok(Self::Aes256Gcm),
            "ChaCha20-Poly1305" => Ok(Self::ChaCha20Poly1305),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Symmetric AEAD cipher with a derived 256-bit key.
pub struct SymmetricCipher {
    key: [u8; 32],
    default_algorithm: SymmetricAlgorithm,
}

impl std::fmt::Debug for SymmetricCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricCipher")
            .field("default_algorithm", &self.default_algorithm)
            .finish()
    }
}

impl SymmetricCipher {
    /// Load key material from configuration and derive the AEAD key.
    pub fn from_config(config: &SymmetricConfig) -> CryptoResult<Self> {
        let material = load_key_bytes(config.key.as_ref(), config.key_file.as_deref())?;
        Ok(Self {
            key: derive_key(&material),
            default_algorithm: SymmetricAlgorithm::from_name(&config.algorithm)?,
        })
    }

    /// Cipher directly over raw key material (used by the ECDH path).
    pub(crate) fn from_raw_key(key: [u8; 32]) -> Self {
        Self {
            key,
            default_algorithm: SymmetricAlgorithm::Aes256Gcm,
        }
    }

    /// Encrypt under the configured default algorithm.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        self.encrypt_with(self.default_algorithm, plaintext)
    }

    /// Decrypt under the configured default algorithm.
    pub fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        self.decrypt_with(self.default_algorithm, ciphertext)
    }

    /// Encrypt under an explicitly resolved algorithm.
    pub fn encrypt_with(
        &self,
        algorithm: SymmetricAlgorithm,
        plaintext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let sealed = match algorithm {
            SymmetricAlgorithm::Aes256Gcm => Aes256Gcm::new((&self.key).into())
                .encrypt(Nonce::from_slice(&nonce), plaintext)
                .map_err(|_| CryptoError::EncryptionFailed)?,
            SymmetricAlgorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new((&self.key).into())
                .encrypt(Nonce::from_slice(&nonce), plaintext)
                .map_err(|_| CryptoError::EncryptionFailed)?,
        };

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt under an explicitly resolved algorithm.
    pub fn decrypt_with(
        &self,
        algorithm: SymmetricAlgorithm,
        ciphertext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN {
            return Err(CryptoError::CiphertextTooShort);
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);

        match algorithm {
            SymmetricAlgorithm::Aes256Gcm => Aes256Gcm::new((&self.key).into())
                .decrypt(Nonce::from_slice(nonce), sealed)
                .map_err(|_| CryptoError::DecryptionFailed),
            SymmetricAlgorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new((&self.key).into())
                .decrypt(Nonce::from_slice(nonce), sealed)
                .map_err(|_| CryptoError::DecryptionFailed),
        }
    }
}

/// SHA-256 of the key material, so any key length yields a 256-bit key.
pub(crate) fn derive_key(material: &[u8]) -> [u8; 32] {
    Sha256::digest(material).into()
}
