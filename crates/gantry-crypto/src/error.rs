//! Crypto engine errors.
//!
//! Every primitive fails closed: an error means no plaintext, no partial
//! output, nothing usable leaked to the caller.

/// Errors from the crypto engine.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// No key material configured for the requested primitive.
    #[error("no encryption key configured")]
    MissingKey,
    /// Key material exists but cannot be decoded or parsed.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    /// Input shorter than the minimum layout (nonce, ephemeral key).
    #[error("ciphertext too short")]
    CiphertextTooShort,
    /// RSA ciphertext length is not a positive multiple of the key size.
    #[error("invalid ciphertext length for RSA decryption")]
    InvalidCiphertextLength,
    /// AEAD or RSA decryption failed integrity or padding checks.
    #[error("decryption failed")]
    DecryptionFailed,
    /// Encryption failed inside the primitive.
    #[error("encryption failed")]
    EncryptionFailed,
    /// HMAC comparison failed.
    #[error("signature verification failed")]
    SignatureMismatch,
    /// Algorithm name not recognised by this engine.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// Encryption mode not recognised by this engine.
    #[error("unsupported encryption mode: {0}")]
    UnsupportedMode(String),
    /// Key file could not be read.
    #[error("failed to read key file: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
