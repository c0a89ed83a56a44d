//! Cryptographic envelope for the gantry service framework.
//!
//! Three symmetric-equivalent primitives sit at the same layer — AEAD
//! (AES-256-GCM / ChaCha20-Poly1305), RSA-OAEP and ECDH-derived AEAD —
//! plus HMAC-SHA256 request/response signatures and the three-tier
//! resolver that decides, per service invocation, whether and how the
//! envelope applies.

pub mod asymmetric;
pub mod config;
pub mod error;
pub mod keys;
pub mod policy;
pub mod sign;
pub mod symmetric;

pub use asymmetric::{AsymmetricAlgorithm, AsymmetricCipher};
pub use config::{
    AsymmetricConfig, EncryptionConfig, SignatureConfig, SymmetricConfig, TierConfig, Whitelist,
};
pub use error::{CryptoError, CryptoResult};
pub use policy::{Decision, EncryptionResolver};
pub use sign::Signer;
pub use symmetric::{SymmetricAlgorithm, SymmetricCipher};
