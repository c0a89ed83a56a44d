//! Encryption configuration sections.
//!
//! The `encryption` block carries the global switch, the per-primitive key
//! material, per-group and per-service overrides and the whitelist that
//! bypasses the envelope entirely.

use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Tier settings shared by the global block and the per-group/per-service
/// overrides. Empty `mode`/`algorithm` fields defer to the next tier.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Whether the envelope applies at this tier.
    pub enabled: bool,
    /// `symmetric` or `asymmetric`; empty defers.
    pub mode: String,
    /// Algorithm name; empty defers.
    pub algorithm: String,
}

/// Symmetric key material.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SymmetricConfig {
    /// `AES256-GCM` (default) or `ChaCha20-Poly1305`.
    pub algorithm: String,
    /// Base64-encoded key material.
    pub key: Option<SecretString>,
    /// File fallback; contents tried as base64, then as raw bytes.
    pub key_file: Option<PathBuf>,
}

/// Asymmetric key material.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AsymmetricConfig {
    /// `RSA-OAEP` (default) or `ECDH`.
    pub algorithm: String,
    /// PEM public key.
    pub public_key: Option<String>,
    /// PEM private key.
    pub private_key: Option<SecretString>,
    /// File fallback for the public key.
    pub public_key_file: Option<PathBuf>,
    /// File fallback for the private key.
    pub private_key_file: Option<PathBuf>,
}

/// HMAC signature settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Top-level signature gate; no per-service override exists.
    pub enabled: bool,
    /// `HMAC-SHA256` (default).
    pub algorithm: String,
    /// Base64-encoded signing key.
    pub key: Option<SecretString>,
    /// File fallback; contents tried as base64, then as raw bytes.
    pub key_file: Option<PathBuf>,
}

/// Services and groups that bypass the envelope entirely.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Whitelist {
    /// Group names that bypass.
    pub groups: Vec<String>,
    /// Service names that bypass.
    pub services: Vec<String>,
}

/// The full `encryption` configuration block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Lowest-priority tier.
    pub global: TierConfig,
    /// Symmetric key material and default algorithm.
    pub symmetric: SymmetricConfig,
    /// Asymmetric key material and default algorithm.
    pub asymmetric: AsymmetricConfig,
    /// Signature settings.
    pub signature: SignatureConfig,
    /// Per-group overrides.
    pub groups: HashMap<String, TierConfig>,
    /// Per-service overrides (highest non-whitelist priority).
    pub services: HashMap<String, TierConfig>,
    /// Bypass list, consulted before every other tier.
    pub whitelist: Whitelist,
}
