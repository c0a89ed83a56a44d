//! HMAC signatures over envelope ciphertext.
//!
//! Signatures cover the raw ciphertext bytes, not their base64 form, and
//! are verified before any decryption happens.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::SignatureConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::load_key_bytes;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer.
pub struct Signer {
    key: Vec<u8>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish()
    }
}

impl Signer {
    /// Load the signing key from configuration.
    pub fn from_config(config: &SignatureConfig) -> CryptoResult<Self> {
        match config.algorithm.as_str() {
            "" | "HMAC-SHA256" => {}
            other => return Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
        let key = load_key_bytes(config.key.as_ref(), config.key_file.as_deref())?;
        Ok(Self { key })
    }

    /// Sign `data`, returning the 32-byte MAC.
    pub fn sign(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Verify `signature` over `data` in constant time.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        mac.update(data);
        mac.verify_slice(signature)
            .map_err(|_| CryptoError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use secrecy::SecretString;

    fn signer() -> Signer {
        Signer::from_config(&SignatureConfig {
            enabled: true,
            algorithm: "HMAC-SHA256".to_string(),
            key: Some(SecretString::new(STANDARD.encode(b"signing key"))),
            key_file: None,
        })
        .unwrap()
    }

    #[test]
    fn sign_verify_roundtrip() {
        let signer = signer();
        for data in [&b""[..], b"x", &[0u8; 1024]] {
            let mac = signer.sign(data).unwrap();
            assert_eq!(mac.len(), 32);
            signer.verify(data, &mac).unwrap();
        }
    }

    #[test]
    fn any_bit_flip_fails() {
        let signer = signer();
        let data = b"the quick brown fox".to_vec();
        let mac = signer.sign(&data).unwrap();

        let mut flipped_data = data.clone();
        flipped_data[3] ^= 0x01;
        assert!(matches!(
            signer.verify(&flipped_data, &mac),
            Err(CryptoError::SignatureMismatch)
        ));

        let mut flipped_mac = mac.clone();
        flipped_mac[0] ^= 0x80;
        assert!(matches!(
            signer.verify(&data, &flipped_mac),
            Err(CryptoError::SignatureMismatch)
        ));
    }

    #[test]
    fn truncated_mac_fails() {
        let signer = signer();
        let mac = signer.sign(b"data").unwrap();
        assert!(signer.verify(b"data", &mac[..16]).is_err());
        assert!(signer.verify(b"data", &[]).is_err());
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let err = Signer::from_config(&SignatureConfig {
            algorithm: "HMAC-MD5".to_string(),
            key: Some(SecretString::new(STANDARD.encode(b"k"))),
            ..Default::default()
        });
        assert!(matches!(err, Err(CryptoError::UnsupportedAlgorithm(_))));
    }
}
