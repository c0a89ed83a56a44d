//! Asymmetric primitives: RSA-OAEP and ECDH-derived AEAD.
//!
//! RSA-OAEP uses SHA-256 for both the OAEP hash and the MGF. Plaintexts
//! longer than `key_size − 2·hash_len − 2` are split into chunks of that
//! size, encrypted independently and concatenated; decryption requires
//! the ciphertext length to be a positive multiple of the key size.
//!
//! ECDH (P-256) encrypts by generating an ephemeral key pair, deriving an
//! AES-256-GCM key by SHA-256 over the raw shared secret and prefixing
//! the ephemeral public key:
//!
//! ```text
//! bytes 0..64       : ephemeral public key (SEC1 uncompressed)
//! bytes 65..76      : nonce
//! bytes 77..end     : AES-256-GCM output (ciphertext || tag)
//! ```

use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey as _, DecodePublicKey as _};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey as _;
use rsa::pkcs8::{DecodePrivateKey as _, DecodePublicKey as _};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use secrecy::ExposeSecret;
use sha2::Sha256;

use crate::config::AsymmetricConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::load_pem;
use crate::symmetric::{derive_key, SymmetricCipher};

/// SHA-256 output length, which fixes the OAEP overhead.
const HASH_LEN: usize = 32;

/// SEC1 uncompressed point length for P-256.
const P256_PUBLIC_KEY_LEN: usize = 65;

/// The two supported asymmetric algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsymmetricAlgorithm {
    /// RSA with OAEP-SHA256 padding.
    RsaOaep,
    /// Ephemeral P-256 ECDH feeding AES-256-GCM.
    Ecdh,
}

impl AsymmetricAlgorithm {
    /// Parse the configuration name; empty means the RSA default.
    pub fn from_name(name: &str) -> CryptoResult<Self> {
        match name {
            "" | "RSA-OAEP" => Ok(Self::RsaOaep),
            "ECDH" => Ok(Self::Ecdh),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Asymmetric cipher over PEM-configured key material.
///
/// Keys are parsed lazily per operation, so a service that only ever
/// encrypts needs no private key and vice versa.
#[derive(Clone)]
pub struct AsymmetricCipher {
    config: AsymmetricConfig,
    default_algorithm: AsymmetricAlgorithm,
}

impl std::fmt::Debug for AsymmetricCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsymmetricCipher")
            .field("default_algorithm", &self.default_algorithm)
            .finish()
    }
}

impl AsymmetricCipher {
    /// Build the cipher from its configuration section.
    pub fn from_config(config: &AsymmetricConfig) -> CryptoResult<Self> {
        Ok(Self {
            default_algorithm: AsymmetricAlgorithm::from_name(&config.algorithm)?,
            config: config.clone(),
        })
    }

    fn public_pem(&self) -> CryptoResult<String> {
        load_pem(
            self.config.public_key.as_deref(),
            self.config.public_key_file.as_deref(),
        )
    }

    fn private_pem(&self) -> CryptoResult<String> {
        load_pem(
            self.config.private_key.as_ref().map(|s| s.expose_secret().as_str()),
            self.config.private_key_file.as_deref(),
        )
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
        algorithm: AsymmetricAlgorithm,
        plaintext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        match algorithm {
            AsymmetricAlgorithm::RsaOaep => self.encrypt_rsa(plaintext),
            AsymmetricAlgorithm::Ecdh => self.encrypt_ecdh(plaintext),
        }
    }

    /// Decrypt under an explicitly resolved algorithm.
    pub fn decrypt_with(
        &self,
        algorithm: AsymmetricAlgorithm,
        ciphertext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        match algorithm {
            AsymmetricAlgorithm::RsaOaep => self.decrypt_rsa(ciphertext),
            AsymmetricAlgorithm::Ecdh => self.decrypt_ecdh(ciphertext),
        }
    }

    fn encrypt_rsa(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let pem = self.public_pem()?;
        let public_key = RsaPublicKey::from_public_key_pem(&pem)
            .map_err(|e| CryptoError::InvalidKey(format!("RSA public key: {e}")))?;

        let key_size = public_key.size();
        let max_chunk = key_size - 2 * HASH_LEN - 2;
        let mut rng = OsRng;

        // chunks() yields nothing for an empty slice, which still must
        // produce one block.
        let chunks: Vec<&[u8]> = if plaintext.is_empty() {
            vec![&[]]
        } else {
            plaintext.chunks(max_chunk).collect()
        };

        let mut out = Vec::with_capacity(chunks.len() * key_size);
        for chunk in chunks {
            let sealed = public_key
                .encrypt(&mut rng, Oaep::new::<Sha256>(), chunk)
                .map_err(|_| CryptoError::EncryptionFailed)?;
            out.extend_from_slice(&sealed);
        }
        Ok(out)
    }

    fn decrypt_rsa(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let pem = self.private_pem()?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
            .map_err(|e| CryptoError::InvalidKey(format!("RSA private key: {e}")))?;

        let key_size = private_key.size();
        if ciphertext.is_empty() || ciphertext.len() % key_size != 0 {
            return Err(CryptoError::InvalidCiphertextLength);
        }

        let mut out = Vec::new();
        for chunk in ciphertext.chunks_exact(key_size) {
            let plain = private_key
                .decrypt(Oaep::new::<Sha256>(), chunk)
                .map_err(|_| CryptoError::DecryptionFailed)?;
            out.extend_from_slice(&plain);
        }
        Ok(out)
    }

    fn encrypt_ecdh(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let pem = self.public_pem()?;
        let recipient = p256::PublicKey::from_public_key_pem(&pem)
            .map_err(|e| CryptoError::InvalidKey(format!("ECDH public key: {e}")))?;

        let ephemeral = EphemeralSecret::random(&mut OsRng);
        let ephemeral_public = ephemeral.public_key().to_encoded_point(false);

        let shared = ephemeral.diffie_hellman(&recipient);
        let aead = SymmetricCipher::from_raw_key(derive_key(shared.raw_secret_bytes()));
        let sealed = aead.encrypt(plaintext)?;

        let mut out = Vec::with_capacity(P256_PUBLIC_KEY_LEN + sealed.len());
        out.extend_from_slice(ephemeral_public.as_bytes());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt_ecdh(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        if data.len() < P256_PUBLIC_KEY_LEN {
            return Err(CryptoError::CiphertextTooShort);
        }
        let (ephemeral_bytes, sealed) = data.split_at(P256_PUBLIC_KEY_LEN);

        let ephemeral_public = p256::PublicKey::from_sec1_bytes(ephemeral_bytes)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        let pem = self.private_pem()?;
        let secret = p256::SecretKey::from_pkcs8_pem(&pem)
            .map_err(|e| CryptoError::InvalidKey(format!("ECDH private key: {e}")))?;

        let shared = p256::ecdh::diffie_hellman(
            secret.to_nonzero_scalar(),
            ephemeral_public.as_affine(),
        );
        let aead = SymmetricCipher::from_raw_key(derive_key(shared.raw_secret_bytes()));
        aead.decrypt(sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::pkcs8::{EncodePrivateKey as _, EncodePublicKey as _};
    use rsa::pkcs8::{EncodePrivateKey as _, EncodePublicKey as _};
    use secrecy::SecretString;

    fn rsa_cipher() -> AsymmetricCipher {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        AsymmetricCipher::from_config(&AsymmetricConfig {
            algorithm: "RSA-OAEP".to_string(),
            public_key: Some(public_key.to_public_key_pem(Default::default()).unwrap()),
            private_key: Some(SecretString::new(
                private_key.to_pkcs8_pem(Default::default()).unwrap().to_string(),
            )),
            ..Default::default()
        })
        .unwrap()
    }

    fn ecdh_cipher() -> AsymmetricCipher {
        let secret = p256::SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        AsymmetricCipher::from_config(&AsymmetricConfig {
            algorithm: "ECDH".to_string(),
            public_key: Some(public.to_public_key_pem(Default::default()).unwrap()),
            private_key: Some(SecretString::new(
                secret.to_pkcs8_pem(Default::default()).unwrap().to_string(),
            )),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn rsa_roundtrip_across_chunk_boundaries() {
        let cipher = rsa_cipher();
        // 2048-bit key, SHA-256: max chunk is 256 - 64 - 2 = 190 bytes.
        for len in [0usize, 1, 189, 190, 191, 380, 381] {
            let plaintext = vec![0xa5u8; len];
            let sealed = cipher.encrypt(&plaintext).unwrap();
            assert_eq!(sealed.len() % 256, 0);
            assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext, "len {len}");
        }
    }

    #[test]
    fn rsa_rejects_ragged_ciphertext() {
        let cipher = rsa_cipher();
        assert!(matches!(
            cipher.decrypt(&[0u8; 100]),
            Err(CryptoError::InvalidCiphertextLength)
        ));
        assert!(matches!(
            cipher.decrypt(&[]),
            Err(CryptoError::InvalidCiphertextLength)
        ));
    }

    #[test]
    fn ecdh_roundtrip() {
        let cipher = ecdh_cipher();
        for plaintext in [&b""[..], b"x", br#"{"id":"1"}"#, &[7u8; 2048]] {
            let sealed = cipher.encrypt(plaintext).unwrap();
            assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn ecdh_ciphertexts_differ_per_call() {
        let cipher = ecdh_cipher();
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a, b);
        // Fresh ephemeral key every call.
        assert_ne!(&a[..P256_PUBLIC_KEY_LEN], &b[..P256_PUBLIC_KEY_LEN]);
    }

    #[test]
    fn ecdh_layout_prefixes_uncompressed_point() {
        let cipher = ecdh_cipher();
        let sealed = cipher.encrypt(b"payload").unwrap();
        assert_eq!(sealed[0], 0x04);
        assert!(sealed.len() > P256_PUBLIC_KEY_LEN + 12);
    }

    #[test]
    fn ecdh_short_input_is_rejected() {
        let cipher = ecdh_cipher();
        assert!(matches!(
            cipher.decrypt(&[0u8; P256_PUBLIC_KEY_LEN - 1]),
            Err(CryptoError::CiphertextTooShort)
        ));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        assert!(matches!(
            AsymmetricAlgorithm::from_name("X25519"),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }
}
