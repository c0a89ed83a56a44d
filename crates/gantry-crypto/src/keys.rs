//! Key material resolution.
//!
//! Every primitive resolves keys the same way: the configured literal
//! wins (base64 for symmetric/HMAC, PEM for RSA/ECDH); otherwise a file
//! path is read and its contents tried as base64 first, then taken as
//! raw bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;

use crate::error::{CryptoError, CryptoResult};

/// Resolve raw key bytes from a base64 literal or a file fallback.
pub fn load_key_bytes(
    literal: Option<&SecretString>,
    file: Option<&Path>,
) -> CryptoResult<Vec<u8>> {
    if let Some(literal) = literal {
        let encoded = literal.expose_secret();
        if !encoded.is_empty() {
            return STANDARD
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKey(format!("key is not valid base64: {e}")));
        }
    }

    if let Some(path) = file {
        let contents = std::fs::read(path)?;
        let trimmed = String::from_utf8_lossy(&contents);
        if let Ok(decoded) = STANDARD.decode(trimmed.trim()) {
            return Ok(decoded);
        }
        return Ok(contents);
    }

    Err(CryptoError::MissingKey)
}

/// Resolve PEM text from a literal or a file fallback.
pub fn load_pem(literal: Option<&str>, file: Option<&Path>) -> CryptoResult<String> {
    if let Some(pem) = literal {
        if !pem.is_empty() {
            return Ok(pem.to_string());
        }
    }
    if let Some(path) = file {
        let contents = std::fs::read_to_string(path)?;
        return Ok(contents);
    }
    Err(CryptoError::MissingKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn literal_base64_wins() {
        let literal = SecretString::new(STANDARD.encode(b"super secret"));
        let bytes = load_key_bytes(Some(&literal), None).unwrap();
        assert_eq!(bytes, b"super secret");
    }

    #[test]
    fn invalid_literal_is_an_error() {
        let literal = SecretString::new("!!not base64!!".to_string());
        assert!(matches!(
            load_key_bytes(Some(&literal), None),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn file_contents_try_base64_then_raw() {
        let mut encoded = tempfile::NamedTempFile::new().unwrap();
        write!(encoded, "{}", STANDARD.encode(b"from base64 file")).unwrap();
        assert_eq!(
            load_key_bytes(None, Some(encoded.path())).unwrap(),
            b"from base64 file"
        );

        let mut raw = tempfile::NamedTempFile::new().unwrap();
        raw.write_all(&[0xff, 0x00, 0x7f]).unwrap();
        assert_eq!(load_key_bytes(None, Some(raw.path())).unwrap(), vec![0xff, 0x00, 0x7f]);
    }

    #[test]
    fn nothing_configured_is_missing_key() {
        assert!(matches!(load_key_bytes(None, None), Err(CryptoError::MissingKey)));
        assert!(matches!(load_pem(None, None), Err(CryptoError::MissingKey)));
    }
}
