//! HMAC signature generation and verification.
//!
//! Deliveries carry `X-Webhook-Signature: sha256=<hex>`, where the digest is
//! HMAC-SHA256 of the exact request body keyed with the subscription secret.
//! Receivers must compare signatures in constant time; [`WebhookSigner::verify`]
//! and [`WebhookSigner::verify_header`] do so.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Webhook signer for generating and verifying signatures.
pub struct WebhookSigner {
    secret: String,
}

impl WebhookSigner {
    /// Creates a new signer with the given secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Generates the hex-encoded signature for a payload.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.mac(payload).finalize().into_bytes())
    }

    /// Generates a full signature header value.
    pub fn sign_header(&self, payload: &[u8]) -> String {
        format!("{}{}", SIGNATURE_PREFIX, self.sign(payload))
    }

    /// Verifies a hex-encoded signature against the payload.
    pub fn verify(&self, signature: &str, payload: &[u8]) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        self.mac(payload).verify_slice(&expected).is_ok()
    }

    /// Parses and verifies a `sha256=<hex>` header value.
    pub fn verify_header(&self, header: &str, payload: &[u8]) -> Result<(), SignatureError> {
        let signature = header
            .trim()
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(SignatureError::InvalidFormat)?;

        if !self.verify(signature, payload) {
            return Err(SignatureError::Invalid);
        }

        Ok(())
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(payload);
        mac
    }
}

/// Signature verification errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Invalid signature format.
    #[error("Invalid signature format")]
    InvalidFormat,
    /// Signature is invalid.
    #[error("Invalid signature")]
    Invalid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = WebhookSigner::new("test-secret");
        let payload = b"test payload";

        let signature = signer.sign(payload);
        assert_eq!(signature.len(), 64);
        assert!(signer.verify(&signature, payload));

        // Wrong payload should fail
        assert!(!signer.verify(&signature, b"wrong payload"));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let signer = WebhookSigner::new("Jefe");
        assert_eq!(
            signer.sign(b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_sign_header() {
        let signer = WebhookSigner::new("test-secret");
        let header = signer.sign_header(b"test payload");
        assert!(header.starts_with("sha256="));
        assert_eq!(signer.verify_header(&header, b"test payload"), Ok(()));
    }

    #[test]
    fn test_verify_header_errors() {
        let signer = WebhookSigner::new("test-secret");
        let payload = b"test payload";
        let bare = signer.sign(payload);

        assert_eq!(
            signer.verify_header(&bare, payload),
            Err(SignatureError::InvalidFormat)
        );
        assert_eq!(
            signer.verify_header("sha256=not-hex", payload),
            Err(SignatureError::Invalid)
        );

        let other = WebhookSigner::new("other-secret").sign_header(payload);
        assert_eq!(
            signer.verify_header(&other, payload),
            Err(SignatureError::Invalid)
        );
    }
}
