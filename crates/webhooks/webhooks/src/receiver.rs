//! Webhook receiver for verifying incoming webhooks.

use serde_json::Value;

use crate::envelope::EventEnvelope;
use crate::error::{WebhookError, WebhookResult};
use crate::signature::WebhookSigner;

/// Verifies deliveries on the subscriber side.
///
/// The signature must be checked against the raw request body, before any
/// JSON parsing or re-serialization.
pub struct WebhookReceiver {
    signer: WebhookSigner,
}

impl WebhookReceiver {
    /// Creates a receiver for a subscription secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            signer: WebhookSigner::new(secret),
        }
    }

    /// Verifies the signature header and parses the envelope.
    pub fn verify(&self, signature: &str, payload: &[u8]) -> WebhookResult<EventEnvelope> {
        self.verify_signature(signature, payload)?;
        Ok(serde_json::from_slice(payload)?)
    }

    /// Verifies the signature header and returns the raw JSON value.
    pub fn verify_raw(&self, signature: &str, payload: &[u8]) -> WebhookResult<Value> {
        self.verify_signature(signature, payload)?;
        Ok(serde_json::from_slice(payload)?)
    }

    /// Verifies only the signature without parsing.
    pub fn verify_signature(&self, signature: &str, payload: &[u8]) -> WebhookResult<()> {
        self.signer
            .verify_header(signature, payload)
            .map_err(|_| WebhookError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::PreparedPayload;

    fn signed_payload(secret: &str) -> (String, PreparedPayload) {
        let mut data = serde_json::Map::new();
        data.insert("user_id".to_string(), Value::from("456"));
        let payload = PreparedPayload::new(EventEnvelope::new("user.created", None, data)).unwrap();
        let header = WebhookSigner::new(secret).sign_header(payload.body.as_bytes());
        (header, payload)
    }

    #[test]
    fn test_verify_parses_envelope() {
        let (header, payload) = signed_payload("whsec_abc");
        let receiver = WebhookReceiver::new("whsec_abc");

        let envelope = receiver.verify(&header, payload.body.as_bytes()).unwrap();
        assert_eq!(envelope, payload.envelope);
        assert_eq!(envelope.data["user_id"], "456");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (header, payload) = signed_payload("whsec_abc");
        let receiver = WebhookReceiver::new("whsec_other");

        let err = receiver.verify(&header, payload.body.as_bytes()).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let (header, payload) = signed_payload("whsec_abc");
        let receiver = WebhookReceiver::new("whsec_abc");
        let tampered = payload.body.replace("456", "457");

        assert!(receiver.verify_signature(&header, tampered.as_bytes()).is_err());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let (header, payload) = signed_payload("whsec_abc");
        let receiver = WebhookReceiver::new("whsec_abc");
        let bare = header.trim_start_matches("sha256=");

        assert!(matches!(
            receiver.verify_signature(bare, payload.body.as_bytes()),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_signed_garbage_is_invalid_payload() {
        let body = b"not json";
        let header = WebhookSigner::new("whsec_abc").sign_header(body);
        let receiver = WebhookReceiver::new("whsec_abc");

        assert!(matches!(
            receiver.verify_raw(&header, body),
            Err(WebhookError::InvalidPayload(_))
        ));
    }
}
