//! Subscription secret generation.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

use crate::config::WebhookConfig;

/// Generates URL-safe signing secrets for subscriptions.
#[derive(Debug, Clone)]
pub struct SecretGenerator {
    /// Prefix prepended to every secret.
    prefix: String,
    /// Number of random bytes before encoding.
    bytes: usize,
}

impl SecretGenerator {
    /// Creates a new secret generator.
    pub fn new(prefix: impl Into<String>, bytes: usize) -> Self {
        Self {
            prefix: prefix.into(),
            bytes,
        }
    }

    /// Creates a generator from engine configuration.
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(config.secret_prefix.clone(), config.secret_bytes)
    }

    /// Generates a new secret.
    pub fn generate(&self) -> String {
        let mut buf = vec![0u8; self.bytes];
        rand::thread_rng().fill_bytes(&mut buf);
        format!("{}{}", self.prefix, URL_SAFE_NO_PAD.encode(&buf))
    }
}

impl Default for SecretGenerator {
    fn default() -> Self {
        Self::new("whsec_", 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_format() {
        let secret = SecretGenerator::default().generate();

        assert!(secret.starts_with("whsec_"));
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(secret.len(), "whsec_".len() + 43);
        assert!(
            secret["whsec_".len()..]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_uniqueness() {
        let generator = SecretGenerator::default();
        let secrets: Vec<String> = (0..100).map(|_| generator.generate()).collect();

        let unique: std::collections::HashSet<_> = secrets.iter().collect();
        assert_eq!(unique.len(), secrets.len());
    }
}
