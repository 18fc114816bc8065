//! Payment callback signatures.
//!
//! The gateway signs each callback with the lower-case hex SHA-512 of
//! `order_id ‖ status_code ‖ gross_amount ‖ server_key`. The comparison runs
//! in constant time.

use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha512};
use thiserror::Error;

/// Signature verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The callback carried no signature
    #[error("Missing signature")]
    Missing,

    /// The signature does not match the payload
    #[error("Invalid signature")]
    Mismatch,
}

/// Verifies gateway callback signatures with the merchant server key.
#[derive(Clone)]
pub struct SignatureVerifier {
    server_key: String,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("server_key", &"<redacted>")
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier for `server_key`.
    #[must_use]
    pub fn new(server_key: impl Into<String>) -> Self {
        Self {
            server_key: server_key.into(),
        }
    }

    /// Compute the expected signature.
    #[must_use]
    pub fn sign(&self, order_id: &str, status_code: &str, gross_amount: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(order_id.as_bytes());
        hasher.update(status_code.as_bytes());
        hasher.update(gross_amount.as_bytes());
        hasher.update(self.server_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check a supplied signature.
    ///
    /// # Errors
    ///
    /// - [`SignatureError::Missing`] if `signature` is empty
    /// - [`SignatureError::Mismatch`] if it does not match
    pub fn verify(
        &self,
        order_id: &str,
        status_code: &str,
        gross_amount: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        let supplied = signature.trim().to_ascii_lowercase();
        if supplied.is_empty() {
            return Err(SignatureError::Missing);
        }
        let expected = self.sign(order_id, status_code, gross_amount);
        if constant_time_eq(expected.as_bytes(), supplied.as_bytes()) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}
