//! Identifiers and random tokens.
//!
//! Inquiry and service ids are opaque strings owned by the document stores, so
//! they are modelled as string newtypes rather than UUIDs. Fresh ids are minted
//! from UUID v4 in simple (hyphen-free, lower-case) form.

use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a random URL-safe token of exactly `len` characters.
///
/// `len` random bytes are encoded as base64url and the encoding is truncated
/// back to `len` characters.
#[must_use]
pub fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut random_bytes = vec![0u8; len];
    rng.fill_bytes(&mut random_bytes);
    let mut token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes);
    token.truncate(len);
    token
}

/// Declare an opaque string id.
///
/// The generated type wraps a `String`, serialises transparently and mints
/// fresh values with `mint`.
macro_rules! string_id {
    (
        $(#[$meta:meta])*
        name: $name:ident,
        mint: $mint:expr
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self($mint)
            }

            /// Wrap an existing id string
            #[must_use]
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the id as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

fn simple_uuid() -> String {
    Uuid::new_v4().simple().to_string()
}

string_id! {
    /// Unique identifier for an inquiry (a booking request).
    name: InquiryId,
    mint: simple_uuid()
}

string_id! {
    /// Unique identifier for a bookable service
    name: ServiceId,
    mint: simple_uuid()
}

string_id! {
    /// Identifier of a booking aggregate document (16-character token)
    name: BookingsId,
    mint: random_token(BookingsId::LEN)
}

impl BookingsId {
    /// Length of generated aggregate ids
    pub const LEN: usize = 16;
}

string_id! {
    /// Unique identifier for a review
    name: ReviewId,
    mint: simple_uuid()
}

/// Short human-facing code shared by every booking slot of one inquiry.
///
/// Always stored and displayed upper-case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationCode(String);

impl ConfirmationCode {
    /// Number of characters in a confirmation code
    pub const LEN: usize = 7;

    /// Generate a fresh random code.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_token(Self::LEN).to_uppercase())
    }

    /// Wrap an existing code, normalising it to upper-case.
    #[must_use]
    pub fn from_string(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().to_uppercase())
    }

    /// Get the code as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn random_token_has_requested_length() {
        for len in [1, 2, 7, 16, 33] {
            let token = random_token(len);
            assert_eq!(token.len(), len);
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }
    }

    #[test]
    fn confirmation_code_is_upper_case() {
        let code = ConfirmationCode::generate();
        assert_eq!(code.as_str().len(), ConfirmationCode::LEN);
        assert_eq!(code.as_str(), code.as_str().to_uppercase());
    }

    #[test]
    fn confirmation_code_normalises_input() {
        assert_eq!(ConfirmationCode::from_string("ab-cd_e").as_str(), "AB-CD_E");
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(InquiryId::new(), InquiryId::new());
        assert_ne!(ReviewId::new(), ReviewId::new());
        assert_eq!(ServiceId::new().as_str().len(), 32);
        assert_eq!(BookingsId::new().as_str().len(), BookingsId::LEN);
    }

    #[test]
    fn ids_serialise_as_bare_strings() {
        let id = InquiryId::from_string("inq-1");
        assert_eq!(id.to_string(), "inq-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"inq-1\"");
        let back: ReviewId = serde_json::from_str("\"rev-9\"").unwrap();
        assert_eq!(back.as_str(), "rev-9");
    }
}
