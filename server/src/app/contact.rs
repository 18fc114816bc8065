//! Guest contact rules: validation, phone normalisation and masking.

use regex::Regex;
use serde::Serialize;
use slotbook_core::inquiry::ContactInfo;
use std::sync::LazyLock;
use thiserror::Error;

#[allow(clippy::expect_used)]
fn contact_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).expect("contact patterns are literals")
}

static PHONE: LazyLock<Regex> = LazyLock::new(|| contact_pattern(r"^(62|08)[0-9]{7,11}$"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| contact_pattern(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"));
static FULL_NAME: LazyLock<Regex> = LazyLock::new(|| contact_pattern(r"^[a-zA-Z ]+$"));

/// Contact field that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// Phone number not in `62…` / `08…` form
    #[error("Nomor telepon harus diawali dengan 62 atau 08: {0}")]
    PhoneNumber(String),

    /// Malformed email address
    #[error("Format email belum benar: {0}")]
    Email(String),

    /// Name with characters other than letters and spaces
    #[error("Nama belum benar: {0}")]
    FullName(String),
}

/// Validate an Indonesian mobile number and rewrite a leading `0` to `62`.
///
/// Accepts `62` or `08` followed by 7 to 11 digits. A leading `+` is ignored.
///
/// # Errors
///
/// Returns [`ContactError::PhoneNumber`] for anything else.
pub fn normalise_phone(raw: &str) -> Result<String, ContactError> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if !PHONE.is_match(digits) {
        return Err(ContactError::PhoneNumber(raw.to_string()));
    }

    Ok(match digits.strip_prefix('0') {
        Some(local) => format!("62{local}"),
        None => digits.to_string(),
    })
}

/// Check an email address and return it trimmed.
///
/// # Errors
///
/// Returns [`ContactError::Email`] if it is malformed.
pub fn validate_email(raw: &str) -> Result<String, ContactError> {
    let email = raw.trim();
    if EMAIL.is_match(email) {
        Ok(email.to_string())
    } else {
        Err(ContactError::Email(raw.to_string()))
    }
}

/// Check a guest name (ASCII letters and spaces) and return it trimmed.
///
/// # Errors
///
/// Returns [`ContactError::FullName`] otherwise.
pub fn validate_full_name(raw: &str) -> Result<String, ContactError> {
    let name = raw.trim();
    if FULL_NAME.is_match(name) {
        Ok(name.to_string())
    } else {
        Err(ContactError::FullName(raw.to_string()))
    }
}

/// Contact details with most characters hidden.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MaskedContact {
    /// Masked name
    pub name: String,
    /// Masked email
    pub email: String,
    /// Masked phone number
    pub phone_number: String,
}

impl From<&ContactInfo> for MaskedContact {
    fn from(contact: &ContactInfo) -> Self {
        Self {
            name: mask_name(&contact.full_name),
            email: mask_email(&contact.email),
            phone_number: mask_phone(&contact.phone_number),
        }
    }
}

/// `"Budi Lestari"` -> `"Bu*i Le****i"`: each word keeps its first two and last
/// characters; two-letter words keep the first; single letters are kept.
#[must_use]
pub fn mask_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let chars: Vec<char> = word.chars().collect();
            match chars.len() {
                0 | 1 => word.to_string(),
                2 => format!("{}*", chars[0]),
                n => {
                    let mut masked: String = chars[..2].iter().collect();
                    masked.push_str(&"*".repeat(n - 3));
                    masked.push(chars[n - 1]);
                    masked
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `"6281234567890"` -> `"+628*******7890"`.
#[must_use]
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= 6 {
        return format!("+{phone}");
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("+{head}{}{tail}", "*".repeat(chars.len() - 6))
}

/// `"johndoe@example.com"` -> `"j*****e@example.com"`.
#[must_use]
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_string();
    };
    if domain.contains('@') {
        return email.to_string();
    }
    let chars: Vec<char> = local.chars().collect();
    match chars.len() {
        0 => email.to_string(),
        1 | 2 => format!("{}{}@{domain}", chars[0], "*".repeat(chars.len() - 1)),
        n => format!("{}{}{}@{domain}", chars[0], "*".repeat(n - 2), chars[n - 1]),
    }
}
