use once_cell::sync::Lazy;
use regex::Regex;

// Hardcoded regex patterns - guaranteed to be valid at compile time
#[allow(clippy::unwrap_used)]
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

#[allow(clippy::unwrap_used)]
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{5,18}[0-9]$").unwrap());

// Spanish personal tax id: 8 digits and a control letter
#[allow(clippy::unwrap_used)]
static NIF_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{8}[A-Za-z]$").unwrap());

#[allow(clippy::unwrap_used)]
static CIF_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{9}$").unwrap());

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 255 && EMAIL_PATTERN.is_match(email)
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_PATTERN.is_match(phone.trim())
}

pub fn is_valid_nif(nif: &str) -> bool {
    NIF_PATTERN.is_match(nif)
}

pub fn is_valid_cif(cif: &str) -> bool {
    CIF_PATTERN.is_match(cif)
}
