//! Phone number normalization
//!
//! The stored phone keeps the form entered at sign-in (`+1...`). Backend
//! lookups use the cleaned form; the identity service wants E.164.

/// Strip a leading `+1`, then any remaining `+`
pub fn clean_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let without_country = trimmed.strip_prefix("+1").unwrap_or(trimmed);
    without_country.replacen('+', "", 1)
}

/// Prefix `+` when missing
pub fn with_plus(phone: &str) -> String {
    let trimmed = phone.trim();
    if trimmed.starts_with('+') {
        trimmed.to_string()
    } else {
        format!("+{}", trimmed)
    }
}
