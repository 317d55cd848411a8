//! Local input validation for the two operator-typed inputs.
//!
//! Both normalizers run before any provider call; a `None` means the
//! engine reprompts and the provider is never contacted.

/// Normalizes a phone number: interior spaces and dashes are removed, and
/// the result must be a `+` sign followed only by digits.
pub fn normalize_phone_number(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .chars()
        .filter(|ch| *ch != ' ' && *ch != '-')
        .collect::<String>();
    let digits = cleaned.strip_prefix('+')?;
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    Some(cleaned)
}

/// Normalizes a one-time code: interior spaces are removed and the result
/// must be all digits. Codes are conventionally typed with spaces between
/// digits so the transport does not linkify them.
pub fn normalize_login_code(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .chars()
        .filter(|ch| *ch != ' ')
        .collect::<String>();
    if cleaned.is_empty() || !cleaned.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::{normalize_login_code, normalize_phone_number};

    #[test]
    fn unit_phone_accepts_sign_and_digits() {
        assert_eq!(
            normalize_phone_number("+1234567890").as_deref(),
            Some("+1234567890")
        );
        assert_eq!(
            normalize_phone_number(" +1 555 123-4567 ").as_deref(),
            Some("+15551234567")
        );
    }

    #[test]
    fn unit_phone_rejects_missing_sign_and_letters() {
        assert_eq!(normalize_phone_number("1234567890"), None);
        assert_eq!(normalize_phone_number("+12a4"), None);
        assert_eq!(normalize_phone_number("+"), None);
        assert_eq!(normalize_phone_number(""), None);
    }

    #[test]
    fn unit_code_accepts_spaced_digits() {
        assert_eq!(normalize_login_code("4 6 9 4 9").as_deref(), Some("46949"));
        assert_eq!(normalize_login_code("12345").as_deref(), Some("12345"));
    }

    #[test]
    fn unit_code_rejects_non_digits() {
        assert_eq!(normalize_login_code("abc12"), None);
        assert_eq!(normalize_login_code(""), None);
        assert_eq!(normalize_login_code("1 2 3x"), None);
    }
}
