//! Phone number canonicalization
//!
//! Members are keyed by a 10-digit canonical phone string. All comparisons
//! against the registry go through [`normalize_phone`] on both sides, so
//! formatting noise in either the submission or the stored row never
//! breaks a match.

/// Reduce an arbitrary textual phone representation to its canonical
/// 10-digit comparison key.
///
/// Strips everything that is not a digit (a leading `+` is tolerated like
/// any other punctuation), drops a US country code (`1` + 10 digits), and
/// truncates to the first 10 digits. Unparsable input yields the empty
/// string, which callers treat as "no match". Pure and total: never fails.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let digits = if digits.len() == 11 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    };

    if digits.len() > 10 {
        digits[..10].to_string()
    } else {
        digits
    }
}

/// True when the string is exactly a 10-digit canonical key.
pub fn is_canonical(key: &str) -> bool {
    key.len() == 10 && key.chars().all(|c| c.is_ascii_digit())
}
