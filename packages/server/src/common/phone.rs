//! Phone number normalization.
//!
//! Every phone that enters the system is normalized to E.164 before any
//! lookup or insert; the uniqueness guarantees in the store only hold if the
//! same number always arrives spelled the same way.
//!
//! Local formats default to KSA: `0501234567`, `966501234567`,
//! `00966501234567` and `+96605...` all normalize to `+966501234567`.
//! Other `+`-prefixed international numbers pass through unchanged.

/// Normalize a raw user-supplied phone number to E.164.
///
/// Returns `None` when the input cannot be shaped into a valid number.
pub fn normalize(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let candidate = if trimmed.starts_with('+') {
        // Already international; normalize +9660XXXXXXXXX -> +966XXXXXXXXX
        if let Some(national) = digits.strip_prefix("966") {
            format!("+966{}", national.strip_prefix('0').unwrap_or(national))
        } else {
            format!("+{digits}")
        }
    } else if let Some(rest) = digits.strip_prefix("00") {
        // 00 international prefix
        format!("+{rest}")
    } else if let Some(national) = digits.strip_prefix("966") {
        format!("+966{}", national.strip_prefix('0').unwrap_or(national))
    } else if let Some(national) = digits.strip_prefix('0') {
        // Local format, e.g. 05XXXXXXXX
        format!("+966{national}")
    } else {
        // National number without leading zero
        format!("+966{digits}")
    };

    is_e164(&candidate).then_some(candidate)
}

/// Whether `s` is a plausible E.164 number: `+`, a non-zero leading digit,
/// 7-15 digits total.
pub fn is_e164(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('+') else {
        return false;
    };
    (7..=15).contains(&rest.len())
        && !rest.starts_with('0')
        && rest.chars().all(|c| c.is_ascii_digit())
}
