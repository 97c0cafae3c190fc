//! Common helper functions for Tessera.

/// Performs a constant-time comparison of two byte strings.
/// Used when comparing credentials so that timing does not leak the match length.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (lhs, rhs) in a.iter().zip(b.iter()) {
        diff |= lhs ^ rhs;
    }
    diff == 0
}

/// True if the string is empty or only whitespace.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
