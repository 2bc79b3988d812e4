//! Base-62 encoding of allocated URL identifiers into short codes.
//!
//! The mapping is a bijection between `u64` and the canonical (no leading zero)
//! strings over [`ALPHABET`], so a short code is a pure function of its id.

/// Symbols in digit order: `0-9`, `a-z`, `A-Z`.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const BASE: u64 = ALPHABET.len() as u64;

/// Encodes an identifier as a base-62 short code, most significant digit first.
///
/// # Examples
///
/// ```
/// use linkpulse::utils::base62::encode;
///
/// assert_eq!(encode(0), "0");
/// assert_eq!(encode(61), "Z");
/// assert_eq!(encode(62), "10");
/// ```
pub fn encode(mut id: u64) -> String {
    if id == 0 {
        return "0".to_string();
    }

    // u64::MAX needs 11 base-62 digits
    let mut digits = Vec::with_capacity(11);
    while id > 0 {
        digits.push(ALPHABET[(id % BASE) as usize]);
        id /= BASE;
    }
    digits.reverse();

    digits.into_iter().map(char::from).collect()
}

/// Decodes a canonical short code back into its identifier.
///
/// Returns `None` for empty input, foreign symbols, non-canonical leading
/// zeros, or values that overflow `u64`.
pub fn decode(code: &str) -> Option<u64> {
    if code.is_empty() || (code.len() > 1 && code.starts_with('0')) {
        return None;
    }

    code.bytes().try_fold(0u64, |acc, b| {
        let digit = ALPHABET.iter().position(|&c| c == b)? as u64;
        acc.checked_mul(BASE)?.checked_add(digit)
    })
}
