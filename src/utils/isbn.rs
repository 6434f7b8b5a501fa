//! ISBN normalization.
//!
//! Everything is keyed by ISBN-13. ISBN-10 input is converted by prefixing
//! `978` and recomputing the check digit; anything else is rejected.

/// Compute the ISBN-13 check digit for the first 12 digits.
///
/// Returns `None` unless `core` is exactly 12 ASCII digits.
pub fn isbn13_check_digit(core: &str) -> Option<char> {
    if core.len() != 12 || !core.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let total: u32 = core
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 0 {
                digit
            } else {
                digit * 3
            }
        })
        .sum();

    let check = (10 - total % 10) % 10;
    char::from_digit(check, 10)
}

/// Normalize a raw ISBN string to ISBN-13.
///
/// All characters except digits and `X`/`x` are stripped first. A 13-digit
/// result is returned as-is (its check digit is not verified); a valid
/// ISBN-10 shape (9 digits plus a digit or `X`) is converted.
pub fn normalize_isbn13(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .collect();

    if cleaned.len() == 13 && cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return Some(cleaned);
    }

    if cleaned.len() == 10 {
        let (body, check) = cleaned.split_at(9);
        let body_ok = body.bytes().all(|b| b.is_ascii_digit());
        let check_ok = check
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b'X' || b == b'x');

        if body_ok && check_ok {
            let core = format!("978{}", body);
            let digit = isbn13_check_digit(&core)?;
            return Some(format!("{}{}", core, digit));
        }
    }

    None
}
