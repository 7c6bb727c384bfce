/// Rewrite "N+" bet lines into "Over (N - 0.5)" notation.
///
/// `"1+"` → `"Over 0.5"`, `"12+"` → `"Over 11.5"`. Anything that is not
/// exactly digits followed by `+` (after trimming) is returned unchanged.
/// Only ASCII `0-9` count as digits; lines written with other scripts'
/// digits (`"٣+"`) pass through as-is.
pub fn normalize_line(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(digits) = trimmed.strip_suffix('+') else {
        return raw.to_string();
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }

    match decrement(digits.trim_start_matches('0')) {
        Some(whole) => format!("Over {whole}.5"),
        None => "Over -0.5".to_string(),
    }
}

/// Subtract one from a decimal digit string without leading zeros.
/// Returns None for zero (empty input). Works for any length.
fn decrement(digits: &str) -> Option<String> {
    if digits.is_empty() {
        return None;
    }
    let mut out: Vec<u8> = digits.bytes().collect();
    for b in out.iter_mut().rev() {
        if *b == b'0' {
            *b = b'9';
        } else {
            *b -= 1;
            break;
        }
    }
    let s = String::from_utf8(out).ok()?;
    let s = s.trim_start_matches('0');
    Some(if s.is_empty() { "0".to_string() } else { s.to_string() })
}
