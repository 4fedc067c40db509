//! Truncation of coordinates to the backend's decimal field limits.
//!
//! The backend stores grid coordinates as decimals with at most 30 digits
//! and 20 decimal places. Coordinates are cut to fit, never rounded, so the
//! values written here compare equal to what was persisted before.

pub const MAX_DIGITS: usize = 30;
pub const DECIMAL_PLACES: usize = 20;

/// Shortest round-trip text for `value`, switching to exponent notation
/// below `1e-6` and from `1e21` upwards (`1e-7`, `1.5e+21`).
pub fn number_text(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let magnitude = value.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return value.to_string();
    }

    let text = format!("{value:e}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => text,
    }
}

/// Parses the longest numeric prefix of `text`, `NaN` if there is none.
pub fn parse_number_prefix(text: &str) -> f64 {
    let mut end = text.len();
    while end > 0 {
        if let Ok(value) = text[..end].parse::<f64>() {
            return value;
        }
        end -= 1;
    }
    f64::NAN
}

fn truncate(text: &str, max_chars: usize) -> &str {
    &text[..text.len().min(max_chars)]
}

/// Cuts `value` to at most 30 characters, then to at most 20 fractional digits.
pub fn align_number(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let first = parse_number_prefix(truncate(&number_text(value), MAX_DIGITS));
    let text = number_text(first);
    match text.split_once('.') {
        Some((whole, fraction)) if !fraction.is_empty() => {
            parse_number_prefix(&format!("{whole}.{}", truncate(fraction, DECIMAL_PLACES)))
        }
        _ => parse_number_prefix(&text),
    }
}
