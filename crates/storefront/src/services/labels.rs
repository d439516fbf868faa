//! Shipping label identifiers.
//!
//! Labels are `BBD-<POSTAL>-<CITY>-<NONCE>`: the postal code reduced to
//! upper-case alphanumerics, the first three letters of the city (padded with
//! `X`), and the approval time in milliseconds written in base 36.

use chrono::{DateTime, Utc};

const PREFIX: &str = "BBD";
const CITY_CODE_LEN: usize = 3;

/// Build a shipping label for an address at a point in time.
#[must_use]
pub fn shipping_label(postal_code: &str, city: &str, at: DateTime<Utc>) -> String {
    let postal: String = postal_code
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let postal = if postal.is_empty() {
        "0".repeat(5)
    } else {
        postal
    };

    let mut city_code: String = city
        .chars()
        .filter(char::is_ascii_alphabetic)
        .take(CITY_CODE_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    while city_code.len() < CITY_CODE_LEN {
        city_code.push('X');
    }

    let nonce = u64::try_from(at.timestamp_millis()).unwrap_or(0);
    format!("{PREFIX}-{postal}-{city_code}-{}", to_base36(nonce))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    if n == 0 {
        return "0".to_owned();
    }

    let mut out = Vec::new();
    while n > 0 {
        // n % 36 < 36, so the index is always in bounds.
        #[allow(clippy::cast_possible_truncation, clippy::indexing_slicing)]
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
