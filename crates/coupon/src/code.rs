//! Coupon code generation.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Prefix of every generated coupon code.
pub const CODE_PREFIX: &str = "COUPON";

const RANDOM_LEN: usize = 5;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Builds `prefix` + `YYMMDD` + five random uppercase alphanumerics.
///
/// Collisions are possible and are left to the caller to retry.
pub fn generate_code(prefix: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let random: String = (0..RANDOM_LEN)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect();
    format!("{prefix}{}{random}", now.format("%y%m%d"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn code_has_prefix_date_and_suffix() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let code = generate_code(CODE_PREFIX, now);

        assert!(code.starts_with("COUPON240309"));
        let suffix = &code["COUPON240309".len()..];
        assert_eq!(suffix.len(), RANDOM_LEN);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn suffix_uses_the_full_alphanumeric_range() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let beyond_hex = (0..200).any(|_| {
            generate_code(CODE_PREFIX, now)["COUPON240309".len()..]
                .bytes()
                .any(|b| b.is_ascii_uppercase() && !b.is_ascii_hexdigit())
        });
        assert!(beyond_hex);
    }

    #[test]
    fn codes_differ_between_calls() {
        let now = Utc::now();
        let codes: std::collections::HashSet<_> =
            (0..50).map(|_| generate_code(CODE_PREFIX, now)).collect();
        // 36^5 suffixes; a collision in 50 draws is already unlikely
        assert!(codes.len() > 48);
    }
}
