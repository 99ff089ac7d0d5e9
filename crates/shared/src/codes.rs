//! Promotional code generation.

use rand::distributions::Uniform;
use rand::Rng;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Prefix of generated welcome coupons.
pub const WELCOME_COUPON_PREFIX: &str = "SEWAGO";

/// Length of the random suffix appended to coupon prefixes.
pub const COUPON_SUFFIX_LEN: usize = 6;

/// Generates a coupon code made of `prefix` followed by `suffix_len`
/// uppercase alphanumeric characters.
pub fn generate_coupon_code(prefix: &str, suffix_len: usize) -> String {
    let mut rng = rand::thread_rng();
    let range = Uniform::from(0..CODE_ALPHABET.len());
    let suffix: String = (0..suffix_len)
        .map(|_| CODE_ALPHABET[rng.sample(range)] as char)
        .collect();
    format!("{}{}", prefix, suffix)
}

/// Generates a welcome coupon code such as `SEWAGO7K2QXA`.
pub fn generate_welcome_coupon() -> String {
    generate_coupon_code(WELCOME_COUPON_PREFIX, COUPON_SUFFIX_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_coupon_format() {
        let code = generate_welcome_coupon();
        assert!(code.starts_with("SEWAGO"));
        assert_eq!(code.len(), 12);
        assert!(code[6..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_coupon_codes_differ() {
        let first = generate_coupon_code("X", 12);
        let second = generate_coupon_code("X", 12);
        assert_ne!(first, second);
    }

    #[test]
    fn test_empty_suffix() {
        assert_eq!(generate_coupon_code("COMEBACK", 0), "COMEBACK");
    }
}
