pub mod escape;
pub mod ip;
pub mod url_validator;

/// Maximum short code length
pub const MAX_SHORT_CODE_LEN: usize = 128;

/// Maximum template slug length
pub const MAX_SLUG_LEN: usize = 64;

/// Validate short code format: non-empty, length <= 128, charset [a-zA-Z0-9_.-]
///
/// Used on every public redirect to reject junk paths before they reach the
/// cache or the store.
#[inline]
pub fn is_valid_short_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_SHORT_CODE_LEN
        && code
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' | b'.'))
}

/// Validate template slug format: non-empty, length <= 64, charset [a-z0-9-]
#[inline]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && slug
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-'))
}

/// Generate a random alphanumeric short code of the given length.
pub fn generate_random_code(length: usize) -> String {
    use rand::Rng;
    use std::iter;

    let mut rng = rand::rng();

    let chars = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    iter::repeat_with(|| chars[rng.random_range(0..chars.len())] as char)
        .take(length)
        .collect()
}

/// Generate a cryptographically secure random token, hex-encoded.
///
/// The returned string length is `length_bytes * 2`. Used for webhook HMAC
/// secrets (32 bytes).
pub fn generate_secure_token(length_bytes: usize) -> String {
    use rand::RngCore;

    let mut bytes = vec![0u8; length_bytes];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
