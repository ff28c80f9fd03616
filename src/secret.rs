//! CSPRNG-backed values: OAuth `state`, PKCE verifier/challenge, session ids and API key secrets.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generates a PKCE code verifier: 48 random bytes, base64url (64 chars, RFC 7636 range).
#[must_use]
pub fn generate_code_verifier() -> String {
    let random_bytes: [u8; 48] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// `BASE64URL(SHA256(verifier))`, the S256 code challenge.
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// OAuth `state` parameter: 16 random bytes, base64url (22 chars).
#[must_use]
pub fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Opaque 256-bit token, base64url (43 chars).
#[must_use]
pub fn random_token() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// API key secret part: 32 random bytes as lowercase hex (64 chars).
#[must_use]
pub fn api_key_secret() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    hex::encode(random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_url_safe(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn code_verifier_is_64_url_safe_chars() {
        let verifier = generate_code_verifier();
        assert_eq!(verifier.len(), 64);
        assert!(is_url_safe(&verifier), "not URL-safe: {verifier}");
    }

    #[test]
    fn challenge_matches_rfc7636_appendix_b() {
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn state_is_22_chars_and_unique() {
        let s1 = generate_state();
        assert_eq!(s1.len(), 22);
        assert_ne!(s1, generate_state());
    }

    #[test]
    fn random_token_is_43_chars() {
        let token = random_token();
        assert_eq!(token.len(), 43);
        assert!(is_url_safe(&token));
    }

    #[test]
    fn api_key_secret_is_lowercase_hex() {
        let secret = api_key_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        assert_ne!(secret, api_key_secret());
    }
}
