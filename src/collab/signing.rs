//! HMAC-SHA256 signatures for presigned URLs and webhook bodies.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 over `message.body`.
pub fn compute_signature(secret: &str, message: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message.as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature produced by [`compute_signature`].
pub fn verify_signature(secret: &str, message: &str, body: &[u8], signature: &str) -> bool {
    let expected = compute_signature(secret, message, body);
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Random 32-byte hex secret, used when none is configured.
pub fn generate_secret() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        let sig = compute_signature("secret", "1700000000", b"change-requests/CR-2025-01/abc");
        assert_eq!(sig.len(), 64);
        assert!(verify_signature(
            "secret",
            "1700000000",
            b"change-requests/CR-2025-01/abc",
            &sig
        ));
    }

    #[test]
    fn test_signature_rejects_tampering() {
        let sig = compute_signature("secret", "1700000000", b"key");
        assert!(!verify_signature("secret", "1700000001", b"key", &sig));
        assert!(!verify_signature("other", "1700000000", b"key", &sig));
        assert!(!verify_signature("secret", "1700000000", b"key2", &sig));
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = generate_secret();
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_secret());
    }
}
