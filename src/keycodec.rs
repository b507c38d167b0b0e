//! Activation key codec - deterministic key construction and format validation.
//!
//! Keys are one-way derivations: a SHA-256 digest over merchant id, plan type,
//! a millisecond timestamp, and 16 random bytes, rendered as five uppercase
//! hex groups behind a fixed prefix (`SK-XXXX-XXXX-XXXX-XXXX-XXXX`). Nothing
//! about the merchant or plan is recoverable from the key; the timestamp and
//! randomness only prevent collisions across repeated calls. This module holds
//! no persistent state.

use hmac::{Hmac, Mac};
use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

type HmacSha256 = Hmac<Sha256>;

/// Fixed literal prefix every activation key starts with.
pub const KEY_PREFIX: &str = "SK";

/// Number of dash-separated hex groups following the prefix.
const SEGMENT_COUNT: usize = 5;

/// Hex digits per group.
const SEGMENT_LENGTH: usize = 4;

static KEY_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^SK(?:-[0-9A-F]{4}){5}$").expect("key format regex is valid")
});

/// Generates a new activation key for a merchant/plan pair.
///
/// Two successive calls with identical inputs produce different keys, since
/// the digest input includes the current time in milliseconds and 16 bytes of
/// OS randomness.
#[must_use]
pub fn generate(merchant_id: i64, plan_type: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let mut entropy = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut entropy);

    let mut hasher = Sha256::new();
    hasher.update(merchant_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(plan_type.as_bytes());
    hasher.update(b"|");
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(entropy);
    let digest = hex::encode_upper(hasher.finalize());

    // First five 4-hex slices of the digest, dash-joined behind the prefix
    let mut key = String::with_capacity(KEY_PREFIX.len() + SEGMENT_COUNT * (SEGMENT_LENGTH + 1));
    key.push_str(KEY_PREFIX);
    for segment in 0..SEGMENT_COUNT {
        key.push('-');
        key.push_str(&digest[segment * SEGMENT_LENGTH..(segment + 1) * SEGMENT_LENGTH]);
    }
    key
}

/// Checks whether a string matches the exact key format.
///
/// The match is case-sensitive: lowercase hex, a wrong prefix, a wrong group
/// count, or any non-hex character is rejected. Callers run this before any
/// storage lookup so malformed input never reaches the database.
#[must_use]
pub fn is_valid_format(key: &str) -> bool {
    KEY_FORMAT.is_match(key)
}

/// Computes an HMAC-SHA256 signature over a key, hex-encoded.
///
/// Used when the key travels through semi-trusted channels and the receiver
/// needs to confirm it was issued by us.
#[must_use]
pub fn sign(key: &str, secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(key.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex-encoded HMAC-SHA256 signature in constant time.
///
/// Returns false for malformed hex as well as for a signature that does not
/// match; callers cannot distinguish the two, which is intentional.
#[must_use]
pub fn verify_signature(key: &str, signature: &str, secret: &[u8]) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(key.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_generate_matches_format() {
        for merchant_id in [1, 42, 9_999_999] {
            for plan in ["starter", "professional", "enterprise"] {
                let key = generate(merchant_id, plan);
                assert!(is_valid_format(&key), "generated key {key} failed format check");
            }
        }
    }

    #[test]
    fn test_generate_is_unique_for_same_inputs() {
        let first = generate(7, "starter");
        let second = generate(7, "starter");
        assert_ne!(first, second);
    }

    #[test]
    fn test_generate_key_shape() {
        let key = generate(1, "starter");
        assert_eq!(key.len(), 27);
        let segments: Vec<&str> = key.split('-').collect();
        assert_eq!(segments.len(), 6);
        assert_eq!(segments[0], KEY_PREFIX);
        for segment in &segments[1..] {
            assert_eq!(segment.len(), 4);
            assert!(segment.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_is_valid_format_accepts_canonical_key() {
        assert!(is_valid_format("SK-A1B2-C3D4-E5F6-0718-293A"));
    }

    #[test]
    fn test_is_valid_format_rejects_lowercase_hex() {
        assert!(!is_valid_format("SK-a1b2-c3d4-e5f6-0718-293a"));
    }

    #[test]
    fn test_is_valid_format_rejects_wrong_prefix() {
        assert!(!is_valid_format("XK-A1B2-C3D4-E5F6-0718-293A"));
        assert!(!is_valid_format("A1B2-C3D4-E5F6-0718-293A"));
    }

    #[test]
    fn test_is_valid_format_rejects_wrong_segment_count() {
        assert!(!is_valid_format("SK-A1B2-C3D4-E5F6-0718"));
        assert!(!is_valid_format("SK-A1B2-C3D4-E5F6-0718-293A-4B5C"));
    }

    #[test]
    fn test_is_valid_format_rejects_non_hex_characters() {
        assert!(!is_valid_format("SK-A1B2-C3D4-E5G6-0718-293A"));
        assert!(!is_valid_format("SK-A1B2-C3D4-E5F6-07!8-293A"));
    }

    #[test]
    fn test_is_valid_format_rejects_surrounding_noise() {
        assert!(!is_valid_format(""));
        assert!(!is_valid_format(" SK-A1B2-C3D4-E5F6-0718-293A"));
        assert!(!is_valid_format("SK-A1B2-C3D4-E5F6-0718-293A\n"));
    }

    #[test]
    fn test_sign_and_verify_signature() {
        let key = generate(3, "professional");
        let signature = sign(&key, b"shared-secret");

        assert!(verify_signature(&key, &signature, b"shared-secret"));
        assert!(!verify_signature(&key, &signature, b"other-secret"));
    }

    #[test]
    fn test_verify_signature_rejects_tampered_signature() {
        let key = generate(3, "professional");
        let mut signature = sign(&key, b"shared-secret");
        // Flip the last hex digit
        let last = if signature.ends_with('0') { '1' } else { '0' };
        signature.pop();
        signature.push(last);

        assert!(!verify_signature(&key, &signature, b"shared-secret"));
    }

    #[test]
    fn test_verify_signature_rejects_malformed_hex() {
        let key = generate(3, "professional");
        assert!(!verify_signature(&key, "not-hex", b"shared-secret"));
        assert!(!verify_signature(&key, "", b"shared-secret"));
    }
}
