// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! 256-bit SHA-256 content digest.
//!
//! [`EntityHash`] identifies a computation invocation (logical key) or the
//! content of a stored blob. The digest algorithm is part of the on-disk
//! contract: metadata written by one build must verify under another, so the
//! algorithm is pinned to SHA-256 and not configurable.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A 32-byte SHA-256 content hash.
///
/// Thin newtype over `[u8; 32]`. The inner bytes are public for zero-cost
/// access; the `Display` impl renders lowercase hex for logging and error
/// messages. Ordering is lexicographic over the raw bytes, which makes the
/// type usable as a deterministic map key.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EntityHash(pub [u8; 32]);

impl EntityHash {
    /// Digest `bytes` with SHA-256.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Fold an ordered sequence of hashes into one digest.
    ///
    /// The aggregate is SHA-256 over the concatenated member bytes in the
    /// order given. Callers are responsible for feeding members in a total,
    /// stable order.
    pub fn combine<'a, I: IntoIterator<Item = &'a EntityHash>>(members: I) -> Self {
        let mut hasher = Sha256::new();
        for member in members {
            hasher.update(member.0);
        }
        Self(hasher.finalize().into())
    }

    /// View the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Canonical base64 projection (standard alphabet, padded).
    pub fn as_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// URL-safe unpadded base64 projection — the serialization used for
    /// string keys at rest.
    pub fn as_url_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Lowercase hex projection.
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the URL-safe unpadded base64 serialization.
    ///
    /// # Errors
    ///
    /// Returns [`ParseHashError`] if the input is not valid base64 or does
    /// not decode to exactly 32 bytes.
    pub fn from_url_base64(s: &str) -> Result<Self, ParseHashError> {
        let bytes = URL_SAFE_NO_PAD.decode(s)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| ParseHashError::BadLength { got: b.len() })?;
        Ok(Self(bytes))
    }

    /// Short human-facing form: the first ten base64 characters.
    pub fn pretty(&self) -> String {
        let mut b64 = self.as_base64();
        b64.truncate(10);
        b64
    }
}

impl std::fmt::Display for EntityHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Errors that can occur when parsing a serialized [`EntityHash`].
#[derive(Debug, Error)]
pub enum ParseHashError {
    /// Input was not valid base64.
    #[error("[HASH_BAD_BASE64] {0}")]
    Base64(#[from] base64::DecodeError),

    /// Input decoded to the wrong number of bytes.
    #[error("[HASH_BAD_LENGTH] expected 32 bytes, got {got}")]
    BadLength {
        /// Number of bytes actually decoded.
        got: usize,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. digest is stable ─────────────────────────────────────────────

    #[test]
    fn digest_of_bytes_is_stable() {
        let a = EntityHash::of_bytes(b"larder");
        let b = EntityHash::of_bytes(b"larder");
        assert_eq!(a, b);
        assert_ne!(a, EntityHash::of_bytes(b"Larder"));
    }

    // ── 2. url-safe base64 round-trip ───────────────────────────────────

    #[test]
    fn url_base64_round_trip() {
        let hash = EntityHash::of_bytes(b"round trip me");
        let encoded = hash.as_url_base64();
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
        let decoded = EntityHash::from_url_base64(&encoded).unwrap();
        assert_eq!(hash, decoded);
    }

    // ── 3. parse rejects wrong length ───────────────────────────────────

    #[test]
    fn parse_rejects_wrong_length() {
        let err = EntityHash::from_url_base64("c2hvcnQ").unwrap_err();
        assert!(matches!(err, ParseHashError::BadLength { got: 5 }));
    }

    // ── 4. parse rejects bad alphabet ───────────────────────────────────

    #[test]
    fn parse_rejects_bad_alphabet() {
        assert!(EntityHash::from_url_base64("not base64 at all!").is_err());
    }

    // ── 5. hex and Display agree ────────────────────────────────────────

    #[test]
    fn hex_and_display_agree() {
        let hash = EntityHash::of_bytes(b"hex me");
        assert_eq!(hash.as_hex(), hash.to_string());
        assert_eq!(hash.as_hex().len(), 64);
    }

    // ── 6. combine respects order ───────────────────────────────────────

    #[test]
    fn combine_respects_order() {
        let a = EntityHash::of_bytes(b"a");
        let b = EntityHash::of_bytes(b"b");
        let ab = EntityHash::combine([&a, &b]);
        let ba = EntityHash::combine([&b, &a]);
        assert_ne!(ab, ba);
        assert_eq!(ab, EntityHash::combine([&a, &b]));
    }

    // ── 7. pretty is a ten-char prefix ──────────────────────────────────

    #[test]
    fn pretty_is_short_prefix() {
        let hash = EntityHash::of_bytes(b"pretty");
        assert_eq!(hash.pretty().len(), 10);
        assert!(hash.as_base64().starts_with(&hash.pretty()));
    }

    // ── 8. ordering is byte-lexicographic ───────────────────────────────

    #[test]
    fn ordering_is_byte_lexicographic() {
        let lo = EntityHash([0x00; 32]);
        let hi = EntityHash([0xFF; 32]);
        assert!(lo < hi);
    }
}
