//! Streaming digest used for object identity.
//!
//! Pulled out into its own trait since both the loose and packed write paths
//! tee plaintext through it while streaming, rather than hashing a
//! materialized buffer.

use sha2::digest::{FixedOutput as _, Update as _};

use crate::config::HashType;

/// A streaming digest.
pub trait ObjectHasher {
    /// Feed more bytes into the running digest.
    fn update(&mut self, bytes: &[u8]);
    /// Consume the hasher, producing the lowercase hex digest.
    fn finalize(self: Box<Self>) -> String;
}

struct Sha256Hasher(sha2::Sha256);

impl ObjectHasher for Sha256Hasher {
    fn update(&mut self, bytes: &[u8]) {
        sha2::digest::Update::update(&mut self.0, bytes);
    }

    fn finalize(self: Box<Self>) -> String {
        let out = self.0.finalize_fixed();
        hex::encode(out)
    }
}

/// Construct a fresh hasher for the given algorithm.
pub fn new_hasher(hash_type: HashType) -> Box<dyn ObjectHasher> {
    match hash_type {
        HashType::Sha256 => Box::new(Sha256Hasher(sha2::Sha256::default())),
    }
}

/// One-shot digest of a complete byte slice, in hex. Used by tests and by
/// callers that already hold the whole object in memory.
pub fn digest_hex(hash_type: HashType, bytes: &[u8]) -> String {
    let mut h = new_hasher(hash_type);
    h.update(bytes);
    h.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        // sha256("test")
        let got = digest_hex(HashType::Sha256, b"test");
        assert_eq!(got, "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08");
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut h = new_hasher(HashType::Sha256);
        h.update(b"te");
        h.update(b"st");
        assert_eq!(h.finalize(), digest_hex(HashType::Sha256, b"test"));
    }
}
