//! Content Hashing - SHA-256 Digests for Artifacts
//!
//! Digests let the writer skip files whose contents did not change and let
//! callers compare two compilations byte for byte.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Digest of an artifact's text, prefixed with the algorithm.
pub fn content_digest(contents: &str) -> String {
    format!("sha256:{}", sha256_hex(contents.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
