//! Content fingerprinting for change detection
//!
//! The incremental path compares the fingerprint of freshly edited contents
//! with the fingerprint of the contents a cached unit was resolved from.
//! Analysis options that change the shape of the tree are folded in as
//! metadata so a unit parsed without bodies never matches one parsed with them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint {
    /// Hash of the source text
    pub content_hash: String,
    /// Hash of the metadata that affects analysis results
    pub metadata_hash: String,
    /// Combined hash for quick comparison
    pub combined_hash: String,
}

pub struct FingerprintBuilder {
    content: Vec<u8>,
    metadata_parts: Vec<String>,
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            metadata_parts: Vec::new(),
        }
    }

    pub fn add_content_str(&mut self, content: &str) -> &mut Self {
        self.content.extend_from_slice(content.as_bytes());
        self
    }

    pub fn add_metadata(&mut self, key: &str, value: impl std::fmt::Display) -> &mut Self {
        self.metadata_parts.push(format!("{}={}", key, value));
        self
    }

    pub fn build(&self) -> ContentFingerprint {
        let content_hash = hex_digest(&[&self.content]);

        // Sorted for deterministic hashing
        let mut metadata = self.metadata_parts.clone();
        metadata.sort();
        let metadata_bytes: Vec<&[u8]> = metadata.iter().map(|m| m.as_bytes()).collect();
        let metadata_hash = hex_digest(&metadata_bytes);

        let combined_hash = hex_digest(&[content_hash.as_bytes(), metadata_hash.as_bytes()]);
        ContentFingerprint {
            content_hash,
            metadata_hash,
            combined_hash,
        }
    }
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}

impl ContentFingerprint {
    /// Fingerprint of the text alone.
    pub fn of(content: &str) -> Self {
        FingerprintBuilder::new().add_content_str(content).build()
    }

    pub fn content_matches(&self, other: &ContentFingerprint) -> bool {
        self.combined_hash == other.combined_hash
    }

    pub fn short_hash(&self) -> String {
        self.combined_hash.chars().take(12).collect()
    }
}
