//! Checksums of canonical encodings

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum of encoded text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum of an encoder's output
    pub fn of_encoding(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Does `text` hash to this checksum?
    pub fn matches(&self, text: &str) -> bool {
        Self::of_encoding(text) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let text = r#"{"x":1,"y":2}"#;
        assert_eq!(Checksum::of_encoding(text), Checksum::of_encoding(text));
        assert_eq!(Checksum::of_encoding(text).as_str().len(), 64);
    }

    #[test]
    fn test_checksum_different_content() {
        assert_ne!(
            Checksum::of_encoding(r#"{"x":1}"#),
            Checksum::of_encoding(r#"{"x":2}"#)
        );
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            Checksum::from_bytes(b"").to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_matches() {
        let checksum = Checksum::of_encoding("[1,2]");
        assert!(checksum.matches("[1,2]"));
        assert!(!checksum.matches("[1, 2]"));
    }
}
