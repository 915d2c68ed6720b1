//! SHA-256 content hashing for cache keys

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 digest.
///
/// The remote fetch cache names its entries by the hash of the requested
/// object path, so two spellings of one path that normalize identically
/// share a cache entry.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn of_str(s: &str) -> Self {
        Self::of_bytes(s.as_bytes())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Cache entry file name: `<hex>.<ext>`
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self.to_hex(), ext)
    }

    /// Two-character shard directory name
    pub fn shard(&self) -> String {
        format!("{:02x}", self.0[0])
    }

    /// Parse a 64-character hex string
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_same_key() {
        assert_eq!(
            ContentHash::of_str("/Game/Tex.Tex"),
            ContentHash::of_str("/Game/Tex.Tex")
        );
        assert_ne!(
            ContentHash::of_str("/Game/Tex.Tex"),
            ContentHash::of_str("/Game/Tex.Other")
        );
    }

    #[test]
    fn test_file_name_and_shard() {
        let h = ContentHash::of_str("/Game/Tex.Tex");
        let name = h.file_name("json");
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), 64 + 5);
        assert!(name.starts_with(&h.shard()));
    }

    #[test]
    fn test_from_hex() {
        let h = ContentHash::of_str("payload");
        assert_eq!(ContentHash::from_hex(&h.to_hex()), Some(h));
        assert!(ContentHash::from_hex("abc").is_none());
    }
}
