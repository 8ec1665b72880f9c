//! Fixed-width SHA3-256 digests

use crate::Result;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::str::FromStr;

/// Length of every digest in bytes
pub const HASH_LENGTH: usize = 32;

/// A SHA3-256 digest. Serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256([u8; HASH_LENGTH]);

impl Hash256 {
    /// Sentinel digest: genesis previous hash and the Merkle root of no transactions
    pub const ZERO: Hash256 = Hash256([0; HASH_LENGTH]);

    pub fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Hash256(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Hash raw bytes
    pub fn digest(data: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(data);
        Hash256(hasher.finalize().into())
    }

    /// Hash the concatenation `left || right`
    pub fn combine(left: &Hash256, right: &Hash256) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(left.0);
        hasher.update(right.0);
        Hash256(hasher.finalize().into())
    }

    /// Hash the canonical JSON encoding of a value
    pub fn of_json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::digest(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut bytes = [0u8; HASH_LENGTH];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Hash256(bytes))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(Hash256::digest(b"stake"), Hash256::digest(b"stake"));
        assert_ne!(Hash256::digest(b"stake"), Hash256::digest(b"stakes"));
    }

    #[test]
    fn test_combine_is_order_sensitive() {
        let a = Hash256::digest(b"a");
        let b = Hash256::digest(b"b");
        assert_ne!(Hash256::combine(&a, &b), Hash256::combine(&b, &a));
    }

    #[test]
    fn test_hex_serde() {
        let h = Hash256::digest(b"block");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json.len(), 2 * HASH_LENGTH + 2);
        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_rejects_short_hex() {
        assert!("abcd".parse::<Hash256>().is_err());
        assert!(serde_json::from_str::<Hash256>("\"00ff\"").is_err());
    }

    #[test]
    fn test_zero_sentinel() {
        assert!(Hash256::ZERO.is_zero());
        assert_eq!(Hash256::ZERO.to_string(), "0".repeat(64));
    }
}
