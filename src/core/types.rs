// Basic hash type shared by blocks and merkle trees

use serde::{Deserialize, Serialize};
use std::fmt;

/// 256-bit hash (32 bytes)
/// Used for block hashes and merkle roots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Create a new Hash256 from a byte array
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a Hash256 from a slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, String> {
        if slice.len() != 32 {
            return Err(format!("invalid hash length: expected 32, got {}", slice.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Zero hash: the genesis block's prev_hash and the hash of an unmined block
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Whether this is the zero hash
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Number of leading zero bits, counted from the most significant byte.
    /// Proof-of-work difficulty is expressed in these units.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut zeros = 0;
        for byte in &self.0 {
            if *byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros();
                break;
            }
        }
        zeros
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self, String> {
        let bytes = hex::decode(hex_str).map_err(|e| format!("invalid hex string: {e}"))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256_creation() {
        let hash = Hash256::new([1u8; 32]);
        assert_eq!(hash.as_bytes(), &[1u8; 32]);
    }

    #[test]
    fn test_hash256_zero() {
        let zero = Hash256::zero();
        assert!(zero.is_zero());
        assert!(!Hash256::new([1u8; 32]).is_zero());
    }

    #[test]
    fn test_leading_zero_bits() {
        assert_eq!(Hash256::zero().leading_zero_bits(), 256);

        let mut bytes = [0u8; 32];
        bytes[0] = 0x01;
        assert_eq!(Hash256::new(bytes).leading_zero_bits(), 7);

        bytes[0] = 0x80;
        assert_eq!(Hash256::new(bytes).leading_zero_bits(), 0);

        bytes[0] = 0x00;
        bytes[1] = 0x10;
        assert_eq!(Hash256::new(bytes).leading_zero_bits(), 11);
    }

    #[test]
    fn test_hash256_hex_roundtrip() {
        let hash = Hash256::new([0xab; 32]);
        let hex = hash.to_hex();
        let decoded = Hash256::from_hex(&hex).unwrap();
        assert_eq!(hash, decoded);
    }
}
