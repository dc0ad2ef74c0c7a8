// Key pairs, addresses and the signature codec

use crate::core::hash::{checksum, sha256};
use crate::error::{ChainError, Result};
use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version byte prepended to the address payload
const ADDRESS_VERSION: u8 = 0x00;

/// Checksum suffix length in bytes
const ADDRESS_CHECKSUM_LEN: usize = 4;

/// Compressed secp256k1 public key length
const PUBLIC_KEY_LEN: usize = 33;

/// Sign a message with the given private key.
///
/// The message is hashed with SHA256 and signed with ECDSA; the signature is
/// returned as fixed-width hex over the compact (r || s) form, so it always
/// encodes to 128 characters.
pub fn sign(message: &[u8], secret_key: &SecretKey) -> String {
    let secp = Secp256k1::signing_only();
    let digest = sha256(message);
    let msg = Message::from_digest(*digest.as_bytes());
    let signature = secp.sign_ecdsa(&msg, secret_key);
    hex::encode(signature.serialize_compact())
}

/// Verify a hex-encoded compact signature over a message.
///
/// Never fails with an error: any decode problem yields `false`.
pub fn verify(message: &[u8], signature_hex: &str, public_key: &PublicKey) -> bool {
    let sig_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = match Signature::from_compact(&sig_bytes) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    let secp = Secp256k1::verification_only();
    let digest = sha256(message);
    let msg = Message::from_digest(*digest.as_bytes());
    secp.verify_ecdsa(&msg, &signature, public_key).is_ok()
}

/// A base58check address carrying the sender's public key.
///
/// Layout before encoding: `version byte || compressed public key || 4-byte
/// checksum`, where the checksum is the truncated double SHA256 of the
/// version byte and key. The key itself is embedded (not hashed down) so the
/// address is fully invertible back to the public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Derive the address for a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let mut payload = Vec::with_capacity(1 + PUBLIC_KEY_LEN);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&public_key.serialize());

        let check = checksum(&payload);
        payload.extend_from_slice(&check);

        Self(bs58::encode(payload).into_string())
    }

    /// Wrap an externally supplied address string (validated on use)
    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }

    /// Recover the public key embedded in the address.
    ///
    /// Returns `ChecksumMismatch` if the trailing checksum does not match a
    /// recomputed checksum over the payload, or `MalformedAddress` if the
    /// decoded payload is too short or does not parse as a public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        let decoded = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| ChainError::MalformedAddress(e.to_string()))?;

        if decoded.len() <= ADDRESS_CHECKSUM_LEN {
            return Err(ChainError::MalformedAddress(format!(
                "decoded to {} bytes",
                decoded.len()
            )));
        }

        let (payload, check) = decoded.split_at(decoded.len() - ADDRESS_CHECKSUM_LEN);
        if checksum(payload) != check {
            return Err(ChainError::ChecksumMismatch);
        }

        // Strip the version byte
        let key_bytes = &payload[1..];
        if key_bytes.len() < PUBLIC_KEY_LEN {
            return Err(ChainError::MalformedAddress(format!(
                "public key is {} bytes, need {PUBLIC_KEY_LEN}",
                key_bytes.len()
            )));
        }

        PublicKey::from_slice(key_bytes)
            .map_err(|e| ChainError::MalformedAddress(e.to_string()))
    }

    /// Address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A secp256k1 key pair with its derived address
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    pub address: Address,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let mut rng = OsRng;

        let secret_key = SecretKey::new(&mut rng);
        let public_key = secret_key.public_key(&secp);
        let address = Address::from_public_key(&public_key);

        Self {
            secret_key,
            public_key,
            address,
        }
    }

    /// Rebuild a key pair from raw secret key bytes
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| ChainError::MalformedAddress(format!("invalid secret key: {e}")))?;
        let public_key = secret_key.public_key(&secp);
        let address = Address::from_public_key(&public_key);

        Ok(Self {
            secret_key,
            public_key,
            address,
        })
    }
}
