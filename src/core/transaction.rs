// Transaction data structure

use crate::core::{Hash256, hash::sha256};
use crate::wallet::keys::{self, Address};
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};

/// A transfer of value between two addresses.
///
/// `signature` covers the deterministic serialization of the other three
/// fields and is empty until [`Transaction::sign`] is called. A transaction
/// is immutable once signed: changing any field invalidates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender address (base58check over the sender's public key)
    pub sender: String,
    /// Recipient address
    pub recipient: String,
    /// Transferred amount, must be positive
    pub amount: u64,
    /// Hex-encoded compact ECDSA signature (r || s)
    pub signature: String,
}

impl Transaction {
    /// Create a new unsigned transaction
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            signature: String::new(),
        }
    }

    /// Canonical byte serialization signed by the sender.
    ///
    /// Field order and encoding are fixed so signer and verifier always
    /// produce identical bytes.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut data =
            Vec::with_capacity(self.sender.len() + self.recipient.len() + 8);
        data.extend_from_slice(self.sender.as_bytes());
        data.extend_from_slice(self.recipient.as_bytes());
        data.extend_from_slice(&self.amount.to_be_bytes());
        data
    }

    /// Sign the transaction with the sender's private key
    pub fn sign(&mut self, secret_key: &SecretKey) {
        self.signature = keys::sign(&self.signing_bytes(), secret_key);
    }

    /// Validate the transaction.
    ///
    /// Checks that both endpoints are non-empty, the amount is positive and
    /// the signature verifies against the public key recovered from the
    /// sender address. Fails closed if the address cannot be decoded.
    pub fn is_valid(&self) -> bool {
        if self.sender.is_empty() || self.recipient.is_empty() {
            return false;
        }
        if self.amount == 0 {
            return false;
        }

        let public_key = match Address::from_string(&self.sender).public_key() {
            Ok(key) => key,
            Err(_) => return false,
        };

        keys::verify(&self.signing_bytes(), &self.signature, &public_key)
    }

    /// Content digest used as the transaction's identity in merkle trees
    pub fn digest(&self) -> Hash256 {
        let mut data = self.signing_bytes();
        data.extend_from_slice(self.signature.as_bytes());
        sha256(&data)
    }
}
