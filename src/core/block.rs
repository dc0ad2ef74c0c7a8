// Block data structure

use crate::core::{Hash256, Transaction, hash::sha256};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Protocol version stamped into every block
pub const CURRENT_BLOCK_VERSION: u32 = 1;

/// Current unix time in seconds
pub fn unix_time_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One block of the chain.
///
/// `hash` is the SHA256 of `prev_hash || merkle_root || timestamp || nonce`
/// (all integers big-endian); transactions are bound in via `merkle_root`.
/// A block is mutable only while being mined; once accepted by the ledger it
/// is never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Protocol version
    pub version: u32,
    /// Hash of the preceding block, zero for genesis
    pub prev_hash: Hash256,
    /// Merkle root over the transaction digests
    pub merkle_root: Hash256,
    /// Creation time, unix seconds
    pub timestamp: u64,
    /// Required number of leading zero bits in `hash`
    pub difficulty: u32,
    /// Proof-of-work nonce, interpreted as a big-endian integer
    pub nonce: u64,
    /// Block hash, zero until mined
    pub hash: Hash256,
    /// Transactions included in this block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build an unmined candidate on top of `prev`, inheriting its difficulty
    pub fn candidate(prev: &Block, transactions: Vec<Transaction>) -> Self {
        Self {
            version: CURRENT_BLOCK_VERSION,
            prev_hash: prev.hash,
            merkle_root: Self::merkle_root(&transactions),
            timestamp: unix_time_now(),
            difficulty: prev.difficulty,
            nonce: 0,
            hash: Hash256::zero(),
            transactions,
        }
    }

    /// Build an unmined genesis candidate with the given difficulty
    pub fn genesis(difficulty: u32) -> Self {
        Self {
            version: CURRENT_BLOCK_VERSION,
            prev_hash: Hash256::zero(),
            merkle_root: Hash256::zero(),
            timestamp: unix_time_now(),
            difficulty,
            nonce: 0,
            hash: Hash256::zero(),
            transactions: Vec::new(),
        }
    }

    /// Recompute the block hash from the current field values
    pub fn compute_hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(80);
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_be_bytes());
        data.extend_from_slice(&self.nonce.to_be_bytes());
        sha256(&data)
    }

    /// Merkle root over transaction digests.
    ///
    /// Odd levels duplicate the last digest; an empty list yields the zero
    /// hash.
    pub fn merkle_root(transactions: &[Transaction]) -> Hash256 {
        if transactions.is_empty() {
            return Hash256::zero();
        }

        let mut level: Vec<Hash256> =
            transactions.iter().map(|tx| tx.digest()).collect();

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                let left = pair[0];
                let right = if pair.len() == 2 { pair[1] } else { pair[0] };

                let mut combined = Vec::with_capacity(64);
                combined.extend_from_slice(left.as_bytes());
                combined.extend_from_slice(right.as_bytes());
                next.push(sha256(&combined));
            }
            level = next;
        }

        level[0]
    }

    /// Whether this block starts a chain
    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::keys::KeyPair;

    fn signed_tx(amount: u64) -> Transaction {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let mut tx =
            Transaction::new(a.address.to_string(), b.address.to_string(), amount);
        tx.sign(&a.secret_key);
        tx
    }

    #[test]
    fn test_genesis_candidate() {
        let genesis = Block::genesis(8);
        assert!(genesis.is_genesis());
        assert_eq!(genesis.version, CURRENT_BLOCK_VERSION);
        assert_eq!(genesis.difficulty, 8);
        assert!(genesis.hash.is_zero());
        assert!(genesis.transactions.is_empty());
    }

    #[test]
    fn test_candidate_links_and_inherits_difficulty() {
        let mut genesis = Block::genesis(8);
        genesis.hash = genesis.compute_hash();

        let next = Block::candidate(&genesis, vec![signed_tx(5)]);
        assert_eq!(next.prev_hash, genesis.hash);
        assert_eq!(next.difficulty, genesis.difficulty);
        assert!(!next.is_genesis());
    }

    #[test]
    fn test_compute_hash_is_deterministic() {
        let block = Block::genesis(8);
        assert_eq!(block.compute_hash(), block.compute_hash());

        let mut changed = block.clone();
        changed.nonce += 1;
        assert_ne!(block.compute_hash(), changed.compute_hash());

        let mut changed = block.clone();
        changed.timestamp += 1;
        assert_ne!(block.compute_hash(), changed.compute_hash());
    }

    #[test]
    fn test_merkle_root_single_tx() {
        let tx = signed_tx(1);
        let root = Block::merkle_root(std::slice::from_ref(&tx));
        assert_eq!(root, tx.digest());
    }

    #[test]
    fn test_merkle_root_multiple_tx() {
        let txs = vec![signed_tx(1), signed_tx(2), signed_tx(3)];
        let root = Block::merkle_root(&txs);
        assert!(!root.is_zero());

        // Order matters
        let reordered = vec![txs[1].clone(), txs[0].clone(), txs[2].clone()];
        assert_ne!(root, Block::merkle_root(&reordered));
    }

    #[test]
    fn test_merkle_root_empty() {
        assert!(Block::merkle_root(&[]).is_zero());
    }
}
