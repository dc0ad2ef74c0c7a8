// Proof of work implementation

use crate::consensus::Consensus;
use crate::core::{Block, CURRENT_BLOCK_VERSION, unix_time_now};
use std::sync::atomic::{AtomicBool, Ordering};

/// How many hash attempts to make between polls of the halt flag
const HALT_CHECK_INTERVAL: u64 = 1024;

/// Nonce-search proof of work.
///
/// A block is sealed when its hash carries at least `difficulty` leading
/// zero bits. Difficulty is carried on each block and never adjusted during
/// the search; a candidate inherits its predecessor's difficulty unchanged.
pub struct ProofOfWork;

impl ProofOfWork {
    pub fn new() -> Self {
        Self
    }

    fn meets_difficulty(block: &Block) -> bool {
        block.hash.leading_zero_bits() >= block.difficulty
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl Consensus for ProofOfWork {
    fn generate_block(&self, block: &mut Block, halt: &AtomicBool) -> bool {
        // Random starting point, then monotonic big-endian increments
        block.nonce = rand::random();

        let mut attempts = 0u64;
        loop {
            let hash = block.compute_hash();
            if hash.leading_zero_bits() >= block.difficulty {
                block.hash = hash;
                log::debug!(
                    "sealed block {} after {} attempts (difficulty {})",
                    block.hash,
                    attempts + 1,
                    block.difficulty
                );
                return true;
            }

            block.nonce = block.nonce.wrapping_add(1);
            attempts += 1;

            if attempts % HALT_CHECK_INTERVAL == 0 && halt.load(Ordering::Relaxed) {
                log::debug!("mining halted after {attempts} attempts");
                return false;
            }
        }
    }

    fn verify_block(&self, block: &Block) -> bool {
        if block.version != CURRENT_BLOCK_VERSION {
            return false;
        }

        if block.timestamp > unix_time_now() {
            return false;
        }

        for tx in &block.transactions {
            if !tx.is_valid() {
                return false;
            }
        }

        // The hash binds the transactions through the merkle root
        if Block::merkle_root(&block.transactions) != block.merkle_root {
            return false;
        }

        if block.compute_hash() != block.hash {
            return false;
        }

        Self::meets_difficulty(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::wallet::keys::KeyPair;

    fn no_halt() -> AtomicBool {
        AtomicBool::new(false)
    }

    fn mined_genesis(difficulty: u32) -> Block {
        let pow = ProofOfWork::new();
        let mut block = Block::genesis(difficulty);
        assert!(pow.generate_block(&mut block, &no_halt()));
        block
    }

    #[test]
    fn test_mined_genesis_verifies() {
        let pow = ProofOfWork::new();
        let block = mined_genesis(8);

        // Difficulty 8 requires one leading zero byte
        assert_eq!(block.hash.as_bytes()[0], 0x00);
        assert!(pow.verify_block(&block));
    }

    #[test]
    fn test_mined_block_with_transactions_verifies() {
        let pow = ProofOfWork::new();
        let genesis = mined_genesis(8);

        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let mut tx =
            Transaction::new(a.address.to_string(), b.address.to_string(), 10);
        tx.sign(&a.secret_key);

        let mut block = Block::candidate(&genesis, vec![tx]);
        assert!(pow.generate_block(&mut block, &no_halt()));
        assert!(pow.verify_block(&block));
    }

    #[test]
    fn test_mutations_after_mining_are_rejected() {
        let pow = ProofOfWork::new();
        let block = mined_genesis(8);

        let mut tampered = block.clone();
        tampered.nonce = tampered.nonce.wrapping_add(1);
        assert!(!pow.verify_block(&tampered));

        let mut tampered = block.clone();
        tampered.prev_hash = crate::core::Hash256::new([7u8; 32]);
        assert!(!pow.verify_block(&tampered));

        let mut tampered = block.clone();
        tampered.merkle_root = crate::core::Hash256::new([7u8; 32]);
        assert!(!pow.verify_block(&tampered));

        let mut tampered = block.clone();
        tampered.timestamp -= 1;
        assert!(!pow.verify_block(&tampered));
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let pow = ProofOfWork::new();
        let mut block = mined_genesis(8);
        block.version += 1;
        assert!(!pow.verify_block(&block));
    }

    #[test]
    fn test_future_timestamp_is_rejected() {
        let pow = ProofOfWork::new();
        let mut block = Block::genesis(0);
        block.timestamp = unix_time_now() + 1000;
        block.hash = block.compute_hash();
        assert!(!pow.verify_block(&block));
    }

    #[test]
    fn test_invalid_transaction_is_rejected() {
        let pow = ProofOfWork::new();
        let genesis = mined_genesis(8);

        // Unsigned transaction inside an otherwise well-sealed block
        let tx = Transaction::new("a", "b", 10);
        let mut block = Block::candidate(&genesis, vec![tx]);
        assert!(pow.generate_block(&mut block, &no_halt()));
        assert!(!pow.verify_block(&block));
    }

    #[test]
    fn test_halt_flag_stops_the_search() {
        let pow = ProofOfWork::new();
        // Difficulty high enough that the search cannot finish quickly
        let mut block = Block::genesis(240);

        let halt = AtomicBool::new(true);
        assert!(!pow.generate_block(&mut block, &halt));
        assert!(block.hash.is_zero());
    }

    #[test]
    fn test_difficulty_not_adjusted_by_search() {
        let block = mined_genesis(8);
        assert_eq!(block.difficulty, 8);
    }
}
