// Persisted ledger using sled

use crate::core::{Block, Hash256};
use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Integrity digest written alongside the block sequence.
///
/// Recomputed and compared on every load; a mismatch means the store was
/// truncated or corrupted and the node must not proceed with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub last_block_hash: Hash256,
    pub block_count: u64,
}

const META_KEY: &[u8] = b"meta";

/// Block-sequence store backed by sled
pub struct ChainStore {
    db: sled::Db,
}

impl ChainStore {
    /// Open (or create) a store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory store for tests
    pub fn memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Persist the full block sequence plus its integrity digest
    pub fn save_chain(&self, blocks: &[Block]) -> Result<()> {
        for (height, block) in blocks.iter().enumerate() {
            let data = serde_json::to_vec(block)?;
            self.db.insert(Self::block_key(height as u64), data)?;
        }

        let meta = ChainMetadata {
            last_block_hash: blocks.last().map(|b| b.hash).unwrap_or_else(Hash256::zero),
            block_count: blocks.len() as u64,
        };
        self.db.insert(META_KEY, serde_json::to_vec(&meta)?)?;
        self.db.flush()?;

        Ok(())
    }

    /// Load the stored block sequence.
    ///
    /// Returns `Ok(None)` for a fresh store. Fails with `CorruptStore` when
    /// blocks are missing or the recomputed digest does not match the stored
    /// one.
    pub fn load_chain(&self) -> Result<Option<Vec<Block>>> {
        let meta = match self.read_meta()? {
            Some(meta) => meta,
            None => return Ok(None),
        };

        let mut blocks = Vec::with_capacity(meta.block_count as usize);
        for height in 0..meta.block_count {
            let data = self
                .db
                .get(Self::block_key(height))?
                .ok_or_else(|| {
                    ChainError::CorruptStore(format!("missing block at height {height}"))
                })?;
            let block: Block = serde_json::from_slice(&data)
                .map_err(|e| ChainError::CorruptStore(format!("block {height}: {e}")))?;
            blocks.push(block);
        }

        let recomputed = ChainMetadata {
            last_block_hash: blocks.last().map(|b| b.hash).unwrap_or_else(Hash256::zero),
            block_count: blocks.len() as u64,
        };
        if recomputed != meta {
            return Err(ChainError::CorruptStore(format!(
                "digest mismatch: stored {}/{}, recomputed {}/{}",
                meta.last_block_hash,
                meta.block_count,
                recomputed.last_block_hash,
                recomputed.block_count
            )));
        }

        Ok(Some(blocks))
    }

    fn read_meta(&self) -> Result<Option<ChainMetadata>> {
        match self.db.get(META_KEY)? {
            Some(data) => {
                let meta = serde_json::from_slice(&data)
                    .map_err(|e| ChainError::CorruptStore(format!("metadata: {e}")))?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    fn block_key(height: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(9);
        key.push(b'b');
        key.extend_from_slice(&height.to_be_bytes());
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{Consensus, ProofOfWork};
    use std::sync::atomic::AtomicBool;

    fn mined_chain(len: u64) -> Vec<Block> {
        let pow = ProofOfWork::new();
        let halt = AtomicBool::new(false);

        let mut blocks = Vec::new();
        let mut genesis = Block::genesis(8);
        assert!(pow.generate_block(&mut genesis, &halt));
        blocks.push(genesis);

        for _ in 1..len {
            let mut next = Block::candidate(blocks.last().unwrap(), Vec::new());
            assert!(pow.generate_block(&mut next, &halt));
            blocks.push(next);
        }
        blocks
    }

    #[test]
    fn test_fresh_store_is_empty() {
        let store = ChainStore::memory().unwrap();
        assert!(store.load_chain().unwrap().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = ChainStore::memory().unwrap();
        let blocks = mined_chain(3);

        store.save_chain(&blocks).unwrap();
        let loaded = store.load_chain().unwrap().unwrap();
        assert_eq!(loaded, blocks);
    }

    #[test]
    fn test_missing_block_is_corrupt() {
        let store = ChainStore::memory().unwrap();
        let blocks = mined_chain(3);
        store.save_chain(&blocks).unwrap();

        store.db.remove(ChainStore::block_key(1)).unwrap();

        assert!(matches!(
            store.load_chain(),
            Err(ChainError::CorruptStore(_))
        ));
    }

    #[test]
    fn test_digest_mismatch_is_corrupt() {
        let store = ChainStore::memory().unwrap();
        let blocks = mined_chain(2);
        store.save_chain(&blocks).unwrap();

        // Tamper with the stored tail hash
        let meta = ChainMetadata {
            last_block_hash: Hash256::new([9u8; 32]),
            block_count: 2,
        };
        store
            .db
            .insert(META_KEY, serde_json::to_vec(&meta).unwrap())
            .unwrap();

        assert!(matches!(
            store.load_chain(),
            Err(ChainError::CorruptStore(_))
        ));
    }

    #[test]
    fn test_garbled_metadata_is_corrupt() {
        let store = ChainStore::memory().unwrap();
        store.db.insert(META_KEY, &b"not json"[..]).unwrap();

        assert!(matches!(
            store.load_chain(),
            Err(ChainError::CorruptStore(_))
        ));
    }
}
