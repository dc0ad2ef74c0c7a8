// The ledger: an append-only sequence of accepted blocks

use crate::consensus::Consensus;
use crate::core::{Block, Hash256};
use crate::error::{ChainError, Result};
use crate::storage::ChainStore;
use std::sync::Arc;

/// Append-only block sequence, genesis at index 0.
///
/// Every block enters through [`Blockchain::add_block`], which enforces the
/// consensus rules before mutation. Blocks are never removed or reordered;
/// there is no reorg support. One instance per node, constructor-injected
/// into every task that needs it.
pub struct Blockchain {
    blocks: Vec<Block>,
    consensus: Arc<dyn Consensus>,
}

impl Blockchain {
    /// Create an empty chain validating through the given consensus engine
    pub fn new(consensus: Arc<dyn Consensus>) -> Self {
        Self {
            blocks: Vec::new(),
            consensus,
        }
    }

    /// Validate and append a block.
    ///
    /// Rejects with `InvalidBlock` unless the consensus engine accepts it.
    /// On acceptance the block's `prev_hash` is pointed at the current tail
    /// (a no-op for locally mined candidates, which are built on the tail)
    /// before it is appended.
    pub fn add_block(&mut self, mut block: Block) -> Result<()> {
        if !self.consensus.verify_block(&block) {
            return Err(ChainError::InvalidBlock(format!(
                "consensus rejected block {}",
                block.hash
            )));
        }

        if let Some(tail) = self.blocks.last() {
            block.prev_hash = tail.hash;
        }

        log::info!(
            "accepted block {} at height {} ({} transactions)",
            block.hash,
            self.blocks.len(),
            block.transactions.len()
        );
        self.blocks.push(block);
        Ok(())
    }

    /// The tail of the chain, or `None` for an empty chain
    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Linear lookup by block hash
    pub fn get_block(&self, hash: &Hash256) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == *hash)
    }

    /// Indexed lookup by height (insertion index)
    pub fn get_block_by_height(&self, height: usize) -> Option<&Block> {
        self.blocks.get(height)
    }

    /// All accepted blocks in order
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of accepted blocks
    pub fn height(&self) -> usize {
        self.blocks.len()
    }

    /// Persist the full chain through the store
    pub fn save(&self, store: &ChainStore) -> Result<()> {
        store.save_chain(&self.blocks)
    }

    /// Load a chain from the store, or start empty on a fresh store.
    ///
    /// A corrupt store is fatal and surfaces as `CorruptStore`.
    pub fn load(store: &ChainStore, consensus: Arc<dyn Consensus>) -> Result<Self> {
        let blocks = store.load_chain()?.unwrap_or_default();
        if !blocks.is_empty() {
            log::info!("loaded chain with {} blocks", blocks.len());
        }
        Ok(Self { blocks, consensus })
    }
}
