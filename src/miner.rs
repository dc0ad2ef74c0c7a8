// Mining loop: drains the mempool, runs the search off the async runtime

use crate::consensus::Consensus;
use crate::core::{Block, Transaction};
use crate::error::{ChainError, Result};
use crate::network::Node;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Difficulty assigned to a freshly mined genesis block; every later block
/// inherits it from its predecessor
pub const GENESIS_DIFFICULTY: u32 = 16;

/// Most transactions packed into one block
pub const MAX_BLOCK_TRANSACTIONS: usize = 16;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Drives block production for one node.
///
/// The search itself runs on a blocking thread so a long nonce hunt never
/// stalls the network tasks. The node's halt flag cuts the search short
/// when a competing block arrives; the drained transactions then go back
/// into the pool.
pub struct Miner {
    node: Arc<Node>,
    consensus: Arc<dyn Consensus>,
}

impl Miner {
    pub fn new(node: Arc<Node>, consensus: Arc<dyn Consensus>) -> Self {
        Self { node, consensus }
    }

    /// Mine a genesis block if the chain is empty. No-op otherwise.
    pub async fn ensure_genesis(&self) -> Result<()> {
        let chain_arc = self.node.chain();
        let mut chain = chain_arc.lock().await;
        if chain.height() > 0 {
            return Ok(());
        }

        log::info!("mining genesis block at difficulty {GENESIS_DIFFICULTY}");
        let consensus = Arc::clone(&self.consensus);
        let mined = tokio::task::spawn_blocking(move || {
            let mut genesis = Block::genesis(GENESIS_DIFFICULTY);
            let halt = AtomicBool::new(false);
            if consensus.generate_block(&mut genesis, &halt) {
                Some(genesis)
            } else {
                None
            }
        })
        .await
        .map_err(|e| ChainError::Io(e.to_string()))?;

        // The flag above is never raised, so the search cannot come back empty
        let genesis = mined.ok_or_else(|| {
            ChainError::InvalidBlock("genesis search aborted".to_string())
        })?;
        chain.add_block(genesis)?;
        chain.save(&self.node.store())
    }

    /// Mine until node shutdown
    pub async fn run(&self) {
        let mempool = self.node.mempool();
        let halt = self.node.halt_flag();
        let mut shutdown = self.node.subscribe_shutdown();

        loop {
            let batch = mempool.len().min(MAX_BLOCK_TRANSACTIONS);
            if batch == 0 {
                tokio::select! {
                    _ = tokio::time::sleep(POLL_INTERVAL) => continue,
                    _ = shutdown.changed() => return,
                }
            }

            let txs = match mempool.pop_n(batch) {
                Some(txs) => txs,
                // Raced with a network block that drained the pool
                None => continue,
            };

            let candidate = {
                let chain_arc = self.node.chain();
                let chain = chain_arc.lock().await;
                // Clear the flag while still holding the lock: a block
                // accepted after this candidate raises it again only after
                // taking the same lock, so the cancellation cannot be lost
                halt.store(false, Ordering::Relaxed);
                chain.last_block().map(|prev| Block::candidate(prev, txs.clone()))
            };
            let candidate = match candidate {
                Some(candidate) => candidate,
                None => {
                    // No genesis yet; nothing to build on
                    self.requeue(&txs).await;
                    tokio::time::sleep(POLL_INTERVAL).await;
                    continue;
                }
            };

            let consensus = Arc::clone(&self.consensus);
            let search_halt = Arc::clone(&halt);
            let mined = tokio::task::spawn_blocking(move || {
                let mut block = candidate;
                if consensus.generate_block(&mut block, &search_halt) {
                    Some(block)
                } else {
                    None
                }
            })
            .await
            .unwrap_or(None);

            match mined {
                Some(block) => {
                    if self.commit(block.clone(), &txs).await {
                        self.node.broadcast_block(&block).await;
                    }
                }
                None => {
                    log::debug!(
                        "search cancelled, returning {} transactions to the pool",
                        txs.len()
                    );
                    self.requeue(&txs).await;
                }
            }

            if *shutdown.borrow() {
                return;
            }
        }
    }

    /// Append a freshly sealed block, or discard it when the tail moved
    /// during the search.
    ///
    /// A competing network block can win between sealing and this append;
    /// the candidate still links to the old tail, so appending it would
    /// re-include transactions the winner already carries. Discarded
    /// candidates send their transactions back through [`Miner::requeue`].
    async fn commit(&self, block: Block, txs: &[Transaction]) -> bool {
        let accepted = {
            let chain_arc = self.node.chain();
            let mut chain = chain_arc.lock().await;

            let tail_moved = chain
                .last_block()
                .map(|tail| tail.hash != block.prev_hash)
                .unwrap_or(true);
            if tail_moved {
                log::debug!("tail moved during the search, discarding candidate");
                false
            } else {
                match chain.add_block(block) {
                    Ok(()) => {
                        if let Err(e) = chain.save(&self.node.store()) {
                            log::error!("failed to persist chain: {e}");
                        }
                        true
                    }
                    Err(e) => {
                        log::warn!("locally mined block rejected: {e}");
                        false
                    }
                }
            }
        };

        if !accepted {
            self.requeue(txs).await;
        }
        accepted
    }

    /// Put drained transactions back, skipping any the winning block (now
    /// the tail) already carries.
    async fn requeue(&self, txs: &[Transaction]) {
        let mempool = self.node.mempool();
        let chain_arc = self.node.chain();
        let chain = chain_arc.lock().await;
        let tail_txs: &[Transaction] = chain
            .last_block()
            .map(|b| b.transactions.as_slice())
            .unwrap_or(&[]);

        for tx in txs {
            if !tail_txs.contains(tx) && !mempool.contains(tx) {
                mempool.add(tx.clone());
            }
        }
    }
}
