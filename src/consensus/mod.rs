// Consensus capability and its proof-of-work implementation

mod pow;

pub use pow::ProofOfWork;

use crate::core::Block;
use std::sync::atomic::AtomicBool;

/// Pluggable consensus algorithm.
///
/// The ledger validates blocks only through this capability, so an
/// alternative algorithm can be swapped in without touching the chain.
pub trait Consensus: Send + Sync {
    /// Seal a candidate block, setting its `hash` field.
    ///
    /// The search has no fixed upper bound; it polls `halt` and returns
    /// `false` when the flag is raised, leaving the block unsealed.
    fn generate_block(&self, block: &mut Block, halt: &AtomicBool) -> bool;

    /// Check whether an externally supplied block is acceptable
    fn verify_block(&self, block: &Block) -> bool;
}
