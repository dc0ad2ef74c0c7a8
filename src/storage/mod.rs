// Storage layer: persisted ledger and the in-memory transaction pool

mod chain_store;
mod mempool;

pub use chain_store::{ChainMetadata, ChainStore};
pub use mempool::Mempool;
