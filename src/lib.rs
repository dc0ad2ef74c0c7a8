// Minimal proof-of-work blockchain with a gossip network

pub mod chain;
pub mod cli;
pub mod consensus;
pub mod core;
pub mod error;
pub mod miner;
pub mod network;
pub mod storage;
pub mod wallet;

// Re-exports for convenience
pub use chain::Blockchain;
pub use cli::{Cli, CliHandler};
pub use consensus::{Consensus, ProofOfWork};
pub use core::{Block, Hash256, Transaction};
pub use error::{ChainError, Result};
pub use miner::Miner;
pub use network::{Message, Node, Peer};
pub use storage::{ChainStore, Mempool};
pub use wallet::{Wallet, WalletStore};
