// Core blockchain data structures

mod block;
pub mod hash;
mod transaction;
mod types;

pub use block::{Block, CURRENT_BLOCK_VERSION, unix_time_now};
pub use hash::{checksum, hash256, sha256};
pub use transaction::Transaction;
pub use types::Hash256;
