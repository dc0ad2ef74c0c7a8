// Key management and wallet persistence

pub mod keys;
mod wallet;

pub use keys::{Address, KeyPair};
pub use wallet::{Wallet, WalletStore, WalletUpdate};
