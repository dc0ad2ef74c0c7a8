// Wallet persistence and the gossiped balance record

use crate::core::Transaction;
use crate::error::{ChainError, Result};
use crate::wallet::keys::KeyPair;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A local key pair plus its last known balance
pub struct Wallet {
    pub keypair: KeyPair,
    pub balance: u64,
}

/// On-disk wallet format
#[derive(Serialize, Deserialize)]
struct SerializableWallet {
    secret_key_bytes: [u8; 32],
    balance: u64,
}

impl Wallet {
    /// Create a wallet around a fresh key pair
    pub fn new() -> Self {
        Self {
            keypair: KeyPair::generate(),
            balance: 0,
        }
    }

    /// The wallet's address string
    pub fn address(&self) -> String {
        self.keypair.address.to_string()
    }

    /// Sign a transaction with this wallet's private key
    pub fn sign_transaction(&self, tx: &mut Transaction) {
        tx.sign(&self.keypair.secret_key);
    }

    /// The gossip record advertising this wallet's balance
    pub fn update_record(&self) -> WalletUpdate {
        WalletUpdate {
            address: self.address(),
            balance: self.balance,
        }
    }

    /// Save the wallet as `<address>.wallet` under `dir`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        fs::create_dir_all(&dir)?;

        let data = SerializableWallet {
            secret_key_bytes: self.keypair.secret_key.secret_bytes(),
            balance: self.balance,
        };
        let json = serde_json::to_string_pretty(&data)?;

        let path = dir.as_ref().join(format!("{}.wallet", self.address()));
        fs::write(&path, json)?;
        Ok(path)
    }

    /// Load a wallet file written by [`Wallet::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let data: SerializableWallet = serde_json::from_str(&json)?;

        Ok(Self {
            keypair: KeyPair::from_secret_bytes(&data.secret_key_bytes)?,
            balance: data.balance,
        })
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Balance record gossiped between nodes.
///
/// Built by the wallet owner and applied blindly by receivers; the core
/// never interprets it beyond persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletUpdate {
    pub address: String,
    pub balance: u64,
}

/// Persists wallet-update records received over gossip
pub struct WalletStore {
    dir: PathBuf,
}

impl WalletStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Persist a received balance record as `<address>.balance`
    pub fn apply(&self, update: &WalletUpdate) -> Result<()> {
        if update.address.is_empty() {
            return Err(ChainError::MalformedAddress("empty address".to_string()));
        }
        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(update)?;
        let path = self.dir.join(format!("{}.balance", update.address));
        fs::write(path, json)?;
        Ok(())
    }

    /// Read back a previously applied record
    pub fn get(&self, address: &str) -> Result<Option<WalletUpdate>> {
        let path = self.dir.join(format!("{address}.balance"));
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_wallet_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let mut wallet = Wallet::new();
        wallet.balance = 42;

        let path = wallet.save(dir.path()).unwrap();
        let loaded = Wallet::load(path).unwrap();

        assert_eq!(loaded.address(), wallet.address());
        assert_eq!(loaded.balance, 42);
    }

    #[test]
    fn test_wallet_signs_valid_transaction() {
        let wallet = Wallet::new();
        let recipient = Wallet::new();
        let mut tx = Transaction::new(wallet.address(), recipient.address(), 10);

        wallet.sign_transaction(&mut tx);
        assert!(tx.is_valid());
    }

    #[test]
    fn test_update_record_reflects_balance() {
        let mut wallet = Wallet::new();
        wallet.balance = 31;

        let record = wallet.update_record();
        assert_eq!(record.address, wallet.address());
        assert_eq!(record.balance, 31);
    }

    #[test]
    fn test_wallet_store_apply_and_get() {
        let dir = tempdir().unwrap();
        let store = WalletStore::new(dir.path());

        let update = WalletUpdate {
            address: "addr1".to_string(),
            balance: 7,
        };
        store.apply(&update).unwrap();

        assert_eq!(store.get("addr1").unwrap(), Some(update));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_wallet_store_rejects_empty_address() {
        let dir = tempdir().unwrap();
        let store = WalletStore::new(dir.path());

        let update = WalletUpdate {
            address: String::new(),
            balance: 7,
        };
        assert!(store.apply(&update).is_err());
    }
}
