// Pending transaction pool

use crate::core::Transaction;
use std::sync::RwLock;

/// Buffer of signed, not-yet-included transactions.
///
/// Insertion order is inclusion priority: the miner drains from the front.
/// The pool never validates; callers validate before adding. All operations
/// are atomic under one lock so the mining task and the network receive
/// tasks can share it.
pub struct Mempool {
    inner: RwLock<Vec<Transaction>>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool {
            inner: RwLock::new(Vec::new()),
        }
    }

    /// Append a transaction to the back of the pool
    pub fn add(&self, tx: Transaction) {
        match self.inner.write() {
            Ok(mut pool) => pool.push(tx),
            Err(_) => log::error!("failed to acquire write lock on mempool"),
        }
    }

    /// Atomically remove and return the first `n` transactions in FIFO order.
    ///
    /// Returns `None` when fewer than `n` transactions are pending; that is
    /// a normal condition, not an error.
    pub fn pop_n(&self, n: usize) -> Option<Vec<Transaction>> {
        match self.inner.write() {
            Ok(mut pool) => {
                if pool.len() < n {
                    return None;
                }
                Some(pool.drain(..n).collect())
            }
            Err(_) => {
                log::error!("failed to acquire write lock on mempool");
                None
            }
        }
    }

    /// Delete any of the given transactions still present, matched by value.
    ///
    /// Used to reconcile the pool after a block containing them was accepted
    /// from the network.
    pub fn remove(&self, txs: &[Transaction]) {
        match self.inner.write() {
            Ok(mut pool) => {
                for tx in txs {
                    if let Some(idx) = pool.iter().position(|t| t == tx) {
                        pool.remove(idx);
                    }
                }
            }
            Err(_) => log::error!("failed to acquire write lock on mempool"),
        }
    }

    pub fn contains(&self, tx: &Transaction) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.iter().any(|t| t == tx),
            Err(_) => {
                log::error!("failed to acquire read lock on mempool");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.len(),
            Err(_) => {
                log::error!("failed to acquire read lock on mempool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::keys::KeyPair;

    fn signed_tx(amount: u64) -> Transaction {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let mut tx =
            Transaction::new(a.address.to_string(), b.address.to_string(), amount);
        tx.sign(&a.secret_key);
        tx
    }

    #[test]
    fn test_add_and_len() {
        let pool = Mempool::new();
        assert!(pool.is_empty());

        pool.add(signed_tx(1));
        pool.add(signed_tx(2));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_pop_n_fifo_order() {
        let pool = Mempool::new();
        let txs: Vec<Transaction> = (1..=4).map(signed_tx).collect();
        for tx in &txs {
            pool.add(tx.clone());
        }

        let popped = pool.pop_n(2).unwrap();
        assert_eq!(popped, txs[..2]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_pop_n_insufficient_is_not_an_error() {
        let pool = Mempool::new();
        pool.add(signed_tx(1));

        assert!(pool.pop_n(2).is_none());
        // Nothing consumed on a miss
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_pop_then_remove_preserves_remainder_order() {
        let pool = Mempool::new();
        let txs: Vec<Transaction> = (1..=5).map(signed_tx).collect();
        for tx in &txs {
            pool.add(tx.clone());
        }

        let popped = pool.pop_n(2).unwrap();
        pool.remove(&popped);

        assert_eq!(pool.len(), txs.len() - 2);
        assert!(pool.contains(&txs[2]));
        assert!(pool.contains(&txs[3]));
        assert!(pool.contains(&txs[4]));

        let rest = pool.pop_n(3).unwrap();
        assert_eq!(rest, txs[2..]);
    }

    #[test]
    fn test_remove_by_identity() {
        let pool = Mempool::new();
        let keep = signed_tx(1);
        let drop1 = signed_tx(2);
        let drop2 = signed_tx(3);

        pool.add(keep.clone());
        pool.add(drop1.clone());
        pool.add(drop2.clone());

        // Removing transactions not in the pool is a no-op
        pool.remove(&[drop1, drop2, signed_tx(4)]);

        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&keep));
    }
}
