//! Bounded pool of fetched-but-not-yet-placed transactions

use rand::Rng;

use crate::chain::{TransactionRecord, TxHash};

/// Transaction buffer with silent drop on overflow
#[derive(Debug, Clone)]
pub struct TxBuffer {
    txs: Vec<TransactionRecord>,
    capacity: usize,
}

impl TxBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            txs: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append if there is room. Returns false when the transaction was dropped.
    pub fn offer(&mut self, tx: TransactionRecord) -> bool {
        if self.txs.len() >= self.capacity {
            return false;
        }
        self.txs.push(tx);
        true
    }

    /// Remove and return one transaction chosen uniformly at random
    pub fn sample_one<R: Rng>(&mut self, rng: &mut R) -> Option<TransactionRecord> {
        if self.txs.is_empty() {
            return None;
        }
        let r: f64 = rng.random();
        let idx = ((r * self.txs.len() as f64) as usize).min(self.txs.len() - 1);
        Some(self.txs.remove(idx))
    }

    /// Drop the tail beyond capacity
    pub fn maintain(&mut self) {
        if self.txs.len() > self.capacity {
            log::debug!(
                "Truncating tx buffer from {} to {}",
                self.txs.len(),
                self.capacity
            );
            self.txs.truncate(self.capacity);
        }
    }

    /// New capacity applies at the next [`Self::maintain`]
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn has_room(&self) -> bool {
        self.txs.len() < self.capacity
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.txs.iter().any(|tx| tx.hash == *hash)
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn clear(&mut self) {
        self.txs.clear();
    }
}
