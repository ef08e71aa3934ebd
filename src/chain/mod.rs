//! Chain data source abstraction
//!
//! The game never talks to a node directly. Requests go out through
//! [`ChainSource::request`]; completions and subscription notifications come
//! back as [`ChainEvent`]s drained once per tick, so every mutation happens on
//! the tick thread.

pub mod rpc;
pub mod scripted;

use std::fmt;

use thiserror::Error;

pub use scripted::ScriptedChainSource;

/// Wei per gwei
pub const WEI_PER_GWEI: f64 = 1e9;
/// Wei per native unit (ETH)
pub const WEI_PER_ETH: f64 = 1e18;

/// Errors reported by a chain data source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    /// Network/transport failure (timeout, connection refused, HTTP status)
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON-RPC error object returned by the node
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Operation on a subscription that is not installed
    #[error("subscription {0} is not active")]
    Unsubscribed(SubscriptionId),
}

/// Transaction hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    /// Abbreviated form for logs and tooltips (`0x1234…abcd`)
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        format!("0x{}…{}", &full[..4], &full[60..])
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.short())
    }
}

/// 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        format!("0x{}…{}", &full[..4], &full[36..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

/// A pending transaction as reported by the node. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub hash: TxHash,
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    /// Transferred value in wei
    pub value: u128,
    /// Gas price in wei (legacy price or EIP-1559 max fee)
    pub gas_price: u128,
    pub gas_limit: u64,
    pub nonce: u64,
    pub input: Vec<u8>,
}

impl TransactionRecord {
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Leading 4-byte method selector, if the input carries one
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).map(|s| [s[0], s[1], s[2], s[3]])
    }

    pub fn gas_price_gwei(&self) -> f64 {
        self.gas_price as f64 / WEI_PER_GWEI
    }

    pub fn value_eth(&self) -> f64 {
        self.value as f64 / WEI_PER_ETH
    }
}

/// Mined receipt summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptInfo {
    /// `status == 1`
    pub success: bool,
    pub block_number: u64,
}

/// Result of a receipt lookup, paired with the head block at lookup time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptLookup {
    /// `None` while the transaction is still pending
    pub receipt: Option<ReceiptInfo>,
    pub head: u64,
}

/// Fee data and mempool size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkSample {
    pub gas_price_gwei: f64,
    pub pending_tx_count: u64,
}

/// Outgoing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainRequest {
    /// `getTransaction(hash)`
    Transaction(TxHash),
    /// `getTransactionReceipt(hash)` plus `getBlockNumber()`
    Receipt(TxHash),
    /// `getFeeData()` plus `getBlock("pending")`
    NetworkSample,
}

/// Completion or notification, delivered on the tick thread
#[derive(Debug, Clone, PartialEq)]
pub enum ChainEvent {
    PendingTransaction(TxHash),
    NewBlock(u64),
    Transaction {
        hash: TxHash,
        result: Result<Option<TransactionRecord>, ChainError>,
    },
    Receipt {
        hash: TxHash,
        result: Result<ReceiptLookup, ChainError>,
    },
    NetworkSample(Result<NetworkSample, ChainError>),
}

/// Notification streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    PendingTransactions,
    NewBlocks,
}

/// Handle returned by [`ChainSource::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u32);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability set the game consumes. All calls are best-effort.
pub trait ChainSource {
    /// Start receiving notifications for `topic`
    fn subscribe(&mut self, topic: Topic) -> Result<SubscriptionId, ChainError>;

    /// Stop a subscription. Unknown ids are ignored.
    fn unsubscribe(&mut self, id: SubscriptionId);

    /// Queue a lookup; its completion arrives through [`Self::poll_events`]
    fn request(&mut self, request: ChainRequest);

    /// Drain notifications and completions that arrived since the last call
    fn poll_events(&mut self, now_ms: u64) -> Vec<ChainEvent>;
}

impl<T: ChainSource + ?Sized> ChainSource for Box<T> {
    fn subscribe(&mut self, topic: Topic) -> Result<SubscriptionId, ChainError> {
        (**self).subscribe(topic)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        (**self).unsubscribe(id)
    }

    fn request(&mut self, request: ChainRequest) {
        (**self).request(request)
    }

    fn poll_events(&mut self, now_ms: u64) -> Vec<ChainEvent> {
        (**self).poll_events(now_ms)
    }
}

/// Subscription bookkeeping shared by source implementations
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next_id: u32,
    active: Vec<(SubscriptionId, Topic)>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, topic: Topic) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.active.push((id, topic));
        id
    }

    /// Returns the topic if the id was active
    pub fn remove(&mut self, id: SubscriptionId) -> Option<Topic> {
        let idx = self.active.iter().position(|(sid, _)| *sid == id)?;
        Some(self.active.remove(idx).1)
    }

    /// Whether anyone listens to `topic`
    pub fn is_subscribed(&self, topic: Topic) -> bool {
        self.active.iter().any(|(_, t)| *t == topic)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_requires_four_bytes() {
        let mut tx = TransactionRecord {
            hash: TxHash([1; 32]),
            from: Address::default(),
            to: Some(Address([2; 20])),
            value: 0,
            gas_price: 0,
            gas_limit: 21_000,
            nonce: 0,
            input: vec![0xa9, 0x05, 0x9c],
        };
        assert_eq!(tx.selector(), None);
        tx.input.push(0xbb);
        assert_eq!(tx.selector(), Some([0xa9, 0x05, 0x9c, 0xbb]));
    }

    #[test]
    fn test_hash_display() {
        let hash = TxHash([0xab; 32]);
        assert_eq!(hash.to_string().len(), 66);
        assert_eq!(hash.short(), "0xabab…abab");
    }

    #[test]
    fn test_registry_add_remove() {
        let mut reg = SubscriptionRegistry::new();
        let a = reg.add(Topic::PendingTransactions);
        let b = reg.add(Topic::NewBlocks);
        assert_ne!(a, b);
        assert!(reg.is_subscribed(Topic::NewBlocks));
        assert_eq!(reg.remove(b), Some(Topic::NewBlocks));
        assert!(!reg.is_subscribed(Topic::NewBlocks));
        assert_eq!(reg.remove(b), None);
        assert_eq!(reg.len(), 1);
    }
}
