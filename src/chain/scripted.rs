//! In-process chain source
//!
//! Two modes:
//! - `manual()`: nothing happens unless the caller scripts it (tests)
//! - `simulated(seed)`: seeded synthetic mempool traffic for the demo and for
//!   offline play when no RPC endpoint is configured
//!
//! Responses are resolved against the scripted state when their latency
//! elapses, so a receipt scripted after the request is still observed.

use std::collections::{HashMap, VecDeque};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::{
    Address, ChainError, ChainEvent, ChainRequest, ChainSource, NetworkSample, ReceiptInfo,
    ReceiptLookup, SubscriptionId, SubscriptionRegistry, Topic, TransactionRecord, TxHash,
    WEI_PER_ETH, WEI_PER_GWEI,
};
use crate::sim::mapper::{NFT_SAFE_TRANSFER_SELECTOR, TOKEN_TRANSFER_SELECTOR};

/// Mined receipts and dropped transactions are forgotten after this many blocks
const RETAIN_BLOCKS: u64 = 64;
/// Most recent requests kept for inspection
const REQUEST_LOG_LEN: usize = 1024;

/// Synthetic traffic parameters
#[derive(Debug, Clone)]
pub struct TrafficProfile {
    /// New pending transactions per second
    pub pending_per_second: f64,
    pub block_interval_ms: u64,
    /// Chance a mined transaction reverts
    pub revert_chance: f64,
    /// Chance a transaction is never mined
    pub drop_chance: f64,
}

impl Default for TrafficProfile {
    fn default() -> Self {
        Self {
            pending_per_second: 8.0,
            block_interval_ms: 12_000,
            revert_chance: 0.08,
            drop_chance: 0.05,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    due_ms: u64,
    request: ChainRequest,
}

/// Deterministic [`ChainSource`]
#[derive(Debug)]
pub struct ScriptedChainSource {
    rng: Pcg32,
    subscriptions: SubscriptionRegistry,
    traffic: Option<TrafficProfile>,
    transactions: HashMap<TxHash, TransactionRecord>,
    receipts: HashMap<TxHash, ReceiptInfo>,
    /// (hash, block it will be mined in, success)
    scheduled: Vec<(TxHash, u64, bool)>,
    /// Never-mined transactions with the head they were announced at
    dropped: VecDeque<(TxHash, u64)>,
    head: u64,
    network: NetworkSample,
    latency_ms: u64,
    failure_rate: f64,
    fail_next: u32,
    in_flight: VecDeque<InFlight>,
    notifications: VecDeque<ChainEvent>,
    request_log: VecDeque<ChainRequest>,
    clock_ms: u64,
    next_block_ms: u64,
    nonce: u64,
}

impl ScriptedChainSource {
    /// Quiet source with zero latency; everything is scripted by the caller
    pub fn manual() -> Self {
        Self {
            rng: Pcg32::seed_from_u64(0),
            subscriptions: SubscriptionRegistry::new(),
            traffic: None,
            transactions: HashMap::new(),
            receipts: HashMap::new(),
            scheduled: Vec::new(),
            dropped: VecDeque::new(),
            head: 1,
            network: NetworkSample {
                gas_price_gwei: 30.0,
                pending_tx_count: 100,
            },
            latency_ms: 0,
            failure_rate: 0.0,
            fail_next: 0,
            in_flight: VecDeque::new(),
            notifications: VecDeque::new(),
            request_log: VecDeque::new(),
            clock_ms: 0,
            next_block_ms: 0,
            nonce: 0,
        }
    }

    /// Seeded synthetic network
    pub fn simulated(seed: u64, traffic: TrafficProfile) -> Self {
        let mut source = Self::manual();
        source.rng = Pcg32::seed_from_u64(seed);
        source.head = 19_000_000;
        source.latency_ms = 120;
        source.failure_rate = 0.02;
        source.next_block_ms = traffic.block_interval_ms;
        source.traffic = Some(traffic);
        source
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    // === Scripting hooks ===

    /// Announce a pending transaction and make it fetchable
    pub fn inject_pending(&mut self, tx: TransactionRecord) {
        let hash = tx.hash;
        self.transactions.insert(hash, tx);
        if self.subscriptions.is_subscribed(Topic::PendingTransactions) {
            self.notifications
                .push_back(ChainEvent::PendingTransaction(hash));
        }
    }

    /// Make a transaction fetchable without announcing it
    pub fn insert_transaction(&mut self, tx: TransactionRecord) {
        self.transactions.insert(tx.hash, tx);
    }

    pub fn set_receipt(&mut self, hash: TxHash, receipt: ReceiptInfo) {
        self.receipts.insert(hash, receipt);
    }

    /// Advance the head and notify block subscribers
    pub fn set_head(&mut self, head: u64) {
        self.head = head;
        if self.subscriptions.is_subscribed(Topic::NewBlocks) {
            self.notifications.push_back(ChainEvent::NewBlock(head));
        }
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    pub fn set_network(&mut self, sample: NetworkSample) {
        self.network = sample;
    }

    /// Fail the next `n` requests with a transport error
    pub fn fail_next(&mut self, n: u32) {
        self.fail_next = n;
    }

    /// The most recent requests, oldest first
    pub fn requests(&self) -> &VecDeque<ChainRequest> {
        &self.request_log
    }

    /// Transactions still fetchable
    pub fn known_transactions(&self) -> usize {
        self.transactions.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    // === Internals ===

    fn resolve(&mut self, request: ChainRequest) -> ChainEvent {
        let failure = if self.fail_next > 0 {
            self.fail_next -= 1;
            true
        } else {
            self.failure_rate > 0.0 && self.rng.random_bool(self.failure_rate)
        };
        let err = || ChainError::Transport("scripted failure".into());

        match request {
            ChainRequest::Transaction(hash) => ChainEvent::Transaction {
                hash,
                result: if failure {
                    Err(err())
                } else {
                    Ok(self.transactions.get(&hash).cloned())
                },
            },
            ChainRequest::Receipt(hash) => ChainEvent::Receipt {
                hash,
                result: if failure {
                    Err(err())
                } else {
                    Ok(ReceiptLookup {
                        receipt: self.receipts.get(&hash).copied(),
                        head: self.head,
                    })
                },
            },
            ChainRequest::NetworkSample => {
                ChainEvent::NetworkSample(if failure { Err(err()) } else { Ok(self.network) })
            }
        }
    }

    fn advance_traffic(&mut self, from_ms: u64, to_ms: u64) {
        let Some(traffic) = self.traffic.clone() else {
            return;
        };
        let elapsed_s = (to_ms.saturating_sub(from_ms)) as f64 / 1000.0;
        let expected = traffic.pending_per_second * elapsed_s;
        let mut count = expected.floor() as u32;
        if self.rng.random_bool((expected - expected.floor()).clamp(0.0, 1.0)) {
            count += 1;
        }
        for _ in 0..count {
            let tx = self.random_transaction();
            let roll: f64 = self.rng.random();
            if roll >= traffic.drop_chance {
                let delay = self.rng.random_range(1..=3);
                let success = !self.rng.random_bool(traffic.revert_chance);
                self.scheduled.push((tx.hash, self.head + delay, success));
            } else {
                self.dropped.push_back((tx.hash, self.head));
            }
            self.inject_pending(tx);
        }

        while to_ms >= self.next_block_ms {
            self.next_block_ms += traffic.block_interval_ms;
            self.mine_block();
        }
    }

    fn mine_block(&mut self) {
        let head = self.head + 1;
        let mut mined = Vec::new();
        self.scheduled.retain(|&(hash, block, success)| {
            if block <= head {
                mined.push((hash, block, success));
                false
            } else {
                true
            }
        });
        for (hash, block, success) in mined {
            self.receipts.insert(
                hash,
                ReceiptInfo {
                    success,
                    block_number: block,
                },
            );
            self.transactions.remove(&hash);
        }
        // Forget anything old enough that no live object can still ask
        self.receipts
            .retain(|_, r| r.block_number + RETAIN_BLOCKS >= head);
        while let Some(&(hash, seen)) = self.dropped.front() {
            if seen + RETAIN_BLOCKS >= head {
                break;
            }
            self.transactions.remove(&hash);
            self.dropped.pop_front();
        }

        // Fee market drifts with a bounded random walk
        let drift = self.rng.random_range(-0.15..0.15);
        self.network.gas_price_gwei = (self.network.gas_price_gwei * (1.0 + drift)).clamp(5.0, 300.0);
        let pending = self.network.pending_tx_count as f64 * (1.0 + self.rng.random_range(-0.2..0.2));
        self.network.pending_tx_count = pending.clamp(20.0, 900.0) as u64;

        self.set_head(head);
    }

    fn random_transaction(&mut self) -> TransactionRecord {
        self.nonce += 1;
        let mut hash = [0u8; 32];
        self.rng.fill(&mut hash[..]);
        let mut from = [0u8; 20];
        self.rng.fill(&mut from[..]);
        let mut to = [0u8; 20];
        self.rng.fill(&mut to[..]);

        let gas_gwei = self.network.gas_price_gwei * self.rng.random_range(0.6..2.5);
        let roll: f64 = self.rng.random();
        let (to, value_eth, input) = if roll < 0.05 {
            (None, 0.0, vec![0x60; self.rng.random_range(2_000..16_000)])
        } else if roll < 0.12 {
            (Some(Address(to)), self.rng.random_range(40.0..180.0), Vec::new())
        } else if roll < 0.45 {
            let mut input = TOKEN_TRANSFER_SELECTOR.to_vec();
            input.extend_from_slice(&[0u8; 64]);
            (Some(Address(to)), 0.0, input)
        } else if roll < 0.55 {
            let mut input = NFT_SAFE_TRANSFER_SELECTOR.to_vec();
            input.extend_from_slice(&[0u8; 96]);
            (Some(Address(to)), 0.0, input)
        } else if roll < 0.65 {
            let len = self.rng.random_range(3_500..12_000);
            (Some(Address(to)), 0.0, vec![0xab; len])
        } else {
            (Some(Address(to)), self.rng.random_range(0.0..3.0), Vec::new())
        };

        TransactionRecord {
            hash: TxHash(hash),
            from: Address(from),
            to,
            value: (value_eth * WEI_PER_ETH) as u128,
            gas_price: (gas_gwei * WEI_PER_GWEI) as u128,
            gas_limit: 21_000 + input.len() as u64 * 16,
            nonce: self.nonce,
            input,
        }
    }
}

impl ChainSource for ScriptedChainSource {
    fn subscribe(&mut self, topic: Topic) -> Result<SubscriptionId, ChainError> {
        Ok(self.subscriptions.add(topic))
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if self.subscriptions.remove(id).is_none() {
            log::debug!("unsubscribe for unknown subscription {id}");
        }
    }

    fn request(&mut self, request: ChainRequest) {
        if self.request_log.len() == REQUEST_LOG_LEN {
            self.request_log.pop_front();
        }
        self.request_log.push_back(request);
        self.in_flight.push_back(InFlight {
            due_ms: self.clock_ms + self.latency_ms,
            request,
        });
    }

    fn poll_events(&mut self, now_ms: u64) -> Vec<ChainEvent> {
        let previous = self.clock_ms;
        self.clock_ms = self.clock_ms.max(now_ms);
        self.advance_traffic(previous, self.clock_ms);

        let mut events: Vec<ChainEvent> = self.notifications.drain(..).collect();
        while self
            .in_flight
            .front()
            .is_some_and(|f| f.due_ms <= self.clock_ms)
        {
            if let Some(flight) = self.in_flight.pop_front() {
                events.push(self.resolve(flight.request));
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(byte: u8) -> TransactionRecord {
        TransactionRecord {
            hash: TxHash([byte; 32]),
            from: Address::default(),
            to: Some(Address([9; 20])),
            value: 0,
            gas_price: 0,
            gas_limit: 21_000,
            nonce: 0,
            input: Vec::new(),
        }
    }

    #[test]
    fn test_pending_only_when_subscribed() {
        let mut source = ScriptedChainSource::manual();
        source.inject_pending(tx(1));
        assert!(source.poll_events(0).is_empty());

        let id = source.subscribe(Topic::PendingTransactions).unwrap();
        source.inject_pending(tx(2));
        assert_eq!(
            source.poll_events(0),
            vec![ChainEvent::PendingTransaction(TxHash([2; 32]))]
        );

        source.unsubscribe(id);
        source.inject_pending(tx(3));
        assert!(source.poll_events(0).is_empty());
    }

    #[test]
    fn test_latency_delays_completion() {
        let mut source = ScriptedChainSource::manual().with_latency(100);
        source.insert_transaction(tx(4));
        source.request(ChainRequest::Transaction(TxHash([4; 32])));
        assert!(source.poll_events(50).is_empty());
        let events = source.poll_events(100);
        assert!(matches!(
            &events[..],
            [ChainEvent::Transaction { result: Ok(Some(_)), .. }]
        ));
    }

    #[test]
    fn test_fail_next() {
        let mut source = ScriptedChainSource::manual();
        source.fail_next(1);
        source.request(ChainRequest::NetworkSample);
        source.request(ChainRequest::NetworkSample);
        let events = source.poll_events(0);
        assert!(matches!(events[0], ChainEvent::NetworkSample(Err(_))));
        assert!(matches!(events[1], ChainEvent::NetworkSample(Ok(_))));
    }

    #[test]
    fn test_simulated_traffic_is_deterministic() {
        let run = |seed| {
            let mut source = ScriptedChainSource::simulated(seed, TrafficProfile::default());
            source.subscribe(Topic::PendingTransactions).unwrap();
            source.subscribe(Topic::NewBlocks).unwrap();
            let mut seen = Vec::new();
            for t in (0..30_000).step_by(500) {
                seen.extend(source.poll_events(t));
            }
            seen
        };
        let a = run(7);
        assert_eq!(a, run(7));
        assert!(a.iter().any(|e| matches!(e, ChainEvent::NewBlock(_))));
        assert!(a.iter().any(|e| matches!(e, ChainEvent::PendingTransaction(_))));
    }

    #[test]
    fn test_long_simulated_session_stays_bounded() {
        let traffic = TrafficProfile {
            pending_per_second: 20.0,
            block_interval_ms: 1_000,
            drop_chance: 0.5,
            ..TrafficProfile::default()
        };
        let mut source = ScriptedChainSource::simulated(11, traffic);
        source.subscribe(Topic::PendingTransactions).unwrap();
        // Ten simulated minutes with a request every poll
        for t in (0..600_000).step_by(100) {
            source.request(ChainRequest::NetworkSample);
            source.poll_events(t);
        }
        assert_eq!(source.requests().len(), REQUEST_LOG_LEN);
        // ~20 tx/s over RETAIN_BLOCKS one-second blocks, plus those awaiting a block
        let bound = (20 * (RETAIN_BLOCKS + 5)) as usize;
        assert!(
            source.known_transactions() < bound,
            "{} transactions retained",
            source.known_transactions()
        );
    }

    #[test]
    fn test_dropped_transaction_stays_fetchable_for_a_while() {
        let traffic = TrafficProfile {
            drop_chance: 1.0,
            block_interval_ms: 1_000,
            ..TrafficProfile::default()
        };
        let mut source = ScriptedChainSource::simulated(5, traffic);
        source.failure_rate = 0.0;
        source.subscribe(Topic::PendingTransactions).unwrap();
        let hash = source
            .poll_events(1_000)
            .into_iter()
            .find_map(|e| match e {
                ChainEvent::PendingTransaction(hash) => Some(hash),
                _ => None,
            })
            .expect("pending transaction");

        let fetch = |source: &mut ScriptedChainSource, now_ms| {
            source.request(ChainRequest::Transaction(hash));
            source.poll_events(now_ms).into_iter().find_map(|e| match e {
                ChainEvent::Transaction { result, .. } => Some(result),
                _ => None,
            })
        };
        assert!(matches!(fetch(&mut source, 2_000), Some(Ok(Some(_)))));

        // Long after the retention window it is gone
        source.poll_events(100_000);
        assert!(matches!(fetch(&mut source, 101_000), Some(Ok(None))));
    }
}
