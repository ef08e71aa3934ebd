//! fetch-based JSON-RPC transport
//!
//! Every request runs as a future on the browser's microtask queue
//! (`spawn_local`). Completions land in a shared mailbox that the tick drains
//! through [`ChainSource::poll_events`], so game state is only ever touched
//! from the tick. Subscriptions are emulated with filter polling: a pending
//! transaction filter for mempool traffic, `eth_blockNumber` for new blocks.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{Request, RequestInit, RequestMode, Response};

use crate::chain::rpc;
use crate::chain::{
    ChainError, ChainEvent, ChainRequest, ChainSource, NetworkSample, ReceiptLookup,
    SubscriptionId, SubscriptionRegistry, Topic, WEI_PER_GWEI,
};

/// State shared with in-flight futures
#[derive(Default)]
struct Shared {
    mailbox: RefCell<VecDeque<ChainEvent>>,
    next_id: Cell<u64>,
    pending_filter: RefCell<Option<String>>,
    installing: Cell<bool>,
    polling: Cell<bool>,
    listen_pending: Cell<bool>,
    listen_blocks: Cell<bool>,
    last_block: Cell<u64>,
}

impl Shared {
    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn push(&self, event: ChainEvent) {
        self.mailbox.borrow_mut().push_back(event);
    }
}

/// Chain source talking to a node over HTTP
pub struct RpcChainSource {
    url: Rc<str>,
    shared: Rc<Shared>,
    subscriptions: SubscriptionRegistry,
    poll_interval_ms: u64,
    last_poll_ms: Option<u64>,
}

impl RpcChainSource {
    pub fn new(url: &str, poll_interval_ms: u64) -> Self {
        log::info!("Using JSON-RPC endpoint {url}");
        Self {
            url: Rc::from(url),
            shared: Rc::new(Shared::default()),
            subscriptions: SubscriptionRegistry::new(),
            poll_interval_ms: poll_interval_ms.max(100),
            last_poll_ms: None,
        }
    }

    fn poll_due(&self, now_ms: u64) -> bool {
        !self.shared.polling.get()
            && self
                .last_poll_ms
                .is_none_or(|last| now_ms.saturating_sub(last) >= self.poll_interval_ms)
    }
}

fn js_err(e: JsValue) -> ChainError {
    ChainError::Transport(format!("{e:?}"))
}

/// POST one request body and extract `result`
async fn call(url: &str, body: String) -> Result<Value, ChainError> {
    let window = web_sys::window().ok_or_else(|| ChainError::Transport("no window".into()))?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_mode(RequestMode::Cors);
    init.set_body(&JsValue::from_str(&body));

    let request = Request::new_with_str_and_init(url, &init).map_err(js_err)?;
    request
        .headers()
        .set("Content-Type", "application/json")
        .map_err(js_err)?;

    let resp: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_err)?
        .dyn_into()
        .map_err(js_err)?;
    if !resp.ok() {
        return Err(ChainError::Transport(format!("HTTP {}", resp.status())));
    }

    let text = JsFuture::from(resp.text().map_err(js_err)?)
        .await
        .map_err(js_err)?
        .as_string()
        .ok_or_else(|| ChainError::Decode("response body is not text".into()))?;
    rpc::parse_response(&text)
}

fn install_pending_filter(url: Rc<str>, shared: Rc<Shared>) {
    if shared.installing.get() || shared.pending_filter.borrow().is_some() {
        return;
    }
    shared.installing.set(true);
    spawn_local(async move {
        let result = call(&url, rpc::new_pending_filter(shared.next_id()))
            .await
            .and_then(|v| rpc::decode_filter_id(&v));
        shared.installing.set(false);
        match result {
            Ok(filter) if shared.listen_pending.get() => {
                log::debug!("Pending transaction filter {filter} installed");
                *shared.pending_filter.borrow_mut() = Some(filter);
            }
            // Unsubscribed while installing
            Ok(filter) => uninstall_filter(url, shared.clone(), filter),
            Err(e) => log::warn!("Failed to install pending filter: {e}"),
        }
    });
}

fn uninstall_filter(url: Rc<str>, shared: Rc<Shared>, filter: String) {
    spawn_local(async move {
        if let Err(e) = call(&url, rpc::uninstall_filter(shared.next_id(), &filter)).await {
            log::debug!("Failed to uninstall filter {filter}: {e}");
        }
    });
}

async fn poll_pending(url: &str, shared: &Rc<Shared>) {
    let Some(filter) = shared.pending_filter.borrow().clone() else {
        return;
    };
    let result = call(url, rpc::filter_changes(shared.next_id(), &filter))
        .await
        .and_then(|v| rpc::decode_hash_list(&v));
    match result {
        Ok(hashes) => {
            if !shared.listen_pending.get() {
                return;
            }
            for hash in hashes {
                shared.push(ChainEvent::PendingTransaction(hash));
            }
        }
        Err(e @ ChainError::Rpc { .. }) => {
            // Filters expire on the node; install a fresh one next round
            log::warn!("Pending filter {filter} rejected: {e}");
            shared.pending_filter.borrow_mut().take();
        }
        Err(e) => log::warn!("Pending filter poll failed: {e}"),
    }
}

async fn poll_blocks(url: &str, shared: &Rc<Shared>) {
    let result = call(url, rpc::block_number(shared.next_id()))
        .await
        .and_then(|v| rpc::decode_quantity(&v));
    match result {
        Ok(number) => {
            let number = number as u64;
            if number > shared.last_block.get() && shared.listen_blocks.get() {
                shared.last_block.set(number);
                shared.push(ChainEvent::NewBlock(number));
            }
        }
        Err(e) => log::warn!("Block number poll failed: {e}"),
    }
}

async fn resolve(url: &str, shared: &Shared, request: ChainRequest) -> ChainEvent {
    match request {
        ChainRequest::Transaction(hash) => {
            let result = call(url, rpc::get_transaction(shared.next_id(), &hash))
                .await
                .and_then(rpc::decode_transaction);
            ChainEvent::Transaction { hash, result }
        }
        ChainRequest::Receipt(hash) => {
            let receipt = call(url, rpc::get_receipt(shared.next_id(), &hash))
                .await
                .and_then(rpc::decode_receipt);
            let head = call(url, rpc::block_number(shared.next_id()))
                .await
                .and_then(|v| rpc::decode_quantity(&v));
            let result = receipt.and_then(|receipt| {
                head.map(|head| ReceiptLookup {
                    receipt,
                    head: head as u64,
                })
            });
            ChainEvent::Receipt { hash, result }
        }
        ChainRequest::NetworkSample => {
            let gas = call(url, rpc::gas_price(shared.next_id()))
                .await
                .and_then(|v| rpc::decode_quantity(&v));
            let pending = call(url, rpc::get_block(shared.next_id(), "pending"))
                .await
                .and_then(|v| rpc::decode_block_tx_count(&v));
            let result = gas.and_then(|wei| {
                pending.map(|pending_tx_count| NetworkSample {
                    gas_price_gwei: wei as f64 / WEI_PER_GWEI,
                    pending_tx_count,
                })
            });
            ChainEvent::NetworkSample(result)
        }
    }
}

impl ChainSource for RpcChainSource {
    fn subscribe(&mut self, topic: Topic) -> Result<SubscriptionId, ChainError> {
        let id = self.subscriptions.add(topic);
        match topic {
            Topic::PendingTransactions => {
                self.shared.listen_pending.set(true);
                install_pending_filter(self.url.clone(), self.shared.clone());
            }
            Topic::NewBlocks => self.shared.listen_blocks.set(true),
        }
        log::debug!("Subscribed {id} to {topic:?}");
        Ok(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        let Some(topic) = self.subscriptions.remove(id) else {
            log::debug!("unsubscribe for unknown subscription {id}");
            return;
        };
        if self.subscriptions.is_subscribed(topic) {
            return;
        }
        match topic {
            Topic::PendingTransactions => {
                self.shared.listen_pending.set(false);
                let filter = self.shared.pending_filter.borrow_mut().take();
                if let Some(filter) = filter {
                    uninstall_filter(self.url.clone(), self.shared.clone(), filter);
                }
            }
            Topic::NewBlocks => self.shared.listen_blocks.set(false),
        }
    }

    fn request(&mut self, request: ChainRequest) {
        let url = self.url.clone();
        let shared = self.shared.clone();
        spawn_local(async move {
            let event = resolve(&url, &shared, request).await;
            shared.push(event);
        });
    }

    fn poll_events(&mut self, now_ms: u64) -> Vec<ChainEvent> {
        if self.poll_due(now_ms) {
            self.last_poll_ms = Some(now_ms);
            let url = self.url.clone();
            let shared = self.shared.clone();

            if shared.listen_pending.get() {
                install_pending_filter(url.clone(), shared.clone());
            }
            shared.polling.set(true);
            spawn_local(async move {
                if shared.listen_pending.get() {
                    poll_pending(&url, &shared).await;
                }
                if shared.listen_blocks.get() {
                    poll_blocks(&url, &shared).await;
                }
                shared.polling.set(false);
            });
        }

        self.shared.mailbox.borrow_mut().drain(..).collect()
    }
}
