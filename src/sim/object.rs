//! Falling transaction objects

use crate::chain::{TransactionRecord, TxHash};
use crate::physics::BodyHandle;

use super::mapper::{Hsl, ObjectDescriptor};

/// Lifecycle of a falling object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Moving under gravity
    Falling,
    /// Resting on the ground or on another landed object
    Landed,
    /// Mined successfully, waiting for enough confirmations
    Confirming,
    /// Mined and reverted; fades on the next tick and takes neighbours with it
    FailedPending,
    /// Shrinking toward removal
    FadingOut,
    /// Body released
    Removed,
}

impl LifecycleState {
    pub fn is_fading(&self) -> bool {
        matches!(self, LifecycleState::FadingOut | LifecycleState::Removed)
    }

    /// Still waiting for a receipt
    pub fn awaits_receipt(&self) -> bool {
        matches!(self, LifecycleState::Falling | LifecycleState::Landed)
    }
}

/// One sampled transaction living in the world
#[derive(Debug, Clone)]
pub struct FallingObject {
    pub tx: TransactionRecord,
    pub body: BodyHandle,
    pub descriptor: ObjectDescriptor,
    pub state: LifecycleState,
    /// Never decreases
    pub confirmations: u64,
    /// Block the receipt was mined in, once observed
    pub receipt_block: Option<u64>,
    pub last_status_poll_ms: u64,
    /// A receipt lookup for this object is outstanding
    pub status_in_flight: bool,
    /// Dodge points already awarded
    pub scored: bool,
    /// Already cost the player a life (or grazed them)
    pub struck_player: bool,
    /// Rendered black after a revert
    pub darkened: bool,
    /// Physically at rest on the ground or on a landed object
    pub grounded: bool,
    /// 1.0 until fading, then decreases to 0.0
    pub scale: f32,
    pub spawned_at_ms: u64,
}

impl FallingObject {
    pub fn new(
        tx: TransactionRecord,
        body: BodyHandle,
        descriptor: ObjectDescriptor,
        now_ms: u64,
    ) -> Self {
        Self {
            tx,
            body,
            descriptor,
            state: LifecycleState::Falling,
            confirmations: 0,
            receipt_block: None,
            last_status_poll_ms: now_ms,
            status_in_flight: false,
            scored: false,
            struck_player: false,
            darkened: false,
            grounded: false,
            scale: 1.0,
            spawned_at_ms: now_ms,
        }
    }

    pub fn hash(&self) -> TxHash {
        self.tx.hash
    }

    /// Raise the confirmation count; lower values are ignored
    pub fn observe_confirmations(&mut self, confirmations: u64) {
        self.confirmations = self.confirmations.max(confirmations);
    }

    /// Color to draw with at `now_ms`
    pub fn color(&self, now_ms: u64) -> Hsl {
        if self.darkened {
            Hsl::BLACK
        } else {
            self.descriptor.tint.resolve(now_ms)
        }
    }

    /// Opacity tracks the fade scale
    pub fn opacity(&self) -> f32 {
        self.scale
    }
}

/// Tooltip data for a selected object
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDetails {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value_eth: f64,
    pub gas_price_gwei: f64,
    pub gas_limit: u64,
    pub category: &'static str,
    pub confirmations: u64,
    /// Confirmation progress in percent of the threshold
    pub progress: f32,
}

impl TransactionDetails {
    pub fn of(object: &FallingObject, threshold: u64) -> Self {
        let tx = &object.tx;
        Self {
            hash: tx.hash.to_string(),
            from: tx.from.short(),
            to: tx.to.map(|a| a.short()).unwrap_or_default(),
            value_eth: tx.value_eth(),
            gas_price_gwei: tx.gas_price_gwei(),
            gas_limit: tx.gas_limit,
            category: object.descriptor.category.as_str(),
            confirmations: object.confirmations,
            progress: (object.confirmations as f32 / threshold.max(1) as f32 * 100.0).min(100.0),
        }
    }
}
