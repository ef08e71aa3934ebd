//! Transaction → falling object mapping
//!
//! Pure and deterministic: the descriptor depends only on the category and
//! the three normalized metrics. The one deliberate exception is the
//! high-value tint, which cycles with time when resolved for drawing
//! ([`Tint::resolve`]); the descriptor itself stays time-independent.

use std::f32::consts::{PI, TAU};

use glam::Vec2;

use crate::chain::TransactionRecord;
use crate::consts::PLAYER_HUE;
use crate::physics::{BodyLabel, BodySpec, Collider};
use crate::{clamp01, lerp, normalize_hue};

/// ERC-20 `transfer(address,uint256)`
pub const TOKEN_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
/// ERC-721 `transferFrom(address,address,uint256)`
pub const NFT_TRANSFER_FROM_SELECTOR: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];
/// ERC-721 `safeTransferFrom(address,address,uint256)`
pub const NFT_SAFE_TRANSFER_SELECTOR: [u8; 4] = [0x42, 0x84, 0x2e, 0x0e];
/// ERC-721 `safeTransferFrom(address,address,uint256,bytes)`
pub const NFT_SAFE_TRANSFER_DATA_SELECTOR: [u8; 4] = [0xb8, 0x8d, 0x4f, 0xde];

/// Normalization ceilings
pub const GAS_CEILING_GWEI: f64 = 500.0;
pub const VALUE_CEILING_ETH: f64 = 100.0;
pub const DATA_CEILING_BYTES: f64 = 10_000.0;

/// Category thresholds on normalized metrics
pub const HIGH_VALUE_THRESHOLD: f32 = 0.5;
pub const HIGH_GAS_THRESHOLD: f32 = 0.6;
pub const DATA_HEAVY_THRESHOLD: f32 = 0.3;

/// Object size bounds before the category multiplier
pub const MIN_SIZE: f32 = 30.0;
pub const MAX_SIZE: f32 = 100.0;

/// Hues within this many degrees of the player's hue are never used
pub const PLAYER_HUE_GUARD: f32 = 20.0;

/// Cycle period of the high-value tint
pub const CYCLE_PERIOD_MS: u64 = 3000;

/// Transaction attributes normalized to [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub gas: f32,
    pub value: f32,
    pub data: f32,
}

impl Metrics {
    pub fn from_transaction(tx: &TransactionRecord) -> Self {
        Self {
            gas: clamp01((tx.gas_price_gwei() / GAS_CEILING_GWEI) as f32),
            value: clamp01((tx.value_eth() / VALUE_CEILING_ETH) as f32),
            data: clamp01((tx.input.len() as f64 / DATA_CEILING_BYTES) as f32),
        }
    }
}

/// Mutually exclusive transaction category, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    ContractCreation,
    HighValue,
    HighGas,
    TokenTransfer,
    NftTransfer,
    DataHeavy,
    Plain,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ContractCreation => "contract-creation",
            Category::HighValue => "high-value",
            Category::HighGas => "high-gas",
            Category::TokenTransfer => "token-transfer",
            Category::NftTransfer => "nft-transfer",
            Category::DataHeavy => "data-heavy",
            Category::Plain => "plain",
        }
    }
}

/// Classify by priority: creation > value > gas > selector > data > plain
pub fn classify(tx: &TransactionRecord, metrics: &Metrics) -> Category {
    if tx.is_contract_creation() {
        return Category::ContractCreation;
    }
    if metrics.value > HIGH_VALUE_THRESHOLD {
        return Category::HighValue;
    }
    if metrics.gas > HIGH_GAS_THRESHOLD {
        return Category::HighGas;
    }
    match tx.selector() {
        Some(TOKEN_TRANSFER_SELECTOR) => return Category::TokenTransfer,
        Some(
            NFT_TRANSFER_FROM_SELECTOR
            | NFT_SAFE_TRANSFER_SELECTOR
            | NFT_SAFE_TRANSFER_DATA_SELECTOR,
        ) => return Category::NftTransfer,
        _ => {}
    }
    if metrics.data > DATA_HEAVY_THRESHOLD {
        return Category::DataHeavy;
    }
    Category::Plain
}

/// Outline family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Rectangle,
    Polygon { sides: u32 },
    Star { points: u32 },
    Diamond,
    Triangle,
    Cross,
    HexStar,
}

/// HSL color (hue degrees, saturation/lightness percent)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Hsl {
    /// Construct, nudging the hue out of the player's reserved band
    pub fn new(h: f32, s: f32, l: f32) -> Self {
        Self {
            h: avoid_player_hue(h),
            s: s.clamp(0.0, 100.0),
            l: l.clamp(0.0, 100.0),
        }
    }

    pub const BLACK: Hsl = Hsl {
        h: 0.0,
        s: 0.0,
        l: 0.0,
    };

    pub fn to_css(&self) -> String {
        format!("hsl({:.0}, {:.0}%, {:.0}%)", self.h, self.s, self.l)
    }
}

/// Shift a hue that falls inside the player's band to just past it
pub fn avoid_player_hue(h: f32) -> f32 {
    let h = normalize_hue(h);
    let delta = h - PLAYER_HUE;
    if delta.abs() <= PLAYER_HUE_GUARD {
        normalize_hue(PLAYER_HUE + PLAYER_HUE_GUARD + 1.0 + (delta + PLAYER_HUE_GUARD))
    } else {
        h
    }
}

/// Color rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tint {
    Fixed(Hsl),
    /// Hue rotates with wall-clock time
    Cycling { saturation: f32, lightness: f32 },
}

impl Tint {
    /// Concrete color at `now_ms`
    pub fn resolve(&self, now_ms: u64) -> Hsl {
        match *self {
            Tint::Fixed(hsl) => hsl,
            Tint::Cycling {
                saturation,
                lightness,
            } => {
                let phase = (now_ms % CYCLE_PERIOD_MS) as f32 / CYCLE_PERIOD_MS as f32;
                Hsl::new(phase * 360.0, saturation, lightness)
            }
        }
    }
}

/// Rigid-body properties
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalProps {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Initial downward speed (units per tick)
    pub fall_speed: f32,
    /// Initial angular velocity (radians per tick)
    pub spin: f32,
}

/// Category-specific fields that replace the base formula
#[derive(Debug, Clone, Copy, Default)]
struct Overrides {
    density: Option<f32>,
    friction: Option<f32>,
    restitution: Option<f32>,
    fall_speed: Option<f32>,
    spin: Option<f32>,
}

impl PhysicalProps {
    fn base(m: &Metrics) -> Self {
        Self {
            density: 0.001 + 0.004 * m.value,
            friction: 0.1 + 0.4 * m.data,
            restitution: 0.2 + 0.3 * (1.0 - m.data),
            fall_speed: 2.0 + 4.0 * m.gas,
            spin: (m.gas - 0.5) * 0.1,
        }
    }

    fn with(self, o: Overrides) -> Self {
        Self {
            density: o.density.unwrap_or(self.density),
            friction: o.friction.unwrap_or(self.friction),
            restitution: o.restitution.unwrap_or(self.restitution),
            fall_speed: o.fall_speed.unwrap_or(self.fall_speed),
            spin: o.spin.unwrap_or(self.spin),
        }
    }
}

/// Everything needed to create and draw a falling object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescriptor {
    pub category: Category,
    pub metrics: Metrics,
    pub shape: ShapeKind,
    /// Nominal diameter
    pub size: f32,
    pub tint: Tint,
    pub physics: PhysicalProps,
}

/// Map a transaction to its object descriptor
pub fn map_transaction(tx: &TransactionRecord) -> ObjectDescriptor {
    let metrics = Metrics::from_transaction(tx);
    let category = classify(tx, &metrics);
    describe(category, metrics)
}

/// Descriptor for a category and metrics triple
pub fn describe(category: Category, m: Metrics) -> ObjectDescriptor {
    let base_size = lerp(
        MIN_SIZE,
        MAX_SIZE,
        0.4 * m.gas + 0.3 * m.value + 0.3 * m.data,
    );

    let (shape, size_mult, tint, overrides) = match category {
        Category::ContractCreation => (
            ShapeKind::HexStar,
            1.3,
            Tint::Fixed(Hsl::new(280.0, 70.0, 40.0 + 20.0 * m.data)),
            Overrides {
                density: Some(0.006),
                spin: Some(0.02),
                ..Default::default()
            },
        ),
        Category::HighValue => (
            ShapeKind::Star { points: 5 },
            1.25,
            Tint::Cycling {
                saturation: 90.0,
                lightness: 60.0,
            },
            Overrides {
                density: Some(0.008),
                restitution: Some(0.6),
                ..Default::default()
            },
        ),
        Category::HighGas => (
            ShapeKind::Triangle,
            0.9,
            Tint::Fixed(Hsl::new(0.0, 85.0, 45.0 + 15.0 * m.gas)),
            Overrides {
                friction: Some(0.05),
                fall_speed: Some(7.0),
                ..Default::default()
            },
        ),
        Category::TokenTransfer => (
            ShapeKind::Diamond,
            0.8,
            Tint::Fixed(Hsl::new(200.0 + 20.0 * m.value, 75.0, 55.0)),
            Overrides {
                restitution: Some(0.5),
                ..Default::default()
            },
        ),
        Category::NftTransfer => (
            ShapeKind::Cross,
            1.0,
            Tint::Fixed(Hsl::new(320.0, 70.0, 50.0 + 10.0 * m.gas)),
            Overrides {
                spin: Some(-0.03),
                ..Default::default()
            },
        ),
        Category::DataHeavy => (
            ShapeKind::Polygon {
                sides: 5 + (m.data * 3.0).round() as u32,
            },
            1.1,
            Tint::Fixed(Hsl::new(40.0 + 20.0 * m.data, 80.0, 50.0)),
            Overrides {
                friction: Some(0.8),
                ..Default::default()
            },
        ),
        Category::Plain => (
            ShapeKind::Rectangle,
            1.0,
            Tint::Fixed(Hsl::new(180.0 + 60.0 * m.gas, 60.0, 50.0)),
            Overrides::default(),
        ),
    };

    ObjectDescriptor {
        category,
        metrics: m,
        shape,
        size: base_size * size_mult,
        tint,
        physics: PhysicalProps::base(&m).with(overrides),
    }
}

fn regular(n: u32, radius: f32) -> Vec<Vec2> {
    (0..n)
        .map(|i| {
            let a = -PI / 2.0 + TAU * i as f32 / n as f32;
            Vec2::new(a.cos(), a.sin()) * radius
        })
        .collect()
}

fn star(points: u32, outer: f32, inner: f32) -> Vec<Vec2> {
    (0..points * 2)
        .map(|i| {
            let r = if i % 2 == 0 { outer } else { inner };
            let a = -PI / 2.0 + PI * i as f32 / points as f32;
            Vec2::new(a.cos(), a.sin()) * r
        })
        .collect()
}

impl ObjectDescriptor {
    /// Outline relative to the body center
    pub fn vertices(&self) -> Vec<Vec2> {
        let r = self.size / 2.0;
        match self.shape {
            ShapeKind::Rectangle => vec![
                Vec2::new(-r, -r),
                Vec2::new(r, -r),
                Vec2::new(r, r),
                Vec2::new(-r, r),
            ],
            ShapeKind::Polygon { sides } => regular(sides.max(3), r),
            ShapeKind::Star { points } => star(points.max(3), r, r * 0.5),
            ShapeKind::Diamond => vec![
                Vec2::new(0.0, -r),
                Vec2::new(r * 0.66, 0.0),
                Vec2::new(0.0, r),
                Vec2::new(-r * 0.66, 0.0),
            ],
            ShapeKind::Triangle => regular(3, r),
            ShapeKind::Cross => {
                let w = r / 3.0;
                vec![
                    Vec2::new(-w, -r),
                    Vec2::new(w, -r),
                    Vec2::new(w, -w),
                    Vec2::new(r, -w),
                    Vec2::new(r, w),
                    Vec2::new(w, w),
                    Vec2::new(w, r),
                    Vec2::new(-w, r),
                    Vec2::new(-w, w),
                    Vec2::new(-r, w),
                    Vec2::new(-r, -w),
                    Vec2::new(-w, -w),
                ]
            }
            ShapeKind::HexStar => star(6, r, r * 0.6),
        }
    }

    pub fn collider(&self) -> Collider {
        match self.shape {
            ShapeKind::Rectangle => Collider::Rect {
                half: Vec2::splat(self.size / 2.0),
            },
            _ => Collider::Polygon {
                vertices: self.vertices(),
            },
        }
    }

    pub fn body_spec(&self, angle: f32) -> BodySpec {
        BodySpec {
            label: BodyLabel::Object,
            collider: self.collider(),
            density: self.physics.density,
            friction: self.physics.friction,
            restitution: self.physics.restitution,
            is_static: false,
            is_sensor: false,
            angle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Address, TxHash, WEI_PER_ETH, WEI_PER_GWEI};
    use proptest::prelude::*;

    fn tx(to: Option<Address>, gas_gwei: f64, value_eth: f64, input: Vec<u8>) -> TransactionRecord {
        TransactionRecord {
            hash: TxHash([7; 32]),
            from: Address::default(),
            to,
            value: (value_eth * WEI_PER_ETH) as u128,
            gas_price: (gas_gwei * WEI_PER_GWEI) as u128,
            gas_limit: 21_000,
            nonce: 0,
            input,
        }
    }

    fn with_selector(sel: [u8; 4]) -> Vec<u8> {
        let mut v = sel.to_vec();
        v.extend_from_slice(&[0; 64]);
        v
    }

    #[test]
    fn test_gas_above_ceiling_clamps_to_one() {
        let m = Metrics::from_transaction(&tx(Some(Address([1; 20])), 600.0, 0.0, vec![]));
        assert_eq!(m.gas, 1.0);
    }

    #[test]
    fn test_category_priority() {
        let to = Some(Address([1; 20]));
        let cases = [
            (tx(None, 900.0, 150.0, with_selector(TOKEN_TRANSFER_SELECTOR)), Category::ContractCreation),
            (tx(to, 900.0, 150.0, vec![]), Category::HighValue),
            (tx(to, 400.0, 1.0, with_selector(TOKEN_TRANSFER_SELECTOR)), Category::HighGas),
            (tx(to, 20.0, 1.0, with_selector(TOKEN_TRANSFER_SELECTOR)), Category::TokenTransfer),
            (tx(to, 20.0, 0.0, with_selector(NFT_SAFE_TRANSFER_SELECTOR)), Category::NftTransfer),
            (tx(to, 20.0, 0.0, vec![0xff; 5000]), Category::DataHeavy),
            (tx(to, 20.0, 0.5, vec![]), Category::Plain),
        ];
        for (t, expected) in cases {
            assert_eq!(map_transaction(&t).category, expected, "{expected:?}");
        }
    }

    #[test]
    fn test_overrides_win_over_base() {
        let d = describe(
            Category::HighGas,
            Metrics {
                gas: 1.0,
                value: 0.0,
                data: 0.0,
            },
        );
        // Base would give 2 + 4 * gas = 6
        assert_eq!(d.physics.fall_speed, 7.0);
        assert_eq!(d.physics.friction, 0.05);
    }

    #[test]
    fn test_cycling_tint_changes_with_time() {
        let d = map_transaction(&tx(Some(Address([1; 20])), 20.0, 150.0, vec![]));
        assert_eq!(d.category, Category::HighValue);
        assert_ne!(d.tint.resolve(0), d.tint.resolve(CYCLE_PERIOD_MS / 2));
    }

    #[test]
    fn test_vertex_counts() {
        let m = Metrics {
            gas: 0.5,
            value: 0.0,
            data: 0.0,
        };
        assert_eq!(describe(Category::ContractCreation, m).vertices().len(), 12);
        assert_eq!(describe(Category::HighValue, m).vertices().len(), 10);
        assert_eq!(describe(Category::HighGas, m).vertices().len(), 3);
        assert_eq!(describe(Category::NftTransfer, m).vertices().len(), 12);
        assert_eq!(describe(Category::Plain, m).vertices().len(), 4);
    }

    fn metrics() -> impl Strategy<Value = Metrics> {
        (0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0).prop_map(|(gas, value, data)| Metrics {
            gas,
            value,
            data,
        })
    }

    fn category() -> impl Strategy<Value = Category> {
        prop_oneof![
            Just(Category::ContractCreation),
            Just(Category::HighValue),
            Just(Category::HighGas),
            Just(Category::TokenTransfer),
            Just(Category::NftTransfer),
            Just(Category::DataHeavy),
            Just(Category::Plain),
        ]
    }

    proptest! {
        #[test]
        fn prop_missing_destination_is_contract_creation(
            gas in 0.0f64..5_000.0,
            value in 0.0f64..1_000.0,
            input in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let d = map_transaction(&tx(None, gas, value, input));
            prop_assert_eq!(d.category, Category::ContractCreation);
            prop_assert_eq!(d.shape, ShapeKind::HexStar);
        }

        #[test]
        fn prop_same_inputs_same_geometry(c in category(), m in metrics()) {
            let a = describe(c, m);
            let b = describe(c, m);
            prop_assert_eq!(a.shape, b.shape);
            prop_assert_eq!(a.size, b.size);
            prop_assert_eq!(a.physics, b.physics);
            prop_assert_eq!(a.vertices(), b.vertices());
            if c != Category::HighValue {
                prop_assert_eq!(a.tint, b.tint);
            }
        }

        #[test]
        fn prop_colors_avoid_player_hue(c in category(), m in metrics(), t in 0u64..100_000) {
            let hsl = describe(c, m).tint.resolve(t);
            prop_assert!((hsl.h - PLAYER_HUE).abs() > PLAYER_HUE_GUARD);
        }
    }
}
