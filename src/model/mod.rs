//! Core domain types flowing through the pipeline.
//!
//! An [`Order`] is the single unit of work created by emitters and consumed
//! by handlers (§3). The enums here and their associated multipliers are
//! intentionally tiny value types — all pipeline behavior lives in the
//! emitter/handler/engine modules, not here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Opaque, unique identity assigned to an order at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId(u64);

impl OrderId {
    /// Returns the raw numeric value, useful for logging.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic generator of [`OrderId`] values, shared across all emitters.
#[derive(Debug, Default)]
pub struct OrderIdGenerator {
    next: AtomicU64,
}

impl OrderIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocates the next unique id.
    pub fn next(&self) -> OrderId {
        OrderId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Drink complexity tier (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Complexity {
    MilkTea,
    CoffeeWithTapioca,
    SpecialMenu,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [
        Complexity::MilkTea,
        Complexity::CoffeeWithTapioca,
        Complexity::SpecialMenu,
    ];

    /// Zero-based ordinal used in `complexityScore` (§3).
    pub fn ordinal(self) -> u32 {
        match self {
            Complexity::MilkTea => 0,
            Complexity::CoffeeWithTapioca => 1,
            Complexity::SpecialMenu => 2,
        }
    }

    /// Service-time multiplier applied by the Toppings stage (§4.4.3).
    pub fn multiplier(self) -> f64 {
        match self {
            Complexity::MilkTea => 1.0,
            Complexity::CoffeeWithTapioca => 1.5,
            Complexity::SpecialMenu => 2.0,
        }
    }
}

/// Cup size (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
    Small,
    Medium,
    Large,
}

impl Size {
    pub const ALL: [Size; 3] = [Size::Small, Size::Medium, Size::Large];

    /// Volume in milliliters.
    pub fn milliliters(self) -> u32 {
        match self {
            Size::Small => 500,
            Size::Medium => 700,
            Size::Large => 1000,
        }
    }

    /// Multiplier used in `complexityScore` (§3).
    pub fn multiplier(self) -> f64 {
        match self {
            Size::Small => 1.0,
            Size::Medium => 1.2,
            Size::Large => 1.5,
        }
    }

    /// Packaging service-time multiplier (§3); applied only when
    /// `PackagingConfig::apply_size_multiplier` is set (§9).
    pub fn packaging_multiplier(self) -> f64 {
        match self {
            Size::Small => 1.0,
            Size::Medium => 1.3,
            Size::Large => 1.7,
        }
    }

    /// Recommended tapioca portions for this size (§3).
    pub fn recommended_tapioca_portions(self) -> u32 {
        match self {
            Size::Small => 1,
            Size::Medium => 2,
            Size::Large => 3,
        }
    }
}

/// A unit of work flowing through the pipeline (§3).
///
/// `startTime`/`completionTime` and the `processingTime` they derive (§3)
/// are tracked by [`crate::engine::SimulationEngine`] against the signal
/// bus rather than on this value: an `Order` only ever lives inside one
/// queue or handler at a time, while the engine's active-orders map is the
/// single place both timestamps for a given id are ever visible together.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub complexity: Complexity,
    pub size: Size,
    pub toppings_count: u8,
    pub is_group_order: bool,
    pub quantity: u32,
    pub has_student_discount: bool,

    pub creation_time: Instant,
}

impl Order {
    /// `complexityOrdinal x sizeMultiplier` (§3).
    pub fn complexity_score(&self) -> f64 {
        self.complexity.ordinal() as f64 * self.size.multiplier()
    }
}
