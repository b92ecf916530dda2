//! Signal bus connecting emitters and handlers to the engine (§9).
//!
//! The original object-oriented event hooks become an explicit channel:
//! every emitter and handler holds a clone of a [`SignalSender`] and pushes
//! [`Signal`] records; the engine drains a single [`SignalReceiver`] and
//! applies each one to its active-orders map, completed/failed bags, and
//! rework counter (§4.5). Using one channel rather than per-event callbacks
//! keeps the engine's bookkeeping single-threaded even though many producer
//! tasks publish concurrently, and preserves the required ordering
//! guarantee: a task always sends `OrderGenerated` before any
//! `OrderCompleted`/`OrderFailed`/`OrderReworked` for the same id, and the
//! channel preserves per-sender order.

use tokio::sync::mpsc;

use crate::model::OrderId;

/// A single named handler stage, used to attribute `OrderCompleted` (only
/// `Packaging`'s completion is terminal) and for per-stage logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    BasePreparation,
    TapiocaCooking,
    Toppings,
    QualityControl,
    Packaging,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::BasePreparation => "BasePreparation",
            Stage::TapiocaCooking => "TapiocaCooking",
            Stage::Toppings => "Toppings",
            Stage::QualityControl => "QualityControl",
            Stage::Packaging => "Packaging",
        }
    }
}

/// An event published by an emitter or handler, observed by the engine (§4.5).
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    /// A new order was constructed and is about to be enqueued.
    OrderGenerated(OrderId),
    /// `stage` finished the order and handed it to the next queue (or, for
    /// `Packaging`, finished it for good).
    OrderCompleted(OrderId, Stage),
    /// `stage` could not advance the order and it is terminally lost.
    OrderFailed(OrderId, Stage),
    /// `stage` re-enqueued the order into its own input queue.
    OrderReworked(OrderId, Stage),
}

/// Sending half of the signal bus. Cheap to clone; every emitter and
/// handler task holds one.
pub type SignalSender = mpsc::UnboundedSender<Signal>;

/// Receiving half of the signal bus, held exclusively by the engine.
pub type SignalReceiver = mpsc::UnboundedReceiver<Signal>;

/// Constructs a fresh signal bus.
pub fn signal_bus() -> (SignalSender, SignalReceiver) {
    mpsc::unbounded_channel()
}
