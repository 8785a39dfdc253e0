//! Connector contract and implementations

pub mod paper;
pub mod traits;

pub use paper::{MarketSnapshot, PairRules, PaperConnector};
pub use traits::SpotConnector;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    /// Buy the base asset, spending the quote asset
    Buy,
    /// Sell the base asset, receiving the quote asset
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Specification of one market order awaiting submission
///
/// All cycle legs execute as immediate market orders; the price is the
/// expected execution price, quantized per pair precision rules, and is
/// carried for budget checks and observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCandidate {
    /// Trading pair identifier
    pub pair: String,
    /// Order side
    pub side: OrderSide,
    /// Base-asset amount, quantized
    pub amount: Decimal,
    /// Expected execution price, quantized
    pub price: Decimal,
}

impl OrderCandidate {
    /// Create a new order candidate
    pub fn new(pair: impl Into<String>, side: OrderSide, amount: Decimal, price: Decimal) -> Self {
        Self {
            pair: pair.into(),
            side,
            amount,
            price,
        }
    }
}

/// Asynchronous order notification from the connector
///
/// Events for one order id are delivered in creation order. Created and
/// Filled are informational; Completed and Failed drive state transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
    /// The order was accepted by the venue
    Created {
        /// Venue order id
        order_id: String,
        /// Trading pair identifier
        pair: String,
        /// Order side
        side: OrderSide,
    },
    /// Part or all of the order was filled
    Filled {
        /// Venue order id
        order_id: String,
        /// Trading pair identifier
        pair: String,
        /// Base-asset amount filled
        amount: Decimal,
        /// Fill price
        price: Decimal,
    },
    /// The order completed in full
    Completed {
        /// Venue order id
        order_id: String,
        /// Trading pair identifier
        pair: String,
        /// Order side
        side: OrderSide,
    },
    /// The venue reported the order as failed
    Failed {
        /// Venue order id
        order_id: String,
        /// Trading pair identifier
        pair: String,
        /// Venue-reported reason
        reason: String,
    },
}

impl OrderEvent {
    /// The order id this event correlates to
    pub fn order_id(&self) -> &str {
        match self {
            OrderEvent::Created { order_id, .. }
            | OrderEvent::Filled { order_id, .. }
            | OrderEvent::Completed { order_id, .. }
            | OrderEvent::Failed { order_id, .. } => order_id,
        }
    }

    /// The trading pair this event refers to
    pub fn pair(&self) -> &str {
        match self {
            OrderEvent::Created { pair, .. }
            | OrderEvent::Filled { pair, .. }
            | OrderEvent::Completed { pair, .. }
            | OrderEvent::Failed { pair, .. } => pair,
        }
    }
}
