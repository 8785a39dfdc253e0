//! Triangular Arbitrage Strategy
//!
//! Detects and executes triangular arbitrage cycles across three trading pairs
//! sharing exactly three assets, one of which is the designated holding asset.
//! Legs are placed strictly sequentially and the engine advances on
//! asynchronous order events from the connector.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connectors;
pub mod data;
pub mod strategy;
pub mod trading;
pub mod utils;

// Re-export commonly used types
pub use config::TriangularConfig;
pub use connectors::{OrderCandidate, OrderEvent, OrderSide, PaperConnector, SpotConnector};
pub use data::{OrderBook, PriceLevel};
pub use strategy::{
    ArbitrageOpportunity, CyclePlan, Direction, ProfitEvaluator, StrategyState,
    TriangularStrategy,
};
pub use trading::TickDriver;

/// Result type used throughout the application
pub type Result<T> = anyhow::Result<T>;

/// Common error types for the arbitrage system
#[derive(thiserror::Error, Debug)]
pub enum StrategyError {
    /// Configuration error, fatal to initialization
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configured pairs do not form a valid triangular cycle
    #[error("Invalid pair set: {0}")]
    InvalidPairSet(String),

    /// A leg of an in-flight cycle failed; the cycle is abandoned
    #[error("Leg failure: {0}")]
    LegFailure(String),

    /// Connector-reported error
    #[error("Connector error: {0}")]
    Connector(String),
}

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
