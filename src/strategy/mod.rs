//! Triangular arbitrage strategy implementation

pub mod cycle;
pub mod depth;
pub mod engine;
pub mod profit;

pub use cycle::{CyclePlan, Direction, Leg, TradingCycle, TradingPair};
pub use depth::{base_amount_for_quote_volume, BookAnalyzer, DefaultBookAnalyzer};
pub use engine::{StatusSnapshot, StrategyState, TriangularStrategy};
pub use profit::{ArbitrageOpportunity, CycleEstimate, ProfitEvaluator};
