//! Per-cycle profit estimation

use crate::{
    connectors::{OrderSide, SpotConnector},
    strategy::cycle::{CyclePlan, Direction, TradingCycle},
    strategy::depth::BookAnalyzer,
    Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A cycle worth executing, produced and consumed within one evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    /// Traversal direction to execute
    pub direction: Direction,
    /// Expected profit in percent
    pub profit_pct: Decimal,
    /// Base order amount for each leg, in execution order
    pub order_amounts: Vec<Decimal>,
}

/// Outcome of simulating one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleEstimate {
    /// Expected profit in percent; `-100` marks an infeasible cycle
    pub profit_pct: Decimal,
    /// Base order amount per leg; empty when infeasible
    pub order_amounts: Vec<Decimal>,
}

impl CycleEstimate {
    /// Sentinel for a cycle no order can be placed on (an expected,
    /// frequent outcome under thin books, not an error)
    pub fn infeasible() -> Self {
        Self {
            profit_pct: -Decimal::ONE_HUNDRED,
            order_amounts: Vec::new(),
        }
    }

    /// Whether this estimate is the infeasible sentinel
    pub fn is_infeasible(&self) -> bool {
        self.order_amounts.is_empty()
    }
}

/// Simulates full cycles against current book depth without placing orders
pub struct ProfitEvaluator<'a> {
    connector: &'a dyn SpotConnector,
    analyzer: &'a dyn BookAnalyzer,
}

impl<'a> ProfitEvaluator<'a> {
    /// Create an evaluator over a connector and an injected book analyzer
    pub fn new(connector: &'a dyn SpotConnector, analyzer: &'a dyn BookAnalyzer) -> Self {
        Self { connector, analyzer }
    }

    /// Simulate sequential execution of a cycle's three legs from
    /// `start_amount` of the holding asset
    ///
    /// Each leg converts the carried amount into a quantized base order
    /// amount, simulates the fill, deducts the taker fee from the proceeds
    /// and carries the net amount into the next leg. The proceeds are
    /// denominated in the asset held after the leg: the base amount bought
    /// for a BUY, the bid-side quote volume for a SELL.
    pub async fn evaluate(
        &self,
        cycle: &TradingCycle,
        start_amount: Decimal,
    ) -> Result<CycleEstimate> {
        let fee_rate = self.connector.estimate_fee(false);
        let mut exchanged_amount = start_amount;
        let mut order_amounts = Vec::with_capacity(3);

        for leg in &cycle.legs {
            let amount = self
                .analyzer
                .order_amount_from_exchanged_amount(
                    self.connector,
                    &leg.pair,
                    leg.side,
                    exchanged_amount,
                )
                .await?;
            if amount.is_zero() {
                debug!(pair = %leg.pair, "order amount too low after quantization");
                return Ok(CycleEstimate::infeasible());
            }
            order_amounts.push(amount);

            let proceeds = match leg.side {
                OrderSide::Buy => amount,
                OrderSide::Sell => {
                    self.connector
                        .simulate_execution_volume(&leg.pair.name, leg.side, amount)
                        .await?
                }
            };
            exchanged_amount = proceeds - fee_rate * proceeds;
        }

        let profit_pct = (exchanged_amount - start_amount) / start_amount * Decimal::ONE_HUNDRED;
        Ok(CycleEstimate {
            profit_pct,
            order_amounts,
        })
    }

    /// Evaluate both directions and pick the better one clearing
    /// `min_profitability`, preferring forward on a tie
    pub async fn find_opportunity(
        &self,
        plan: &CyclePlan,
        start_amount: Decimal,
        min_profitability: Decimal,
    ) -> Result<Option<ArbitrageOpportunity>> {
        let forward = self.evaluate(&plan.forward, start_amount).await?;
        let reverse = self.evaluate(&plan.reverse, start_amount).await?;

        info!(
            forward_pct = %forward.profit_pct.round_dp(2),
            reverse_pct = %reverse.profit_pct.round_dp(2),
            "cycle profitability"
        );

        if forward.profit_pct >= min_profitability && forward.profit_pct >= reverse.profit_pct {
            Ok(Some(ArbitrageOpportunity {
                direction: Direction::Forward,
                profit_pct: forward.profit_pct,
                order_amounts: forward.order_amounts,
            }))
        } else if reverse.profit_pct >= min_profitability {
            Ok(Some(ArbitrageOpportunity {
                direction: Direction::Reverse,
                profit_pct: reverse.profit_pct,
                order_amounts: reverse.order_amounts,
            }))
        } else {
            Ok(None)
        }
    }
}
