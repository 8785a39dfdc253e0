//! Sequential execution engine for triangular cycles
//!
//! A single state machine drives each strategy instance: evaluation runs on
//! an external tick while the machine is ready, and an in-flight cycle
//! advances only on asynchronous order events. Exactly one order is
//! outstanding at any time; any leg failure abandons the whole cycle.

use crate::{
    config::TriangularConfig,
    connectors::{OrderCandidate, OrderEvent, OrderSide, SpotConnector},
    log_leg,
    strategy::cycle::{CyclePlan, Direction},
    strategy::depth::{BookAnalyzer, DefaultBookAnalyzer},
    strategy::profit::{ArbitrageOpportunity, ProfitEvaluator},
    Result, StrategyError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

/// Execution state of the strategy state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyState {
    /// Cycles not yet derived; the first tick initializes
    Uninitialized,
    /// Idle and evaluating opportunities each tick
    Ready,
    /// A cycle is in flight with one order outstanding
    Executing,
    /// A cycle was aborted; the next tick recovers to Ready
    Faulted,
    /// Initialization failed; terminal until external restart
    Disabled,
}

impl fmt::Display for StrategyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyState::Uninitialized => write!(f, "UNINITIALIZED"),
            StrategyState::Ready => write!(f, "READY"),
            StrategyState::Executing => write!(f, "EXECUTING"),
            StrategyState::Faulted => write!(f, "FAULTED"),
            StrategyState::Disabled => write!(f, "DISABLED"),
        }
    }
}

/// State of the one in-flight cycle; exists only while executing
#[derive(Debug, Clone)]
struct CycleExecution {
    direction: Direction,
    pending_orders: Vec<OrderCandidate>,
    current_leg: usize,
    active_order_id: Option<String>,
    order_ids: Vec<String>,
    start_balance: Decimal,
}

/// Serializable snapshot of the strategy for the status surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Current state
    pub state: StrategyState,
    /// Direction of the in-flight cycle, if any
    pub direction: Option<Direction>,
    /// Index of the leg currently executing, if any
    pub current_leg: Option<usize>,
    /// Outstanding order id, if any
    pub active_order_id: Option<String>,
    /// Placement failures observed since start (diagnostic only)
    pub placement_failures: u32,
    /// Accumulated realized profit in holding-asset units
    pub total_profit: Decimal,
    /// Accumulated realized profit in percent of the per-cycle amount
    pub total_profit_pct: Decimal,
}

/// Triangular arbitrage strategy state machine
pub struct TriangularStrategy {
    config: TriangularConfig,
    analyzer: Box<dyn BookAnalyzer>,
    plan: Option<CyclePlan>,
    state: StrategyState,
    execution: Option<CycleExecution>,
    placement_failures: u32,
    total_profit: Decimal,
    total_profit_pct: Decimal,
}

impl TriangularStrategy {
    /// Create a strategy with the default book analyzer
    pub fn new(config: TriangularConfig) -> Self {
        Self::with_analyzer(config, Box::new(DefaultBookAnalyzer))
    }

    /// Create a strategy with an injected book analyzer
    pub fn with_analyzer(config: TriangularConfig, analyzer: Box<dyn BookAnalyzer>) -> Self {
        Self {
            config,
            analyzer,
            plan: None,
            state: StrategyState::Uninitialized,
            execution: None,
            placement_failures: 0,
            total_profit: Decimal::ZERO,
            total_profit_pct: Decimal::ZERO,
        }
    }

    /// Strategy configuration
    pub fn config(&self) -> &TriangularConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> StrategyState {
        self.state
    }

    /// Derived cycle plan, present once initialized
    pub fn plan(&self) -> Option<&CyclePlan> {
        self.plan.as_ref()
    }

    /// Accumulated realized profit in holding-asset units
    pub fn total_profit(&self) -> Decimal {
        self.total_profit
    }

    /// Accumulated realized profit in percent of the per-cycle amount
    pub fn total_profit_pct(&self) -> Decimal {
        self.total_profit_pct
    }

    /// Evaluation entry point, driven by a periodic external tick
    ///
    /// No-ops while a cycle is executing; initializes on the first call;
    /// recovers from a fault; otherwise evaluates both directions and
    /// starts a cycle when one clears the profitability threshold.
    pub async fn on_tick(&mut self, connector: &dyn SpotConnector) {
        match self.state {
            StrategyState::Uninitialized => self.init_strategy(),
            StrategyState::Disabled => {}
            StrategyState::Executing => {}
            StrategyState::Faulted => {
                info!("recovering from aborted cycle");
                self.state = StrategyState::Ready;
            }
            StrategyState::Ready => {
                if let Err(e) = self.evaluate_tick(connector).await {
                    // Transient market-data trouble skips the tick; it is
                    // not a configuration fault.
                    warn!(error = %e, "evaluation skipped");
                }
            }
        }
    }

    /// Event entry point for connector order notifications
    ///
    /// Events are correlated to the outstanding order by id; all others
    /// are ignored. Created and Filled are informational; Completed
    /// advances the cycle and Failed aborts it.
    pub async fn on_order_event(&mut self, connector: &dyn SpotConnector, event: OrderEvent) {
        let is_active = self
            .execution
            .as_ref()
            .and_then(|e| e.active_order_id.as_deref())
            .map(|id| id == event.order_id())
            .unwrap_or(false);
        if !is_active {
            return;
        }

        match event {
            OrderEvent::Created { order_id, pair, side } => {
                info!(order_id = %order_id, pair = %pair, side = %side, "order created");
            }
            OrderEvent::Filled { order_id, pair, amount, price } => {
                info!(
                    order_id = %order_id,
                    pair = %pair,
                    amount = %amount,
                    price = %price,
                    "order filled"
                );
            }
            OrderEvent::Completed { order_id, pair, side } => {
                info!(order_id = %order_id, pair = %pair, side = %side, "order completed");
                self.handle_order_completed(connector).await;
            }
            OrderEvent::Failed { order_id, pair, reason } => {
                error!(
                    order_id = %order_id,
                    pair = %pair,
                    reason = %reason,
                    "order failed, aborting arbitrage"
                );
                self.fail_cycle();
            }
        }
    }

    /// Stop the strategy: cancel the outstanding order, if any, and
    /// discard pending cycle state without completing the cycle
    pub async fn stop(&mut self, connector: &dyn SpotConnector) {
        if let Some(order_id) = self
            .execution
            .as_ref()
            .and_then(|e| e.active_order_id.clone())
        {
            // Best-effort: local state clears regardless of the outcome.
            if let Err(e) = connector.cancel_order(&order_id).await {
                warn!(order_id = %order_id, error = %e, "cancel failed");
            } else {
                info!(order_id = %order_id, "cancelled active order");
            }
        }
        self.execution = None;
        if self.state != StrategyState::Disabled && self.state != StrategyState::Uninitialized {
            self.state = StrategyState::Ready;
        }
        info!("strategy stopped");
    }

    /// Current status snapshot for the presentation layer
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state,
            direction: self.execution.as_ref().map(|e| e.direction),
            current_leg: self.execution.as_ref().map(|e| e.current_leg),
            active_order_id: self
                .execution
                .as_ref()
                .and_then(|e| e.active_order_id.clone()),
            placement_failures: self.placement_failures,
            total_profit: self.total_profit,
            total_profit_pct: self.total_profit_pct,
        }
    }

    /// Human-readable status, one line per field
    pub fn format_status(&self) -> String {
        let mut lines = vec![format!("Status: {}", self.state)];
        if let Some(execution) = &self.execution {
            lines.push(format!("Direction: {}", execution.direction));
            lines.push(format!("Current leg: {}", execution.current_leg));
            if let Some(order_id) = &execution.active_order_id {
                lines.push(format!("Active order: {}", order_id));
            }
        }
        lines.push(format!(
            "Total profit: {} {}",
            self.total_profit, self.config.holding_asset
        ));
        lines.push(format!("Total profit percentage: {}%", self.total_profit_pct));
        lines.join("\n")
    }

    fn init_strategy(&mut self) {
        match CyclePlan::build(&self.config) {
            Ok(plan) => {
                info!(forward = %plan.forward, reverse = %plan.reverse, "strategy initialized");
                self.plan = Some(plan);
                self.state = StrategyState::Ready;
            }
            Err(e) => {
                error!(error = %e, "strategy initialization failed");
                self.state = StrategyState::Disabled;
            }
        }
    }

    async fn evaluate_tick(&mut self, connector: &dyn SpotConnector) -> Result<()> {
        if !self.ready_for_new_orders(connector).await? {
            return Ok(());
        }

        let opportunity = {
            let plan = self
                .plan
                .as_ref()
                .ok_or_else(|| StrategyError::Config("cycle plan missing".to_string()))?;
            let evaluator = ProfitEvaluator::new(connector, self.analyzer.as_ref());
            evaluator
                .find_opportunity(
                    plan,
                    self.config.order_amount_in_holding_asset,
                    self.config.min_profitability,
                )
                .await?
        };

        if let Some(opportunity) = opportunity {
            self.start_arbitrage(connector, opportunity).await;
        }
        Ok(())
    }

    /// Insufficient balance is a skip condition, not an error
    async fn ready_for_new_orders(&self, connector: &dyn SpotConnector) -> Result<bool> {
        let available = connector
            .get_available_balance(&self.config.holding_asset)
            .await?;
        if available < self.config.order_amount_in_holding_asset {
            info!(
                asset = %self.config.holding_asset,
                available = %available,
                "balance too low, skipping evaluation"
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Build all three order candidates up front and submit the first leg
    ///
    /// A zero quantized amount on any candidate abandons the start and
    /// leaves the machine ready: a missed opportunity, not a fault.
    async fn start_arbitrage(
        &mut self,
        connector: &dyn SpotConnector,
        opportunity: ArbitrageOpportunity,
    ) {
        info!(
            direction = %opportunity.direction,
            expected_pct = %opportunity.profit_pct.round_dp(2),
            "starting arbitrage"
        );

        let cycle = match self.plan.as_ref() {
            Some(plan) => plan.cycle(opportunity.direction).clone(),
            None => return,
        };

        let mut pending_orders = Vec::with_capacity(3);
        for (leg, amount) in cycle.legs.iter().zip(&opportunity.order_amounts) {
            match self.build_candidate(connector, &leg.pair.name, leg.side, *amount).await {
                Ok(Some(candidate)) => pending_orders.push(candidate),
                Ok(None) => {
                    info!(pair = %leg.pair, "candidate amount quantized to zero, aborting start");
                    return;
                }
                Err(e) => {
                    warn!(pair = %leg.pair, error = %e, "could not build candidate, aborting start");
                    return;
                }
            }
        }

        let start_balance = match connector
            .get_available_balance(&self.config.holding_asset)
            .await
        {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "balance snapshot failed, aborting start");
                return;
            }
        };

        self.execution = Some(CycleExecution {
            direction: opportunity.direction,
            pending_orders,
            current_leg: 0,
            active_order_id: None,
            order_ids: Vec::with_capacity(3),
            start_balance,
        });
        self.state = StrategyState::Executing;
        self.place_next_order(connector).await;
    }

    async fn build_candidate(
        &self,
        connector: &dyn SpotConnector,
        pair: &str,
        side: OrderSide,
        amount: Decimal,
    ) -> Result<Option<OrderCandidate>> {
        let price = connector.estimate_execution_price(pair, side, amount).await?;
        let price = connector.quantize_price(pair, price);
        let amount = connector.quantize_amount(pair, amount);

        if amount.is_zero() {
            return Ok(None);
        }
        Ok(Some(OrderCandidate::new(pair, side, amount, price)))
    }

    /// Submit the current leg, or finish the cycle when none remain
    async fn place_next_order(&mut self, connector: &dyn SpotConnector) {
        let next = {
            let Some(execution) = self.execution.as_ref() else {
                return;
            };
            execution
                .pending_orders
                .get(execution.current_leg)
                .cloned()
        };
        let Some(candidate) = next else {
            self.complete_cycle(connector).await;
            return;
        };

        match self.process_candidate(connector, &candidate).await {
            Ok(order_id) => {
                log_leg!(info, candidate.pair, candidate.side, candidate.amount, candidate.price,
                         order_id = %order_id, "leg placed");
                if let Some(execution) = self.execution.as_mut() {
                    execution.order_ids.push(order_id.clone());
                    execution.active_order_id = Some(order_id);
                }
            }
            Err(e) => {
                error!(pair = %candidate.pair, error = %e, "leg placement failed, aborting arbitrage");
                self.placement_failures += 1;
                self.fail_cycle();
            }
        }
    }

    /// Budget-check and submit one candidate; a non-full adjustment is a
    /// leg failure (partial legs break the closed-loop guarantee)
    async fn process_candidate(
        &self,
        connector: &dyn SpotConnector,
        candidate: &OrderCandidate,
    ) -> Result<String> {
        let adjusted = connector.adjust_candidate_all_or_none(candidate).await?;
        if adjusted.amount != candidate.amount || adjusted.amount.is_zero() {
            return Err(StrategyError::LegFailure(format!(
                "budget adjustment returned {} of requested {} on {}",
                adjusted.amount, candidate.amount, candidate.pair
            ))
            .into());
        }
        connector.submit_order(&adjusted).await
    }

    async fn handle_order_completed(&mut self, connector: &dyn SpotConnector) {
        if let Some(execution) = self.execution.as_mut() {
            execution.active_order_id = None;
            execution.current_leg += 1;
        }
        self.place_next_order(connector).await;
    }

    /// Realized profit is the holding-asset balance delta over the cycle
    async fn complete_cycle(&mut self, connector: &dyn SpotConnector) {
        let Some(execution) = self.execution.take() else {
            return;
        };

        match connector
            .get_available_balance(&self.config.holding_asset)
            .await
        {
            Ok(final_balance) => {
                let profit = final_balance - execution.start_balance;
                let profit_pct =
                    profit / self.config.order_amount_in_holding_asset * Decimal::ONE_HUNDRED;
                self.total_profit += profit;
                self.total_profit_pct += profit_pct;
                info!(
                    direction = %execution.direction,
                    orders = execution.order_ids.len(),
                    profit = %profit,
                    profit_pct = %profit_pct.round_dp(4),
                    asset = %self.config.holding_asset,
                    "arbitrage completed"
                );
            }
            Err(e) => {
                // The cycle itself finished; only the bookkeeping is lost.
                warn!(error = %e, "final balance unavailable, profit not recorded");
            }
        }

        self.state = StrategyState::Ready;
    }

    /// Abort the in-flight cycle: discard pending state, no retry.
    /// The next tick performs the Faulted -> Ready recovery.
    fn fail_cycle(&mut self) {
        self.execution = None;
        self.state = StrategyState::Faulted;
    }
}
