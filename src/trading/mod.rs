//! Strategy run loop

use crate::{
    connectors::{OrderEvent, SpotConnector},
    strategy::{StrategyState, TriangularStrategy},
    Result, StrategyError,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Periodic tick driver for one strategy instance
///
/// Single logical thread of control: each round first applies every queued
/// order event, then runs one evaluation tick, so no notification is ever
/// processed concurrently with tick logic. The kill switch is enforced
/// here, above the core state machine.
pub struct TickDriver {
    interval: Duration,
    max_ticks: Option<u64>,
}

impl TickDriver {
    /// Create a driver ticking at the given interval, running until stopped
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
        }
    }

    /// Limit the run to a fixed number of ticks
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Drive the strategy against a connector until the tick budget runs
    /// out, the kill switch fires, or the strategy is disabled
    pub async fn run<C: SpotConnector>(
        &self,
        strategy: &mut TriangularStrategy,
        connector: &C,
    ) -> Result<()> {
        let mut events = connector.take_order_events().ok_or_else(|| {
            StrategyError::Connector("order event stream already taken".to_string())
        })?;

        let mut ticks = 0u64;
        loop {
            drain_events(strategy, connector, &mut events).await;

            // The kill switch gates evaluation: once cumulative loss
            // reaches the configured rate, no further cycle may start.
            if self.kill_switch_tripped(strategy) {
                warn!(
                    profit_pct = %strategy.total_profit_pct(),
                    rate = %strategy.config().kill_switch_rate,
                    "kill switch tripped, stopping strategy"
                );
                strategy.stop(connector).await;
                break;
            }

            strategy.on_tick(connector).await;
            drain_events(strategy, connector, &mut events).await;

            if strategy.state() == StrategyState::Disabled {
                warn!("strategy disabled, stopping run loop");
                break;
            }

            ticks += 1;
            if let Some(max_ticks) = self.max_ticks {
                if ticks >= max_ticks {
                    info!(ticks, "tick budget exhausted");
                    break;
                }
            }

            tokio::time::sleep(self.interval).await;
        }

        Ok(())
    }

    fn kill_switch_tripped(&self, strategy: &TriangularStrategy) -> bool {
        let config = strategy.config();
        config.kill_switch_enabled && strategy.total_profit_pct() <= config.kill_switch_rate
    }
}

async fn drain_events<C: SpotConnector>(
    strategy: &mut TriangularStrategy,
    connector: &C,
    events: &mut mpsc::Receiver<OrderEvent>,
) {
    while let Ok(event) = events.try_recv() {
        strategy.on_order_event(connector, event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriangularConfig;
    use crate::connectors::PaperConnector;
    use crate::data::{OrderBook, PriceLevel};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn profitable_market() -> PaperConnector {
        PaperConnector::new("paper")
            .with_fees(Decimal::ZERO, Decimal::ZERO)
            .with_balance("USDT", dec!(100))
            .with_book(OrderBook::with_sides(
                "ADA-USDT",
                vec![PriceLevel::new(dec!(0.49), dec!(100000))],
                vec![PriceLevel::new(dec!(0.50), dec!(100000))],
            ))
            .with_book(OrderBook::with_sides(
                "ADA-BTC",
                vec![PriceLevel::new(dec!(0.00001), dec!(100000))],
                vec![PriceLevel::new(dec!(0.0000101), dec!(100000))],
            ))
            .with_book(OrderBook::with_sides(
                "BTC-USDT",
                vec![PriceLevel::new(dec!(60000), dec!(10))],
                vec![PriceLevel::new(dec!(60100), dec!(10))],
            ))
    }

    #[tokio::test]
    async fn test_driver_completes_cycles_within_budget() {
        let connector = profitable_market();
        let mut strategy = TriangularStrategy::new(TriangularConfig::default());

        let driver = TickDriver::new(Duration::from_millis(1)).with_max_ticks(3);
        driver.run(&mut strategy, &connector).await.unwrap();

        assert_eq!(strategy.state(), StrategyState::Ready);
        assert!(strategy.total_profit() > Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_driver_stops_on_disabled_strategy() {
        let connector = profitable_market();
        let mut config = TriangularConfig::default();
        config.holding_asset = "ETH".to_string();
        let mut strategy = TriangularStrategy::new(config);

        let driver = TickDriver::new(Duration::from_millis(1)).with_max_ticks(100);
        driver.run(&mut strategy, &connector).await.unwrap();
        assert_eq!(strategy.state(), StrategyState::Disabled);
    }

    #[tokio::test]
    async fn test_event_stream_can_only_drive_one_loop() {
        let connector = profitable_market();
        let _events = connector.take_order_events().unwrap();
        let mut strategy = TriangularStrategy::new(TriangularConfig::default());

        let driver = TickDriver::new(Duration::from_millis(1)).with_max_ticks(1);
        assert!(driver.run(&mut strategy, &connector).await.is_err());
    }
}
