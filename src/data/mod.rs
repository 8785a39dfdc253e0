//! Order book data structures

use crate::connectors::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One order-book rung: a price and the amount available at that price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price in quote-asset units
    pub price: Decimal,
    /// Base-asset amount available at this price
    pub amount: Decimal,
}

impl PriceLevel {
    /// Create a new price level
    pub fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }

    /// Full quote-asset value of the level (price x amount)
    pub fn value(&self) -> Decimal {
        self.price * self.amount
    }
}

/// Order book snapshot for one trading pair
///
/// Levels are kept sorted by execution priority: bids descending,
/// asks ascending. Consumers may rely on this ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    /// Trading pair identifier, e.g. `ADA-USDT`
    pub pair: String,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    timestamp: i64,
}

impl OrderBook {
    /// Create an empty order book
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            timestamp: 0,
        }
    }

    /// Create a book from raw sides; levels are sorted into priority order
    pub fn with_sides(
        pair: impl Into<String>,
        mut bids: Vec<PriceLevel>,
        mut asks: Vec<PriceLevel>,
    ) -> Self {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self {
            pair: pair.into(),
            bids,
            asks,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Insert or replace a bid level, keeping priority order
    pub fn update_bid(&mut self, price: Decimal, amount: Decimal) {
        Self::update_side(&mut self.bids, price, amount);
        self.bids.sort_by(|a, b| b.price.cmp(&a.price));
    }

    /// Insert or replace an ask level, keeping priority order
    pub fn update_ask(&mut self, price: Decimal, amount: Decimal) {
        Self::update_side(&mut self.asks, price, amount);
        self.asks.sort_by(|a, b| a.price.cmp(&b.price));
    }

    fn update_side(side: &mut Vec<PriceLevel>, price: Decimal, amount: Decimal) {
        if let Some(level) = side.iter_mut().find(|l| l.price == price) {
            level.amount = amount;
        } else {
            side.push(PriceLevel::new(price, amount));
        }
        side.retain(|l| !l.amount.is_zero());
    }

    /// Bid levels, best (highest) price first
    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    /// Ask levels, best (lowest) price first
    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    /// Levels a taker order of the given side executes against:
    /// asks for a buy, bids for a sell
    pub fn taker_levels(&self, side: OrderSide) -> &[PriceLevel] {
        match side {
            OrderSide::Buy => &self.asks,
            OrderSide::Sell => &self.bids,
        }
    }

    /// Best bid price, if any
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Best ask price, if any
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Snapshot timestamp in milliseconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Set the snapshot timestamp
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sides_keep_priority_order() {
        let mut book = OrderBook::new("ADA-USDT");
        book.update_ask(dec!(101), dec!(2));
        book.update_ask(dec!(100), dec!(1));
        book.update_bid(dec!(98), dec!(1));
        book.update_bid(dec!(99), dec!(3));

        assert_eq!(book.best_ask(), Some(dec!(100)));
        assert_eq!(book.best_bid(), Some(dec!(99)));
        assert_eq!(book.asks()[1].price, dec!(101));
        assert_eq!(book.bids()[1].price, dec!(98));
    }

    #[test]
    fn test_zero_amount_removes_level() {
        let mut book = OrderBook::new("ADA-USDT");
        book.update_ask(dec!(100), dec!(1));
        book.update_ask(dec!(100), dec!(0));
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn test_taker_levels_side_selection() {
        let book = OrderBook::with_sides(
            "ADA-USDT",
            vec![PriceLevel::new(dec!(99), dec!(1))],
            vec![PriceLevel::new(dec!(100), dec!(1))],
        );
        assert_eq!(book.taker_levels(OrderSide::Buy)[0].price, dec!(100));
        assert_eq!(book.taker_levels(OrderSide::Sell)[0].price, dec!(99));
    }

    #[test]
    fn test_with_sides_sorts_unordered_input() {
        let book = OrderBook::with_sides(
            "BTC-USDT",
            vec![
                PriceLevel::new(dec!(59000), dec!(1)),
                PriceLevel::new(dec!(60000), dec!(1)),
            ],
            vec![
                PriceLevel::new(dec!(60200), dec!(1)),
                PriceLevel::new(dec!(60100), dec!(1)),
            ],
        );
        assert_eq!(book.best_bid(), Some(dec!(60000)));
        assert_eq!(book.best_ask(), Some(dec!(60100)));
    }

    #[test]
    fn test_level_value() {
        let level = PriceLevel::new(dec!(100), dec!(1.5));
        assert_eq!(level.value(), dec!(150));
    }
}
