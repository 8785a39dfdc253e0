//! Paper trading connector
//!
//! Simulates a spot venue against in-memory order books and a balance
//! ledger. Market orders fill instantly, emitting Created, Filled and
//! Completed events in order; failures can be injected deterministically
//! for tests and drills.

use crate::{
    connectors::{OrderCandidate, OrderEvent, OrderSide, SpotConnector},
    data::{OrderBook, PriceLevel},
    Result, StrategyError,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Per-pair precision rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRules {
    /// Amount quantization step
    #[serde(default = "PairRules::default_step")]
    pub amount_step: Decimal,
    /// Price quantization step
    #[serde(default = "PairRules::default_step")]
    pub price_step: Decimal,
    /// Minimum tradable amount; smaller amounts quantize to zero
    #[serde(default)]
    pub min_amount: Decimal,
}

impl PairRules {
    fn default_step() -> Decimal {
        Decimal::new(1, 8)
    }
}

impl Default for PairRules {
    fn default() -> Self {
        Self {
            amount_step: Self::default_step(),
            price_step: Self::default_step(),
            min_amount: Decimal::ZERO,
        }
    }
}

/// One pair in a paper market definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPair {
    /// Trading pair identifier
    pub pair: String,
    /// Precision rules for the pair
    #[serde(flatten)]
    pub rules: PairRules,
    /// Bid levels as `[price, amount]` rows
    #[serde(default)]
    pub bids: Vec<(Decimal, Decimal)>,
    /// Ask levels as `[price, amount]` rows
    #[serde(default)]
    pub asks: Vec<(Decimal, Decimal)>,
}

/// Paper market definition: balances, fees and order books
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Taker fee rate as a fraction, e.g. `0.001`
    #[serde(default = "MarketSnapshot::default_fee")]
    pub taker_fee: Decimal,
    /// Maker fee rate as a fraction
    #[serde(default = "MarketSnapshot::default_fee")]
    pub maker_fee: Decimal,
    /// Initial balances per asset
    #[serde(default)]
    pub balances: HashMap<String, Decimal>,
    /// Order books and precision rules per pair
    pub pairs: Vec<SnapshotPair>,
}

impl MarketSnapshot {
    fn default_fee() -> Decimal {
        Decimal::new(1, 3)
    }

    /// Load a market definition from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| StrategyError::Config(format!("Failed to read market file: {}", e)))?;
        let snapshot: MarketSnapshot = toml::from_str(&content)
            .map_err(|e| StrategyError::Config(format!("Failed to parse market file: {}", e)))?;
        Ok(snapshot)
    }
}

/// Record of one simulated fill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperFill {
    /// Venue order id
    pub order_id: String,
    /// Trading pair identifier
    pub pair: String,
    /// Order side
    pub side: OrderSide,
    /// Filled base amount
    pub amount: Decimal,
    /// Average fill price
    pub price: Decimal,
}

/// Simulated spot connector
pub struct PaperConnector {
    name: String,
    books: RwLock<HashMap<String, OrderBook>>,
    balances: RwLock<HashMap<String, Decimal>>,
    rules: HashMap<String, PairRules>,
    taker_fee: Decimal,
    maker_fee: Decimal,
    fills: RwLock<Vec<PaperFill>>,
    events_tx: mpsc::Sender<OrderEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<OrderEvent>>>,
    submissions: AtomicU64,
    fail_on_submission: AtomicU64,
}

impl PaperConnector {
    /// Create an empty paper connector
    pub fn new(name: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            name: name.into(),
            books: RwLock::new(HashMap::new()),
            balances: RwLock::new(HashMap::new()),
            rules: HashMap::new(),
            taker_fee: MarketSnapshot::default_fee(),
            maker_fee: MarketSnapshot::default_fee(),
            fills: RwLock::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            submissions: AtomicU64::new(0),
            fail_on_submission: AtomicU64::new(0),
        }
    }

    /// Build a connector from a market definition
    pub fn from_snapshot(name: impl Into<String>, snapshot: MarketSnapshot) -> Self {
        let mut connector = Self::new(name).with_fees(snapshot.taker_fee, snapshot.maker_fee);
        for (asset, amount) in snapshot.balances {
            connector = connector.with_balance(asset, amount);
        }
        for entry in snapshot.pairs {
            let bids = entry
                .bids
                .iter()
                .map(|(p, a)| PriceLevel::new(*p, *a))
                .collect();
            let asks = entry
                .asks
                .iter()
                .map(|(p, a)| PriceLevel::new(*p, *a))
                .collect();
            let book = OrderBook::with_sides(entry.pair.clone(), bids, asks);
            connector = connector
                .with_book(book)
                .with_rules(entry.pair, entry.rules);
        }
        connector
    }

    /// Set fee rates (fractions of traded volume)
    pub fn with_fees(mut self, taker: Decimal, maker: Decimal) -> Self {
        self.taker_fee = taker;
        self.maker_fee = maker;
        self
    }

    /// Seed an initial balance
    pub fn with_balance(mut self, asset: impl Into<String>, amount: Decimal) -> Self {
        self.balances.get_mut().insert(asset.into(), amount);
        self
    }

    /// Seed an order book
    pub fn with_book(mut self, book: OrderBook) -> Self {
        self.books.get_mut().insert(book.pair.clone(), book);
        self
    }

    /// Set precision rules for a pair
    pub fn with_rules(mut self, pair: impl Into<String>, rules: PairRules) -> Self {
        self.rules.insert(pair.into(), rules);
        self
    }

    /// Replace the order book for a pair at runtime
    pub async fn set_book(&self, book: OrderBook) {
        self.books.write().await.insert(book.pair.clone(), book);
    }

    /// Inject a venue failure on the n-th submitted order (1-based)
    pub fn fail_submission(&self, n: u64) {
        self.fail_on_submission.store(n, Ordering::SeqCst);
    }

    /// All fills recorded so far
    pub async fn fills(&self) -> Vec<PaperFill> {
        self.fills.read().await.clone()
    }

    /// Walk taker levels, filling up to `amount` base units.
    /// Returns (base filled, quote volume moved).
    fn walk_levels(levels: &[PriceLevel], amount: Decimal) -> (Decimal, Decimal) {
        let mut remaining = amount;
        let mut quote = Decimal::ZERO;
        for level in levels {
            if remaining.is_zero() {
                break;
            }
            let take = remaining.min(level.amount);
            quote += take * level.price;
            remaining -= take;
        }
        (amount - remaining, quote)
    }

    async fn taker_walk(&self, pair: &str, side: OrderSide, amount: Decimal) -> Result<(Decimal, Decimal)> {
        let books = self.books.read().await;
        let book = books
            .get(pair)
            .ok_or_else(|| StrategyError::Connector(format!("Unknown pair: {}", pair)))?;
        Ok(Self::walk_levels(book.taker_levels(side), amount))
    }

    fn rules_for(&self, pair: &str) -> PairRules {
        self.rules.get(pair).cloned().unwrap_or_default()
    }

    async fn balance_of(&self, asset: &str) -> Decimal {
        self.balances
            .read()
            .await
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    async fn credit(&self, asset: &str, delta: Decimal) {
        let mut balances = self.balances.write().await;
        let entry = balances.entry(asset.to_string()).or_insert(Decimal::ZERO);
        *entry += delta;
    }

    fn split_pair(pair: &str) -> Result<(&str, &str)> {
        pair.split_once('-')
            .ok_or_else(|| StrategyError::Connector(format!("Malformed pair: {}", pair)).into())
    }

    async fn send_event(&self, event: OrderEvent) -> Result<()> {
        self.events_tx
            .send(event)
            .await
            .map_err(|_| StrategyError::Connector("Order event channel closed".to_string()).into())
    }
}

#[async_trait]
impl SpotConnector for PaperConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_order_book(&self, pair: &str) -> Result<OrderBook> {
        let books = self.books.read().await;
        books
            .get(pair)
            .cloned()
            .ok_or_else(|| StrategyError::Connector(format!("Unknown pair: {}", pair)).into())
    }

    async fn get_available_balance(&self, asset: &str) -> Result<Decimal> {
        Ok(self.balance_of(asset).await)
    }

    async fn estimate_execution_price(
        &self,
        pair: &str,
        side: OrderSide,
        amount: Decimal,
    ) -> Result<Decimal> {
        let (filled, quote) = self.taker_walk(pair, side, amount).await?;
        if filled.is_zero() {
            return Err(StrategyError::Connector(format!("No liquidity on {}", pair)).into());
        }
        Ok(quote / filled)
    }

    async fn simulate_execution_volume(
        &self,
        pair: &str,
        side: OrderSide,
        amount: Decimal,
    ) -> Result<Decimal> {
        let (_, quote) = self.taker_walk(pair, side, amount).await?;
        Ok(quote)
    }

    fn quantize_amount(&self, pair: &str, amount: Decimal) -> Decimal {
        let rules = self.rules_for(pair);
        if amount < rules.min_amount {
            return Decimal::ZERO;
        }
        if rules.amount_step.is_zero() {
            return amount;
        }
        amount - amount % rules.amount_step
    }

    fn quantize_price(&self, pair: &str, price: Decimal) -> Decimal {
        let rules = self.rules_for(pair);
        if rules.price_step.is_zero() {
            return price;
        }
        price - price % rules.price_step
    }

    fn estimate_fee(&self, is_maker: bool) -> Decimal {
        if is_maker {
            self.maker_fee
        } else {
            self.taker_fee
        }
    }

    async fn adjust_candidate_all_or_none(
        &self,
        candidate: &OrderCandidate,
    ) -> Result<OrderCandidate> {
        let (base, quote) = Self::split_pair(&candidate.pair)?;
        let covered = match candidate.side {
            OrderSide::Buy => {
                self.balance_of(quote).await >= candidate.amount * candidate.price
            }
            OrderSide::Sell => self.balance_of(base).await >= candidate.amount,
        };

        let mut adjusted = candidate.clone();
        if !covered {
            debug!(
                pair = %candidate.pair,
                side = %candidate.side,
                amount = %candidate.amount,
                "budget check cannot cover candidate in full"
            );
            adjusted.amount = Decimal::ZERO;
        }
        Ok(adjusted)
    }

    async fn submit_order(&self, candidate: &OrderCandidate) -> Result<String> {
        let order_id = Uuid::new_v4().to_string();
        let submission = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;

        self.send_event(OrderEvent::Created {
            order_id: order_id.clone(),
            pair: candidate.pair.clone(),
            side: candidate.side,
        })
        .await?;

        if self.fail_on_submission.load(Ordering::SeqCst) == submission {
            self.send_event(OrderEvent::Failed {
                order_id: order_id.clone(),
                pair: candidate.pair.clone(),
                reason: "injected venue failure".to_string(),
            })
            .await?;
            return Ok(order_id);
        }

        let (filled, quote_volume) = self
            .taker_walk(&candidate.pair, candidate.side, candidate.amount)
            .await?;
        if filled < candidate.amount {
            self.send_event(OrderEvent::Failed {
                order_id: order_id.clone(),
                pair: candidate.pair.clone(),
                reason: "insufficient book depth".to_string(),
            })
            .await?;
            return Ok(order_id);
        }

        let (base, quote) = Self::split_pair(&candidate.pair)?;
        let fee = self.taker_fee;
        match candidate.side {
            OrderSide::Buy => {
                self.credit(quote, -quote_volume).await;
                self.credit(base, filled * (Decimal::ONE - fee)).await;
            }
            OrderSide::Sell => {
                self.credit(base, -filled).await;
                self.credit(quote, quote_volume * (Decimal::ONE - fee)).await;
            }
        }

        let price = quote_volume / filled;
        info!(
            order_id = %order_id,
            pair = %candidate.pair,
            side = %candidate.side,
            amount = %filled,
            price = %price,
            "paper order filled"
        );

        self.fills.write().await.push(PaperFill {
            order_id: order_id.clone(),
            pair: candidate.pair.clone(),
            side: candidate.side,
            amount: filled,
            price,
        });

        self.send_event(OrderEvent::Filled {
            order_id: order_id.clone(),
            pair: candidate.pair.clone(),
            amount: filled,
            price,
        })
        .await?;
        self.send_event(OrderEvent::Completed {
            order_id: order_id.clone(),
            pair: candidate.pair.clone(),
            side: candidate.side,
        })
        .await?;

        Ok(order_id)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        // Market orders fill on submission; nothing is resting to cancel.
        debug!(order_id = %order_id, "cancel requested");
        Ok(())
    }

    fn take_order_events(&self) -> Option<mpsc::Receiver<OrderEvent>> {
        self.events_rx.lock().expect("event receiver lock").take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ada_usdt_book() -> OrderBook {
        OrderBook::with_sides(
            "ADA-USDT",
            vec![PriceLevel::new(dec!(0.49), dec!(1000))],
            vec![PriceLevel::new(dec!(0.50), dec!(1000))],
        )
    }

    fn connector() -> PaperConnector {
        PaperConnector::new("paper")
            .with_fees(Decimal::ZERO, Decimal::ZERO)
            .with_balance("USDT", dec!(100))
            .with_book(ada_usdt_book())
    }

    #[tokio::test]
    async fn test_quantize_amount_floor_and_min() {
        let connector = PaperConnector::new("paper").with_rules(
            "ADA-USDT",
            PairRules {
                amount_step: dec!(0.1),
                price_step: dec!(0.01),
                min_amount: dec!(1),
            },
        );
        assert_eq!(connector.quantize_amount("ADA-USDT", dec!(5.27)), dec!(5.2));
        assert_eq!(connector.quantize_amount("ADA-USDT", dec!(0.9)), Decimal::ZERO);
        assert_eq!(connector.quantize_price("ADA-USDT", dec!(0.519)), dec!(0.51));
    }

    #[tokio::test]
    async fn test_execution_price_walks_depth() {
        let book = OrderBook::with_sides(
            "ADA-USDT",
            vec![],
            vec![
                PriceLevel::new(dec!(100), dec!(1)),
                PriceLevel::new(dec!(101), dec!(2)),
            ],
        );
        let connector = PaperConnector::new("paper").with_book(book);
        let price = connector
            .estimate_execution_price("ADA-USDT", OrderSide::Buy, dec!(2))
            .await
            .unwrap();
        assert_eq!(price, dec!(100.5));
    }

    #[tokio::test]
    async fn test_submit_order_fills_and_emits_events() {
        let connector = connector();
        let mut events = connector.take_order_events().unwrap();

        let candidate = OrderCandidate::new("ADA-USDT", OrderSide::Buy, dec!(100), dec!(0.50));
        let order_id = connector.submit_order(&candidate).await.unwrap();

        assert!(matches!(events.try_recv().unwrap(), OrderEvent::Created { .. }));
        match events.try_recv().unwrap() {
            OrderEvent::Filled { order_id: id, amount, price, .. } => {
                assert_eq!(id, order_id);
                assert_eq!(amount, dec!(100));
                assert_eq!(price, dec!(0.50));
            }
            other => panic!("expected fill, got {:?}", other),
        }
        assert!(matches!(events.try_recv().unwrap(), OrderEvent::Completed { .. }));

        assert_eq!(connector.get_available_balance("USDT").await.unwrap(), dec!(50));
        assert_eq!(connector.get_available_balance("ADA").await.unwrap(), dec!(100));
    }

    #[tokio::test]
    async fn test_injected_failure_emits_failed_event() {
        let connector = connector();
        connector.fail_submission(1);
        let mut events = connector.take_order_events().unwrap();

        let candidate = OrderCandidate::new("ADA-USDT", OrderSide::Buy, dec!(10), dec!(0.50));
        connector.submit_order(&candidate).await.unwrap();

        assert!(matches!(events.try_recv().unwrap(), OrderEvent::Created { .. }));
        assert!(matches!(events.try_recv().unwrap(), OrderEvent::Failed { .. }));
        // No balance movement on a failed order
        assert_eq!(connector.get_available_balance("USDT").await.unwrap(), dec!(100));
    }

    #[tokio::test]
    async fn test_all_or_none_adjustment() {
        let connector = connector();

        let affordable = OrderCandidate::new("ADA-USDT", OrderSide::Buy, dec!(100), dec!(0.50));
        let adjusted = connector.adjust_candidate_all_or_none(&affordable).await.unwrap();
        assert_eq!(adjusted.amount, dec!(100));

        let oversized = OrderCandidate::new("ADA-USDT", OrderSide::Buy, dec!(1000), dec!(0.50));
        let adjusted = connector.adjust_candidate_all_or_none(&oversized).await.unwrap();
        assert_eq!(adjusted.amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_take_order_events_yields_once() {
        let connector = connector();
        assert!(connector.take_order_events().is_some());
        assert!(connector.take_order_events().is_none());
    }

    #[test]
    fn test_snapshot_parsing() {
        let raw = r#"
            taker_fee = 0.001
            maker_fee = 0.001

            [balances]
            USDT = 100.0

            [[pairs]]
            pair = "ADA-USDT"
            amount_step = 0.01
            price_step = 0.0001
            min_amount = 1.0
            bids = [[0.49, 1000.0]]
            asks = [[0.50, 1000.0]]
        "#;
        let snapshot: MarketSnapshot = toml::from_str(raw).unwrap();
        assert_eq!(snapshot.pairs.len(), 1);
        assert_eq!(snapshot.balances["USDT"], dec!(100));

        let connector = PaperConnector::from_snapshot("paper", snapshot);
        assert_eq!(connector.quantize_amount("ADA-USDT", dec!(2.555)), dec!(2.55));
    }
}
