//! Spot connector trait

use crate::{
    connectors::{OrderCandidate, OrderEvent, OrderSide},
    data::OrderBook,
    Result,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

/// Contract the strategy core consumes from a spot market connector
///
/// Order submission is fire-and-forget: `submit_order` returns an order id
/// immediately and the connector follows up with `OrderEvent`s on the
/// receiver handed out by `take_order_events`. Event ordering is preserved
/// per order id.
#[async_trait]
pub trait SpotConnector: Send + Sync {
    /// Connector identifier
    fn name(&self) -> &str;

    /// Current order book snapshot for a pair
    async fn get_order_book(&self, pair: &str) -> Result<OrderBook>;

    /// Available (unlocked) balance of an asset
    async fn get_available_balance(&self, asset: &str) -> Result<Decimal>;

    /// Expected average execution price for a taker order of `amount`
    /// base units against current book depth
    async fn estimate_execution_price(
        &self,
        pair: &str,
        side: OrderSide,
        amount: Decimal,
    ) -> Result<Decimal>;

    /// Quote-asset volume moved by filling `amount` base units against
    /// current book depth (asks for a buy, bids for a sell); best-effort
    /// when the book is thinner than the requested amount
    async fn simulate_execution_volume(
        &self,
        pair: &str,
        side: OrderSide,
        amount: Decimal,
    ) -> Result<Decimal>;

    /// Round an amount down per pair precision rules; returns zero for
    /// amounts below the minimum tradable size
    fn quantize_amount(&self, pair: &str, amount: Decimal) -> Decimal;

    /// Round a price down per pair precision rules
    fn quantize_price(&self, pair: &str, price: Decimal) -> Decimal;

    /// Fee rate as a fraction of traded volume, e.g. `0.001` for 0.1%
    fn estimate_fee(&self, is_maker: bool) -> Decimal;

    /// All-or-none budget check: returns the candidate unchanged when the
    /// account can cover it in full, or with a zero amount otherwise;
    /// never a partial adjustment
    async fn adjust_candidate_all_or_none(
        &self,
        candidate: &OrderCandidate,
    ) -> Result<OrderCandidate>;

    /// Submit a market order, returning the venue order id
    async fn submit_order(&self, candidate: &OrderCandidate) -> Result<String>;

    /// Cancel an outstanding order, best-effort
    async fn cancel_order(&self, order_id: &str) -> Result<()>;

    /// Hand out the order event receiver; yields `None` after the first call
    fn take_order_events(&self) -> Option<mpsc::Receiver<OrderEvent>>;
}
