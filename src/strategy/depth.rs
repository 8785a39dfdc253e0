//! Depth-aware conversion of trade values into order amounts

use crate::{
    connectors::{OrderSide, SpotConnector},
    data::PriceLevel,
    strategy::cycle::TradingPair,
    Result,
};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Cumulative base-asset amount obtainable for a target quote-asset value
///
/// Consumes `levels` in priority order (best price first) until the target
/// value is met or the book is exhausted; the final level is consumed only
/// fractionally. Exhausting the book is not an error: the amount consumed
/// so far is returned. The target must be non-negative.
pub fn base_amount_for_quote_volume(levels: &[PriceLevel], quote_volume: Decimal) -> Decimal {
    debug_assert!(
        !quote_volume.is_sign_negative(),
        "target trade value must be non-negative"
    );
    if quote_volume <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut cumulative_volume = Decimal::ZERO;
    let mut cumulative_amount = Decimal::ZERO;

    for level in levels {
        let mut row_volume = level.value();
        let row_amount = if cumulative_volume + row_volume >= quote_volume {
            row_volume = quote_volume - cumulative_volume;
            row_volume / level.price
        } else {
            level.amount
        };
        cumulative_volume += row_volume;
        cumulative_amount += row_amount;
        if cumulative_volume >= quote_volume {
            break;
        }
    }

    cumulative_amount
}

/// Book-analysis capability the profit evaluator is parameterized over
///
/// Injected into the strategy so tests can substitute doubles for the
/// depth-walking behavior.
#[async_trait]
pub trait BookAnalyzer: Send + Sync {
    /// Base amount obtainable for a quote-asset value on the pair's
    /// taker side for a buy
    async fn amount_for_value(
        &self,
        connector: &dyn SpotConnector,
        pair: &TradingPair,
        value: Decimal,
    ) -> Result<Decimal>;

    /// Convert the amount carried from the previous leg into this leg's
    /// quantized base order amount: value-to-amount through the book for
    /// a buy, pass-through for a sell
    async fn order_amount_from_exchanged_amount(
        &self,
        connector: &dyn SpotConnector,
        pair: &TradingPair,
        side: OrderSide,
        exchanged_amount: Decimal,
    ) -> Result<Decimal>;
}

/// Default analyzer walking the live order book
#[derive(Debug, Default)]
pub struct DefaultBookAnalyzer;

#[async_trait]
impl BookAnalyzer for DefaultBookAnalyzer {
    async fn amount_for_value(
        &self,
        connector: &dyn SpotConnector,
        pair: &TradingPair,
        value: Decimal,
    ) -> Result<Decimal> {
        let book = connector.get_order_book(&pair.name).await?;
        Ok(base_amount_for_quote_volume(
            book.taker_levels(OrderSide::Buy),
            value,
        ))
    }

    async fn order_amount_from_exchanged_amount(
        &self,
        connector: &dyn SpotConnector,
        pair: &TradingPair,
        side: OrderSide,
        exchanged_amount: Decimal,
    ) -> Result<Decimal> {
        let amount = match side {
            OrderSide::Buy => {
                self.amount_for_value(connector, pair, exchanged_amount)
                    .await?
            }
            OrderSide::Sell => exchanged_amount,
        };
        Ok(connector.quantize_amount(&pair.name, amount))
    }
}
