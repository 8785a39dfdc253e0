//! Trading pairs and triangular cycle derivation

use crate::{config::TriangularConfig, connectors::OrderSide, Result, StrategyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// An ordered pair of assets parsed from a `BASE-QUOTE` identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    /// Pair identifier as configured, e.g. `ADA-USDT`
    pub name: String,
    /// Base asset
    pub base: String,
    /// Quote asset
    pub quote: String,
}

impl TradingPair {
    /// Whether the pair contains the given asset as base or quote
    pub fn contains(&self, asset: &str) -> bool {
        self.base == asset || self.quote == asset
    }
}

impl FromStr for TradingPair {
    type Err = StrategyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('-') => {
                Ok(Self {
                    name: s.to_string(),
                    base: base.to_string(),
                    quote: quote.to_string(),
                })
            }
            _ => Err(StrategyError::Config(format!(
                "Trading pair '{}' is not in BASE-QUOTE form",
                s
            ))),
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Traversal direction of the triangular cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Forward traversal (first holding pair first)
    Forward,
    /// Reverse traversal (forward legs in reverse order)
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// One trade of a triangular cycle: a pair and the side to take on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    /// Trading pair
    pub pair: TradingPair,
    /// Side to take on the pair
    pub side: OrderSide,
}

/// An ordered traversal of the three pairs returning to the holding asset
///
/// Invariant: the asset held after leg *i* is the asset consumed by leg
/// *i + 1*, and the holding asset is held before leg 0 and after leg 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingCycle {
    /// Traversal direction
    pub direction: Direction,
    /// The three legs in execution order
    pub legs: [Leg; 3],
}

impl fmt::Display for TradingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.direction)?;
        for leg in &self.legs {
            write!(f, " {} {}", leg.side, leg.pair)?;
        }
        Ok(())
    }
}

/// Both traversal directions, derived once at initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePlan {
    /// Forward cycle
    pub forward: TradingCycle,
    /// Reverse cycle
    pub reverse: TradingCycle,
}

impl CyclePlan {
    /// Validate the configured pairs and derive both traversal directions
    pub fn build(config: &TriangularConfig) -> Result<Self> {
        let pairs = parse_pairs(config)?;
        check_pair_set(&pairs, &config.holding_asset)?;

        let ordered = order_for_chaining(pairs, &config.holding_asset)?;
        let reversed = {
            let mut r = ordered.clone();
            r.reverse();
            r
        };

        Ok(Self {
            forward: derive_sides(Direction::Forward, ordered, &config.holding_asset)?,
            reverse: derive_sides(Direction::Reverse, reversed, &config.holding_asset)?,
        })
    }

    /// The cycle for a traversal direction
    pub fn cycle(&self, direction: Direction) -> &TradingCycle {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }
}

fn parse_pairs(config: &TriangularConfig) -> Result<[TradingPair; 3]> {
    let [first, second, third] = config.pairs();
    Ok([first.parse()?, second.parse()?, third.parse()?])
}

/// The three pairs must reference exactly three distinct assets, one of
/// which is the holding asset, and at least two pairs must contain the
/// holding asset for the triangle to close.
fn check_pair_set(pairs: &[TradingPair; 3], holding_asset: &str) -> Result<()> {
    let assets: BTreeSet<&str> = pairs
        .iter()
        .flat_map(|p| [p.base.as_str(), p.quote.as_str()])
        .collect();

    if assets.len() != 3 || !assets.contains(holding_asset) {
        return Err(StrategyError::InvalidPairSet(format!(
            "Pairs {}, {}, {} are not suitable for triangular arbitrage",
            pairs[0], pairs[1], pairs[2]
        ))
        .into());
    }

    if pairs.iter().filter(|p| p.contains(holding_asset)).count() < 2 {
        return Err(StrategyError::InvalidPairSet(
            "At least two pairs must include the holding asset".to_string(),
        )
        .into());
    }

    Ok(())
}

/// Order the pairs so legs always chain: a holding-asset pair first, the
/// cross pair second, the other holding-asset pair last. Holding-asset
/// pairs keep their configuration order.
fn order_for_chaining(pairs: [TradingPair; 3], holding_asset: &str) -> Result<Vec<TradingPair>> {
    let (holding, cross): (Vec<TradingPair>, Vec<TradingPair>) =
        pairs.into_iter().partition(|p| p.contains(holding_asset));

    match (holding.as_slice(), cross.as_slice()) {
        ([h0, h1], [x]) => Ok(vec![h0.clone(), x.clone(), h1.clone()]),
        _ => Err(StrategyError::InvalidPairSet(
            "Exactly two pairs must include the holding asset".to_string(),
        )
        .into()),
    }
}

/// Track the held asset through the legs, assigning BUY where the pair's
/// quote is held and SELL where the base is held.
fn derive_sides(
    direction: Direction,
    pairs: Vec<TradingPair>,
    holding_asset: &str,
) -> Result<TradingCycle> {
    let mut held = holding_asset.to_string();
    let mut legs = Vec::with_capacity(3);

    for pair in pairs {
        let side = if pair.base == held {
            held = pair.quote.clone();
            OrderSide::Sell
        } else if pair.quote == held {
            held = pair.base.clone();
            OrderSide::Buy
        } else {
            return Err(StrategyError::InvalidPairSet(format!(
                "Held asset {} not in pair {}",
                held, pair
            ))
            .into());
        };
        legs.push(Leg { pair, side });
    }

    debug_assert_eq!(held, holding_asset, "cycle must return to the holding asset");

    Ok(TradingCycle {
        direction,
        legs: legs
            .try_into()
            .expect("exactly three legs are derived from three pairs"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: [&str; 3], holding: &str) -> TriangularConfig {
        let mut config = TriangularConfig::default();
        config.first_pair = pairs[0].to_string();
        config.second_pair = pairs[1].to_string();
        config.third_pair = pairs[2].to_string();
        config.holding_asset = holding.to_string();
        config
    }

    fn pair_names(cycle: &TradingCycle) -> Vec<&str> {
        cycle.legs.iter().map(|l| l.pair.name.as_str()).collect()
    }

    fn sides(cycle: &TradingCycle) -> Vec<OrderSide> {
        cycle.legs.iter().map(|l| l.side).collect()
    }

    #[test]
    fn test_pair_parsing() {
        let pair: TradingPair = "ADA-USDT".parse().unwrap();
        assert_eq!(pair.base, "ADA");
        assert_eq!(pair.quote, "USDT");
        assert!(pair.contains("ADA"));
        assert!(!pair.contains("BTC"));

        assert!("ADAUSDT".parse::<TradingPair>().is_err());
        assert!("-USDT".parse::<TradingPair>().is_err());
        assert!("ADA-".parse::<TradingPair>().is_err());
        assert!("ADA-BTC-USDT".parse::<TradingPair>().is_err());
    }

    #[test]
    fn test_forward_cycle_chains_for_default_triangle() {
        let plan = CyclePlan::build(&config(["ADA-USDT", "ADA-BTC", "BTC-USDT"], "USDT")).unwrap();

        // The cross pair must sit between the two holding-asset pairs for
        // legs to chain; holding pairs keep configuration order.
        assert_eq!(pair_names(&plan.forward), vec!["ADA-USDT", "ADA-BTC", "BTC-USDT"]);
        assert_eq!(
            sides(&plan.forward),
            vec![OrderSide::Buy, OrderSide::Sell, OrderSide::Sell]
        );
    }

    #[test]
    fn test_reverse_cycle_is_exact_reversal() {
        let plan = CyclePlan::build(&config(["ADA-USDT", "ADA-BTC", "BTC-USDT"], "USDT")).unwrap();

        let mut forward_names = pair_names(&plan.forward);
        forward_names.reverse();
        assert_eq!(pair_names(&plan.reverse), forward_names);
        assert_eq!(
            sides(&plan.reverse),
            vec![OrderSide::Buy, OrderSide::Buy, OrderSide::Sell]
        );
    }

    #[test]
    fn test_cycle_returns_to_holding_asset() {
        let plan = CyclePlan::build(&config(["ADA-USDT", "ADA-BTC", "BTC-USDT"], "USDT")).unwrap();

        for cycle in [&plan.forward, &plan.reverse] {
            let mut held = "USDT".to_string();
            for leg in &cycle.legs {
                held = match leg.side {
                    OrderSide::Sell => {
                        assert_eq!(leg.pair.base, held);
                        leg.pair.quote.clone()
                    }
                    OrderSide::Buy => {
                        assert_eq!(leg.pair.quote, held);
                        leg.pair.base.clone()
                    }
                };
            }
            assert_eq!(held, "USDT");
        }
    }

    #[test]
    fn test_quote_oriented_holding_pairs() {
        // Holding asset as base of its pairs still chains
        let plan = CyclePlan::build(&config(["USDT-ADA", "USDT-BTC", "ADA-BTC"], "USDT")).unwrap();
        assert_eq!(pair_names(&plan.forward), vec!["USDT-ADA", "ADA-BTC", "USDT-BTC"]);
        assert_eq!(
            sides(&plan.forward),
            vec![OrderSide::Sell, OrderSide::Sell, OrderSide::Buy]
        );
    }

    #[test]
    fn test_rejects_wrong_asset_count() {
        // Two distinct assets
        let err = CyclePlan::build(&config(["ADA-USDT", "ADA-USDT", "ADA-USDT"], "USDT"));
        assert!(err.is_err());

        // Four distinct assets
        let err = CyclePlan::build(&config(["ADA-USDT", "ETH-BTC", "BTC-USDT"], "USDT"));
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_missing_holding_asset() {
        let err = CyclePlan::build(&config(["ADA-USDT", "ADA-BTC", "BTC-USDT"], "ETH"));
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_too_few_holding_pairs() {
        // Three assets, holding asset present, but only one pair contains it
        let err = CyclePlan::build(&config(["ADA-BTC", "ADA-BTC", "BTC-USDT"], "USDT"));
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_non_chaining_duplicate_holding_pairs() {
        // Two holding pairs over the same assets cannot close the triangle
        let err = CyclePlan::build(&config(["ADA-USDT", "ADA-USDT", "ADA-BTC"], "USDT"));
        assert!(err.is_err());
    }

    #[test]
    fn test_invalid_pair_set_error_kind() {
        let err = CyclePlan::build(&config(["ADA-USDT", "ADA-BTC", "BTC-USDT"], "ETH"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StrategyError>(),
            Some(StrategyError::InvalidPairSet(_))
        ));
    }
}
