//! Configuration validation helpers and defaults

use crate::{Result, StrategyError};
use rust_decimal::Decimal;

/// Configuration validation utilities
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a `BASE-QUOTE` trading pair identifier
    pub fn validate_pair(pair: &str) -> Result<()> {
        let mut parts = pair.split('-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => {
                Self::validate_asset(base)?;
                Self::validate_asset(quote)?;
                Ok(())
            }
            _ => Err(StrategyError::Config(format!(
                "Trading pair '{}' is not in BASE-QUOTE form",
                pair
            ))
            .into()),
        }
    }

    /// Validate an asset identifier
    pub fn validate_asset(asset: &str) -> Result<()> {
        if asset.is_empty() {
            return Err(StrategyError::Config("Asset cannot be empty".to_string()).into());
        }

        if !asset.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StrategyError::Config(format!(
                "Asset '{}' must contain only alphanumeric characters",
                asset
            ))
            .into());
        }

        Ok(())
    }

    /// Validate a positive decimal value
    pub fn validate_positive(value: Decimal, name: &str) -> Result<()> {
        if value <= Decimal::ZERO {
            return Err(StrategyError::Config(format!("{} must be positive", name)).into());
        }
        Ok(())
    }
}

/// Configuration defaults
pub struct ConfigDefaults;

impl ConfigDefaults {
    /// Default connector identifier
    pub const CONNECTOR_NAME: &'static str = "kucoin";

    /// Default first pair
    pub const FIRST_PAIR: &'static str = "ADA-USDT";

    /// Default second pair
    pub const SECOND_PAIR: &'static str = "ADA-BTC";

    /// Default third pair
    pub const THIRD_PAIR: &'static str = "BTC-USDT";

    /// Default holding asset
    pub const HOLDING_ASSET: &'static str = "USDT";

    /// Default minimum profitability in percent
    pub fn min_profitability() -> Decimal {
        Decimal::new(5, 1) // 0.5%
    }

    /// Default per-cycle order amount in holding-asset units
    pub fn order_amount() -> Decimal {
        Decimal::from(20)
    }

    /// Default kill-switch rate in percent
    pub fn kill_switch_rate() -> Decimal {
        Decimal::from(-2)
    }
}
