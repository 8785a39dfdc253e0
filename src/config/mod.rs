//! Configuration management module

pub mod settings;

pub use settings::*;

use crate::{Result, StrategyError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one triangular arbitrage strategy instance
///
/// Immutable after load: the strategy derives its trading cycles from the
/// three pairs and the holding asset once, at initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangularConfig {
    /// Connector identifier the strategy trades through
    pub connector_name: String,
    /// First trading pair, `BASE-QUOTE`
    pub first_pair: String,
    /// Second trading pair, `BASE-QUOTE`
    pub second_pair: String,
    /// Third trading pair, `BASE-QUOTE`
    pub third_pair: String,
    /// Asset capital is held in before and after a complete cycle
    pub holding_asset: String,
    /// Minimum expected profit, in percent, for a cycle to start
    pub min_profitability: Decimal,
    /// Amount committed per cycle, in holding-asset units
    pub order_amount_in_holding_asset: Decimal,
    /// Whether the kill switch is enforced by the run loop
    pub kill_switch_enabled: bool,
    /// Cumulative profit percentage at or below which the kill switch fires
    pub kill_switch_rate: Decimal,
}

impl TriangularConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| StrategyError::Config(format!("Failed to read config file: {}", e)))?;

        let config: TriangularConfig = toml::from_str(&content)
            .map_err(|e| StrategyError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for any variable that is not set
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            connector_name: env_or("CONNECTOR_NAME", defaults.connector_name),
            first_pair: env_or("FIRST_PAIR", defaults.first_pair),
            second_pair: env_or("SECOND_PAIR", defaults.second_pair),
            third_pair: env_or("THIRD_PAIR", defaults.third_pair),
            holding_asset: env_or("HOLDING_ASSET", defaults.holding_asset),
            min_profitability: env_decimal_or("MIN_PROFITABILITY", defaults.min_profitability)?,
            order_amount_in_holding_asset: env_decimal_or(
                "ORDER_AMOUNT",
                defaults.order_amount_in_holding_asset,
            )?,
            kill_switch_enabled: env_or("KILL_SWITCH_ENABLED", defaults.kill_switch_enabled.to_string())
                .to_lowercase()
                == "true",
            kill_switch_rate: env_decimal_or("KILL_SWITCH_RATE", defaults.kill_switch_rate)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Pair-set validation (distinct assets, holding asset membership,
    /// chaining) happens when the strategy builds its cycles; this only
    /// checks the fields in isolation.
    pub fn validate(&self) -> Result<()> {
        if self.connector_name.is_empty() {
            return Err(StrategyError::Config("Connector name cannot be empty".to_string()).into());
        }

        for pair in self.pairs() {
            ConfigValidator::validate_pair(pair)?;
        }

        ConfigValidator::validate_asset(&self.holding_asset)?;
        ConfigValidator::validate_positive(
            self.order_amount_in_holding_asset,
            "order_amount_in_holding_asset",
        )?;

        if self.kill_switch_enabled && self.kill_switch_rate >= Decimal::ZERO {
            return Err(StrategyError::Config(
                "kill_switch_rate must be negative when the kill switch is enabled".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// The three configured pairs, in configuration order
    pub fn pairs(&self) -> [&str; 3] {
        [&self.first_pair, &self.second_pair, &self.third_pair]
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_decimal_or(name: &str, default: Decimal) -> Result<Decimal> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<Decimal>()
            .map_err(|e| StrategyError::Config(format!("{} is not a valid decimal: {}", name, e)).into()),
        Err(_) => Ok(default),
    }
}

impl Default for TriangularConfig {
    fn default() -> Self {
        Self {
            connector_name: ConfigDefaults::CONNECTOR_NAME.to_string(),
            first_pair: ConfigDefaults::FIRST_PAIR.to_string(),
            second_pair: ConfigDefaults::SECOND_PAIR.to_string(),
            third_pair: ConfigDefaults::THIRD_PAIR.to_string(),
            holding_asset: ConfigDefaults::HOLDING_ASSET.to_string(),
            min_profitability: ConfigDefaults::min_profitability(),
            order_amount_in_holding_asset: ConfigDefaults::order_amount(),
            kill_switch_enabled: true,
            kill_switch_rate: ConfigDefaults::kill_switch_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_validation() {
        let config = TriangularConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_pair_rejected() {
        let mut config = TriangularConfig::default();
        config.first_pair = "ADAUSDT".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_order_amount_rejected() {
        let mut config = TriangularConfig::default();
        config.order_amount_in_holding_asset = Decimal::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_kill_switch_rate_must_be_negative() {
        let mut config = TriangularConfig::default();
        config.kill_switch_rate = dec!(2);
        assert!(config.validate().is_err());

        config.kill_switch_enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = TriangularConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: TriangularConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.first_pair, parsed.first_pair);
        assert_eq!(config.min_profitability, parsed.min_profitability);
    }

    #[test]
    fn test_config_from_file() {
        let config = TriangularConfig::default();
        let toml_content = toml::to_string(&config).unwrap();

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let loaded = TriangularConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.holding_asset, loaded.holding_asset);
        assert_eq!(
            config.order_amount_in_holding_asset,
            loaded.order_amount_in_holding_asset
        );
    }
}
