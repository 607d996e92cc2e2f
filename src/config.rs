use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tuning knobs for the market-making controller.
#[derive(Debug, Clone)]
pub struct MarketMakerConfig {
    /// Fractional spread applied symmetrically to both legs, in (0, 1).
    pub spread_fraction: Decimal,
    /// Minimum ETH balance required to cover miner fees.
    pub min_eth_for_fees: Decimal,
    /// Minimum tradable amount stamped on both legs, in the base unit.
    pub min_tradable_amount: Decimal,
    /// Backoff between balance-fetch retries.
    pub retry_delay: Duration,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            spread_fraction: dec!(0.1),
            min_eth_for_fees: dec!(0.02),
            min_tradable_amount: dec!(0.00038906),
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl MarketMakerConfig {
    pub fn with_spread(spread_fraction: Decimal) -> Result<Self> {
        let cfg = Self {
            spread_fraction,
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.spread_fraction > Decimal::ZERO && self.spread_fraction < Decimal::ONE,
            "spread_fraction must be in (0, 1): {}",
            self.spread_fraction
        );
        anyhow::ensure!(
            self.min_eth_for_fees >= Decimal::ZERO,
            "min_eth_for_fees must not be negative: {}",
            self.min_eth_for_fees
        );
        anyhow::ensure!(
            self.min_tradable_amount > Decimal::ZERO,
            "min_tradable_amount must be positive: {}",
            self.min_tradable_amount
        );
        Ok(())
    }
}
