//! Matching configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DUST_COLLECTOR, DEFAULT_MAX_PRICE_LIMIT_RATIO, DEFAULT_TICK_PRECISION,
    DEFAULT_WITHDRAW_FEE_RATE, MAX_TICK_PRECISION,
};
use crate::{Dec, DexError, Result, TickGrid};

/// Per-pair configuration of the batch auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Significant digits kept by the tick grid beyond the leading one.
    pub tick_precision: u32,
    /// Maximum relative deviation of a batch price from the last price.
    pub max_price_limit_ratio: Dec,
    /// Fee kept by a pool on (partial) withdrawals.
    pub withdraw_fee_rate: Dec,
    /// Account receiving each batch's rounding dust.
    pub dust_collector: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        let (ratio_mantissa, ratio_scale) = DEFAULT_MAX_PRICE_LIMIT_RATIO;
        let (fee_mantissa, fee_scale) = DEFAULT_WITHDRAW_FEE_RATE;
        Self {
            tick_precision: DEFAULT_TICK_PRECISION,
            max_price_limit_ratio: Dec::new(ratio_mantissa, ratio_scale),
            withdraw_fee_rate: Dec::new(fee_mantissa, fee_scale),
            dust_collector: DEFAULT_DUST_COLLECTOR.to_string(),
        }
    }
}

impl MatchConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_precision > MAX_TICK_PRECISION {
            return Err(DexError::Configuration(format!(
                "tick_precision {} exceeds {MAX_TICK_PRECISION}",
                self.tick_precision
            )));
        }
        if !self.max_price_limit_ratio.is_positive() || self.max_price_limit_ratio >= Dec::ONE {
            return Err(DexError::Configuration(format!(
                "max_price_limit_ratio {} must be in (0, 1)",
                self.max_price_limit_ratio
            )));
        }
        if self.withdraw_fee_rate.is_negative() || self.withdraw_fee_rate >= Dec::ONE {
            return Err(DexError::Configuration(format!(
                "withdraw_fee_rate {} must be in [0, 1)",
                self.withdraw_fee_rate
            )));
        }
        if self.dust_collector.trim().is_empty() {
            return Err(DexError::Configuration("dust_collector must not be empty".into()));
        }
        Ok(())
    }

    /// The tick grid for this configuration's precision.
    pub fn tick_grid(&self) -> Result<TickGrid> {
        TickGrid::new(self.tick_precision)
    }
}
