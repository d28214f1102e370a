//! Rate map and response types shared by every provider

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Currency code to the amount of that currency worth one unit of the base.
pub type RateMap = BTreeMap<String, Decimal>;

/// Decimal places kept for every converted or quoted rate.
pub const RATE_DECIMAL_PLACES: u32 = 2;

/// Rounds a rate to two places, midpoints away from zero.
pub fn round_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(RATE_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(rename = "base")]
    pub base_currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub rates: RateMap,
}

impl RateResponse {
    pub fn new(base_currency: impl Into<String>, rates: RateMap) -> Self {
        Self {
            success: true,
            timestamp: None,
            base_currency: base_currency.into(),
            date: None,
            rates,
        }
    }

    /// Unsuccessful response with no rates, handed out instead of an error
    /// when a provider absorbs its upstream faults.
    pub fn soft_failure(base_currency: impl Into<String>) -> Self {
        Self {
            success: false,
            timestamp: None,
            base_currency: base_currency.into(),
            date: None,
            rates: RateMap::new(),
        }
    }

    pub fn rate(&self, currency: &str) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }
}
