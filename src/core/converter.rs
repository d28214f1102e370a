//! Re-denominates a set of quoted rates onto a different base currency

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use super::error::RateError;
use super::rates::{RateMap, RateResponse, round_rate};

#[async_trait]
pub trait BaseRateConverter: Send + Sync {
    async fn convert(&self, new_base: &str, response: RateResponse) -> Result<RateResponse, RateError>;
}

/// Converts by inverting the new base's quoted rate and rescaling every other
/// rate with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReciprocalConverter;

#[async_trait]
impl BaseRateConverter for ReciprocalConverter {
    async fn convert(&self, new_base: &str, response: RateResponse) -> Result<RateResponse, RateError> {
        convert_base(new_base, &response)
    }
}

/// Returns `response` re-quoted against `new_base`.
///
/// The old base comes back as an explicit entry and `new_base` disappears
/// from the map. Every produced rate is rounded to two places. Converting onto
/// the current base only drops any self-referential entry and rounds.
pub fn convert_base(new_base: &str, response: &RateResponse) -> Result<RateResponse, RateError> {
    let old_base = response.base_currency.as_str();

    if new_base == old_base {
        let mut same = response.clone();
        same.rates.remove(new_base);
        for rate in same.rates.values_mut() {
            *rate = round_rate(*rate);
        }
        return Ok(same);
    }

    let pivot = response
        .rate(new_base)
        .ok_or_else(|| RateError::CurrencyNotFound(new_base.to_string()))?;

    if pivot <= Decimal::ZERO {
        return Err(RateError::InvalidRate {
            currency: new_base.to_string(),
            rate: pivot.to_string(),
        });
    }

    let inverse_pivot = Decimal::ONE
        .checked_div(pivot)
        .ok_or_else(|| RateError::InvalidRate {
            currency: new_base.to_string(),
            rate: pivot.to_string(),
        })?;
    debug!(%old_base, %new_base, %pivot, "Re-denominating rates");

    let mut rates = RateMap::new();
    rates.insert(old_base.to_string(), round_rate(inverse_pivot));

    for (code, rate) in response
        .rates
        .iter()
        .filter(|(code, _)| code.as_str() != new_base && code.as_str() != old_base)
    {
        let rescaled = rate
            .checked_mul(inverse_pivot)
            .ok_or_else(|| RateError::InvalidRate {
                currency: code.clone(),
                rate: rate.to_string(),
            })?;
        rates.insert(code.clone(), round_rate(rescaled));
    }

    Ok(RateResponse {
        success: response.success,
        timestamp: response.timestamp,
        base_currency: new_base.to_string(),
        date: response.date.clone(),
        rates,
    })
}
