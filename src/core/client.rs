//! Provider abstractions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::warn;

use super::error::RateError;
use super::rates::RateResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Fiat,
    Crypto,
}

impl Provider {
    /// Label shown next to the provider's rates.
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Fiat => "https://exchangeratesapi.io",
            Provider::Crypto => "https://coinmarketcap.com/api",
        }
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Provider::Fiat => "fiat",
                Provider::Crypto => "crypto",
            }
        )
    }
}

/// What a provider does with faults raised while talking to its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Upstream faults become an unsuccessful, empty response.
    Absorb,
    /// Upstream faults are returned to the caller.
    Propagate,
}

impl FailurePolicy {
    /// Applies the policy to the outcome of a fetch. Faults that are not
    /// upstream faults always propagate.
    pub fn resolve(
        self,
        provider: Provider,
        base_currency: &str,
        outcome: Result<RateResponse, RateError>,
    ) -> Result<RateResponse, RateError> {
        match outcome {
            Err(err) if self == FailurePolicy::Absorb && err.is_upstream() => {
                warn!(%provider, base = %base_currency, error = %err, "Upstream failure absorbed");
                Ok(RateResponse::soft_failure(base_currency))
            }
            other => other,
        }
    }
}

#[async_trait]
pub trait CurrencyApiClient: Send + Sync {
    fn provider(&self) -> Provider;

    fn failure_policy(&self) -> FailurePolicy;

    /// Rates for `symbols`, quoted against `base_currency`.
    async fn fetch_rates(
        &self,
        base_currency: &str,
        symbols: &[String],
    ) -> Result<RateResponse, RateError>;
}
