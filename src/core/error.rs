//! Error taxonomy for rate conversion and upstream fetches

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum RateError {
    /// The requested base is not among the quoted rates.
    #[error("Could not find currency {0} in the quoted rates")]
    CurrencyNotFound(String),

    /// The pivot rate cannot be inverted.
    #[error("Invalid rate {rate} for currency {currency}")]
    InvalidRate { currency: String, rate: String },

    /// The caller passed a code no upstream could ever quote.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),

    #[error("Error fetching currency rates from {provider}: {message}")]
    UpstreamFetch {
        provider: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// One or more per-symbol calls of a fan-out fetch failed.
    #[error("{provider}: {} of the per-symbol requests failed ({})", .failed.len(), .failed.join(", "))]
    PartialUpstreamFailure {
        provider: String,
        failed: Vec<String>,
    },
}

impl RateError {
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        RateError::UpstreamFetch {
            provider: provider.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn upstream_with<E>(provider: impl Into<String>, message: impl Into<String>, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        RateError::UpstreamFetch {
            provider: provider.into(),
            message: message.into(),
            source: Some(err.into()),
        }
    }

    /// Faults that come from talking to an upstream, as opposed to a bad
    /// request or bad arithmetic on the caller's side.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RateError::UpstreamFetch { .. } | RateError::PartialUpstreamFailure { .. }
        )
    }
}
