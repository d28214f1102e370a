use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use super::util::{build_http_client, parse_base_url, unique_codes, validate_currency_code};
use crate::core::client::{CurrencyApiClient, FailurePolicy, Provider};
use crate::core::config::ProviderConfig;
use crate::core::error::RateError;
use crate::core::rates::{RateMap, RateResponse, round_rate};

const PROVIDER: Provider = Provider::Crypto;
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

#[derive(Debug, Deserialize)]
struct CoinMarketCapResponse {
    status: Option<CoinMarketCapStatus>,
    data: Option<CoinMarketCapData>,
}

#[derive(Debug, Deserialize)]
struct CoinMarketCapStatus {
    #[serde(default)]
    error_code: i64,
    error_message: Option<String>,
}

// Lookups by symbol answer with a list, lookups by id with a single entry.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CoinMarketCapData {
    Many(Vec<CoinMarketCapEntry>),
    One(CoinMarketCapEntry),
}

#[derive(Debug, Deserialize)]
struct CoinMarketCapEntry {
    #[serde(default)]
    quote: BTreeMap<String, CoinMarketCapQuote>,
}

#[derive(Debug, Deserialize)]
struct CoinMarketCapQuote {
    price: Option<Decimal>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Quote {
    code: String,
    price: Decimal,
    last_updated: Option<DateTime<Utc>>,
}

/// Crypto quotes, one price-conversion request per symbol. The upstream
/// prices one unit of the requested base directly, so nothing is
/// re-denominated.
pub struct CoinMarketCapProvider {
    base_url: reqwest::Url,
    client: reqwest::Client,
    policy: FailurePolicy,
}

impl CoinMarketCapProvider {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let headers = [
            (API_KEY_HEADER, config.api_key.as_str()),
            ("Accept", "application/json"),
        ];
        Ok(CoinMarketCapProvider {
            base_url: parse_base_url(config)?,
            client: build_http_client(config, &headers)?,
            policy: config.on_failure.unwrap_or(FailurePolicy::Absorb),
        })
    }

    async fn fetch_quote(&self, base_currency: &str, symbol: &str) -> Result<Quote, RateError> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("symbol", base_currency)
            .append_pair("amount", "1")
            .append_pair("convert", symbol);
        debug!(base_url = %self.base_url, %symbol, "Requesting price conversion");

        let response = self.client.get(url).send().await.map_err(|e| {
            RateError::upstream_with(
                PROVIDER.to_string(),
                format!("Request error for {base_currency}/{symbol}"),
                e,
            )
        })?;

        if !response.status().is_success() {
            return Err(RateError::upstream(
                PROVIDER.to_string(),
                format!(
                    "HTTP error: {} for {base_currency}/{symbol}",
                    response.status()
                ),
            ));
        }

        let text = response.text().await.map_err(|e| {
            RateError::upstream_with(PROVIDER.to_string(), "Failed to read response body", e)
        })?;

        let data: CoinMarketCapResponse = serde_json::from_str(&text).map_err(|e| {
            RateError::upstream_with(
                PROVIDER.to_string(),
                format!("Failed to parse JSON response for {base_currency}/{symbol}"),
                e,
            )
        })?;

        if let Some(status) = data.status.filter(|s| s.error_code != 0) {
            return Err(RateError::upstream(
                PROVIDER.to_string(),
                format!(
                    "Upstream error {}: {}",
                    status.error_code,
                    status.error_message.unwrap_or_default()
                ),
            ));
        }

        let entry = match data.data {
            Some(CoinMarketCapData::Many(entries)) => entries.into_iter().next(),
            Some(CoinMarketCapData::One(entry)) => Some(entry),
            None => None,
        };
        let mut quotes = entry.map(|e| e.quote).unwrap_or_default();

        let (code, quote) = match quotes.remove_entry(symbol) {
            Some(found) => found,
            None => quotes.into_iter().next().ok_or_else(|| {
                RateError::upstream(
                    PROVIDER.to_string(),
                    format!("No quote found for {base_currency}/{symbol}"),
                )
            })?,
        };

        Ok(Quote {
            code,
            price: round_rate(quote.price.unwrap_or(Decimal::ZERO)),
            last_updated: quote.last_updated,
        })
    }
}

#[async_trait]
impl CurrencyApiClient for CoinMarketCapProvider {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    #[instrument(name = "CryptoQuotesFetch", skip(self, symbols), fields(base = %base_currency))]
    async fn fetch_rates(
        &self,
        base_currency: &str,
        symbols: &[String],
    ) -> Result<RateResponse, RateError> {
        validate_currency_code(base_currency)?;
        for symbol in symbols {
            validate_currency_code(symbol)?;
        }

        let requested = unique_codes(symbols.iter().map(String::as_str));
        let quote_futures = requested.into_iter().map(|symbol| async move {
            (symbol, self.fetch_quote(base_currency, symbol).await)
        });
        let results = join_all(quote_futures).await;

        let mut rates = RateMap::new();
        let mut last_updated: Option<DateTime<Utc>> = None;
        let mut failed = Vec::new();

        for (symbol, result) in results {
            match result {
                Ok(quote) => {
                    last_updated = last_updated.max(quote.last_updated);
                    rates.insert(quote.code, quote.price);
                }
                Err(err) => {
                    warn!(%symbol, error = %err, "Quote request failed");
                    failed.push(symbol.to_string());
                }
            }
        }

        let outcome = if failed.is_empty() {
            Ok(RateResponse {
                success: true,
                timestamp: last_updated.map(|t| t.timestamp()),
                base_currency: base_currency.to_string(),
                date: last_updated.map(|t| t.format("%Y-%m-%d").to_string()),
                rates,
            })
        } else {
            Err(RateError::PartialUpstreamFailure {
                provider: PROVIDER.to_string(),
                failed,
            })
        };

        self.policy.resolve(PROVIDER, base_currency, outcome)
    }
}
