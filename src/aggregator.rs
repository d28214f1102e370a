//! Fetches every configured provider for one base currency.

use anyhow::Result;
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::client::{CurrencyApiClient, Provider};
use crate::core::config::AppConfig;
use crate::core::converter::ReciprocalConverter;
use crate::core::error::RateError;
use crate::core::rates::RateResponse;
use crate::providers::coin_market_cap::CoinMarketCapProvider;
use crate::providers::exchange_rates::ExchangeRatesProvider;

pub type ProviderRates = BTreeMap<Provider, RateResponse>;

pub struct RateAggregator {
    clients: BTreeMap<Provider, Arc<dyn CurrencyApiClient>>,
    symbols: Vec<String>,
}

impl RateAggregator {
    pub fn new(symbols: Vec<String>) -> Self {
        RateAggregator {
            clients: BTreeMap::new(),
            symbols,
        }
    }

    /// Registers `client` under its own provider tag, replacing any earlier one.
    pub fn with_client(mut self, client: Arc<dyn CurrencyApiClient>) -> Self {
        self.clients.insert(client.provider(), client);
        self
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let fiat = ExchangeRatesProvider::new(
            &config.providers.get(Provider::Fiat),
            Arc::new(ReciprocalConverter),
        )?;
        let crypto = CoinMarketCapProvider::new(&config.providers.get(Provider::Crypto))?;

        Ok(Self::new(config.symbols.clone())
            .with_client(Arc::new(fiat))
            .with_client(Arc::new(crypto)))
    }

    /// Rates from every provider, keyed by provider. A blank base is a no-op
    /// and yields an empty map. Any provider error fails the whole fetch.
    pub async fn fetch_all(&self, base_currency: &str) -> Result<ProviderRates, RateError> {
        let base = base_currency.trim();
        if base.is_empty() {
            debug!("No base currency given, skipping fetch");
            return Ok(ProviderRates::new());
        }

        let fetches = self.clients.iter().map(|(provider, client)| async move {
            let rates = client.fetch_rates(base, &self.symbols).await?;
            debug!(%provider, success = rates.success, count = rates.rates.len(), "Provider done");
            Ok::<_, RateError>((*provider, rates))
        });

        Ok(try_join_all(fetches).await?.into_iter().collect())
    }
}
