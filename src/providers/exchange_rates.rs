use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::util::{build_http_client, parse_base_url, unique_codes, validate_currency_code};
use crate::core::client::{CurrencyApiClient, FailurePolicy, Provider};
use crate::core::config::ProviderConfig;
use crate::core::converter::BaseRateConverter;
use crate::core::error::RateError;
use crate::core::rates::{RateMap, RateResponse};

const PROVIDER: Provider = Provider::Fiat;

#[derive(Debug, Deserialize)]
struct ExchangeRatesResponse {
    success: Option<bool>,
    timestamp: Option<i64>,
    base: Option<String>,
    date: Option<String>,
    #[serde(default)]
    rates: RateMap,
    error: Option<ExchangeRatesError>,
}

#[derive(Debug, Deserialize)]
struct ExchangeRatesError {
    #[serde(rename = "type")]
    kind: Option<String>,
    info: Option<String>,
}

/// Fiat rates. The upstream only quotes against its own home currency, so
/// every answer is re-denominated onto the requested base.
pub struct ExchangeRatesProvider {
    base_url: reqwest::Url,
    api_key: String,
    client: reqwest::Client,
    converter: Arc<dyn BaseRateConverter>,
    policy: FailurePolicy,
}

impl ExchangeRatesProvider {
    pub fn new(config: &ProviderConfig, converter: Arc<dyn BaseRateConverter>) -> anyhow::Result<Self> {
        Ok(ExchangeRatesProvider {
            base_url: parse_base_url(config)?,
            api_key: config.api_key.clone(),
            client: build_http_client(config, &[])?,
            converter,
            policy: config.on_failure.unwrap_or(FailurePolicy::Propagate),
        })
    }

    fn request_url(&self, base_currency: &str, symbols: &[String]) -> reqwest::Url {
        let requested = unique_codes(symbols.iter().map(String::as_str).chain([base_currency]));

        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("access_key", &self.api_key)
            .append_pair("symbols", &requested.join(","));
        url
    }

    /// Rates as the upstream quotes them, against its home currency.
    async fn fetch_upstream(
        &self,
        base_currency: &str,
        symbols: &[String],
    ) -> Result<RateResponse, RateError> {
        let url = self.request_url(base_currency, symbols);
        debug!(base_url = %self.base_url, "Requesting fiat rates");

        let response = self.client.get(url).send().await.map_err(|e| {
            RateError::upstream_with(PROVIDER.to_string(), "Request error", e)
        })?;

        if !response.status().is_success() {
            return Err(RateError::upstream(
                PROVIDER.to_string(),
                format!("HTTP error: {}", response.status()),
            ));
        }

        let text = response.text().await.map_err(|e| {
            RateError::upstream_with(PROVIDER.to_string(), "Failed to read response body", e)
        })?;

        let data: ExchangeRatesResponse = serde_json::from_str(&text).map_err(|e| {
            RateError::upstream_with(PROVIDER.to_string(), "Failed to parse JSON response", e)
        })?;

        if data.success == Some(false) {
            let detail = data
                .error
                .and_then(|e| e.info.or(e.kind))
                .unwrap_or_else(|| "no details".to_string());
            return Err(RateError::upstream(
                PROVIDER.to_string(),
                format!("Upstream reported failure: {detail}"),
            ));
        }

        let base = data.base.filter(|b| !b.is_empty()).ok_or_else(|| {
            RateError::upstream(PROVIDER.to_string(), "Response carries no base currency")
        })?;

        debug!(upstream_base = %base, count = data.rates.len(), "Received fiat rates");
        Ok(RateResponse {
            success: true,
            timestamp: data.timestamp,
            base_currency: base,
            date: data.date,
            rates: data.rates,
        })
    }

    async fn fetch_and_convert(
        &self,
        base_currency: &str,
        symbols: &[String],
    ) -> Result<RateResponse, RateError> {
        let upstream = self.fetch_upstream(base_currency, symbols).await?;
        self.converter.convert(base_currency, upstream).await
    }
}

#[async_trait]
impl CurrencyApiClient for ExchangeRatesProvider {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    #[instrument(name = "FiatRatesFetch", skip(self, symbols), fields(base = %base_currency))]
    async fn fetch_rates(
        &self,
        base_currency: &str,
        symbols: &[String],
    ) -> Result<RateResponse, RateError> {
        validate_currency_code(base_currency)?;
        for symbol in symbols {
            validate_currency_code(symbol)?;
        }

        let outcome = self.fetch_and_convert(base_currency, symbols).await;
        self.policy.resolve(PROVIDER, base_currency, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::converter::ReciprocalConverter;
    use crate::providers::util::closed_port_uri;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MOCK_JSON: &str = r#"{
        "success": true,
        "timestamp": 1732054263,
        "base": "EUR",
        "date": "2024-11-19",
        "rates": {
            "USD": 1.055742,
            "EUR": 1,
            "BRL": 6.104929,
            "GBP": 0.83335,
            "AUD": 1.621026,
            "BTC": 0.000011332407
        }
    }"#;

    fn symbols() -> Vec<String> {
        ["USD", "EUR", "BRL", "GBP", "AUD"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    async fn create_mock_server(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider_for(uri: &str) -> ExchangeRatesProvider {
        let config = ProviderConfig::new(uri, "fake_access_key");
        ExchangeRatesProvider::new(&config, Arc::new(ReciprocalConverter)).unwrap()
    }

    /// Records what it was asked to convert and hands back a canned answer.
    struct RecordingConverter {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl BaseRateConverter for RecordingConverter {
        async fn convert(
            &self,
            new_base: &str,
            response: RateResponse,
        ) -> Result<RateResponse, RateError> {
            self.seen
                .lock()
                .unwrap()
                .push((new_base.to_string(), response.base_currency.clone()));
            Ok(RateResponse::new(new_base, RateMap::new()))
        }
    }

    #[tokio::test]
    async fn test_fetch_rates_converts_to_requested_base() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("access_key", "fake_access_key"))
            .and(query_param("symbols", "USD,EUR,BRL,GBP,AUD,BTC"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_JSON))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server.uri());
        let result = provider.fetch_rates("BTC", &symbols()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.base_currency, "BTC");
        assert_eq!(result.timestamp, Some(1732054263));
        assert_eq!(result.date.as_deref(), Some("2024-11-19"));
        assert_eq!(result.rates.len(), 5);
        assert_eq!(result.rate("EUR"), Some(dec!(88242.51)));
        assert_eq!(result.rate("USD"), Some(dec!(93161.32)));
        assert_eq!(result.rate("BRL"), Some(dec!(538714.24)));
        assert_eq!(result.rate("GBP"), Some(dec!(73536.89)));
        assert_eq!(result.rate("AUD"), Some(dec!(143043.40)));
    }

    #[tokio::test]
    async fn test_base_already_in_symbols_is_requested_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("symbols", "USD,EUR,BRL,GBP,AUD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_JSON))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server.uri());
        let result = provider.fetch_rates("USD", &symbols()).await.unwrap();

        assert_eq!(result.base_currency, "USD");
        assert!(result.rate("USD").is_none());
        assert!(result.rate("EUR").is_some());
    }

    #[tokio::test]
    async fn test_upstream_answer_goes_through_converter() {
        let mock_server = create_mock_server(200, MOCK_JSON).await;
        let converter = Arc::new(RecordingConverter {
            seen: Mutex::new(Vec::new()),
        });
        let config = ProviderConfig::new(&mock_server.uri(), "fake_access_key");
        let provider = ExchangeRatesProvider::new(&config, converter.clone()).unwrap();

        let result = provider.fetch_rates("GBP", &symbols()).await.unwrap();

        assert_eq!(result.base_currency, "GBP");
        assert_eq!(
            *converter.seen.lock().unwrap(),
            vec![("GBP".to_string(), "EUR".to_string())]
        );
    }

    #[tokio::test]
    async fn test_http_error_is_raised() {
        let mock_server = create_mock_server(500, "").await;
        let provider = provider_for(&mock_server.uri());

        let err = provider.fetch_rates("USD", &symbols()).await.unwrap_err();

        assert!(matches!(err, RateError::UpstreamFetch { .. }));
        assert_eq!(
            err.to_string(),
            "Error fetching currency rates from fiat: HTTP error: 500 Internal Server Error"
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_raised() {
        let provider = provider_for(&closed_port_uri());

        let err = provider.fetch_rates("USD", &symbols()).await.unwrap_err();

        assert!(matches!(err, RateError::UpstreamFetch { .. }));
    }

    #[tokio::test]
    async fn test_reported_failure_is_raised() {
        let body = r#"{
            "success": false,
            "error": {"code": 101, "type": "invalid_access_key", "info": "You have not supplied a valid API Access Key."}
        }"#;
        let mock_server = create_mock_server(200, body).await;
        let provider = provider_for(&mock_server.uri());

        let err = provider.fetch_rates("USD", &symbols()).await.unwrap_err();

        assert!(
            err.to_string()
                .contains("You have not supplied a valid API Access Key.")
        );
    }

    #[tokio::test]
    async fn test_malformed_response_is_raised() {
        let mock_server = create_mock_server(200, r#"{"rates": "nope"}"#).await;
        let provider = provider_for(&mock_server.uri());

        let err = provider.fetch_rates("USD", &symbols()).await.unwrap_err();

        assert!(err.to_string().contains("Failed to parse JSON response"));
    }

    #[tokio::test]
    async fn test_unquoted_base_is_not_found() {
        let mock_server = create_mock_server(200, MOCK_JSON).await;
        let provider = provider_for(&mock_server.uri());

        let err = provider.fetch_rates("XYZ", &symbols()).await.unwrap_err();

        assert!(matches!(err, RateError::CurrencyNotFound(code) if code == "XYZ"));
    }

    #[tokio::test]
    async fn test_invalid_base_is_rejected_before_any_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_JSON))
            .expect(0)
            .mount(&mock_server)
            .await;
        let provider = provider_for(&mock_server.uri());

        let err = provider.fetch_rates("US D", &symbols()).await.unwrap_err();

        assert!(matches!(err, RateError::InvalidCurrencyCode(_)));
    }

    #[tokio::test]
    async fn test_absorb_policy_from_config() {
        let mock_server = create_mock_server(503, "").await;
        let mut config = ProviderConfig::new(&mock_server.uri(), "fake_access_key");
        config.on_failure = Some(FailurePolicy::Absorb);
        let provider = ExchangeRatesProvider::new(&config, Arc::new(ReciprocalConverter)).unwrap();

        let result = provider.fetch_rates("USD", &symbols()).await.unwrap();

        assert_eq!(provider.failure_policy(), FailurePolicy::Absorb);
        assert!(!result.success);
        assert!(result.rates.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_symbols_are_requested_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("symbols", "USD,GBP,EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_JSON))
            .expect(1)
            .mount(&mock_server)
            .await;
        let provider = provider_for(&mock_server.uri());
        let symbols: Vec<String> = ["USD", "GBP", "USD", "GBP"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = provider.fetch_rates("EUR", &symbols).await.unwrap();

        assert_eq!(result.base_currency, "EUR");
        assert_eq!(result.rate("USD"), Some(dec!(1.06)));
    }

    #[test]
    fn test_invalid_base_url_fails_construction() {
        let config = ProviderConfig::new("not a url", "fake_access_key");

        let result = ExchangeRatesProvider::new(&config, Arc::new(ReciprocalConverter));

        let err = result.err().unwrap();
        assert!(err.to_string().contains("Invalid base URL"));
    }

    #[test]
    fn test_default_policy_propagates() {
        let provider = provider_for("http://localhost");
        assert_eq!(provider.failure_policy(), FailurePolicy::Propagate);
        assert_eq!(provider.provider(), Provider::Fiat);
    }
}
