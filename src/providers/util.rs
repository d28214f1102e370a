use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use crate::core::config::ProviderConfig;
use crate::core::error::RateError;

const MAX_CODE_LEN: usize = 10;

/// Builds the pooled client an adapter keeps for its lifetime.
///
/// `headers` are the adapter's own required headers; entries from the config
/// are layered on top of them.
pub fn build_http_client(
    config: &ProviderConfig,
    headers: &[(&str, &str)],
) -> Result<reqwest::Client> {
    let mut default_headers = HeaderMap::new();
    let configured = config
        .headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()));

    for (name, value) in headers.iter().copied().chain(configured) {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name: {name}"))?;
        let header_value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for header {name}"))?;
        default_headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .user_agent("knap/0.1")
        .default_headers(default_headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Parses the configured endpoint once, so a typo surfaces at startup instead
/// of on every fetch.
pub fn parse_base_url(config: &ProviderConfig) -> Result<reqwest::Url> {
    reqwest::Url::parse(&config.base_url)
        .with_context(|| format!("Invalid base URL: {}", config.base_url))
}

/// Drops repeated codes, keeping the first occurrence of each in order.
pub fn unique_codes<'a>(codes: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut unique: Vec<&str> = Vec::new();
    for code in codes {
        if !unique.contains(&code) {
            unique.push(code);
        }
    }
    unique
}

/// Rejects codes no upstream could quote: empty, too long, or containing
/// anything but ASCII letters and digits.
pub fn validate_currency_code(code: &str) -> Result<(), RateError> {
    let valid = !code.is_empty()
        && code.len() <= MAX_CODE_LEN
        && code.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(RateError::InvalidCurrencyCode(code.to_string()))
    }
}

/// Address nothing listens on, for exercising transport failures.
#[cfg(test)]
pub(crate) fn closed_port_uri() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
