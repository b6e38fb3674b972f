//! INR -> USD exchange-rate lookup.
//!
//! The model was fit on USD amounts while applicants enter rupees, so every
//! analysis needs a conversion rate. A failed lookup is never fatal: the
//! configured fallback rate is used and the caller is told which source won.

use crate::config::CurrencyConfig;
use crate::error::CurrencyError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Where an exchange rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Live,
    Fallback,
}

/// An INR -> USD rate together with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub inr_to_usd: f64,
    pub source: RateSource,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

/// Client for the exchange-rate endpoint.
pub struct ExchangeRateClient {
    client: Client,
    config: CurrencyConfig,
}

impl ExchangeRateClient {
    pub fn new(config: CurrencyConfig) -> Result<Self, CurrencyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CurrencyError::Request {
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    /// The configured fallback, without touching the network.
    pub fn fallback(&self) -> ExchangeRate {
        ExchangeRate {
            inr_to_usd: self.config.fallback_rate,
            source: RateSource::Fallback,
        }
    }

    /// Fetch the live rate.
    pub async fn fetch(&self) -> Result<f64, CurrencyError> {
        debug!(url = %self.config.rate_url, "Fetching INR exchange rate");
        let response = self
            .client
            .get(&self.config.rate_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CurrencyError::Request {
                message: e.to_string(),
            })?;
        let body = response.text().await.map_err(|e| CurrencyError::Request {
            message: e.to_string(),
        })?;
        parse_usd_rate(&body)
    }

    /// Fetch the live rate, falling back to the configured rate on any failure.
    pub async fn current_rate(&self) -> ExchangeRate {
        if !self.config.live {
            return self.fallback();
        }
        match self.fetch().await {
            Ok(rate) => ExchangeRate {
                inr_to_usd: rate,
                source: RateSource::Live,
            },
            Err(e) => {
                warn!(error = %e, fallback = self.config.fallback_rate, "Could not fetch live exchange rate; using fallback");
                self.fallback()
            }
        }
    }
}

/// Extract `rates.USD` from an exchange-rate API body.
pub fn parse_usd_rate(body: &str) -> Result<f64, CurrencyError> {
    let parsed: RatesResponse = serde_json::from_str(body).map_err(|e| CurrencyError::Request {
        message: format!("Invalid JSON: {e}"),
    })?;
    let rate = parsed
        .rates
        .get("USD")
        .copied()
        .ok_or_else(|| CurrencyError::MissingRate {
            currency: "USD".to_string(),
        })?;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(CurrencyError::InvalidRate { rate });
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_usd_rate() {
        let body = r#"{"base":"INR","rates":{"INR":1,"USD":0.01198,"EUR":0.011}}"#;
        assert!((parse_usd_rate(body).unwrap() - 0.01198).abs() < 1e-12);
    }

    #[test]
    fn test_parse_missing_usd() {
        let body = r#"{"rates":{"EUR":0.011}}"#;
        assert!(matches!(
            parse_usd_rate(body),
            Err(CurrencyError::MissingRate { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_non_positive() {
        let body = r#"{"rates":{"USD":0.0}}"#;
        assert!(matches!(
            parse_usd_rate(body),
            Err(CurrencyError::InvalidRate { .. })
        ));
        assert!(parse_usd_rate("not json").is_err());
    }

    #[tokio::test]
    async fn test_offline_uses_fallback() {
        let client = ExchangeRateClient::new(CurrencyConfig {
            live: false,
            ..CurrencyConfig::default()
        })
        .unwrap();
        let rate = client.current_rate().await;
        assert_eq!(rate.source, RateSource::Fallback);
        assert!((rate.inr_to_usd - 0.012).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        let client = ExchangeRateClient::new(CurrencyConfig {
            rate_url: "http://127.0.0.1:9/latest/INR".to_string(),
            timeout_secs: 1,
            ..CurrencyConfig::default()
        })
        .unwrap();
        let rate = client.current_rate().await;
        assert_eq!(rate.source, RateSource::Fallback);
    }
}
