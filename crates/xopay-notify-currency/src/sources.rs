//! Pluggable exchange-rate sources.
//!
//! Each source fetches one public bank API and returns normalized
//! [`RateEntry`] values. Sources are independent; the scheduler runs them
//! concurrently and treats any single failure as a failed refresh.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::RateError;
use crate::rates::RateEntry;

const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

const PRIVATBANK_URL: &str = "https://api.privatbank.ua/p24api/pubinfo?json&exchange&coursid=5";
const NBU_URL: &str = "https://bank.gov.ua/NBUStatService/v1/statdirectory/exchange?json";

/// A parameter-less exchange-rate source.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Human-readable source name, used in failure reports.
    fn name(&self) -> &str;

    /// Fetch and normalize the current rates.
    async fn fetch(&self) -> Result<Vec<RateEntry>, RateError>;
}

fn http_client() -> Client {
    Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .expect("failed to create HTTP client")
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    source: &str,
    url: &str,
) -> Result<T, RateError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| RateError::load(source, err))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RateError::load(source, format!("HTTP status {status}")));
    }

    response
        .json()
        .await
        .map_err(|err| RateError::parse(source, err))
}

// PrivatBank

#[derive(Debug, Deserialize)]
struct PrivatRate {
    ccy: String,
    base_ccy: String,
    buy: Decimal,
    sale: Decimal,
}

/// PrivatBank cash-rate API: UAH pairs for EUR and USD.
///
/// The buy side gives the direct `CCY -> UAH` rate; the reverse direction
/// is the inverse of the sell side.
pub struct PrivatBankSource {
    client: Client,
    url: String,
}

impl PrivatBankSource {
    pub fn new() -> Self {
        Self::with_url(PRIVATBANK_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
        }
    }
}

impl Default for PrivatBankSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateSource for PrivatBankSource {
    fn name(&self) -> &str {
        "Privat bank"
    }

    async fn fetch(&self) -> Result<Vec<RateEntry>, RateError> {
        let listed: Vec<PrivatRate> = get_json(&self.client, self.name(), &self.url).await?;

        let mut rates = Vec::new();
        for exchange in listed
            .iter()
            .filter(|e| e.base_ccy == "UAH" && matches!(e.ccy.as_str(), "EUR" | "USD"))
        {
            if exchange.sale.is_zero() {
                return Err(RateError::parse(
                    self.name(),
                    format!("zero sell rate for {}", exchange.ccy),
                ));
            }
            rates.push(RateEntry::new(&exchange.ccy, "UAH", exchange.buy));
            rates.push(RateEntry::inverse_of("UAH", &exchange.ccy, exchange.sale));
        }

        if rates.is_empty() {
            return Err(RateError::parse(self.name(), "no UAH exchange rates in response"));
        }

        Ok(rates)
    }
}

// National bank

#[derive(Debug, Deserialize)]
struct NbuRate {
    cc: String,
    rate: Decimal,
}

/// National Bank of Ukraine open-data API: official daily `CCY -> UAH`
/// rates. A single rate per currency, no buy/sell spread.
pub struct NbuSource {
    client: Client,
    url: String,
}

impl NbuSource {
    pub fn new() -> Self {
        Self::with_url(NBU_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
        }
    }
}

impl Default for NbuSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateSource for NbuSource {
    fn name(&self) -> &str {
        "National bank"
    }

    async fn fetch(&self) -> Result<Vec<RateEntry>, RateError> {
        let listed: Vec<NbuRate> = get_json(&self.client, self.name(), &self.url).await?;

        let rates: Vec<RateEntry> = listed
            .iter()
            .filter(|e| matches!(e.cc.as_str(), "EUR" | "USD"))
            .map(|e| RateEntry::new(&e.cc, "UAH", e.rate))
            .collect();

        if rates.is_empty() {
            return Err(RateError::parse(self.name(), "no EUR/USD rates in response"));
        }

        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_privatbank_normalizes_buy_and_inverse_sell() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"ccy": "EUR", "base_ccy": "UAH", "buy": "30.10", "sale": "31.00"},
                {"ccy": "USD", "base_ccy": "UAH", "buy": "27.00", "sale": "27.50"},
                {"ccy": "BTC", "base_ccy": "USD", "buy": "9000", "sale": "9500"}
            ])))
            .mount(&server)
            .await;

        let rates = PrivatBankSource::with_url(server.uri()).fetch().await.unwrap();

        assert_eq!(rates.len(), 4);
        assert_eq!(rates[0].from_currency, "EUR");
        assert_eq!(rates[0].rate.to_string(), "30.10");
        assert_eq!(rates[1].from_currency, "UAH");
        assert_eq!(rates[1].to_currency, "EUR");
        assert_eq!(rates[1].rate.to_string(), "0.0322581");
    }

    #[tokio::test]
    async fn test_privatbank_http_error_is_load_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = PrivatBankSource::with_url(server.uri()).fetch().await.unwrap_err();
        assert!(matches!(err, RateError::Load { .. }));
    }

    #[tokio::test]
    async fn test_privatbank_garbage_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = PrivatBankSource::with_url(server.uri()).fetch().await.unwrap_err();
        assert!(matches!(err, RateError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_nbu_keeps_major_currencies_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"cc": "USD", "rate": 27.123456789},
                {"cc": "EUR", "rate": 30.5},
                {"cc": "PLN", "rate": 7.1}
            ])))
            .mount(&server)
            .await;

        let rates = NbuSource::with_url(server.uri()).fetch().await.unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].rate.to_string(), "27.1235");
    }
}
